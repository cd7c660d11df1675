use std::path::PathBuf;

use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu, ensure};
use tracing::instrument;

use crate::{
    config::{
        CLIENT_REMARK, DEFAULT_DESCRIPTION, DEFAULT_ENVIRONMENT, DEFAULT_HANDLER,
        DEFAULT_MEMORY_SIZE, DEFAULT_NAMESPACE, DEFAULT_PROTOCOL, DEFAULT_RUNTIME,
        DEFAULT_TIMEOUT, FRAMEWORK, GATEWAY_DESCRIPTION,
        merge::merge,
        request::{
            DeploymentRequest, DnsConf, ParseRegionOverrideError, SourceLocation, SourceObject,
        },
        resolved::{CodeSource, FunctionConfig, GatewayConfig},
    },
    dns::{DEFAULT_RECORD_STATUS, DEFAULT_RECORD_TYPE, DEFAULT_SUB_DOMAIN, DnsPolicy, DnsRecordSet},
    provider::{BoxError, DomainValidator},
    state::InstanceState,
};

type Result<T, E = Error> = std::result::Result<T, E>;

const GENERATED_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const GENERATED_ID_LENGTH: usize = 8;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("'djangoProjectName' is required in serverless.yaml"))]
    MissingProjectName,

    #[snafu(transparent)]
    ParseRegionOverride { source: ParseRegionOverrideError },

    #[snafu(display("failed to apply the {kind} override of region {region:?}"))]
    ApplyRegionOverride {
        source: serde_json::Error,
        kind: &'static str,
        region: String,
    },

    #[snafu(display("failed to check custom domain {domain:?}"))]
    CheckDomain { source: BoxError, domain: String },
}

/// Everything a deployment needs to know, fully defaulted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDeployment {
    pub project_name: String,
    pub region_list: Vec<String>,

    /// The function name shared by all regions before overrides.
    pub function_name: String,

    /// One plan per region, in the order of [`Self::region_list`].
    pub regions: Vec<RegionPlan>,

    /// Desired DNS records per custom domain, values still unresolved.
    pub dns: Vec<DnsRecordSet>,
}

impl NormalizedDeployment {
    pub fn region(&self, region: &str) -> Option<&RegionPlan> {
        self.regions.iter().find(|plan| plan.region == region)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPlan {
    pub region: String,
    pub function: FunctionConfig,
    pub gateway: GatewayConfig,
    pub dns_policy: DnsPolicy,
}

/// Expands a [`DeploymentRequest`] into per-region configurations.
pub struct ConfigNormalizer<'a> {
    domain_validator: &'a dyn DomainValidator,
}

impl<'a> ConfigNormalizer<'a> {
    pub fn new(domain_validator: &'a dyn DomainValidator) -> Self {
        Self { domain_validator }
    }

    /// Resolves `request` against the previously recorded `state`.
    ///
    /// Names recorded in `state` are reused, so normalizing the same request
    /// against the same state always yields the same function name and
    /// gateway services.
    #[instrument(skip_all, fields(project = ?request.django_project_name))]
    pub async fn normalize(
        &self,
        request: &DeploymentRequest,
        state: &InstanceState,
    ) -> Result<NormalizedDeployment> {
        let project_name = validate_project_name(request)?;
        let region_list = request.region_list();

        let function_name = resolve_function_name(request, state, &region_list);
        let shared_function = shared_function_config(request, function_name.clone());
        let shared_gateway = shared_gateway_config(request);
        let shared_dns = request.cloud_dns_conf.clone().unwrap_or_default();

        let mut regions = Vec::with_capacity(region_list.len());
        for region in &region_list {
            regions.push(plan_region(
                request,
                state,
                region,
                &shared_function,
                &shared_gateway,
                &shared_dns,
            )?);
        }

        let dns = if shared_gateway.is_disabled {
            Vec::new()
        } else {
            self.desired_records(&shared_gateway, &regions).await?
        };

        tracing::debug!(
            function.name = %function_name,
            regions = ?region_list,
            domains = dns.len(),
            "normalized deployment request"
        );

        Ok(NormalizedDeployment {
            project_name,
            region_list,
            function_name,
            regions,
            dns,
        })
    }

    /// One record set per registrable domain, with one record per region that
    /// has a record line and a gateway.
    async fn desired_records(
        &self,
        gateway: &GatewayConfig,
        regions: &[RegionPlan],
    ) -> Result<Vec<DnsRecordSet>> {
        let mut record_sets: Vec<DnsRecordSet> = Vec::new();

        for custom_domain in &gateway.custom_domain {
            let check = self
                .domain_validator
                .check(&custom_domain.domain)
                .await
                .context(CheckDomainSnafu {
                    domain: &custom_domain.domain,
                })?;
            let sub_domain = check
                .sub_domain
                .as_deref()
                .filter(|sub_domain| !sub_domain.is_empty())
                .unwrap_or(DEFAULT_SUB_DOMAIN);

            let records = regions
                .iter()
                .filter(|plan| !plan.gateway.is_disabled)
                .filter_map(|plan| {
                    plan.dns_policy
                        .record_for(&plan.region, &check.domain, sub_domain)
                });

            match record_sets
                .iter_mut()
                .find(|record_set| record_set.domain == check.domain)
            {
                Some(record_set) => record_set.records.extend(records),
                None => record_sets.push(DnsRecordSet {
                    records: records.collect(),
                    domain: check.domain,
                }),
            }
        }

        Ok(record_sets)
    }
}

pub(crate) fn validate_project_name(request: &DeploymentRequest) -> Result<String> {
    let project_name = request.django_project_name.clone().unwrap_or_default();
    ensure!(!project_name.trim().is_empty(), MissingProjectNameSnafu);
    Ok(project_name)
}

/// Explicit name, then the name recorded for the first region, then the name
/// recorded for the whole instance, then a new one.
fn resolve_function_name(
    request: &DeploymentRequest,
    state: &InstanceState,
    region_list: &[String],
) -> String {
    request
        .function_name
        .clone()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            region_list
                .first()
                .and_then(|region| state.region(region))
                .and_then(|region| region.function.as_ref())
                .map(|function| function.name.clone())
        })
        .or_else(|| state.function_name.clone())
        .unwrap_or_else(generate_function_name)
}

/// `django_component_` followed by a short random id.
pub fn generate_function_name() -> String {
    let mut rng = rand::rng();
    let id: String = (0..GENERATED_ID_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..GENERATED_ID_CHARSET.len());
            char::from(GENERATED_ID_CHARSET[index])
        })
        .collect();

    format!("{FRAMEWORK}_component_{id}")
}

/// The first non-empty value, or `default`.
fn first_set(values: &[Option<&String>], default: &str) -> String {
    values
        .iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map_or_else(|| default.to_owned(), |value| (*value).clone())
}

fn shared_function_config(request: &DeploymentRequest, name: String) -> FunctionConfig {
    let conf = request.function_conf.clone().unwrap_or_default();

    let mut function = FunctionConfig {
        name,
        handler: first_set(&[conf.handler.as_ref(), request.handler.as_ref()], DEFAULT_HANDLER),
        runtime: first_set(&[conf.runtime.as_ref(), request.runtime.as_ref()], DEFAULT_RUNTIME),
        namespace: first_set(
            &[conf.namespace.as_ref(), request.namespace.as_ref()],
            DEFAULT_NAMESPACE,
        ),
        description: first_set(
            &[conf.description.as_ref(), request.description.as_ref()],
            DEFAULT_DESCRIPTION,
        ),
        timeout: conf.timeout.filter(|timeout| *timeout > 0).unwrap_or(DEFAULT_TIMEOUT),
        memory_size: conf
            .memory_size
            .filter(|memory_size| *memory_size > 0)
            .unwrap_or(DEFAULT_MEMORY_SIZE),
        tags: conf.tags.or_else(|| request.tags.clone()),
        include: conf
            .include
            .or_else(|| request.include.clone())
            .unwrap_or_default(),
        exclude: conf
            .exclude
            .or_else(|| request.exclude.clone())
            .unwrap_or_default(),
        environment: conf.environment,
        vpc_config: conf.vpc_config,
        code: code_source(request.src.as_ref()),
        from_client_remark: CLIENT_REMARK.to_owned(),
    };
    function.ensure_forced_excludes();
    function
}

pub(crate) fn code_source(src: Option<&SourceLocation>) -> CodeSource {
    match src {
        Some(SourceLocation::Object(SourceObject {
            bucket: Some(bucket),
            object: Some(object),
            ..
        })) => CodeSource::Storage {
            bucket: bucket.clone(),
            object: object.clone(),
        },
        Some(
            SourceLocation::Path(src)
            | SourceLocation::Object(SourceObject { src: Some(src), .. }),
        ) => CodeSource::Local {
            src: PathBuf::from(src),
        },
        _ => CodeSource::Local {
            src: PathBuf::from("."),
        },
    }
}

fn shared_gateway_config(request: &DeploymentRequest) -> GatewayConfig {
    let conf = request.apigateway_conf.clone().unwrap_or_default();

    GatewayConfig {
        service_id: None,
        service_name: request.service_name.clone(),
        description: GATEWAY_DESCRIPTION.to_owned(),
        protocols: conf
            .protocols
            .filter(|protocols| !protocols.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_PROTOCOL.to_owned()]),
        environment: first_set(&[conf.environment.as_ref()], DEFAULT_ENVIRONMENT),
        is_disabled: conf.is_disabled == Some(true),
        enable_cors: conf.enable_cors,
        usage_plan: conf.usage_plan,
        auth: conf.auth,
        endpoints: Vec::new(),
        custom_domain: conf.custom_domain.unwrap_or_default(),
        from_client_remark: CLIENT_REMARK.to_owned(),
    }
}

fn plan_region(
    request: &DeploymentRequest,
    state: &InstanceState,
    region: &str,
    shared_function: &FunctionConfig,
    shared_gateway: &GatewayConfig,
    shared_dns: &DnsConf,
) -> Result<RegionPlan> {
    let region_override = request.region_override(region)?.unwrap_or_default();

    let mut function = apply_region_override(
        shared_function,
        region_override.function_conf.as_ref(),
        "function",
        region,
    )?;
    function.ensure_forced_excludes();

    let mut gateway = shared_gateway.clone();
    gateway.service_id = request
        .service_id
        .clone()
        .filter(|service_id| !service_id.is_empty())
        .or_else(|| {
            state
                .region(region)
                .and_then(|region| region.gateway.as_ref())
                .map(|gateway| gateway.service_id.clone())
        });
    gateway.bind_function(&function);
    let mut gateway = apply_region_override(
        &gateway,
        region_override.apigateway_conf.as_ref(),
        "gateway",
        region,
    )?;
    // The override may change the function or the endpoint options.
    gateway.bind_function(&function);

    let dns = apply_region_override(
        shared_dns,
        region_override.cloud_dns_conf.as_ref(),
        "DNS",
        region,
    )?;
    let dns_policy = DnsPolicy {
        record_type: DEFAULT_RECORD_TYPE.to_owned(),
        record_line: dns.record_line.filter(|line| !line.is_empty()),
        ttl: dns.ttl,
        mx: dns.mx,
        status: first_set(&[dns.status.as_ref()], DEFAULT_RECORD_STATUS),
    };

    Ok(RegionPlan {
        region: region.to_owned(),
        function,
        gateway,
        dns_policy,
    })
}

/// Lays `region_override` over the JSON form of `shared`.
fn apply_region_override<T>(
    shared: &T,
    region_override: Option<&Value>,
    kind: &'static str,
    region: &str,
) -> Result<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    let Some(region_override) = region_override else {
        return Ok(shared.clone());
    };

    let shared = serde_json::to_value(shared).context(ApplyRegionOverrideSnafu { kind, region })?;
    serde_json::from_value(merge(region_override, &shared))
        .context(ApplyRegionOverrideSnafu { kind, region })
}
