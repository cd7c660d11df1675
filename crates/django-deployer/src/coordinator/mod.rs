//! Drives a deployment across all regions.
//!
//! A deployment runs in three phases: normalize the request, provision the
//! function and gateway of every region concurrently, then reconcile DNS
//! against the gateway sub-domains that came out of the second phase. Region
//! state is persisted as soon as a region settles, the shared keys and the DNS
//! history only once every region has.

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc};

use futures::future::join_all;
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    config::{
        CodeSource, ConfigNormalizer, DeploymentRequest,
        normalize::{self, code_source, validate_project_name},
    },
    credentials::{self, Credentials, TemporarySecrets},
    provider::{BoxError, FunctionRemoval, GatewayRemoval, Providers},
    state::{InstanceState, RegionState, StatePatch, StateStore},
};

mod dns;
mod outputs;
mod region;

pub use outputs::{
    DOMAIN_ALREADY_ADDED, DeployOutputs, FunctionOutput, GatewayOutput, MultiRegionOutputs,
    SingleRegionOutputs,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to acquire credentials"))]
    Credentials { source: credentials::Error },

    #[snafu(display("failed to read instance state"))]
    ReadState { source: BoxError },

    #[snafu(display("failed to record the deployed regions"))]
    WriteSharedState { source: BoxError },

    #[snafu(display("failed to record the DNS history"))]
    WriteDnsState { source: BoxError },

    #[snafu(display("failed to clear instance state"))]
    ClearState { source: BoxError },

    #[snafu(display("failed to restore the state of regions that could not be removed"))]
    RestoreState { source: BoxError },

    #[snafu(display("invalid deployment request"))]
    Normalize { source: normalize::Error },

    #[snafu(display("failed to stage source {src:?}"))]
    StageSource { source: BoxError, src: PathBuf },

    #[snafu(display("failed to package {directory:?}"))]
    PackageSource { source: BoxError, directory: PathBuf },

    #[snafu(display("failed to deploy DNS records"))]
    DeployDnsRecords { source: DomainFailures },

    #[snafu(display("one or more regions failed"))]
    Regions { source: RegionFailures },
}

/// A failure confined to a single region.
#[derive(Debug, Snafu)]
pub enum RegionError {
    #[snafu(display("failed to ensure code bucket {bucket:?} in region {region:?}"))]
    EnsureBucket {
        source: BoxError,
        region: String,
        bucket: String,
    },

    #[snafu(display("failed to upload {key:?} to bucket {bucket:?} in region {region:?}"))]
    UploadCode {
        source: BoxError,
        region: String,
        bucket: String,
        key: String,
    },

    #[snafu(display("failed to deploy function {name:?} in region {region:?}"))]
    DeployFunction {
        source: BoxError,
        region: String,
        name: String,
    },

    #[snafu(display("failed to deploy gateway in region {region:?}"))]
    DeployGateway { source: BoxError, region: String },

    #[snafu(display("failed to record state of region {region:?}"))]
    WriteRegionState { source: BoxError, region: String },

    #[snafu(display("no code package was built for region {region:?}"))]
    MissingArtifact { region: String },

    #[snafu(display("failed to remove function {name:?} in region {region:?}"))]
    RemoveFunction {
        source: BoxError,
        region: String,
        name: String,
    },
}

impl RegionError {
    pub fn region(&self) -> &str {
        match self {
            Self::EnsureBucket { region, .. }
            | Self::UploadCode { region, .. }
            | Self::DeployFunction { region, .. }
            | Self::DeployGateway { region, .. }
            | Self::WriteRegionState { region, .. }
            | Self::MissingArtifact { region }
            | Self::RemoveFunction { region, .. } => region,
        }
    }
}

/// Every region failure of one run, reported after all regions settled.
#[derive(Debug)]
pub struct RegionFailures(pub Vec<RegionError>);

impl RegionFailures {
    /// The failed regions, each named once.
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = Vec::new();
        for region in self.0.iter().map(RegionError::region) {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        regions
    }
}

impl fmt::Display for RegionFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_error_chains(f, &self.0)
    }
}

impl std::error::Error for RegionFailures {}

/// The record set of one custom domain could not be deployed.
#[derive(Debug, Snafu)]
#[snafu(display("failed to deploy DNS records of domain {domain:?}"))]
pub struct DomainError {
    source: BoxError,
    domain: String,
}

impl DomainError {
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Every domain whose record set could not be deployed in one run.
#[derive(Debug)]
pub struct DomainFailures(pub Vec<DomainError>);

impl DomainFailures {
    pub fn domains(&self) -> Vec<&str> {
        self.0.iter().map(DomainError::domain).collect()
    }
}

impl fmt::Display for DomainFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_error_chains(f, &self.0)
    }
}

impl std::error::Error for DomainFailures {}

/// Writes every error with its sources, separated by commas.
fn write_error_chains<E: std::error::Error>(
    f: &mut fmt::Formatter<'_>,
    errors: &[E],
) -> fmt::Result {
    for (index, error) in errors.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{error}")?;

        let mut source = error.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
    }
    Ok(())
}

/// Deploys and removes a Django application across regions.
pub struct Deployer {
    providers: Providers,
    state_store: Arc<dyn StateStore>,
    secrets: TemporarySecrets,
}

impl Deployer {
    pub fn new(
        providers: Providers,
        state_store: Arc<dyn StateStore>,
        secrets: TemporarySecrets,
    ) -> Self {
        Self {
            providers,
            state_store,
            secrets,
        }
    }

    /// Deploys `request` to every region it names.
    ///
    /// Credential and request validation failures abort before anything is
    /// provisioned. A failing region does not stop the others: regions that
    /// succeeded stay deployed and recorded, and [`Error::Regions`] lists the
    /// ones that did not. DNS is only reconciled once every region succeeded.
    #[instrument(skip_all, fields(project = ?request.django_project_name))]
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeployOutputs> {
        let credentials = Credentials::try_from(&self.secrets).context(CredentialsSnafu)?;
        let project_name = validate_project_name(request).context(NormalizeSnafu)?;
        let state = self.state_store.read().await.context(ReadStateSnafu)?;

        let staged = match code_source(request.src.as_ref()) {
            CodeSource::Local { src } => Some(
                self.providers
                    .artifact
                    .stage(&src, &project_name)
                    .await
                    .context(StageSourceSnafu { src: &src })?,
            ),
            CodeSource::Storage { .. } => None,
        };

        let normalized = ConfigNormalizer::new(self.providers.domain.as_ref())
            .normalize(request, &state)
            .await
            .context(NormalizeSnafu)?;

        let artifact = match (&staged, normalized.regions.first()) {
            (Some(directory), Some(plan)) => Some(
                self.providers
                    .artifact
                    .package(directory, &plan.function.include, &plan.function.exclude)
                    .await
                    .context(PackageSourceSnafu { directory })?,
            ),
            _ => None,
        };

        let outcomes = join_all(normalized.regions.iter().map(|plan| {
            self.deploy_region(
                plan,
                artifact.as_deref(),
                &credentials,
                state.region(&plan.region),
            )
        }))
        .await;

        self.state_store
            .write(StatePatch::Shared {
                region: normalized.region_list.first().cloned(),
                region_list: normalized.region_list.clone(),
                function_name: Some(normalized.function_name.clone()),
            })
            .await
            .context(WriteSharedStateSnafu)?;

        let mut scf = BTreeMap::new();
        let mut apigw = BTreeMap::new();
        let mut sub_domains = BTreeMap::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            if let Some(function) = outcome.function {
                scf.insert(outcome.region.clone(), function);
            }
            if let Some(gateway) = outcome.gateway {
                sub_domains.insert(outcome.region.clone(), gateway.sub_domain.clone());
                apigw.insert(outcome.region.clone(), GatewayOutput::from(&gateway));
            }
            failures.extend(outcome.errors);
        }

        if !failures.is_empty() {
            let failures = RegionFailures(failures);
            tracing::warn!(
                regions = ?failures.regions(),
                "skipping DNS reconciliation because regions failed"
            );
            return Err(Error::Regions { source: failures });
        }

        let cns = if normalized.dns.is_empty() && state.cns.is_empty() {
            None
        } else {
            let cns = self
                .reconcile_dns(&normalized.dns, &sub_domains, &state.cns)
                .await?;
            (!normalized.dns.is_empty()).then_some(cns)
        };

        Ok(DeployOutputs::shape(
            &normalized.region_list,
            &normalized.function_name,
            scf,
            apigw,
            cns,
        ))
    }

    /// Removes everything the recorded state names.
    ///
    /// Every region is attempted even if others fail. Gateway removals and DNS
    /// deletions that fail are logged and otherwise ignored. Regions whose
    /// function could not be removed stay recorded so that a re-run retries
    /// them.
    #[instrument(skip_all)]
    pub async fn remove(&self) -> Result<()> {
        Credentials::try_from(&self.secrets).context(CredentialsSnafu)?;
        let state = self.state_store.read().await.context(ReadStateSnafu)?;

        let results = join_all(
            state
                .regions
                .iter()
                .map(|(region, region_state)| self.remove_region(region, region_state)),
        )
        .await;
        let failures: Vec<RegionError> = results.into_iter().filter_map(Result::err).collect();

        for record_set in state.cns.iter().filter(|set| !set.records.is_empty()) {
            if let Err(error) = self.providers.dns.remove(&record_set.records).await {
                tracing::warn!(
                    %error,
                    domain = %record_set.domain,
                    "failed to remove DNS records"
                );
            }
        }

        self.state_store
            .write(StatePatch::Clear)
            .await
            .context(ClearStateSnafu)?;

        if failures.is_empty() {
            tracing::info!("removed all regions");
            return Ok(());
        }

        let failures = RegionFailures(failures);
        self.restore_failed_regions(&state, &failures.regions())
            .await
            .context(RestoreStateSnafu)?;
        Err(Error::Regions { source: failures })
    }

    async fn remove_region(
        &self,
        region: &str,
        region_state: &RegionState,
    ) -> Result<(), RegionError> {
        if let Some(function) = &region_state.function {
            self.providers
                .function
                .remove(region, &FunctionRemoval {
                    name: function.name.clone(),
                    namespace: function.namespace.clone(),
                })
                .await
                .context(RemoveFunctionSnafu {
                    region,
                    name: &function.name,
                })?;
            tracing::info!(region, function.name = %function.name, "removed function");
        }

        if let Some(gateway) = &region_state.gateway {
            let removal = GatewayRemoval {
                service_id: gateway.service_id.clone(),
                environment: gateway.environment.clone(),
                api_list: gateway.api_list.clone(),
                custom_domains: gateway.custom_domains.clone(),
                created: gateway.created,
            };
            match self.providers.gateway.remove(region, &removal).await {
                Ok(()) => {
                    tracing::info!(
                        region,
                        gateway.service_id = %gateway.service_id,
                        "removed gateway"
                    );
                }
                Err(error) => tracing::warn!(
                    %error,
                    region,
                    gateway.service_id = %gateway.service_id,
                    "failed to remove gateway"
                ),
            }
        }

        Ok(())
    }

    async fn restore_failed_regions(
        &self,
        state: &InstanceState,
        failed: &[&str],
    ) -> Result<(), BoxError> {
        for region in failed {
            if let Some(region_state) = state.region(region) {
                self.state_store
                    .write(StatePatch::Region {
                        region: (*region).to_owned(),
                        state: region_state.clone(),
                    })
                    .await?;
            }
        }

        let region_list: Vec<String> = failed.iter().map(|region| (*region).to_owned()).collect();
        self.state_store
            .write(StatePatch::Shared {
                region: region_list.first().cloned(),
                region_list,
                function_name: state.function_name.clone(),
            })
            .await
    }
}
