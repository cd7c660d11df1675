use std::path::Path;

use jiff::Timestamp;
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use crate::{
    config::{CodeSource, RegionPlan},
    coordinator::{
        Deployer, DeployFunctionSnafu, DeployGatewaySnafu, EnsureBucketSnafu, FunctionOutput,
        MissingArtifactSnafu, RegionError, UploadCodeSnafu, WriteRegionStateSnafu,
    },
    credentials::Credentials,
    provider::{BucketSpec, LifecycleRule},
    state::{FunctionState, GatewayState, RegionState, StatePatch},
};

const CODE_BUCKET_PREFIX: &str = "sls-cloudfunction";
const CODE_LIFECYCLE_DAYS: u32 = 10;

/// What one region's branch of a deployment produced.
#[derive(Debug)]
pub(super) struct RegionOutcome {
    pub region: String,
    pub function: Option<FunctionOutput>,
    pub gateway: Option<GatewayState>,
    pub errors: Vec<RegionError>,
}

/// The code bucket of `region` as function configs refer to it. Storage
/// requests need the app id suffixed.
pub(super) fn code_bucket(region: &str) -> String {
    format!("{CODE_BUCKET_PREFIX}-{region}-code")
}

fn code_bucket_spec(name: String) -> BucketSpec {
    BucketSpec {
        name,
        lifecycle: vec![LifecycleRule {
            id: "deleteObject".to_owned(),
            status: "Enabled".to_owned(),
            filter: String::new(),
            expiration_days: CODE_LIFECYCLE_DAYS,
            abort_incomplete_multipart_upload_days: CODE_LIFECYCLE_DAYS,
        }],
    }
}

/// `https` if any protocol asks for it, `http` otherwise.
fn url_scheme(protocols: &[String]) -> &'static str {
    if protocols
        .iter()
        .any(|protocol| protocol.eq_ignore_ascii_case("https"))
    {
        "https"
    } else {
        "http"
    }
}

impl Deployer {
    /// Deploys function and gateway of one region concurrently and records
    /// whatever of the two succeeded.
    #[instrument(skip_all, fields(region = %plan.region))]
    pub(super) async fn deploy_region(
        &self,
        plan: &RegionPlan,
        artifact: Option<&Path>,
        credentials: &Credentials,
        prior: Option<&RegionState>,
    ) -> RegionOutcome {
        let (function, gateway) = tokio::join!(
            self.deploy_function(plan, artifact, credentials),
            self.deploy_gateway(plan, prior),
        );

        let mut outcome = RegionOutcome {
            region: plan.region.clone(),
            function: None,
            gateway: None,
            errors: Vec::new(),
        };
        let mut patch = RegionState::default();

        match function {
            Ok(state) => {
                outcome.function = Some(FunctionOutput::from(&state));
                patch.function = Some(state);
            }
            Err(error) => outcome.errors.push(error),
        }

        match gateway {
            Ok(Some(state)) => {
                outcome.gateway = Some(state.clone());
                patch.gateway = Some(state);
            }
            Ok(None) => {}
            Err(error) => outcome.errors.push(error),
        }

        if let Err(error) = self.record_region(&plan.region, patch).await {
            outcome.errors.push(error);
        }

        if outcome.errors.is_empty() {
            tracing::info!("deployed region");
        } else {
            tracing::warn!(failures = outcome.errors.len(), "region failed");
        }
        outcome
    }

    async fn record_region(&self, region: &str, state: RegionState) -> Result<(), RegionError> {
        if state.function.is_none() && state.gateway.is_none() {
            return Ok(());
        }

        self.state_store
            .write(StatePatch::Region {
                region: region.to_owned(),
                state,
            })
            .await
            .context(WriteRegionStateSnafu { region })
    }

    async fn deploy_function(
        &self,
        plan: &RegionPlan,
        artifact: Option<&Path>,
        credentials: &Credentials,
    ) -> Result<FunctionState, RegionError> {
        let region = &plan.region;
        let mut function = plan.function.clone();

        if let CodeSource::Local { .. } = function.code {
            let artifact = artifact.context(MissingArtifactSnafu { region })?;
            function.code = self
                .upload_code(region, &function.name, artifact, credentials)
                .await?;
        }

        let deployment = self
            .providers
            .function
            .deploy(region, &function)
            .await
            .context(DeployFunctionSnafu {
                region,
                name: &function.name,
            })?;
        tracing::info!(function.name = %deployment.name, "deployed function");

        let (bucket, object) = match function.code {
            CodeSource::Storage { bucket, object } => (Some(bucket), Some(object)),
            CodeSource::Local { .. } => (None, None),
        };
        Ok(FunctionState {
            name: deployment.name,
            runtime: deployment.runtime,
            namespace: deployment.namespace,
            bucket,
            object,
        })
    }

    /// Ensures the region's code bucket and uploads `artifact` into it.
    async fn upload_code(
        &self,
        region: &str,
        function_name: &str,
        artifact: &Path,
        credentials: &Credentials,
    ) -> Result<CodeSource, RegionError> {
        let bucket = code_bucket(region);
        let bucket_name = format!("{bucket}-{}", credentials.app_id);

        self.providers
            .storage
            .ensure_bucket(region, &code_bucket_spec(bucket_name.clone()))
            .await
            .context(EnsureBucketSnafu {
                region,
                bucket: &bucket_name,
            })?;

        let object = format!("{function_name}-{}.zip", Timestamp::now().as_second());
        self.providers
            .storage
            .upload(region, &bucket_name, artifact, &object)
            .await
            .context(UploadCodeSnafu {
                region,
                bucket: &bucket_name,
                key: &object,
            })?;
        tracing::debug!(bucket = %bucket_name, object, "uploaded code package");

        Ok(CodeSource::Storage { bucket, object })
    }

    async fn deploy_gateway(
        &self,
        plan: &RegionPlan,
        prior: Option<&RegionState>,
    ) -> Result<Option<GatewayState>, RegionError> {
        if plan.gateway.is_disabled {
            tracing::debug!("gateway is disabled");
            return Ok(None);
        }

        let prior_api_list = prior
            .and_then(|prior| prior.gateway.as_ref())
            .map_or(&[][..], |gateway| gateway.api_list.as_slice());

        let deployment = self
            .providers
            .gateway
            .deploy(&plan.region, &plan.gateway, prior_api_list)
            .await
            .context(DeployGatewaySnafu {
                region: &plan.region,
            })?;
        tracing::info!(gateway.service_id = %deployment.service_id, "deployed gateway");

        let url = format!(
            "{}://{}/{}/",
            url_scheme(&deployment.protocols),
            deployment.sub_domain,
            deployment.environment
        );
        Ok(Some(GatewayState {
            service_id: deployment.service_id,
            sub_domain: deployment.sub_domain,
            environment: deployment.environment,
            url,
            api_list: deployment.api_list,
            created: deployment.created,
            custom_domains: deployment.custom_domains,
        }))
    }
}
