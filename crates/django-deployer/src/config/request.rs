use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::config::{
    DEFAULT_REGION,
    resolved::{EndpointAuth, FunctionEnvironment, UsagePlan, VpcConfig},
};

#[derive(Debug, Snafu)]
#[snafu(display("failed to parse the override block of region {region:?}"))]
pub struct ParseRegionOverrideError {
    source: serde_json::Error,
    region: String,
}

/// The user supplied deployment configuration (the `inputs` of a
/// `serverless.yml`). Everything except the project name is optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub django_project_name: Option<String>,
    pub src: Option<SourceLocation>,
    pub region: Option<OneOrMany<String>>,

    /// Explicit function name, wins over the name recorded in state.
    pub function_name: Option<String>,

    /// Explicit gateway service, wins over the service recorded in state.
    pub service_id: Option<String>,
    pub service_name: Option<String>,

    pub handler: Option<String>,
    pub runtime: Option<String>,
    pub namespace: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "tag")]
    pub tags: Option<BTreeMap<String, String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,

    pub function_conf: Option<FunctionConf>,
    pub apigateway_conf: Option<GatewayConf>,
    #[serde(rename = "cloudDNSConf")]
    pub cloud_dns_conf: Option<DnsConf>,

    /// Any other top level key. Keys named after a requested region are
    /// per-region override blocks, see [`RegionOverride`].
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeploymentRequest {
    /// The requested regions in order, [`DEFAULT_REGION`] if none was given.
    pub fn region_list(&self) -> Vec<String> {
        match &self.region {
            Some(OneOrMany::One(region)) => vec![region.clone()],
            Some(OneOrMany::Many(regions)) if !regions.is_empty() => regions.clone(),
            _ => vec![DEFAULT_REGION.to_owned()],
        }
    }

    /// The override block keyed by `region`, if the request contains one.
    ///
    /// The block has to be a mapping. Sequences are rejected instead of being
    /// read positionally into the override fields.
    pub fn region_override(
        &self,
        region: &str,
    ) -> Result<Option<RegionOverride>, ParseRegionOverrideError> {
        self.extra
            .get(region)
            .map(|block| {
                serde_json::from_value::<Map<String, Value>>(block.clone())
                    .and_then(|block| serde_json::from_value(Value::Object(block)))
            })
            .transpose()
            .context(ParseRegionOverrideSnafu { region })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Where the application code comes from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceLocation {
    Path(String),
    Object(SourceObject),
}

/// A source given as object. With both `bucket` and `object` set, the code is
/// already uploaded and used as is.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceObject {
    pub src: Option<String>,
    pub bucket: Option<String>,
    pub object: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConf {
    pub handler: Option<String>,
    pub runtime: Option<String>,
    pub namespace: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
    pub environment: Option<FunctionEnvironment>,
    pub vpc_config: Option<VpcConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConf {
    pub protocols: Option<Vec<String>>,
    pub environment: Option<String>,
    pub is_disabled: Option<bool>,
    #[serde(rename = "enableCORS")]
    pub enable_cors: Option<bool>,
    pub usage_plan: Option<UsagePlan>,
    pub auth: Option<EndpointAuth>,
    pub custom_domain: Option<Vec<CustomDomain>>,
}

/// A custom domain bound to the gateway. Fields other than `domain` are
/// passed to the gateway provider untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub domain: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DnsConf {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A block keyed by a region name. Each part is merged on top of the shared
/// configuration of that region only.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionOverride {
    pub function_conf: Option<Value>,
    pub apigateway_conf: Option<Value>,
    #[serde(rename = "cloudDNSConf")]
    pub cloud_dns_conf: Option<Value>,
}
