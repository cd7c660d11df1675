//! What the last deployment provisioned, persisted between invocations.
//!
//! Writes are expressed as [`StatePatch`]es so that concurrently deploying
//! regions only ever touch their own block.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{dns::DnsRecordSet, provider::BoxError};

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    /// The first region of the last deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub region_list: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regions: BTreeMap<String, RegionState>,

    /// DNS records created by previous deployments, per domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cns: Vec<DnsRecordSet>,
}

impl InstanceState {
    pub fn region(&self, region: &str) -> Option<&RegionState> {
        self.regions.get(region)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies `patch`, leaving every key it does not name untouched.
    pub fn apply(&mut self, patch: StatePatch) {
        match patch {
            StatePatch::Region { region, state } => {
                let entry = self.regions.entry(region).or_default();
                if let Some(function) = state.function {
                    entry.function = Some(function);
                }
                if let Some(gateway) = state.gateway {
                    entry.gateway = Some(gateway);
                }
            }
            StatePatch::Shared {
                region,
                region_list,
                function_name,
            } => {
                self.region = region;
                self.region_list = region_list;
                self.function_name = function_name;
            }
            StatePatch::Dns(history) => self.cns = history,
            StatePatch::Clear => *self = Self::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayState>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionState {
    pub name: String,
    pub runtime: String,
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayState {
    pub service_id: String,
    pub sub_domain: String,
    pub environment: String,
    pub url: String,

    #[serde(default)]
    pub api_list: Vec<Value>,

    #[serde(default)]
    pub created: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domains: Option<Vec<Value>>,
}

/// A partial write to the [`InstanceState`].
#[derive(Clone, Debug, PartialEq)]
pub enum StatePatch {
    /// Replaces the parts of one region's block that are set in `state`.
    Region { region: String, state: RegionState },

    /// Replaces the keys shared by all regions.
    Shared {
        region: Option<String>,
        region_list: Vec<String>,
        function_name: Option<String>,
    },

    /// Replaces the DNS record history.
    Dns(Vec<DnsRecordSet>),

    /// Forgets everything.
    Clear,
}

/// Persistence of the [`InstanceState`].
///
/// `write` may be called concurrently for different regions and must not lose
/// either update.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self) -> Result<InstanceState, BoxError>;

    async fn write(&self, patch: StatePatch) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn function_state(name: &str) -> FunctionState {
        FunctionState {
            name: name.to_owned(),
            runtime: "Python3.6".to_owned(),
            namespace: "default".to_owned(),
            bucket: None,
            object: None,
        }
    }

    fn gateway_state(service_id: &str) -> GatewayState {
        GatewayState {
            service_id: service_id.to_owned(),
            sub_domain: format!("{service_id}.apigw.tencentcs.com"),
            environment: "release".to_owned(),
            url: format!("http://{service_id}.apigw.tencentcs.com/release/"),
            api_list: Vec::new(),
            created: true,
            custom_domains: None,
        }
    }

    #[test]
    fn region_patch_only_replaces_named_parts() {
        let mut state = InstanceState::default();
        state.apply(StatePatch::Region {
            region: "ap-guangzhou".to_owned(),
            state: RegionState {
                function: Some(function_state("first")),
                gateway: Some(gateway_state("service-1")),
            },
        });
        state.apply(StatePatch::Region {
            region: "ap-guangzhou".to_owned(),
            state: RegionState {
                function: Some(function_state("second")),
                gateway: None,
            },
        });

        let region = state.region("ap-guangzhou").expect("region is recorded");
        assert_eq!(region.function, Some(function_state("second")));
        assert_eq!(region.gateway, Some(gateway_state("service-1")));
    }

    #[test]
    fn region_patch_leaves_other_regions_alone() {
        let mut state = InstanceState::default();
        for (region, name) in [("ap-guangzhou", "gz"), ("ap-shanghai", "sh")] {
            state.apply(StatePatch::Region {
                region: region.to_owned(),
                state: RegionState {
                    function: Some(function_state(name)),
                    gateway: None,
                },
            });
        }

        assert_eq!(state.regions.len(), 2);
        assert_eq!(
            state.region("ap-guangzhou").and_then(|r| r.function.clone()),
            Some(function_state("gz"))
        );
    }

    #[test]
    fn clear_forgets_everything() {
        let mut state = InstanceState {
            region: Some("ap-guangzhou".to_owned()),
            region_list: vec!["ap-guangzhou".to_owned()],
            function_name: Some("demo".to_owned()),
            ..Default::default()
        };

        state.apply(StatePatch::Clear);

        assert!(state.is_empty());
    }

    #[test]
    fn reads_persisted_json() {
        let state: InstanceState = serde_json::from_str(indoc! {r#"
            {
              "region": "ap-guangzhou",
              "regionList": ["ap-guangzhou"],
              "functionName": "django_component_abcdefgh",
              "regions": {
                "ap-guangzhou": {
                  "function": {"name": "django_component_abcdefgh", "runtime": "Python3.6", "namespace": "default"},
                  "gateway": {
                    "serviceId": "service-1",
                    "subDomain": "service-1.gz.apigw.tencentcs.com",
                    "environment": "release",
                    "url": "http://service-1.gz.apigw.tencentcs.com/release/",
                    "apiList": [{"apiId": "api-1", "path": "/", "method": "ANY"}],
                    "created": true
                  }
                }
              },
              "cns": [
                {"domain": "example.com", "records": [
                  {"domain": "example.com", "subDomain": "www", "recordType": "CNAME", "recordLine": "默认",
                   "value": "service-1.gz.apigw.tencentcs.com", "status": "enable", "recordId": "42"}
                ]}
              ]
            }
        "#})
        .expect("state parses");

        let gateway = state
            .region("ap-guangzhou")
            .and_then(|region| region.gateway.as_ref())
            .expect("gateway is recorded");
        assert_eq!(gateway.service_id, "service-1");
        assert_eq!(gateway.api_list.len(), 1);
        assert_eq!(state.cns[0].records[0].record_id.as_deref(), Some("42"));
    }
}
