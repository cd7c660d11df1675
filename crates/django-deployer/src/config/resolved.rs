//! Fully defaulted configurations, one per resource and region.
//!
//! These are serialized to JSON for the per-region override merge, so every
//! optional field is skipped when unset instead of being written as `null`.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{FORCED_EXCLUDES, request::CustomDomain};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    pub name: String,
    pub handler: String,
    pub runtime: String,
    pub namespace: String,
    pub description: String,
    pub timeout: u32,
    pub memory_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<FunctionEnvironment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_config: Option<VpcConfig>,

    pub code: CodeSource,
    pub from_client_remark: String,
}

impl FunctionConfig {
    /// Makes sure every [`FORCED_EXCLUDES`] pattern is in the exclude list
    /// exactly once, at the end.
    pub fn ensure_forced_excludes(&mut self) {
        self.exclude
            .retain(|pattern| !FORCED_EXCLUDES.contains(&pattern.as_str()));
        self.exclude
            .extend(FORCED_EXCLUDES.iter().map(|pattern| (*pattern).to_owned()));
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FunctionEnvironment {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

/// Where the function provider fetches the code from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CodeSource {
    /// Already uploaded to object storage.
    Storage { bucket: String, object: String },

    /// Still to be packaged and uploaded.
    Local { src: PathBuf },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Reused when known, otherwise the provider creates a new service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    pub description: String,
    pub protocols: Vec<String>,
    pub environment: String,

    #[serde(default)]
    pub is_disabled: bool,

    #[serde(
        rename = "enableCORS",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_cors: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_plan: Option<UsagePlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<EndpointAuth>,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domain: Vec<CustomDomain>,

    pub from_client_remark: String,
}

impl GatewayConfig {
    /// The single `ANY /` endpoint that forwards every request to `function`.
    ///
    /// Usage plan and auth are only attached when configured, providers treat
    /// their presence as "enable".
    pub fn catch_all_endpoint(&self, function: &FunctionConfig) -> Endpoint {
        Endpoint {
            path: "/".to_owned(),
            method: "ANY".to_owned(),
            enable_cors: self.enable_cors,
            function: EndpointFunction {
                is_integrated_response: true,
                function_name: function.name.clone(),
                function_namespace: function.namespace.clone(),
            },
            usage_plan: self.usage_plan.clone(),
            auth: self.auth.clone(),
        }
    }

    /// Binds the first endpoint to `function`, keeping any further endpoints.
    pub fn bind_function(&mut self, function: &FunctionConfig) {
        let endpoint = self.catch_all_endpoint(function);
        match self.endpoints.first_mut() {
            Some(first) => *first = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub path: String,
    pub method: String,

    #[serde(
        rename = "enableCORS",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_cors: Option<bool>,

    pub function: EndpointFunction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_plan: Option<UsagePlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<EndpointAuth>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFunction {
    pub is_integrated_response: bool,
    pub function_name: String,
    pub function_namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsagePlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_plan_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_plan_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_plan_desc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_request_num: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn code_source_shapes() {
        let storage: CodeSource =
            serde_json::from_value(json!({"bucket": "code", "object": "app.zip"}))
                .expect("storage code parses");
        let local: CodeSource =
            serde_json::from_value(json!({"src": "./app"})).expect("local code parses");

        assert_eq!(
            storage,
            CodeSource::Storage {
                bucket: "code".to_owned(),
                object: "app.zip".to_owned()
            }
        );
        assert_eq!(
            local,
            CodeSource::Local {
                src: PathBuf::from("./app")
            }
        );
    }

    #[test]
    fn endpoint_omits_unset_sub_objects() {
        let endpoint = Endpoint {
            path: "/".to_owned(),
            method: "ANY".to_owned(),
            enable_cors: None,
            function: EndpointFunction {
                is_integrated_response: true,
                function_name: "demo".to_owned(),
                function_namespace: "default".to_owned(),
            },
            usage_plan: None,
            auth: None,
        };

        assert_eq!(
            serde_json::to_value(&endpoint).expect("endpoint serializes"),
            json!({
                "path": "/",
                "method": "ANY",
                "function": {
                    "isIntegratedResponse": true,
                    "functionName": "demo",
                    "functionNamespace": "default"
                }
            })
        );
    }
}
