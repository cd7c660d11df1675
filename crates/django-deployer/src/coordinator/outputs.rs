use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::state::{FunctionState, GatewayState};

/// Reported for a domain the DNS provider already knew.
pub const DOMAIN_ALREADY_ADDED: &str = "The domain name has already been added.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionOutput {
    pub function_name: String,
    pub runtime: String,
    pub namespace: String,
}

impl From<&FunctionState> for FunctionOutput {
    fn from(state: &FunctionState) -> Self {
        Self {
            function_name: state.name.clone(),
            runtime: state.runtime.clone(),
            namespace: state.namespace.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOutput {
    pub service_id: String,
    pub sub_domain: String,
    pub environment: String,
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domains: Option<Vec<Value>>,
}

impl From<&GatewayState> for GatewayOutput {
    fn from(state: &GatewayState) -> Self {
        Self {
            service_id: state.service_id.clone(),
            sub_domain: state.sub_domain.clone(),
            environment: state.environment.clone(),
            url: state.url.clone(),
            custom_domains: state.custom_domains.clone(),
        }
    }
}

/// What a deployment reports back.
///
/// A deployment to a single region is flattened, anything else is keyed by
/// region.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeployOutputs {
    SingleRegion(SingleRegionOutputs),
    MultiRegion(MultiRegionOutputs),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleRegionOutputs {
    pub region: String,
    pub function_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_gateway_service_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub apigw: Option<GatewayOutput>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scf: Option<FunctionOutput>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cns: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MultiRegionOutputs {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub apigw: BTreeMap<String, GatewayOutput>,

    pub scf: BTreeMap<String, FunctionOutput>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cns: Option<BTreeMap<String, String>>,
}

impl DeployOutputs {
    pub(crate) fn shape(
        region_list: &[String],
        function_name: &str,
        mut scf: BTreeMap<String, FunctionOutput>,
        mut apigw: BTreeMap<String, GatewayOutput>,
        cns: Option<BTreeMap<String, String>>,
    ) -> Self {
        let [region] = region_list else {
            return Self::MultiRegion(MultiRegionOutputs { apigw, scf, cns });
        };

        let apigw = apigw.remove(region);
        let scf = scf.remove(region);
        Self::SingleRegion(SingleRegionOutputs {
            region: region.clone(),
            function_name: scf
                .as_ref()
                .map_or_else(|| function_name.to_owned(), |scf| scf.function_name.clone()),
            api_gateway_service_id: apigw.as_ref().map(|apigw| apigw.service_id.clone()),
            url: apigw.as_ref().map(|apigw| apigw.url.clone()),
            apigw,
            scf,
            cns,
        })
    }

    pub fn gateway(&self, region: &str) -> Option<&GatewayOutput> {
        match self {
            Self::SingleRegion(outputs) if outputs.region == region => outputs.apigw.as_ref(),
            Self::SingleRegion(_) => None,
            Self::MultiRegion(outputs) => outputs.apigw.get(region),
        }
    }

    pub fn function(&self, region: &str) -> Option<&FunctionOutput> {
        match self {
            Self::SingleRegion(outputs) if outputs.region == region => outputs.scf.as_ref(),
            Self::SingleRegion(_) => None,
            Self::MultiRegion(outputs) => outputs.scf.get(region),
        }
    }

    pub fn cns(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::SingleRegion(outputs) => outputs.cns.as_ref(),
            Self::MultiRegion(outputs) => outputs.cns.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn function(name: &str) -> FunctionOutput {
        FunctionOutput {
            function_name: name.to_owned(),
            runtime: "Python3.6".to_owned(),
            namespace: "default".to_owned(),
        }
    }

    fn gateway(service_id: &str) -> GatewayOutput {
        GatewayOutput {
            service_id: service_id.to_owned(),
            sub_domain: format!("{service_id}.apigw.tencentcs.com"),
            environment: "release".to_owned(),
            url: format!("http://{service_id}.apigw.tencentcs.com/release/"),
            custom_domains: None,
        }
    }

    #[test]
    fn single_region_is_flattened() {
        let outputs = DeployOutputs::shape(
            &["ap-guangzhou".to_owned()],
            "demo",
            BTreeMap::from([("ap-guangzhou".to_owned(), function("demo"))]),
            BTreeMap::from([("ap-guangzhou".to_owned(), gateway("service-1"))]),
            None,
        );

        assert_eq!(
            serde_json::to_value(&outputs).expect("outputs serialize"),
            json!({
                "region": "ap-guangzhou",
                "functionName": "demo",
                "apiGatewayServiceId": "service-1",
                "url": "http://service-1.apigw.tencentcs.com/release/",
                "apigw": {
                    "serviceId": "service-1",
                    "subDomain": "service-1.apigw.tencentcs.com",
                    "environment": "release",
                    "url": "http://service-1.apigw.tencentcs.com/release/"
                },
                "scf": {"functionName": "demo", "runtime": "Python3.6", "namespace": "default"}
            })
        );
    }

    #[test]
    fn multiple_regions_are_keyed() {
        let outputs = DeployOutputs::shape(
            &["ap-guangzhou".to_owned(), "ap-shanghai".to_owned()],
            "demo",
            BTreeMap::from([
                ("ap-guangzhou".to_owned(), function("demo")),
                ("ap-shanghai".to_owned(), function("demo")),
            ]),
            BTreeMap::from([
                ("ap-guangzhou".to_owned(), gateway("service-1")),
                ("ap-shanghai".to_owned(), gateway("service-2")),
            ]),
            Some(BTreeMap::from([(
                "example.com".to_owned(),
                DOMAIN_ALREADY_ADDED.to_owned(),
            )])),
        );

        let value = serde_json::to_value(&outputs).expect("outputs serialize");
        assert!(value.get("region").is_none());
        assert_eq!(value["apigw"]["ap-shanghai"]["serviceId"], "service-2");
        assert_eq!(value["scf"]["ap-guangzhou"]["functionName"], "demo");
        assert_eq!(value["cns"]["example.com"], DOMAIN_ALREADY_ADDED);
        assert_eq!(
            outputs.gateway("ap-guangzhou").map(|g| g.service_id.as_str()),
            Some("service-1")
        );
    }

    #[test]
    fn missing_gateway_omits_apigw() {
        let outputs = DeployOutputs::shape(
            &["ap-guangzhou".to_owned()],
            "demo",
            BTreeMap::from([("ap-guangzhou".to_owned(), function("demo"))]),
            BTreeMap::new(),
            None,
        );

        let value = serde_json::to_value(&outputs).expect("outputs serialize");
        assert!(value.get("apigw").is_none());
        assert!(value.get("url").is_none());
        assert_eq!(value["functionName"], "demo");
    }

    #[test]
    fn function_output_leaves_out_code_location() {
        let state = FunctionState {
            name: "demo".to_owned(),
            runtime: "Python3.6".to_owned(),
            namespace: "default".to_owned(),
            bucket: Some("sls-cloudfunction-ap-guangzhou-code".to_owned()),
            object: Some("demo-1700000000.zip".to_owned()),
        };

        let value =
            serde_json::to_value(FunctionOutput::from(&state)).expect("output serializes");
        assert_eq!(
            value,
            json!({"functionName": "demo", "runtime": "Python3.6", "namespace": "default"})
        );
    }
}
