//! Interfaces to the cloud services a deployment touches.
//!
//! Implementations own their network clients and credentials. Removing a
//! resource that does not exist any more must succeed, so that an interrupted
//! removal can simply be run again.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{FunctionConfig, GatewayConfig},
    dns::{DnsRecord, DnsRecordSet, DomainCheck},
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDeployment {
    pub name: String,
    pub runtime: String,
    pub namespace: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionRemoval {
    pub name: String,
    pub namespace: String,
}

#[async_trait]
pub trait FunctionProvider: Send + Sync {
    async fn deploy(
        &self,
        region: &str,
        config: &FunctionConfig,
    ) -> Result<FunctionDeployment, BoxError>;

    async fn remove(&self, region: &str, function: &FunctionRemoval) -> Result<(), BoxError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct GatewayDeployment {
    pub service_id: String,
    pub sub_domain: String,
    pub environment: String,
    pub protocols: Vec<String>,
    pub api_list: Vec<Value>,

    /// Whether the service was created by us (and may therefore be deleted).
    pub created: bool,
    pub custom_domains: Option<Vec<Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GatewayRemoval {
    pub service_id: String,
    pub environment: String,
    pub api_list: Vec<Value>,
    pub custom_domains: Option<Vec<Value>>,
    pub created: bool,
}

#[async_trait]
pub trait GatewayProvider: Send + Sync {
    /// Deploys the service. `prior_api_list` is what the last deployment of
    /// this region created, so the provider can remove APIs no longer wanted.
    async fn deploy(
        &self,
        region: &str,
        config: &GatewayConfig,
        prior_api_list: &[Value],
    ) -> Result<GatewayDeployment, BoxError>;

    async fn remove(&self, region: &str, gateway: &GatewayRemoval) -> Result<(), BoxError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub id: String,
    pub status: String,
    pub filter: String,
    pub expiration_days: u32,
    pub abort_incomplete_multipart_upload_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub name: String,
    pub lifecycle: Vec<LifecycleRule>,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Creates the bucket if needed and applies its lifecycle rules.
    async fn ensure_bucket(&self, region: &str, spec: &BucketSpec) -> Result<(), BoxError>;

    async fn upload(
        &self,
        region: &str,
        bucket: &str,
        file: &Path,
        key: &str,
    ) -> Result<(), BoxError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsDeployment {
    /// The records as they now exist, including provider ids.
    pub records: Vec<DnsRecord>,

    /// The name servers the domain has to be delegated to, if it was newly
    /// added to the provider.
    pub dns: Option<String>,
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn deploy(&self, record_set: &DnsRecordSet) -> Result<DnsDeployment, BoxError>;

    async fn remove(&self, records: &[DnsRecord]) -> Result<(), BoxError>;
}

#[async_trait]
pub trait DomainValidator: Send + Sync {
    /// Validates `domain` and splits it into registrable domain and sub-domain.
    async fn check(&self, domain: &str) -> Result<DomainCheck, BoxError>;
}

#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// Prepares the application found at `src` for packaging (unpacking it and
    /// adding the Django entry point for `project_name`), returning the
    /// directory to package.
    async fn stage(&self, src: &Path, project_name: &str) -> Result<PathBuf, BoxError>;

    /// Packs `directory` into an archive honoring the path patterns.
    async fn package(
        &self,
        directory: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<PathBuf, BoxError>;
}

/// Every collaborator the [`Deployer`](crate::Deployer) talks to.
#[derive(Clone)]
pub struct Providers {
    pub function: Arc<dyn FunctionProvider>,
    pub gateway: Arc<dyn GatewayProvider>,
    pub storage: Arc<dyn StorageProvider>,
    pub dns: Arc<dyn DnsProvider>,
    pub domain: Arc<dyn DomainValidator>,
    pub artifact: Arc<dyn ArtifactProvider>,
}
