//! The deployment request and the configurations resolved from it.

pub mod merge;
pub mod normalize;
pub mod request;
pub mod resolved;

pub use normalize::{ConfigNormalizer, NormalizedDeployment, RegionPlan};
pub use request::DeploymentRequest;
pub use resolved::{CodeSource, Endpoint, FunctionConfig, GatewayConfig};

pub const FRAMEWORK: &str = "django";
pub const DEFAULT_REGION: &str = "ap-guangzhou";

pub const DEFAULT_HANDLER: &str = "index.main_handler";
pub const DEFAULT_RUNTIME: &str = "Python3.6";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_DESCRIPTION: &str = "This is a function created by serverless component";
pub const DEFAULT_TIMEOUT: u32 = 3;
pub const DEFAULT_MEMORY_SIZE: u32 = 128;

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_ENVIRONMENT: &str = "release";
pub const GATEWAY_DESCRIPTION: &str = "Serverless Framework Tencent-Django Component";
pub const CLIENT_REMARK: &str = "tencent-django";

/// Always appended to the exclude list of the function package.
pub const FORCED_EXCLUDES: [&str; 4] = [".git/**", ".gitignore", ".serverless", ".DS_Store"];
