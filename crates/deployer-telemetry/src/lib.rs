//! Logging setup shared by the deployer binaries.
pub mod tracing;

pub use tracing::Tracing;
