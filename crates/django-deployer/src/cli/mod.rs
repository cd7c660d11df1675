//! Command line arguments shared by deployer binaries.
//!
//! ```rust
//! use clap::Parser;
//! use django_deployer::cli::DeployerArguments;
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     common: DeployerArguments,
//! }
//!
//! let cli = Cli::parse_from(["deployer", "--state", "/tmp/state.json"]);
//! assert_eq!(cli.common.state, std::path::PathBuf::from("/tmp/state.json"));
//! ```

use std::path::PathBuf;

use clap::Args;

use crate::telemetry::tracing::TelemetryOptions;

mod request_file;

pub use request_file::{DEFAULT_REQUEST_FILES, Error, RequestPath};

pub const DEFAULT_STATE_FILE: &str = ".serverless/state.json";

#[derive(Debug, PartialEq, Eq, Args)]
pub struct DeployerArguments {
    /// Provides the path to the deployment request (serverless.yaml or JSON)
    #[arg(
        long,
        short = 'r',
        value_name = "FILE",
        default_value = "",
        env = "DEPLOY_REQUEST"
    )]
    pub request: RequestPath,

    /// Provides the path to the file the instance state is kept in
    #[arg(long, value_name = "FILE", default_value = DEFAULT_STATE_FILE, env = "DEPLOY_STATE_FILE")]
    pub state: PathBuf,

    // All flattened sub structs should be placed at the end to keep the help
    // headings correct.
    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        common: DeployerArguments,
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_state_file() {
        let cli = Cli::try_parse_from(["deployer"]).expect("arguments parse");

        assert_eq!(cli.common.state, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(cli.common.request, RequestPath::from(std::ffi::OsStr::new("")));
    }
}
