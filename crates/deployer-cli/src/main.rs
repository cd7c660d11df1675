use clap::{Parser, Subcommand};
use django_deployer::{
    cli::{self, DEFAULT_REQUEST_FILES, DeployerArguments},
    config::{ConfigNormalizer, normalize},
    dns::SplitDomainValidator,
    provider::BoxError,
    state::{FileStateStore, StateStore},
    telemetry::{self, Tracing},
};
use snafu::{ResultExt, Snafu};

const APP_NAME: &str = "django-deployer";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize tracing"))]
    InitTracing { source: telemetry::tracing::Error },

    #[snafu(display("failed to load deployment request"))]
    LoadRequest { source: cli::Error },

    #[snafu(display("failed to read instance state"))]
    ReadState { source: BoxError },

    #[snafu(display("failed to normalize deployment request"))]
    Normalize { source: normalize::Error },

    #[snafu(display("failed to serialize the plan"))]
    SerializePlan { source: serde_yaml::Error },

    #[snafu(display("failed to serialize the state"))]
    SerializeState { source: serde_json::Error },
}

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the per-region configuration the request resolves to.
    Plan(DeployerArguments),

    /// Print the recorded instance state.
    State(DeployerArguments),
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Command::Plan(arguments) => {
            let _tracing_guard = Tracing::pre_configured(APP_NAME, arguments.telemetry)
                .init()
                .context(InitTracingSnafu)?;

            let request = arguments
                .request
                .load(&DEFAULT_REQUEST_FILES)
                .context(LoadRequestSnafu)?;
            let state = FileStateStore::new(&arguments.state)
                .read()
                .await
                .context(ReadStateSnafu)?;

            let plan = ConfigNormalizer::new(&SplitDomainValidator)
                .normalize(&request, &state)
                .await
                .context(NormalizeSnafu)?;
            print!(
                "{}",
                serde_yaml::to_string(&plan).context(SerializePlanSnafu)?
            );
        }
        Command::State(arguments) => {
            let _tracing_guard = Tracing::pre_configured(APP_NAME, arguments.telemetry)
                .init()
                .context(InitTracingSnafu)?;

            let state = FileStateStore::new(&arguments.state)
                .read()
                .await
                .context(ReadStateSnafu)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&state).context(SerializeStateSnafu)?
            );
        }
    }

    Ok(())
}
