//! Subscriber setup for the deployer binaries.
//!
//! Two outputs exist: human readable lines on the console and JSON lines in a
//! log directory. Each output has its own level, read from an environment
//! variable with a fallback. Start with [`Tracing::pre_configured`].

use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to create the log file appender in {directory:?}"))]
    CreateFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("failed to install the global subscriber"))]
    InstallSubscriber { source: SetGlobalDefaultError },
}

/// The level of one output. `environment_variable` takes `EnvFilter`
/// directives and wins over `default_level` when set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLevel {
    pub environment_variable: &'static str,
    pub default_level: LevelFilter,
}

impl OutputLevel {
    fn env_filter(self) -> EnvFilter {
        EnvFilter::builder()
            .with_env_var(self.environment_variable)
            .with_default_directive(self.default_level.into())
            .from_env_lossy()
    }
}

/// JSON lines written to `<directory>/<service>.<rotation suffix>.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileOutput {
    pub level: OutputLevel,
    pub directory: PathBuf,
    pub rotation_period: RotationPeriod,
}

/// Configured subscriber outputs of one binary.
///
/// ```no_run
/// use deployer_telemetry::tracing::{Error, TelemetryOptions, Tracing};
///
/// fn main() -> Result<(), Error> {
///     // `let _ = ...` would drop the guard and lose buffered file output.
///     let _tracing_guard =
///         Tracing::pre_configured("django-deployer", TelemetryOptions::default()).init()?;
///
///     tracing::info!("ready");
///     Ok(())
/// }
/// ```
pub struct Tracing {
    service_name: &'static str,
    console_output: Option<OutputLevel>,
    file_output: Option<FileOutput>,

    file_log_guard: Option<WorkerGuard>,
}

impl Tracing {
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
    pub const FILE_LOG_SUFFIX: &str = "json";

    /// Starts with both outputs off.
    pub fn builder(service_name: &'static str) -> TracingBuilder {
        TracingBuilder {
            service_name,
            console_output: None,
            file_output: None,
        }
    }

    /// Console output at INFO unless disabled, file output at INFO when a
    /// directory is given.
    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            file_log_directory,
            file_log_rotation_period,
        } = options;

        let mut builder = Self::builder(service_name);
        if !console_log_disabled {
            builder = builder.with_console_output(OutputLevel {
                environment_variable: Self::CONSOLE_LOG_LEVEL,
                default_level: LevelFilter::INFO,
            });
        }
        if let Some(directory) = file_log_directory {
            builder = builder.with_file_output(FileOutput {
                level: OutputLevel {
                    environment_variable: Self::FILE_LOG_LEVEL,
                    default_level: LevelFilter::INFO,
                },
                directory,
                rotation_period: file_log_rotation_period.unwrap_or_default(),
            });
        }
        builder.build()
    }

    /// Installs the configured outputs as the global subscriber.
    ///
    /// The returned value owns the file writer and must be kept alive for as
    /// long as events should reach the log directory.
    pub fn init(mut self) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if let Some(level) = self.console_output {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_filter(level.env_filter())
                    .boxed(),
            );
        }

        if let Some(file_output) = &self.file_output {
            let appender = RollingFileAppender::builder()
                .rotation(file_output.rotation_period.into())
                .filename_prefix(self.service_name)
                .filename_suffix(Self::FILE_LOG_SUFFIX)
                .build(&file_output.directory)
                .context(CreateFileAppenderSnafu {
                    directory: &file_output.directory,
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            self.file_log_guard = Some(guard);

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_output.level.env_filter())
                    .boxed(),
            );
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(InstallSubscriberSnafu)?;
        }

        Ok(self)
    }

    pub fn service_name(&self) -> &'static str {
        self.service_name
    }
}

pub struct TracingBuilder {
    service_name: &'static str,
    console_output: Option<OutputLevel>,
    file_output: Option<FileOutput>,
}

impl TracingBuilder {
    pub fn with_console_output(mut self, level: OutputLevel) -> Self {
        self.console_output = Some(level);
        self
    }

    pub fn with_file_output(mut self, file_output: FileOutput) -> Self {
        self.file_output = Some(file_output);
        self
    }

    pub fn build(self) -> Tracing {
        Tracing {
            service_name: self.service_name,
            console_output: self.console_output,
            file_output: self.file_output,
            file_log_guard: None,
        }
    }
}

/// Logging flags shared by every deployer command.
#[cfg_attr(feature = "clap", derive(clap::Args, PartialEq, Eq))]
#[derive(Debug, Default)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Also write JSON logs into DIRECTORY.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// How often a new log file is started.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_to_console_only() {
        let tracing = Tracing::pre_configured("django-deployer", TelemetryOptions::default());

        assert_eq!(tracing.service_name(), "django-deployer");
        assert_eq!(
            tracing.console_output,
            Some(OutputLevel {
                environment_variable: Tracing::CONSOLE_LOG_LEVEL,
                default_level: LevelFilter::INFO,
            })
        );
        assert_eq!(tracing.file_output, None);
    }

    #[test]
    fn log_directory_enables_file_output() {
        let options = TelemetryOptions {
            console_log_disabled: true,
            file_log_directory: Some(PathBuf::from("/var/log/deployer")),
            file_log_rotation_period: Some(RotationPeriod::Hourly),
        };

        let tracing = Tracing::pre_configured("django-deployer", options);

        assert_eq!(tracing.console_output, None);
        assert_eq!(
            tracing.file_output,
            Some(FileOutput {
                level: OutputLevel {
                    environment_variable: Tracing::FILE_LOG_LEVEL,
                    default_level: LevelFilter::INFO,
                },
                directory: PathBuf::from("/var/log/deployer"),
                rotation_period: RotationPeriod::Hourly,
            })
        );
    }

    #[test]
    fn file_output_never_rotates_by_default() {
        let options = TelemetryOptions {
            file_log_directory: Some(PathBuf::from("logs")),
            ..Default::default()
        };

        let tracing = Tracing::pre_configured("django-deployer", options);

        let file_output = tracing.file_output.expect("file output is enabled");
        assert_eq!(file_output.rotation_period, RotationPeriod::Never);
        assert_eq!(Rotation::from(file_output.rotation_period), Rotation::NEVER);
    }

    #[rstest]
    #[case("Minutely", RotationPeriod::Minutely)]
    #[case("Hourly", RotationPeriod::Hourly)]
    #[case("Daily", RotationPeriod::Daily)]
    #[case("Never", RotationPeriod::Never)]
    fn parses_rotation_period(#[case] input: &str, #[case] expected: RotationPeriod) {
        assert_eq!(RotationPeriod::from_str(input), Ok(expected));
        assert_eq!(expected.to_string(), input);
    }
}
