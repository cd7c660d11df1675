use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::config::DeploymentRequest;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Files looked for in the working directory when no request file is given.
pub const DEFAULT_REQUEST_FILES: [&str; 2] = ["serverless.yaml", "serverless.yml"];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "failed to locate a required file in any of the following locations: {search_path:?}"
    ))]
    RequiredFileMissing { search_path: Vec<PathBuf> },

    #[snafu(display("failed to read request file {path:?}"))]
    ReadRequestFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse request file {path:?} as JSON"))]
    ParseJson {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse request file {path:?} as YAML"))]
    ParseYaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("request file {path:?} is not a valid deployment request"))]
    InvalidRequest {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// A path to a deployment request file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPath {
    path: Option<PathBuf>,
}

impl From<&OsStr> for RequestPath {
    fn from(s: &OsStr) -> Self {
        Self {
            // The empty string stands for "search the default locations".
            path: if s.is_empty() { None } else { Some(s.into()) },
        }
    }
}

impl RequestPath {
    /// Load the [`DeploymentRequest`] from the given path, falling back to the
    /// first path that exists from `default_search_paths` if none is given by
    /// the user.
    ///
    /// `.json` files are parsed as JSON, anything else as YAML. A serverless
    /// component file (with `component` and `inputs` keys) yields its inputs.
    pub fn load(&self, default_search_paths: &[impl AsRef<Path>]) -> Result<DeploymentRequest> {
        let path = Self::resolve_path(self.path.as_deref(), default_search_paths)?;
        let contents = std::fs::read(path).context(ReadRequestFileSnafu { path })?;

        let document: Value = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_slice(&contents).context(ParseJsonSnafu { path })?
        } else {
            serde_yaml::from_slice(&contents).context(ParseYamlSnafu { path })?
        };

        serde_json::from_value(component_inputs(document)).context(InvalidRequestSnafu { path })
    }

    /// Check if the path can be found anywhere
    ///
    /// 1. User provides a path. Return [`Error`] if it does not exist.
    /// 2. User does not provide a path -> search in `default_paths` and take
    ///    the first existing file.
    /// 3. Return [`Error`] if nothing was found.
    fn resolve_path<'a>(
        user_provided_path: Option<&'a Path>,
        default_paths: &'a [impl AsRef<Path> + 'a],
    ) -> Result<&'a Path> {
        let search_paths = if let Some(path) = user_provided_path {
            vec![path]
        } else {
            default_paths.iter().map(|path| path.as_ref()).collect()
        };
        for path in &search_paths {
            if path.exists() {
                return Ok(path);
            }
        }
        RequiredFileMissingSnafu {
            search_path: search_paths
                .into_iter()
                .map(PathBuf::from)
                .collect::<Vec<_>>(),
        }
        .fail()
    }
}

fn component_inputs(document: Value) -> Value {
    match document {
        Value::Object(mut document)
            if document.contains_key("component") && document.contains_key("inputs") =>
        {
            document.remove("inputs").unwrap_or_default()
        }
        document => document,
    }
}
