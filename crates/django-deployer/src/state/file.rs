use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};
use tokio::sync::Mutex;

use crate::{
    provider::BoxError,
    state::{InstanceState, StatePatch, StateStore},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read state file {path:?}"))]
    ReadStateFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse state file {path:?}"))]
    ParseStateFile {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to serialize state"))]
    SerializeState { source: serde_json::Error },

    #[snafu(display("failed to create state directory {path:?}"))]
    CreateStateDirectory {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write state file {path:?}"))]
    WriteStateFile {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Persists the state as pretty printed JSON.
///
/// A missing file reads as empty state. Every write re-reads the file, applies
/// the patch and writes it back while holding a lock, so concurrent writers of
/// the same store do not lose updates.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<InstanceState> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(InstanceState::default());
            }
            Err(error) => {
                return Err(error).context(ReadStateFileSnafu { path: &self.path });
            }
        };

        serde_json::from_slice(&contents).context(ParseStateFileSnafu { path: &self.path })
    }

    async fn store(&self, state: &InstanceState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(CreateStateDirectorySnafu { path: parent })?;
        }

        let contents = serde_json::to_vec_pretty(state).context(SerializeStateSnafu)?;
        tokio::fs::write(&self.path, contents)
            .await
            .context(WriteStateFileSnafu { path: &self.path })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self) -> Result<InstanceState, BoxError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?)
    }

    async fn write(&self, patch: StatePatch) -> Result<(), BoxError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        state.apply(patch);
        tracing::debug!(path = %self.path.display(), "writing state");
        Ok(self.store(&state).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::{FunctionState, RegionState};

    fn region_patch(region: &str) -> StatePatch {
        StatePatch::Region {
            region: region.to_owned(),
            state: RegionState {
                function: Some(FunctionState {
                    name: "demo".to_owned(),
                    runtime: "Python3.6".to_owned(),
                    namespace: "default".to_owned(),
                    bucket: Some("sls-cloudfunction-ap-guangzhou-code".to_owned()),
                    object: Some("demo-1700000000.zip".to_owned()),
                }),
                gateway: None,
            },
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir is created");
        let store = FileStateStore::new(dir.path().join("state.json"));

        let state = store.read().await.expect("read succeeds");

        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir is created");
        let path = dir.path().join(".serverless").join("state.json");
        let store = FileStateStore::new(&path);

        store
            .write(region_patch("ap-guangzhou"))
            .await
            .expect("write succeeds");

        let reopened = FileStateStore::new(&path);
        let state = reopened.read().await.expect("read succeeds");
        assert!(state.region("ap-guangzhou").is_some());
    }

    #[tokio::test]
    async fn concurrent_region_writes_are_kept() {
        let dir = tempfile::tempdir().expect("temp dir is created");
        let store = Arc::new(FileStateStore::new(dir.path().join("state.json")));
        let regions = ["ap-guangzhou", "ap-shanghai", "ap-beijing", "ap-chengdu"];

        futures::future::join_all(regions.iter().map(|region| {
            let store = Arc::clone(&store);
            async move { store.write(region_patch(region)).await }
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("all writes succeed");

        let state = store.read().await.expect("read succeeds");
        assert_eq!(state.regions.len(), regions.len());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir is created");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").expect("file is written");

        let error = FileStateStore::new(&path)
            .read()
            .await
            .expect_err("file is not valid JSON");

        assert!(error.to_string().starts_with("failed to parse state file"));
    }
}
