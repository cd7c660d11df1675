use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    provider::BoxError,
    state::{InstanceState, StatePatch, StateStore},
};

/// Keeps the state in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<InstanceState>,
}

impl MemoryStateStore {
    pub fn new(state: InstanceState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> InstanceState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self) -> Result<InstanceState, BoxError> {
        Ok(self.snapshot().await)
    }

    async fn write(&self, patch: StatePatch) -> Result<(), BoxError> {
        self.state.lock().await.apply(patch);
        Ok(())
    }
}
