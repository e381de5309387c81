use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::ConversationRecord;

/// Conversation-session identifier correlating a paused turn with its later
/// resumption.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint store failure: {0}")]
    Store(String),
}

/// Pluggable persistence for paused turns, keyed by thread id. The default
/// implementation is process-local and non-durable; a restart loses all
/// in-flight conversations.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread: &ThreadId) -> Result<Option<ConversationRecord>, CheckpointError>;
    async fn save(
        &self,
        thread: &ThreadId,
        record: ConversationRecord,
    ) -> Result<(), CheckpointError>;
    async fn remove(&self, thread: &ThreadId) -> Result<(), CheckpointError>;
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    records: RwLock<HashMap<ThreadId, ConversationRecord>>,
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread: &ThreadId) -> Result<Option<ConversationRecord>, CheckpointError> {
        let records = self.records.read().await;
        Ok(records.get(thread).cloned())
    }

    async fn save(
        &self,
        thread: &ThreadId,
        record: ConversationRecord,
    ) -> Result<(), CheckpointError> {
        let mut records = self.records.write().await;
        records.insert(thread.clone(), record);
        Ok(())
    }

    async fn remove(&self, thread: &ThreadId) -> Result<(), CheckpointError> {
        let mut records = self.records.write().await;
        records.remove(thread);
        Ok(())
    }
}
