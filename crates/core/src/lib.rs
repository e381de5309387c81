pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod record;

pub use catalog::{ArmTemplate, CatalogError, TemplateCatalog};
pub use checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore, ThreadId};
pub use config::{AppConfig, ConfigError, LlmProvider, LogFormat};
pub use record::{
    ConversationRecord, Intent, Message, ResourceType, Role, Scope, StageStatus,
};
