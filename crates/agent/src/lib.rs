//! Conversational pipeline for the ARM assistant.
//!
//! This crate is the "brain" of arma: it turns a natural-language request
//! into concrete Azure Resource Manager operations. A turn flows through a
//! fixed pipeline of stages:
//!
//! 1. **Intent extraction** (`intent`) - NL -> structured `StructuredIntent`
//! 2. **Template fetch + scope** - quickstart catalog lookup, `$schema` scope
//! 3. **Existence checks** (`existence`) - subscription / resource group
//! 4. **Validation** (`validator`) - map user fields onto template parameters
//! 5. **Deploy or dispatch** (`deploy`, `actions`) - provider calls
//!
//! The orchestrator (`workflow`) routes create/update through the template
//! branch and get/list/delete through the action dispatcher. When required
//! input is missing the turn pauses: the record is checkpointed under its
//! thread id and `TurnOutcome::AwaitingInput` is returned, never an error.
//!
//! The LLM is strictly a translator. It never decides which provider calls
//! run or with what credentials; those are deterministic decisions made from
//! the typed record.

pub mod actions;
pub mod deploy;
pub mod existence;
pub mod intent;
pub mod llm;
pub mod prompts;
pub mod validator;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use intent::{IntentExtractor, LlmIntentExtractor, StructuredIntent};
pub use llm::{build_llm_client, AzureOpenAiClient, LlmClient, LlmError, OpenAiClient};
pub use validator::{LlmParameterMatcher, ParameterMatcher, ValidationReport};
pub use workflow::{TurnError, TurnOutcome, Workflow};
