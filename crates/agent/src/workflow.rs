use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use arma_azure::provider::ResourceProvider;
use arma_core::catalog::TemplateCatalog;
use arma_core::checkpoint::{CheckpointError, CheckpointStore, ThreadId};
use arma_core::record::{ConversationRecord, Intent, Message, Scope, StageStatus};

use crate::actions;
use crate::deploy;
use crate::existence;
use crate::intent::IntentExtractor;
use crate::validator::{drop_defaulted_parameters, ParameterMatcher};

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// How a turn ended. A pause is a value, not an error: the paused record is
/// checkpointed under the thread id and the caller relays `message` to the
/// user; the next utterance on the same thread resumes where it stopped.
#[derive(Debug)]
pub enum TurnOutcome {
    Completed(ConversationRecord),
    AwaitingInput { record: ConversationRecord, message: String, missing_fields: Vec<String> },
}

/// Orchestrates one conversation turn through the stage pipeline:
///
/// ```text
/// intent -> scope fields -> template -> existence -> validation -> deploy
///        \-> action dispatch (get/list/delete)
/// ```
///
/// Built explicitly from its collaborators; nothing here is a global.
pub struct Workflow {
    intent_extractor: Arc<dyn IntentExtractor>,
    parameter_matcher: Arc<dyn ParameterMatcher>,
    provider: Arc<dyn ResourceProvider>,
    catalog: TemplateCatalog,
    checkpoints: Arc<dyn CheckpointStore>,
    default_subscription_id: Option<String>,
}

impl Workflow {
    pub fn new(
        intent_extractor: Arc<dyn IntentExtractor>,
        parameter_matcher: Arc<dyn ParameterMatcher>,
        provider: Arc<dyn ResourceProvider>,
        catalog: TemplateCatalog,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            intent_extractor,
            parameter_matcher,
            provider,
            catalog,
            checkpoints,
            default_subscription_id: None,
        }
    }

    /// Subscription used when the user names none at all. An explicit id or
    /// name in the conversation always wins.
    pub fn with_default_subscription(mut self, subscription_id: Option<String>) -> Self {
        self.default_subscription_id = subscription_id;
        self
    }

    pub async fn run_turn(
        &self,
        thread: &ThreadId,
        prompt: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let mut follow_up = ConversationRecord::from_prompt(prompt);
        match self.intent_extractor.extract(prompt).await {
            Ok(extracted) => extracted.apply_to(&mut follow_up),
            Err(error) => {
                warn!(error = %error, "intent extraction failed");
                follow_up.intent_error = Some(error.to_string());
            }
        }

        // A resumed thread keeps its earlier answers; the follow-up only
        // overrides what it explicitly re-states.
        let mut record = match self.checkpoints.load(thread).await? {
            Some(mut paused) => {
                paused.absorb(follow_up);
                paused
            }
            None => follow_up,
        };

        if !record.has_subscription_reference() {
            record.subscription_id = self.default_subscription_id.clone();
        }

        let Some(intent) = record.intent else {
            record.push_message(Message::system(
                "I could not determine an Azure operation from that request.",
            ));
            self.checkpoints.remove(thread).await?;
            return Ok(TurnOutcome::Completed(record));
        };

        info!(%thread, %intent, "routing turn");
        if intent.requires_template() {
            self.run_template_branch(thread, record).await
        } else {
            self.run_action_branch(thread, record, intent).await
        }
    }

    async fn run_template_branch(
        &self,
        thread: &ThreadId,
        mut record: ConversationRecord,
    ) -> Result<TurnOutcome, TurnError> {
        let mut missing = record.missing_scope_field_names();
        if record.resource_type.is_none() {
            missing.push("resource_type".to_string());
        }
        if !missing.is_empty() {
            let message = pause_message(&missing);
            record.missing_scope_fields = missing.clone();
            record.missing_scope_message = Some(message.clone());
            return self.pause(thread, record, message, missing).await;
        }
        let Some(resource_type) = record.resource_type.clone() else {
            let missing = vec!["resource_type".to_string()];
            let message = pause_message(&missing);
            return self.pause(thread, record, message, missing).await;
        };

        match self.catalog.fetch(&resource_type) {
            Ok(template) => {
                record.template_error = None;
                record.scope = Some(template.scope());
                record.template = Some(template.into_document());
            }
            Err(error) => {
                warn!(%resource_type, error = %error, "template fetch failed");
                record.template_error = Some(error.to_string());
                record.template = Some(Value::Object(Default::default()));
                record.scope = Some(Scope::ResourceGroup);
            }
        }

        record = existence::check_existence(self.provider.as_ref(), record).await;

        let template_parameters = record
            .template
            .as_ref()
            .and_then(|template| template.get("parameters"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        match self
            .parameter_matcher
            .match_parameters(&template_parameters, &record.provided_fields)
            .await
        {
            Ok(mut report) => {
                drop_defaulted_parameters(&mut report, &template_parameters);
                record.parameter_file_content = report.parameter_file_content;
                record.missing_parameters = report.missing_parameters;
                record.extra_fields = report.extra_fields;
                record.validation_error = report.validation_error;
                record.validation_status = Some(if record.validation_error.is_none() {
                    StageStatus::Success
                } else {
                    StageStatus::Failed
                });
            }
            Err(error) => {
                record.validation_status = Some(StageStatus::Failed);
                record.validation_error = Some(error.to_string());
            }
        }

        if record.validation_error.is_some() || !record.missing_parameters.is_empty() {
            let missing = record.missing_parameters.clone();
            let message = match record.validation_error.clone() {
                Some(error) => {
                    record.push_message(Message::system(format!(
                        "template validation failed: {error}"
                    )));
                    validation_pause_message(&error)
                }
                None => pause_message(&missing),
            };
            return self.pause(thread, record, message, missing).await;
        }

        record = deploy::run_deployment(self.provider.as_ref(), record).await;
        self.checkpoints.remove(thread).await?;
        Ok(TurnOutcome::Completed(record))
    }

    async fn run_action_branch(
        &self,
        thread: &ThreadId,
        mut record: ConversationRecord,
        intent: Intent,
    ) -> Result<TurnOutcome, TurnError> {
        let missing = actions::missing_action_fields(&record, intent);
        if !missing.is_empty() {
            let message = pause_message(&missing);
            record.missing_scope_fields = missing.clone();
            record.missing_scope_message = Some(message.clone());
            return self.pause(thread, record, message, missing).await;
        }

        record = existence::check_existence(self.provider.as_ref(), record).await;
        record = actions::dispatch(self.provider.as_ref(), record, intent).await;
        self.checkpoints.remove(thread).await?;
        Ok(TurnOutcome::Completed(record))
    }

    async fn pause(
        &self,
        thread: &ThreadId,
        record: ConversationRecord,
        message: String,
        missing_fields: Vec<String>,
    ) -> Result<TurnOutcome, TurnError> {
        info!(%thread, missing = ?missing_fields, "pausing turn for more input");
        self.checkpoints.save(thread, record.clone()).await?;
        Ok(TurnOutcome::AwaitingInput { message, record, missing_fields })
    }
}

fn pause_message(missing_fields: &[String]) -> String {
    format!(
        "I need a bit more information to continue. Please provide: {}.",
        missing_fields.join(", ")
    )
}

fn validation_pause_message(error: &str) -> String {
    format!("The provided values did not pass validation: {error}. Please send corrected values.")
}
