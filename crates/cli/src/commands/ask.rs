use std::sync::Arc;

use anyhow::{Context, Result};

use arma_agent::llm::build_llm_client;
use arma_agent::{LlmIntentExtractor, LlmParameterMatcher, TurnOutcome, Workflow};
use arma_azure::rest::ArmRestProvider;
use arma_core::catalog::TemplateCatalog;
use arma_core::checkpoint::{InMemoryCheckpointStore, ThreadId};
use arma_core::config::{AppConfig, LoadOptions};
use arma_core::record::{ConversationRecord, StageStatus};

pub async fn run(prompt: &str, thread: Option<&str>) -> Result<String> {
    let config =
        AppConfig::load(LoadOptions::default()).context("configuration failed to load")?;
    crate::telemetry::init(&config.logging);

    let llm = build_llm_client(&config.llm)?;
    let workflow = Workflow::new(
        Arc::new(LlmIntentExtractor::new(llm.clone())),
        Arc::new(LlmParameterMatcher::new(llm)),
        Arc::new(ArmRestProvider::new(&config.azure)),
        TemplateCatalog::new(config.catalog.root.clone()),
        Arc::new(InMemoryCheckpointStore::default()),
    )
    .with_default_subscription(config.azure.default_subscription_id.clone());

    let thread = thread.map(ThreadId::from).unwrap_or_else(ThreadId::random);
    match workflow.run_turn(&thread, prompt).await? {
        TurnOutcome::Completed(record) => Ok(render_completed(&record)),
        TurnOutcome::AwaitingInput { message, missing_fields, .. } => Ok(format!(
            "{message}\nmissing: {}\nresume with: arma ask --thread {thread} --prompt \"...\"",
            missing_fields.join(", ")
        )),
    }
}

fn render_completed(record: &ConversationRecord) -> String {
    let mut lines = Vec::new();
    if let Some(intent) = record.intent {
        lines.push(format!("intent: {intent}"));
    }
    if let Some(error) = &record.intent_error {
        lines.push(format!("intent error: {error}"));
    }
    if let Some(error) = &record.template_error {
        lines.push(format!("template: {error}"));
    }
    push_stage(&mut lines, "validation", record.validation_status, &record.validation_error);
    push_stage(&mut lines, "deployment", record.deployment_status, &record.deployment_error);
    push_stage(
        &mut lines,
        "resource action",
        record.resource_action_status,
        &record.resource_action_error,
    );

    let result = record.deployment_result.as_ref().or(record.resource_action_result.as_ref());
    if let Some(result) = result {
        if let Ok(pretty) = serde_json::to_string_pretty(result) {
            lines.push(pretty);
        }
    }
    if lines.is_empty() {
        lines.push("nothing to do".to_string());
    }
    lines.join("\n")
}

fn push_stage(
    lines: &mut Vec<String>,
    stage: &str,
    status: Option<StageStatus>,
    error: &Option<String>,
) {
    match (status, error) {
        (Some(StageStatus::Success), _) => lines.push(format!("{stage}: success")),
        (Some(StageStatus::Failed), Some(error)) => {
            lines.push(format!("{stage}: failed ({error})"))
        }
        (Some(StageStatus::Failed), None) => lines.push(format!("{stage}: failed")),
        (None, _) => {}
    }
}
