use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::llm::{strip_code_fences, LlmClient};
use crate::prompts::TEMPLATE_VALIDATION_SYSTEM_PROMPT;

/// Outcome of matching user-supplied fields against a template's parameters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationReport {
    pub parameter_file_content: Option<Value>,
    pub missing_parameters: Vec<String>,
    pub extra_fields: Vec<String>,
    pub validation_error: Option<String>,
}

/// Injectable so the pipeline tests run without a model. The contract:
/// fuzzy conceptual matches are allowed, but a value violating its
/// parameter's type or allowedValues must surface as `validation_error`.
#[async_trait]
pub trait ParameterMatcher: Send + Sync {
    async fn match_parameters(
        &self,
        template_parameters: &Map<String, Value>,
        provided_fields: &Map<String, Value>,
    ) -> Result<ValidationReport>;
}

pub struct LlmParameterMatcher {
    llm: Arc<dyn LlmClient>,
}

impl LlmParameterMatcher {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ParameterMatcher for LlmParameterMatcher {
    async fn match_parameters(
        &self,
        template_parameters: &Map<String, Value>,
        provided_fields: &Map<String, Value>,
    ) -> Result<ValidationReport> {
        let payload = json!({
            "template_parameters": template_parameters,
            "provided_fields": provided_fields,
        });
        let completion = self
            .llm
            .complete(TEMPLATE_VALIDATION_SYSTEM_PROMPT, &payload.to_string())
            .await
            .context("template validation call failed")?;
        let stripped = strip_code_fences(&completion);
        let mut report: ValidationReport = serde_json::from_str(&stripped)
            .context("template validation returned malformed JSON")?;
        drop_defaulted_parameters(&mut report, template_parameters);
        debug!(
            missing = report.missing_parameters.len(),
            extra = report.extra_fields.len(),
            "matched template parameters"
        );
        Ok(report)
    }
}

/// Local rule applied regardless of what the model reported: a parameter
/// that carries a `defaultValue` is deployable without user input and is
/// never "missing".
pub fn drop_defaulted_parameters(
    report: &mut ValidationReport,
    template_parameters: &Map<String, Value>,
) {
    report.missing_parameters.retain(|name| {
        template_parameters
            .get(name)
            .and_then(|parameter| parameter.get("defaultValue"))
            .is_none()
    });
}
