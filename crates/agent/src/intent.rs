use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use arma_core::record::ConversationRecord;

use crate::llm::{strip_code_fences, LlmClient};
use crate::prompts::INTENT_EXTRACTION_SYSTEM_PROMPT;

/// What the model extracted from one utterance. Everything is optional: a
/// follow-up like "the resource group is demorg" legitimately carries
/// nothing but one field.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructuredIntent {
    pub intent: Option<String>,
    pub resource_type: Option<String>,
    pub resource_group_name: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub location: Option<String>,
    pub provided_fields: Map<String, Value>,
}

impl StructuredIntent {
    /// Folds the extraction into the record. Supplied values win; absent
    /// values never erase what an earlier turn collected. Unparseable
    /// intent or resource type strings land in `intent_error` instead of
    /// being silently dropped.
    pub fn apply_to(self, record: &mut ConversationRecord) {
        if let Some(raw) = non_empty(self.intent) {
            match raw.parse() {
                Ok(intent) => record.intent = Some(intent),
                Err(error) => record.intent_error = Some(error.to_string()),
            }
        }
        if let Some(raw) = non_empty(self.resource_type) {
            match raw.parse() {
                Ok(resource_type) => record.resource_type = Some(resource_type),
                Err(error) => record.intent_error = Some(error.to_string()),
            }
        }
        if let Some(name) = non_empty(self.resource_group_name) {
            record.resource_group_name = Some(name);
        }
        if let Some(id) = non_empty(self.subscription_id) {
            record.subscription_id = Some(id);
        }
        if let Some(name) = non_empty(self.subscription_name) {
            record.subscription_name = Some(name);
        }
        if let Some(location) = non_empty(self.location) {
            record.location = Some(location);
        }
        for (key, value) in self.provided_fields {
            record.provided_fields.insert(key, value);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, utterance: &str) -> Result<StructuredIntent>;
}

pub struct LlmIntentExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmIntentExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(&self, utterance: &str) -> Result<StructuredIntent> {
        let completion = self
            .llm
            .complete(INTENT_EXTRACTION_SYSTEM_PROMPT, utterance)
            .await
            .context("intent extraction call failed")?;
        let stripped = strip_code_fences(&completion);
        let extracted: StructuredIntent = serde_json::from_str(&stripped)
            .context("intent extraction returned malformed JSON")?;
        debug!(?extracted, "extracted intent");
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use arma_core::record::{ConversationRecord, Intent};

    use crate::test_support::FakeLlm;

    use super::{IntentExtractor, LlmIntentExtractor, StructuredIntent};

    #[test]
    fn apply_parses_intent_and_resource_type() {
        let mut record = ConversationRecord::default();
        let extracted = StructuredIntent {
            intent: Some("create".to_string()),
            resource_type: Some("Microsoft.Storage/storageAccounts".to_string()),
            resource_group_name: Some("demorg".to_string()),
            provided_fields: json!({"name": "testsa"}).as_object().cloned().unwrap(),
            ..Default::default()
        };

        extracted.apply_to(&mut record);

        assert_eq!(record.intent, Some(Intent::Create));
        assert_eq!(
            record.resource_type.as_ref().map(ToString::to_string).as_deref(),
            Some("Microsoft.Storage/storageAccounts")
        );
        assert_eq!(record.provided_fields.get("name"), Some(&json!("testsa")));
        assert!(record.intent_error.is_none());
    }

    #[test]
    fn unknown_intent_is_recorded_not_swallowed() {
        let mut record = ConversationRecord::default();
        StructuredIntent { intent: Some("provision".to_string()), ..Default::default() }
            .apply_to(&mut record);

        assert_eq!(record.intent, None);
        assert!(record.intent_error.as_deref().unwrap_or_default().contains("provision"));
    }

    #[test]
    fn empty_strings_never_overwrite_earlier_values() {
        let mut record = ConversationRecord::default();
        record.resource_group_name = Some("demorg".to_string());

        StructuredIntent { resource_group_name: Some("  ".to_string()), ..Default::default() }
            .apply_to(&mut record);

        assert_eq!(record.resource_group_name.as_deref(), Some("demorg"));
    }

    #[tokio::test]
    async fn extractor_strips_fences_before_parsing() {
        let llm = FakeLlm::with_responses(vec![
            "```json\n{\"intent\": \"delete\", \"resource_type\": \"Microsoft.KeyVault/vaults\"}\n```"
                .to_string(),
        ]);
        let extractor = LlmIntentExtractor::new(std::sync::Arc::new(llm));

        let extracted = extractor.extract("delete my vault").await.expect("extraction");
        assert_eq!(extracted.intent.as_deref(), Some("delete"));
    }

    #[tokio::test]
    async fn malformed_completion_is_an_error() {
        let llm = FakeLlm::with_responses(vec!["sure, deleting it now!".to_string()]);
        let extractor = LlmIntentExtractor::new(std::sync::Arc::new(llm));

        assert!(extractor.extract("delete my vault").await.is_err());
    }
}
