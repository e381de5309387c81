//! Scripted fakes shared by the stage tests: an `LlmClient` that replays
//! canned completions in order and a `ResourceProvider` that records every
//! call it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use arma_azure::provider::{ProviderError, ResourceProvider, SubscriptionInfo};
use arma_core::record::ResourceType;

use crate::llm::{LlmClient, LlmError};

pub struct FakeLlm {
    responses: Mutex<VecDeque<String>>,
}

impl FakeLlm {
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self { responses: Mutex::new(responses.into()) }
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, _system_prompt: &str, _user_message: &str) -> Result<String, LlmError> {
        self.responses
            .lock()
            .expect("llm fake poisoned")
            .pop_front()
            .ok_or(LlmError::EmptyCompletion)
    }
}

pub struct FakeProvider {
    pub subscriptions: Vec<SubscriptionInfo>,
    pub existing_resource_groups: Vec<String>,
    pub calls: Mutex<Vec<String>>,
    pub fail_validation: bool,
    pub fail_deployments: bool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            subscriptions: vec![SubscriptionInfo {
                subscription_id: "sub-1".to_string(),
                display_name: "Production".to_string(),
                state: "Enabled".to_string(),
            }],
            existing_resource_groups: vec!["demorg".to_string()],
            calls: Mutex::new(Vec::new()),
            fail_validation: false,
            fail_deployments: false,
        }
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().expect("provider fake poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("provider fake poisoned").push(call);
    }
}

#[async_trait]
impl ResourceProvider for FakeProvider {
    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, ProviderError> {
        self.record("list_subscriptions".to_string());
        Ok(self.subscriptions.clone())
    }

    async fn resource_group_exists(
        &self,
        _subscription_id: &str,
        resource_group_name: &str,
    ) -> Result<bool, ProviderError> {
        self.record(format!("resource_group_exists {resource_group_name}"));
        Ok(self.existing_resource_groups.iter().any(|name| name == resource_group_name))
    }

    async fn create_resource_group(
        &self,
        _subscription_id: &str,
        resource_group_name: &str,
        location: &str,
    ) -> Result<Value, ProviderError> {
        self.record(format!("create_resource_group {resource_group_name} {location}"));
        Ok(json!({"name": resource_group_name, "location": location}))
    }

    async fn validate_resource_group_deployment(
        &self,
        _subscription_id: &str,
        resource_group_name: &str,
        _deployment_name: &str,
        _template: &Value,
        _parameters: &Value,
    ) -> Result<Value, ProviderError> {
        self.record(format!("validate_resource_group {resource_group_name}"));
        if self.fail_validation {
            return Err(ProviderError::Operation {
                state: "Invalid".to_string(),
                message: "the template is not valid".to_string(),
            });
        }
        Ok(json!({"properties": {"provisioningState": "Succeeded"}}))
    }

    async fn validate_subscription_deployment(
        &self,
        _subscription_id: &str,
        _deployment_name: &str,
        location: &str,
        _template: &Value,
        _parameters: &Value,
    ) -> Result<Value, ProviderError> {
        self.record(format!("validate_subscription {location}"));
        if self.fail_validation {
            return Err(ProviderError::Operation {
                state: "Invalid".to_string(),
                message: "the template is not valid".to_string(),
            });
        }
        Ok(json!({"properties": {"provisioningState": "Succeeded"}}))
    }

    async fn deploy_resource_group_scope(
        &self,
        _subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
        _template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError> {
        self.record(format!("deploy_resource_group {resource_group_name} {parameters}"));
        if self.fail_deployments {
            return Err(ProviderError::Operation {
                state: "Failed".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        Ok(json!({
            "name": deployment_name,
            "properties": {"provisioningState": "Succeeded"}
        }))
    }

    async fn deploy_subscription_scope(
        &self,
        _subscription_id: &str,
        deployment_name: &str,
        location: &str,
        _template: &Value,
        _parameters: &Value,
    ) -> Result<Value, ProviderError> {
        self.record(format!("deploy_subscription {location}"));
        if self.fail_deployments {
            return Err(ProviderError::Operation {
                state: "Failed".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        Ok(json!({
            "name": deployment_name,
            "properties": {"provisioningState": "Succeeded"}
        }))
    }

    async fn get_resource(
        &self,
        _subscription_id: &str,
        _resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError> {
        self.record(format!("get_resource {resource_type} {resource_name}"));
        Ok(json!({"name": resource_name, "type": resource_type.to_string()}))
    }

    async fn list_resources(
        &self,
        _subscription_id: &str,
        resource_group_name: &str,
        resource_type: Option<&ResourceType>,
    ) -> Result<Vec<Value>, ProviderError> {
        self.record(format!(
            "list_resources {resource_group_name} {}",
            resource_type.map(ToString::to_string).unwrap_or_else(|| "*".to_string())
        ));
        Ok(vec![json!({"name": "existing-resource"})])
    }

    async fn delete_resource(
        &self,
        _subscription_id: &str,
        _resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError> {
        self.record(format!("delete_resource {resource_type} {resource_name}"));
        Ok(json!({"message": format!("resource {resource_type} '{resource_name}' deleted")}))
    }
}
