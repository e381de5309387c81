use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use arma_core::record::ResourceType;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("azure returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("long-running operation ended in `{state}`: {message}")]
    Operation { state: String, message: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
}

impl SubscriptionInfo {
    pub fn is_enabled(&self) -> bool {
        self.state.eq_ignore_ascii_case("enabled")
    }
}

/// The ARM operations the pipeline consumes. Deployments and deletes are
/// long-running on the Azure side; implementations block until the
/// operation reaches a terminal state (no local timeout of their own).
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, ProviderError>;

    async fn resource_group_exists(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
    ) -> Result<bool, ProviderError>;

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        location: &str,
    ) -> Result<Value, ProviderError>;

    /// ARM-side preflight validation of a resource group deployment.
    async fn validate_resource_group_deployment(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError>;

    /// ARM-side preflight validation of a subscription scope deployment.
    async fn validate_subscription_deployment(
        &self,
        subscription_id: &str,
        deployment_name: &str,
        location: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError>;

    /// Incremental-mode deployment into a resource group.
    async fn deploy_resource_group_scope(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError>;

    /// Incremental-mode deployment at subscription scope.
    async fn deploy_subscription_scope(
        &self,
        subscription_id: &str,
        deployment_name: &str,
        location: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError>;

    async fn get_resource(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError>;

    async fn list_resources(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: Option<&ResourceType>,
    ) -> Result<Vec<Value>, ProviderError>;

    async fn delete_resource(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError>;
}
