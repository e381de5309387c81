use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use arma_azure::provider::{ProviderError, ResourceProvider};
use arma_core::record::{ConversationRecord, Message, Scope, StageStatus};

/// Region used when a resource group must be created and the user named no
/// location.
pub const DEFAULT_LOCATION: &str = "eastus";

pub fn deployment_name(now: DateTime<Utc>) -> String {
    format!("ai-deployment-{}", now.format("%Y%m%d%H%M%S"))
}

/// Deployment stage. Routes on the scope derived from the template's
/// `$schema`; only resourceGroup and subscription scopes are deployable.
/// Every deployment is Incremental mode and awaited to completion.
pub async fn run_deployment(
    provider: &dyn ResourceProvider,
    mut record: ConversationRecord,
) -> ConversationRecord {
    let scope = record.scope.unwrap_or(Scope::ResourceGroup);
    let Some(subscription_id) = record.subscription_id.clone() else {
        return deployment_failed(record, "subscription could not be resolved to an id".to_string());
    };
    let Some(template) = record.template.clone() else {
        return deployment_failed(record, "no template available to deploy".to_string());
    };
    let Some(parameters) = record.deployable_parameters().cloned() else {
        return deployment_failed(record, "parameters have not passed validation".to_string());
    };

    let name = deployment_name(Utc::now());
    let outcome = match scope {
        Scope::ResourceGroup => {
            deploy_into_resource_group(provider, &subscription_id, &name, &template, &parameters, &mut record)
                .await
        }
        Scope::Subscription => {
            let Some(location) = record.location.clone() else {
                return deployment_failed(
                    record,
                    "location is required for subscription scope deployments".to_string(),
                );
            };
            deploy_at_subscription_scope(
                provider,
                &subscription_id,
                &name,
                &location,
                &template,
                &parameters,
            )
            .await
        }
        Scope::ManagementGroup | Scope::Tenant => {
            return deployment_failed(
                record,
                format!("deployments at {scope} scope are not supported"),
            )
        }
    };

    match outcome {
        Ok(result) => {
            record.deployment_status = Some(StageStatus::Success);
            record.deployment_error = None;
            record.push_message(Message::system(format!("deployment {name} succeeded")));
            record.deployment_result = Some(result);
            record
        }
        Err(error) => deployment_failed(record, error.to_string()),
    }
}

async fn deploy_into_resource_group(
    provider: &dyn ResourceProvider,
    subscription_id: &str,
    deployment_name: &str,
    template: &Value,
    parameters: &Value,
    record: &mut ConversationRecord,
) -> Result<Value, ProviderError> {
    let Some(resource_group_name) = record.resource_group_name.clone() else {
        return Err(ProviderError::Operation {
            state: "Failed".to_string(),
            message: "resource_group_name is required".to_string(),
        });
    };

    if record.resource_group_exists == Some(false) {
        let location =
            record.location.clone().unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        info!(%resource_group_name, %location, "resource group absent, creating it first");
        provider
            .create_resource_group(subscription_id, &resource_group_name, &location)
            .await?;
        record.resource_group_exists = Some(true);
        record.push_message(Message::system(format!(
            "created resource group '{resource_group_name}' in {location}"
        )));
    }

    provider
        .validate_resource_group_deployment(
            subscription_id,
            &resource_group_name,
            deployment_name,
            template,
            parameters,
        )
        .await?;

    provider
        .deploy_resource_group_scope(
            subscription_id,
            &resource_group_name,
            deployment_name,
            template,
            parameters,
        )
        .await
}

async fn deploy_at_subscription_scope(
    provider: &dyn ResourceProvider,
    subscription_id: &str,
    deployment_name: &str,
    location: &str,
    template: &Value,
    parameters: &Value,
) -> Result<Value, ProviderError> {
    provider
        .validate_subscription_deployment(subscription_id, deployment_name, location, template, parameters)
        .await?;

    provider
        .deploy_subscription_scope(subscription_id, deployment_name, location, template, parameters)
        .await
}

fn deployment_failed(mut record: ConversationRecord, error: String) -> ConversationRecord {
    record.deployment_status = Some(StageStatus::Failed);
    record.push_message(Message::system(format!("deployment failed: {error}")));
    record.deployment_error = Some(error);
    record
}
