use serde_json::Value;
use tracing::info;

use arma_azure::provider::ResourceProvider;
use arma_core::record::{ConversationRecord, Intent, Message, StageStatus};

/// Required inputs for a get/list/delete, by exact user-facing name. The
/// caller pauses the turn when anything is missing; no provider call is made
/// until the list is empty.
pub fn missing_action_fields(record: &ConversationRecord, intent: Intent) -> Vec<String> {
    let mut missing = record.missing_scope_field_names();
    if matches!(intent, Intent::Get | Intent::Delete) {
        if record.resource_type.is_none() {
            missing.push("resource_type".to_string());
        }
        if resource_name(record).is_none() {
            missing.push("name".to_string());
        }
    }
    missing
}

fn resource_name(record: &ConversationRecord) -> Option<&str> {
    record
        .provided_fields
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
}

/// Runs the resolved get/list/delete against the provider and records the
/// outcome. Deletes are awaited to completion by the provider itself.
pub async fn dispatch(
    provider: &dyn ResourceProvider,
    mut record: ConversationRecord,
    intent: Intent,
) -> ConversationRecord {
    let Some(subscription_id) = record.subscription_id.clone() else {
        return action_failed(record, "subscription could not be resolved to an id".to_string());
    };
    let Some(resource_group_name) = record.resource_group_name.clone() else {
        return action_failed(record, "resource_group_name is required".to_string());
    };

    info!(%intent, %resource_group_name, "dispatching resource action");
    let outcome = match intent {
        Intent::Get => {
            let (resource_type, name) = match (record.resource_type.clone(), resource_name(&record))
            {
                (Some(resource_type), Some(name)) => (resource_type, name.to_string()),
                _ => {
                    return action_failed(
                        record,
                        "resource_type and name are required for get".to_string(),
                    )
                }
            };
            provider
                .get_resource(&subscription_id, &resource_group_name, &resource_type, &name)
                .await
        }
        Intent::List => provider
            .list_resources(&subscription_id, &resource_group_name, record.resource_type.as_ref())
            .await
            .map(Value::Array),
        Intent::Delete => {
            let (resource_type, name) = match (record.resource_type.clone(), resource_name(&record))
            {
                (Some(resource_type), Some(name)) => (resource_type, name.to_string()),
                _ => {
                    return action_failed(
                        record,
                        "resource_type and name are required for delete".to_string(),
                    )
                }
            };
            provider
                .delete_resource(&subscription_id, &resource_group_name, &resource_type, &name)
                .await
        }
        Intent::Create | Intent::Update => {
            return action_failed(
                record,
                format!("intent `{intent}` is handled by the deployment branch"),
            )
        }
    };

    match outcome {
        Ok(result) => {
            record.resource_action_status = Some(StageStatus::Success);
            record.resource_action_error = None;
            record.push_message(Message::system(format!("{intent} completed")));
            record.resource_action_result = Some(result);
        }
        Err(error) => return action_failed(record, error.to_string()),
    }
    record
}

fn action_failed(mut record: ConversationRecord, error: String) -> ConversationRecord {
    record.resource_action_status = Some(StageStatus::Failed);
    record.push_message(Message::system(format!("resource action failed: {error}")));
    record.resource_action_error = Some(error);
    record
}
