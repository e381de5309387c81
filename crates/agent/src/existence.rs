use arma_azure::provider::ResourceProvider;
use arma_azure::subscriptions::{resolve_subscription, resource_group_exists};
use arma_core::record::{ConversationRecord, Message};

/// Existence-check stage. Reconciles the subscription reference against the
/// live subscription list, fills in the missing id/name counterpart, and
/// checks the resource group. Both checks degrade to "does not exist" on
/// provider failure; re-running on unchanged inputs is idempotent.
pub async fn check_existence(
    provider: &dyn ResourceProvider,
    mut record: ConversationRecord,
) -> ConversationRecord {
    let check = resolve_subscription(
        provider,
        record.subscription_id.as_deref(),
        record.subscription_name.as_deref(),
    )
    .await;

    record.subscription_exists = Some(check.exists);
    if check.mismatch {
        record.push_message(Message::system(format!(
            "The subscription id and name you gave do not belong to the same subscription; \
             using id '{}' ('{}').",
            check.subscription_id.as_deref().unwrap_or_default(),
            check.subscription_name.as_deref().unwrap_or_default(),
        )));
    }
    if check.subscription_id.is_some() {
        record.subscription_id = check.subscription_id;
    }
    if check.subscription_name.is_some() {
        record.subscription_name = check.subscription_name;
    }

    if let (Some(subscription_id), Some(resource_group_name)) =
        (record.subscription_id.as_deref(), record.resource_group_name.as_deref())
    {
        record.resource_group_exists =
            Some(resource_group_exists(provider, subscription_id, resource_group_name).await);
    }

    record
}
