use tracing::warn;

use crate::provider::{ResourceProvider, SubscriptionInfo};

/// Outcome of reconciling the user-supplied subscription identifiers against
/// the live subscription list. When only one identifier was supplied, the
/// counterpart is filled in from Azure; when both were supplied and disagree,
/// `mismatch` is set and the Azure-side values win.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionCheck {
    pub exists: bool,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub mismatch: bool,
}

/// Looks a subscription up by id or by case-insensitive display name.
/// `exists` additionally requires the subscription state to be `Enabled`.
/// A provider failure degrades to not-found rather than propagating; the
/// caller cannot tell "absent" from "check failed" (by design, logged here).
pub async fn resolve_subscription<P: ResourceProvider + ?Sized>(
    provider: &P,
    subscription_id: Option<&str>,
    subscription_name: Option<&str>,
) -> SubscriptionCheck {
    let supplied = SubscriptionCheck {
        exists: false,
        subscription_id: subscription_id.map(str::to_string),
        subscription_name: subscription_name.map(str::to_string),
        mismatch: false,
    };
    if subscription_id.is_none() && subscription_name.is_none() {
        return supplied;
    }

    let subscriptions = match provider.list_subscriptions().await {
        Ok(subscriptions) => subscriptions,
        Err(error) => {
            warn!(%error, "subscription existence check degraded to not-found");
            return supplied;
        }
    };

    match find_subscription(&subscriptions, subscription_id, subscription_name) {
        Some((matched, mismatch)) => SubscriptionCheck {
            exists: matched.is_enabled(),
            subscription_id: Some(matched.subscription_id.clone()),
            subscription_name: Some(matched.display_name.clone()),
            mismatch,
        },
        None => supplied,
    }
}

fn find_subscription<'a>(
    subscriptions: &'a [SubscriptionInfo],
    subscription_id: Option<&str>,
    subscription_name: Option<&str>,
) -> Option<(&'a SubscriptionInfo, bool)> {
    let normalized_name = subscription_name.map(|name| name.trim().to_lowercase());

    for subscription in subscriptions {
        if let Some(id) = subscription_id {
            if subscription.subscription_id == id {
                let mismatch = normalized_name
                    .as_deref()
                    .map(|name| subscription.display_name.trim().to_lowercase() != name)
                    .unwrap_or(false);
                return Some((subscription, mismatch));
            }
            continue;
        }
        if let Some(name) = normalized_name.as_deref() {
            if subscription.display_name.trim().to_lowercase() == name {
                return Some((subscription, false));
            }
        }
    }
    None
}

/// Resource-group existence with the same degrade-to-false contract.
pub async fn resource_group_exists<P: ResourceProvider + ?Sized>(
    provider: &P,
    subscription_id: &str,
    resource_group_name: &str,
) -> bool {
    match provider.resource_group_exists(subscription_id, resource_group_name).await {
        Ok(exists) => exists,
        Err(error) => {
            warn!(%error, "resource group existence check degraded to not-found");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use arma_core::record::ResourceType;

    use crate::provider::{ProviderError, ResourceProvider, SubscriptionInfo};

    use super::{resolve_subscription, resource_group_exists};

    struct FakeProvider {
        subscriptions: Result<Vec<SubscriptionInfo>, ()>,
        resource_group: Result<bool, ()>,
    }

    impl FakeProvider {
        fn with_subscriptions(subscriptions: Vec<SubscriptionInfo>) -> Self {
            Self { subscriptions: Ok(subscriptions), resource_group: Ok(true) }
        }

        fn failing() -> Self {
            Self { subscriptions: Err(()), resource_group: Err(()) }
        }
    }

    fn transport_error() -> ProviderError {
        ProviderError::Transport("connection refused".to_string())
    }

    #[async_trait]
    impl ResourceProvider for FakeProvider {
        async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, ProviderError> {
            self.subscriptions.clone().map_err(|_| transport_error())
        }

        async fn resource_group_exists(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
        ) -> Result<bool, ProviderError> {
            self.resource_group.map_err(|_| transport_error())
        }

        async fn create_resource_group(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _location: &str,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn validate_resource_group_deployment(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _deployment_name: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn validate_subscription_deployment(
            &self,
            _subscription_id: &str,
            _deployment_name: &str,
            _location: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn deploy_resource_group_scope(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _deployment_name: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn deploy_subscription_scope(
            &self,
            _subscription_id: &str,
            _deployment_name: &str,
            _location: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn get_resource(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _resource_type: &ResourceType,
            _resource_name: &str,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn list_resources(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _resource_type: Option<&ResourceType>,
        ) -> Result<Vec<Value>, ProviderError> {
            unimplemented!("not exercised")
        }

        async fn delete_resource(
            &self,
            _subscription_id: &str,
            _resource_group_name: &str,
            _resource_type: &ResourceType,
            _resource_name: &str,
        ) -> Result<Value, ProviderError> {
            unimplemented!("not exercised")
        }
    }

    fn enabled(id: &str, name: &str) -> SubscriptionInfo {
        SubscriptionInfo {
            subscription_id: id.to_string(),
            display_name: name.to_string(),
            state: "Enabled".to_string(),
        }
    }

    #[tokio::test]
    async fn lookup_by_id_fills_in_display_name() {
        let provider = FakeProvider::with_subscriptions(vec![enabled("sub-1", "Production")]);
        let check = resolve_subscription(&provider, Some("sub-1"), None).await;

        assert!(check.exists);
        assert_eq!(check.subscription_name.as_deref(), Some("Production"));
        assert!(!check.mismatch);
    }

    #[tokio::test]
    async fn lookup_by_name_is_case_insensitive_and_fills_in_id() {
        let provider = FakeProvider::with_subscriptions(vec![enabled("sub-1", "Production")]);
        let check = resolve_subscription(&provider, None, Some("production")).await;

        assert!(check.exists);
        assert_eq!(check.subscription_id.as_deref(), Some("sub-1"));
    }

    #[tokio::test]
    async fn id_and_name_agreeing_for_the_same_subscription() {
        let provider = FakeProvider::with_subscriptions(vec![enabled("sub-1", "Production")]);
        let check =
            resolve_subscription(&provider, Some("sub-1"), Some("Production")).await;

        assert!(check.exists);
        assert!(!check.mismatch);
    }

    #[tokio::test]
    async fn mismatched_id_and_name_are_flagged_never_silently_resolved() {
        let provider = FakeProvider::with_subscriptions(vec![enabled("sub-1", "Production")]);
        let check = resolve_subscription(&provider, Some("sub-1"), Some("Staging")).await;

        assert!(check.mismatch);
        // Azure-side values win so downstream stages see consistent data.
        assert_eq!(check.subscription_name.as_deref(), Some("Production"));
    }

    #[tokio::test]
    async fn disabled_subscription_does_not_exist() {
        let provider = FakeProvider::with_subscriptions(vec![SubscriptionInfo {
            subscription_id: "sub-1".to_string(),
            display_name: "Old".to_string(),
            state: "Disabled".to_string(),
        }]);
        let check = resolve_subscription(&provider, Some("sub-1"), None).await;

        assert!(!check.exists);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_not_found() {
        let provider = FakeProvider::failing();
        let check = resolve_subscription(&provider, Some("sub-1"), None).await;

        assert!(!check.exists);
        assert_eq!(check.subscription_id.as_deref(), Some("sub-1"));

        assert!(!resource_group_exists(&provider, "sub-1", "demorg").await);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_for_unchanged_inputs() {
        let provider = FakeProvider::with_subscriptions(vec![enabled("sub-1", "Production")]);
        let first = resolve_subscription(&provider, Some("sub-1"), None).await;
        let second = resolve_subscription(&provider, Some("sub-1"), None).await;
        assert_eq!(first, second);
    }
}
