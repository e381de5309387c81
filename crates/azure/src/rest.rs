use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use arma_core::config::AzureConfig;
use arma_core::record::ResourceType;

use crate::provider::{ProviderError, ResourceProvider, SubscriptionInfo};
use crate::ARM_API_VERSION;

const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
// Refresh the token a minute before Azure expires it.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// ARM REST implementation of [`ResourceProvider`]. Authenticates with a
/// client-credentials grant and polls long-running operations to completion;
/// the only timeout is whatever the HTTP client and Azure enforce.
pub struct ArmRestProvider {
    client: Client,
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
    management_endpoint: String,
    login_endpoint: String,
    poll_interval: Duration,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct SubscriptionList {
    value: Vec<SubscriptionEntry>,
}

#[derive(Deserialize)]
struct SubscriptionEntry {
    #[serde(rename = "subscriptionId")]
    subscription_id: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(default)]
    state: String,
}

#[derive(Deserialize)]
struct ResourceList {
    value: Vec<Value>,
}

impl ArmRestProvider {
    pub fn new(azure: &AzureConfig) -> Self {
        Self {
            client: Client::new(),
            tenant_id: azure.tenant_id.clone(),
            client_id: azure.client_id.clone(),
            client_secret: azure.client_secret.clone(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            token: RwLock::new(None),
        }
    }

    /// Point at a sovereign-cloud or test endpoint pair.
    pub fn with_endpoints(
        mut self,
        management_endpoint: impl Into<String>,
        login_endpoint: impl Into<String>,
    ) -> Self {
        self.management_endpoint = management_endpoint.into();
        self.login_endpoint = login_endpoint.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn bearer_token(&self) -> Result<String, ProviderError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token_expired(token.expires_at, Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_endpoint, self.tenant_id);
        let scope = format!("{}/.default", self.management_endpoint);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth(message));
        }

        let token: TokenResponse =
            response.json().await.map_err(|err| ProviderError::Auth(err.to_string()))?;
        let expires_at =
            Utc::now() + chrono::Duration::seconds(token.expires_in - TOKEN_EXPIRY_MARGIN_SECS);
        let access_token = token.access_token.clone();

        let mut cached = self.token.write().await;
        *cached = Some(CachedToken { access_token: token.access_token, expires_at });
        debug!("refreshed arm access token");
        Ok(access_token)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, ProviderError> {
        let token = self.bearer_token().await?;
        let mut request = self.client.request(method, url).bearer_auth(token).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn api_error(response: Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        ProviderError::Api { status, message }
    }

    fn resource_group_deployment_url(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
    ) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}",
            self.management_endpoint, subscription_id, resource_group_name, deployment_name
        )
    }

    fn subscription_deployment_url(&self, subscription_id: &str, deployment_name: &str) -> String {
        format!(
            "{}/subscriptions/{}/providers/Microsoft.Resources/deployments/{}",
            self.management_endpoint, subscription_id, deployment_name
        )
    }

    fn resource_url(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.management_endpoint,
            subscription_id,
            resource_group_name,
            resource_type.namespace(),
            resource_type.resource(),
            resource_name
        )
    }

    /// Polls a deployment resource until its provisioning state is terminal.
    async fn await_deployment(&self, deployment_url: &str) -> Result<Value, ProviderError> {
        loop {
            let response = self
                .send(Method::GET, deployment_url, &[("api-version", ARM_API_VERSION)], None)
                .await?;
            if !response.status().is_success() {
                return Err(Self::api_error(response).await);
            }
            let body: Value = response.json().await?;
            let state = body
                .pointer("/properties/provisioningState")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            match state.as_str() {
                "Succeeded" => return Ok(body),
                "Failed" | "Canceled" => {
                    let message = body
                        .pointer("/properties/error/message")
                        .and_then(Value::as_str)
                        .unwrap_or("deployment did not succeed")
                        .to_string();
                    return Err(ProviderError::Operation { state, message });
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// POSTs a deployment body to the `validate` endpoint. ARM reports a
    /// rejected template either as a non-success status or as an `error`
    /// object in a 200 body; both surface as errors here.
    async fn preflight_deployment(
        &self,
        deployment_url: &str,
        body: Value,
    ) -> Result<Value, ProviderError> {
        let url = format!("{deployment_url}/validate");
        let response = self
            .send(Method::POST, &url, &[("api-version", ARM_API_VERSION)], Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let result: Value = response.json().await?;
        if let Some(message) = result.pointer("/error/message").and_then(Value::as_str) {
            return Err(ProviderError::Operation {
                state: "Invalid".to_string(),
                message: message.to_string(),
            });
        }
        Ok(result)
    }

    async fn start_deployment(
        &self,
        deployment_url: &str,
        body: Value,
    ) -> Result<Value, ProviderError> {
        let response = self
            .send(
                Method::PUT,
                deployment_url,
                &[("api-version", ARM_API_VERSION)],
                Some(&body),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        self.await_deployment(deployment_url).await
    }
}

/// Incremental-mode deployment properties; the mode is a fixed policy, never
/// user-configurable.
pub fn deployment_properties(template: &Value, parameters: &Value) -> Value {
    json!({
        "properties": {
            "mode": "Incremental",
            "template": template,
            "parameters": parameters,
        }
    })
}

pub fn subscription_deployment_body(
    location: &str,
    template: &Value,
    parameters: &Value,
) -> Value {
    let mut body = deployment_properties(template, parameters);
    body["location"] = Value::String(location.to_string());
    body
}

pub fn resource_type_filter(resource_type: &ResourceType) -> String {
    format!("resourceType eq '{resource_type}'")
}

fn token_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

#[async_trait::async_trait]
impl ResourceProvider for ArmRestProvider {
    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, ProviderError> {
        let url = format!("{}/subscriptions", self.management_endpoint);
        let response =
            self.send(Method::GET, &url, &[("api-version", ARM_API_VERSION)], None).await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let list: SubscriptionList = response.json().await?;
        Ok(list
            .value
            .into_iter()
            .map(|entry| SubscriptionInfo {
                subscription_id: entry.subscription_id,
                display_name: entry.display_name,
                state: entry.state,
            })
            .collect())
    }

    async fn resource_group_exists(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
    ) -> Result<bool, ProviderError> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups/{}",
            self.management_endpoint, subscription_id, resource_group_name
        );
        let response =
            self.send(Method::HEAD, &url, &[("api-version", ARM_API_VERSION)], None).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        location: &str,
    ) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups/{}",
            self.management_endpoint, subscription_id, resource_group_name
        );
        let body = json!({ "location": location });
        let response = self
            .send(Method::PUT, &url, &[("api-version", ARM_API_VERSION)], Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        info!(resource_group_name, location, "created resource group");
        Ok(response.json().await?)
    }

    async fn validate_resource_group_deployment(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError> {
        let url = self.resource_group_deployment_url(
            subscription_id,
            resource_group_name,
            deployment_name,
        );
        info!(deployment_name, resource_group_name, "validating resource group deployment");
        self.preflight_deployment(&url, deployment_properties(template, parameters)).await
    }

    async fn validate_subscription_deployment(
        &self,
        subscription_id: &str,
        deployment_name: &str,
        location: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError> {
        let url = self.subscription_deployment_url(subscription_id, deployment_name);
        info!(deployment_name, location, "validating subscription scope deployment");
        self.preflight_deployment(&url, subscription_deployment_body(location, template, parameters))
            .await
    }

    async fn deploy_resource_group_scope(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        deployment_name: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError> {
        let url = self.resource_group_deployment_url(
            subscription_id,
            resource_group_name,
            deployment_name,
        );
        info!(deployment_name, resource_group_name, "starting resource group deployment");
        self.start_deployment(&url, deployment_properties(template, parameters)).await
    }

    async fn deploy_subscription_scope(
        &self,
        subscription_id: &str,
        deployment_name: &str,
        location: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<Value, ProviderError> {
        let url = self.subscription_deployment_url(subscription_id, deployment_name);
        info!(deployment_name, location, "starting subscription scope deployment");
        self.start_deployment(&url, subscription_deployment_body(location, template, parameters))
            .await
    }

    async fn get_resource(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError> {
        let url =
            self.resource_url(subscription_id, resource_group_name, resource_type, resource_name);
        let response =
            self.send(Method::GET, &url, &[("api-version", ARM_API_VERSION)], None).await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn list_resources(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: Option<&ResourceType>,
    ) -> Result<Vec<Value>, ProviderError> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/resources",
            self.management_endpoint, subscription_id, resource_group_name
        );
        let filter = resource_type.map(resource_type_filter);
        let mut query: Vec<(&str, &str)> = vec![("api-version", ARM_API_VERSION)];
        if let Some(filter) = filter.as_deref() {
            query.push(("$filter", filter));
        }
        let response = self.send(Method::GET, &url, &query, None).await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let list: ResourceList = response.json().await?;
        Ok(list.value)
    }

    async fn delete_resource(
        &self,
        subscription_id: &str,
        resource_group_name: &str,
        resource_type: &ResourceType,
        resource_name: &str,
    ) -> Result<Value, ProviderError> {
        let url =
            self.resource_url(subscription_id, resource_group_name, resource_type, resource_name);
        let response =
            self.send(Method::DELETE, &url, &[("api-version", ARM_API_VERSION)], None).await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {}
            StatusCode::ACCEPTED => {
                // Deletion is long-running; poll the resource until it is gone.
                loop {
                    tokio::time::sleep(self.poll_interval).await;
                    let lookup = self
                        .send(Method::GET, &url, &[("api-version", ARM_API_VERSION)], None)
                        .await?;
                    match lookup.status() {
                        StatusCode::NOT_FOUND => break,
                        status if status.is_success() => continue,
                        _ => return Err(Self::api_error(lookup).await),
                    }
                }
            }
            _ => return Err(Self::api_error(response).await),
        }
        Ok(json!({
            "message": format!("resource {resource_type} '{resource_name}' deleted")
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use arma_core::record::ResourceType;

    use super::{
        deployment_properties, resource_type_filter, subscription_deployment_body, token_expired,
    };

    #[test]
    fn deployment_mode_is_always_incremental() {
        let body = deployment_properties(&json!({"resources": []}), &json!({}));
        assert_eq!(body["properties"]["mode"], "Incremental");
    }

    #[test]
    fn subscription_deployments_carry_a_location() {
        let body =
            subscription_deployment_body("eastus", &json!({"resources": []}), &json!({}));
        assert_eq!(body["location"], "eastus");
        assert_eq!(body["properties"]["mode"], "Incremental");
    }

    #[test]
    fn resource_filter_uses_the_full_two_part_type() {
        let resource_type: ResourceType =
            "Microsoft.Storage/storageAccounts".parse().expect("valid type");
        assert_eq!(
            resource_type_filter(&resource_type),
            "resourceType eq 'Microsoft.Storage/storageAccounts'"
        );
    }

    #[test]
    fn token_expiry_is_checked_against_now() {
        let now = Utc::now();
        assert!(token_expired(now - Duration::seconds(1), now));
        assert!(!token_expired(now + Duration::seconds(30), now));
    }
}
