use arma_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.push(format!("azure.tenant_id = {}", config.azure.tenant_id));
    lines.push(format!("azure.client_id = {}", config.azure.client_id));
    lines.push(format!(
        "azure.client_secret = {}",
        redact(config.azure.client_secret.expose_secret())
    ));
    lines.push(format!(
        "azure.default_subscription_id = {}",
        config.azure.default_subscription_id.as_deref().unwrap_or("<unset>")
    ));
    lines.push(format!("llm.provider = {:?}", config.llm.provider));
    lines.push(format!(
        "llm.api_key = {}",
        config
            .llm
            .api_key
            .as_ref()
            .map(|key| redact(key.expose_secret()))
            .unwrap_or_else(|| "<unset>".to_string())
    ));
    lines.push(format!("llm.endpoint = {}", config.llm.endpoint.as_deref().unwrap_or("<unset>")));
    lines.push(format!(
        "llm.deployment = {}",
        config.llm.deployment.as_deref().unwrap_or("<unset>")
    ));
    lines.push(format!("llm.api_version = {}", config.llm.api_version));
    lines.push(format!("llm.model = {}", config.llm.model));
    lines.push(format!("llm.timeout_secs = {}", config.llm.timeout_secs));
    lines.push(format!("catalog.root = {}", config.catalog.root.display()));
    lines.push(format!("logging.level = {}", config.logging.level));
    lines.push(format!("logging.format = {:?}", config.logging.format));
    lines.join("\n")
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    let tail: String = {
        let chars: Vec<char> = secret.chars().collect();
        chars[chars.len() - 4..].iter().collect()
    };
    format!("****{tail}")
}
