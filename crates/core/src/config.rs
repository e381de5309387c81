use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub azure: AzureConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// Credentials for the ARM boundary. The assistant authenticates with a
/// client-credentials grant; all four values come from the app registration.
#[derive(Clone, Debug)]
pub struct AzureConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub default_subscription_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub root: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Azure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub catalog_root: Option<PathBuf>,
    pub default_subscription_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            azure: AzureConfig {
                tenant_id: String::new(),
                client_id: String::new(),
                client_secret: String::new().into(),
                default_subscription_id: None,
            },
            llm: LlmConfig {
                provider: LlmProvider::Azure,
                api_key: None,
                endpoint: None,
                deployment: None,
                api_version: "2024-06-01".to_string(),
                model: "gpt-4o".to_string(),
                timeout_secs: 60,
            },
            catalog: CatalogConfig { root: PathBuf::from("quickstarts") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "azure" => Ok(Self::Azure),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|azure)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("arma.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(azure) = patch.azure {
            if let Some(tenant_id) = azure.tenant_id {
                self.azure.tenant_id = tenant_id;
            }
            if let Some(client_id) = azure.client_id {
                self.azure.client_id = client_id;
            }
            if let Some(client_secret_value) = azure.client_secret {
                self.azure.client_secret = secret_value(client_secret_value);
            }
            if let Some(default_subscription_id) = azure.default_subscription_id {
                self.azure.default_subscription_id = Some(default_subscription_id);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(endpoint) = llm.endpoint {
                self.llm.endpoint = Some(endpoint);
            }
            if let Some(deployment) = llm.deployment {
                self.llm.deployment = Some(deployment);
            }
            if let Some(api_version) = llm.api_version {
                self.llm.api_version = api_version;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(root) = catalog.root {
                self.catalog.root = PathBuf::from(root);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ARMA_AZURE_TENANT_ID") {
            self.azure.tenant_id = value;
        }
        if let Some(value) = read_env("ARMA_AZURE_CLIENT_ID") {
            self.azure.client_id = value;
        }
        if let Some(value) = read_env("ARMA_AZURE_CLIENT_SECRET") {
            self.azure.client_secret = secret_value(value);
        }
        if let Some(value) = read_env("ARMA_AZURE_SUBSCRIPTION_ID") {
            self.azure.default_subscription_id = Some(value);
        }

        if let Some(value) = read_env("ARMA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ARMA_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ARMA_LLM_ENDPOINT") {
            self.llm.endpoint = Some(value);
        }
        if let Some(value) = read_env("ARMA_LLM_DEPLOYMENT") {
            self.llm.deployment = Some(value);
        }
        if let Some(value) = read_env("ARMA_LLM_API_VERSION") {
            self.llm.api_version = value;
        }
        if let Some(value) = read_env("ARMA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ARMA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ARMA_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ARMA_CATALOG_ROOT") {
            self.catalog.root = PathBuf::from(value);
        }

        let log_level = read_env("ARMA_LOGGING_LEVEL").or_else(|| read_env("ARMA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("ARMA_LOGGING_FORMAT").or_else(|| read_env("ARMA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(catalog_root) = overrides.catalog_root {
            self.catalog.root = catalog_root;
        }
        if let Some(default_subscription_id) = overrides.default_subscription_id {
            self.azure.default_subscription_id = Some(default_subscription_id);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_azure(&self.azure)?;
        validate_llm(&self.llm)?;
        validate_catalog(&self.catalog)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("arma.toml"), PathBuf::from("config/arma.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_azure(azure: &AzureConfig) -> Result<(), ConfigError> {
    if azure.tenant_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "azure.tenant_id is required (set ARMA_AZURE_TENANT_ID or [azure] tenant_id)"
                .to_string(),
        ));
    }
    if azure.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "azure.client_id is required (set ARMA_AZURE_CLIENT_ID or [azure] client_id)"
                .to_string(),
        ));
    }
    if azure.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "azure.client_secret is required (set ARMA_AZURE_CLIENT_SECRET or [azure] client_secret)"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let key_missing = llm
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if key_missing {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if llm.provider == LlmProvider::Azure {
        let endpoint_missing =
            llm.endpoint.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if endpoint_missing {
            return Err(ConfigError::Validation(
                "llm.endpoint is required for the azure provider".to_string(),
            ));
        }
        let deployment_missing =
            llm.deployment.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if deployment_missing {
            return Err(ConfigError::Validation(
                "llm.deployment is required for the azure provider".to_string(),
            ));
        }
        if llm.api_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_version is required for the azure provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.root must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    azure: Option<AzurePatch>,
    llm: Option<LlmPatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AzurePatch {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    default_subscription_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    endpoint: Option<String>,
    deployment: Option<String>,
    api_version: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LlmProvider};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        env::set_var("ARMA_AZURE_TENANT_ID", "tenant-from-env");
        env::set_var("ARMA_AZURE_CLIENT_ID", "client-from-env");
        env::set_var("ARMA_AZURE_CLIENT_SECRET", "secret-from-env");
        env::set_var("ARMA_LLM_API_KEY", "key-from-env");
        env::set_var("ARMA_LLM_ENDPOINT", "https://example.openai.azure.com");
        env::set_var("ARMA_LLM_DEPLOYMENT", "gpt-4o");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    const REQUIRED_VARS: &[&str] = &[
        "ARMA_AZURE_TENANT_ID",
        "ARMA_AZURE_CLIENT_ID",
        "ARMA_AZURE_CLIENT_SECRET",
        "ARMA_LLM_API_KEY",
        "ARMA_LLM_ENDPOINT",
        "ARMA_LLM_DEPLOYMENT",
    ];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("TEST_ARMA_TENANT", "tenant-from-interpolation");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("arma.toml");
            fs::write(
                &path,
                r#"
[azure]
tenant_id = "${TEST_ARMA_TENANT}"
"#,
            )
            .map_err(|err| err.to_string())?;

            // Env overrides outrank the file, so drop the env tenant first.
            env::remove_var("ARMA_AZURE_TENANT_ID");
            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.azure.tenant_id == "tenant-from-interpolation",
                "tenant id should be interpolated from the environment",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["TEST_ARMA_TENANT"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("ARMA_LOG_LEVEL", "warn");
        env::set_var("ARMA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should come from env")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty log format should come from env",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["ARMA_LOG_LEVEL", "ARMA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("arma.toml");
            fs::write(
                &path,
                r#"
[azure]
tenant_id = "tenant-from-file"

[llm]
model = "gpt-4o-mini"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    llm_model: Some("model-from-override".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.azure.tenant_id == "tenant-from-env",
                "env tenant id should win over file and defaults",
            )?;
            ensure(
                config.llm.model == "model-from-override",
                "override model should win over file",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("ARMA_AZURE_CLIENT_SECRET");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("azure.client_secret")
            );
            ensure(has_message, "validation failure should mention azure.client_secret")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn openai_provider_does_not_require_endpoint() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("ARMA_LLM_ENDPOINT");
        env::remove_var("ARMA_LLM_DEPLOYMENT");
        env::set_var("ARMA_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.llm.provider == LlmProvider::OpenAi,
                "provider should be openai from env",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["ARMA_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("secret-from-env"),
                "debug output should not contain the client secret",
            )?;
            ensure(
                !debug.contains("key-from-env"),
                "debug output should not contain the llm api key",
            )?;
            ensure(
                config.azure.client_secret.expose_secret() == "secret-from-env",
                "exposed secret should round-trip",
            )
        })();

        clear_vars(REQUIRED_VARS);
        result
    }
}
