use arma_core::catalog::TemplateCatalog;
use arma_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let catalog = TemplateCatalog::new(config.catalog.root);
    let entries = catalog.list();
    if entries.is_empty() {
        return format!("no templates found under `{}`", catalog.root().display());
    }
    entries.join("\n")
}
