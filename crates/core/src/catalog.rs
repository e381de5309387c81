use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{ResourceType, Scope};

/// Static, local catalog of quickstart ARM templates keyed by resource type.
/// Lookup is purely a filesystem path derivation; there is no network access.
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    root: PathBuf,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("template not found for `{resource_type}` at `{path}`")]
    NotFound { resource_type: ResourceType, path: PathBuf },
    #[error("could not read template `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse template `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

impl TemplateCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `Ns/Type` maps to `<root>/ns/type.json`, both segments lowercased.
    pub fn template_path(&self, resource_type: &ResourceType) -> PathBuf {
        self.root
            .join(resource_type.namespace().to_lowercase())
            .join(format!("{}.json", resource_type.resource().to_lowercase()))
    }

    pub fn fetch(&self, resource_type: &ResourceType) -> Result<ArmTemplate, CatalogError> {
        let path = self.template_path(resource_type);
        if !path.exists() {
            return Err(CatalogError::NotFound { resource_type: resource_type.clone(), path });
        }
        let raw = fs::read_to_string(&path)
            .map_err(|source| CatalogError::Read { path: path.clone(), source })?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse { path, source })?;
        Ok(ArmTemplate::new(document))
    }

    /// Every `<namespace>/<resource>.json` entry under the catalog root,
    /// as `namespace/resource` strings. Unreadable directories are skipped.
    pub fn list(&self) -> Vec<String> {
        let mut entries = Vec::new();
        let Ok(namespaces) = fs::read_dir(&self.root) else {
            return entries;
        };
        for namespace in namespaces.flatten() {
            if !namespace.path().is_dir() {
                continue;
            }
            let Ok(templates) = fs::read_dir(namespace.path()) else {
                continue;
            };
            for template in templates.flatten() {
                let path = template.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                    if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                        entries.push(format!(
                            "{}/{}",
                            namespace.file_name().to_string_lossy(),
                            stem
                        ));
                    }
                }
            }
        }
        entries.sort();
        entries
    }
}

/// A parsed ARM template document.
#[derive(Clone, Debug, PartialEq)]
pub struct ArmTemplate {
    document: Value,
}

impl ArmTemplate {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    /// The declared `parameters` section, empty when absent.
    pub fn parameters(&self) -> Map<String, Value> {
        self.document
            .get("parameters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Deployment scope derived from the `$schema` URL. A missing schema or
    /// one without a scope marker defaults to resource-group scope.
    pub fn scope(&self) -> Scope {
        let Some(schema) = self.document.get("$schema").and_then(Value::as_str) else {
            return Scope::ResourceGroup;
        };
        let schema = schema.to_ascii_lowercase();
        if schema.contains("managementgroup") {
            Scope::ManagementGroup
        } else if schema.contains("tenant") {
            Scope::Tenant
        } else if schema.contains("subscription") {
            Scope::Subscription
        } else {
            Scope::ResourceGroup
        }
    }
}
