use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The shared, accumulating state threaded through every pipeline stage.
///
/// Each stage receives the record by value and returns it augmented with its
/// own fields. Stages never remove fields written by an earlier stage; the
/// per-stage outcome pairs (`*_status` + `*_error`) are always set together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub messages: Vec<Message>,
    pub intent: Option<Intent>,
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub provided_fields: Map<String, Value>,
    pub resource_group_name: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub location: Option<String>,
    pub scope: Option<Scope>,
    pub template: Option<Value>,
    pub template_error: Option<String>,
    pub parameter_file_content: Option<Value>,
    #[serde(default)]
    pub missing_parameters: Vec<String>,
    #[serde(default)]
    pub extra_fields: Vec<String>,
    pub intent_error: Option<String>,
    pub subscription_exists: Option<bool>,
    pub resource_group_exists: Option<bool>,
    #[serde(default)]
    pub missing_scope_fields: Vec<String>,
    pub missing_scope_message: Option<String>,
    pub validation_status: Option<StageStatus>,
    pub validation_error: Option<String>,
    pub deployment_status: Option<StageStatus>,
    pub deployment_error: Option<String>,
    pub deployment_result: Option<Value>,
    pub resource_action_status: Option<StageStatus>,
    pub resource_action_error: Option<String>,
    pub resource_action_result: Option<Value>,
}

impl ConversationRecord {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.push_message(Message::user(prompt));
        record
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    /// True when the user identified a subscription by id or by name.
    pub fn has_subscription_reference(&self) -> bool {
        self.subscription_id.is_some() || self.subscription_name.is_some()
    }

    /// Scope-identifying fields required before any template stage may run.
    /// Returns the exact names to surface to the user when absent.
    pub fn missing_scope_field_names(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.resource_group_name.as_deref().map_or(true, str::is_empty) {
            missing.push("resource_group_name".to_string());
        }
        if !self.has_subscription_reference() {
            missing.push("subscription_id or subscription_name".to_string());
        }
        missing
    }

    /// Resolved deployment parameters, trusted only once validation passed.
    pub fn deployable_parameters(&self) -> Option<&Value> {
        if !self.missing_parameters.is_empty() || self.validation_error.is_some() {
            return None;
        }
        self.parameter_file_content
            .as_ref()
            .and_then(|content| content.get("parameters"))
            .filter(|parameters| {
                parameters.as_object().map_or(false, |map| !map.is_empty())
            })
    }

    /// Merge fields from a later turn into a paused record. Newly supplied
    /// values win; absent values never erase what an earlier turn collected.
    pub fn absorb(&mut self, follow_up: ConversationRecord) {
        self.messages.extend(follow_up.messages);
        if follow_up.intent.is_some() {
            self.intent = follow_up.intent;
        }
        if follow_up.resource_type.is_some() {
            self.resource_type = follow_up.resource_type;
        }
        for (key, value) in follow_up.provided_fields {
            self.provided_fields.insert(key, value);
        }
        if follow_up.resource_group_name.is_some() {
            self.resource_group_name = follow_up.resource_group_name;
        }
        if follow_up.subscription_id.is_some() {
            self.subscription_id = follow_up.subscription_id;
        }
        if follow_up.subscription_name.is_some() {
            self.subscription_name = follow_up.subscription_name;
        }
        if follow_up.location.is_some() {
            self.location = follow_up.location;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    System,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Create,
    Update,
    Get,
    List,
    Delete,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Get => "get",
            Self::List => "list",
            Self::Delete => "delete",
        }
    }

    /// Create and update flow through template fetch + validation + deploy;
    /// everything else routes to the action dispatcher.
    pub fn requires_template(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl FromStr for Intent {
    type Err = RecordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "get" => Ok(Self::Get),
            "list" => Ok(Self::List),
            "delete" => Ok(Self::Delete),
            other => Err(RecordParseError::UnknownIntent(other.to_string())),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment scope derived from a template's `$schema` URL, never
/// user-supplied. Management-group and tenant scopes are recognized but
/// rejected by the deployer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    ResourceGroup,
    Subscription,
    ManagementGroup,
    Tenant,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "resourceGroup",
            Self::Subscription => "subscription",
            Self::ManagementGroup => "managementGroup",
            Self::Tenant => "tenant",
        }
    }

    pub fn supports_deployment(&self) -> bool {
        matches!(self, Self::ResourceGroup | Self::Subscription)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A two-part ARM resource type, e.g. `Microsoft.Storage/storageAccounts`.
/// The namespace/resource split doubles as the template catalog lookup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceType {
    namespace: String,
    resource: String,
}

impl ResourceType {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl FromStr for ResourceType {
    type Err = RecordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.split_once('/') {
            Some((namespace, resource))
                if !namespace.is_empty() && !resource.is_empty() && !resource.contains('/') =>
            {
                Ok(Self { namespace: namespace.to_string(), resource: resource.to_string() })
            }
            _ => Err(RecordParseError::InvalidResourceType(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = RecordParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.resource)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("unknown intent `{0}` (expected create|update|get|list|delete)")]
    UnknownIntent(String),
    #[error("invalid resource type `{0}` (expected `Namespace/Resource`)")]
    InvalidResourceType(String),
}
