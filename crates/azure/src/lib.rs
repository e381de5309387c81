//! Cloud provider boundary for the ARM assistant.
//!
//! Everything the pipeline needs from Azure goes through the
//! [`ResourceProvider`] trait: subscription listing, resource-group
//! existence and creation, template deployments at resource-group and
//! subscription scope, and generic resource get/list/delete. The production
//! implementation talks to the ARM REST API; tests swap in scripted fakes.

pub mod provider;
pub mod rest;
pub mod subscriptions;

pub use provider::{ProviderError, ResourceProvider, SubscriptionInfo};
pub use rest::ArmRestProvider;
pub use subscriptions::{resolve_subscription, SubscriptionCheck};

/// Fixed api-version for generic resource operations and deployments.
pub const ARM_API_VERSION: &str = "2021-04-01";
