//! tfplug - provider framework for declarative infrastructure tools
//!
//! Providers describe their configuration and resources with schemas and
//! implement the [`Provider`] and [`Resource`] traits. The in-process
//! [`Host`] drives them: it validates configuration, plans changes and
//! tracks the state each resource reports back.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod logging;
pub mod plan_modifier;

// Lifecycle driver
pub mod host;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use host::{Host, HostConfig, Outcome, Plan, PlanAction, ResourceAddress};
pub use logging::LogLevel;
pub use plan_modifier::{PlanModifier, RequiresReplace};
pub use provider::{Provider, ProviderData, ResourceFactory};
pub use resource::Resource;
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue};
