//! In-process host that drives a provider through its lifecycle
//!
//! The host owns the provider, its configuration and the tracked state of
//! every managed resource. It plans changes from configuration, picks
//! create / update / replace, and only persists state returned by an
//! operation that produced no error diagnostics.
//!
//! State is kept msgpack-encoded per [`ResourceAddress`]. Operations on
//! different addresses may run concurrently; the host never runs two
//! operations on the same address at once on its own, and callers are
//! expected to keep to that.

use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::logging::{self, LogLevel};
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderData, ProviderSchemaRequest, ResourceFactory,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    CreateResourceRequest, DeleteResourceRequest, ReadResourceRequest, Resource,
    ResourceSchemaRequest, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::plan_modifier::PlanModifierRequest;
use crate::schema::Schema;
use crate::types::{has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::Instrument;

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub enable_logging: bool,
    pub log_level: LogLevel,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }
}

/// Where a resource lives in the host's state, e.g. `uca_server.web`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceAddress {
    pub type_name: String,
    pub name: String,
}

impl ResourceAddress {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    NoOp,
    Update,
    /// Delete, then create
    Replace,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub action: PlanAction,
    pub prior_state: Option<DynamicValue>,
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Plan {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Result of an apply, refresh or destroy
#[derive(Debug, Clone)]
pub struct Outcome {
    pub diagnostics: Vec<Diagnostic>,
    /// What the host tracks for the address afterwards
    pub state: Option<DynamicValue>,
}

impl Outcome {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

struct StoredState {
    schema_version: i64,
    encoded: Vec<u8>,
}

pub struct Host<P: Provider> {
    provider: P,
    factories: HashMap<String, ResourceFactory>,
    provider_data: Option<ProviderData>,
    states: RwLock<HashMap<ResourceAddress, StoredState>>,
}

impl<P: Provider> Host<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, HostConfig::default())
    }

    pub fn with_config(provider: P, config: HostConfig) -> Self {
        if config.enable_logging {
            logging::init(config.log_level);
        }

        let factories = provider.resources();
        Self {
            provider,
            factories,
            provider_data: None,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_configured(&self) -> bool {
        self.provider_data.is_some()
    }

    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Validate provider configuration and hand it to the provider
    pub async fn configure(&mut self, config: DynamicValue) -> Result<Vec<Diagnostic>> {
        let ctx = Context::for_operation("configure");
        let span = ctx.span();
        self.configure_inner(config, &ctx).instrument(span).await
    }

    /// Tracked state for an address, if any
    pub async fn state(&self, address: &ResourceAddress) -> Result<Option<DynamicValue>> {
        let states = self.states.read().await;
        states
            .get(address)
            .map(|stored| DynamicValue::decode_msgpack(&stored.encoded))
            .transpose()
    }

    pub async fn addresses(&self) -> Vec<ResourceAddress> {
        let mut addresses: Vec<ResourceAddress> =
            self.states.read().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Compute the change needed to reach `config`
    pub async fn plan(&self, address: &ResourceAddress, config: DynamicValue) -> Result<Plan> {
        let ctx = Context::for_operation("plan");
        let span = operation_span(&ctx, address);
        self.plan_inner(address, &config, &ctx).instrument(span).await
    }

    /// Plan and carry out the change needed to reach `config`
    pub async fn apply(&self, address: &ResourceAddress, config: DynamicValue) -> Result<Outcome> {
        let ctx = Context::for_operation("apply");
        let span = operation_span(&ctx, address);
        self.apply_inner(address, config, &ctx).instrument(span).await
    }

    /// Re-read the remote object and update or drop tracked state
    pub async fn refresh(&self, address: &ResourceAddress) -> Result<Outcome> {
        let ctx = Context::for_operation("refresh");
        let span = operation_span(&ctx, address);
        self.refresh_inner(address, &ctx).instrument(span).await
    }

    /// Delete the remote object and stop tracking it
    pub async fn destroy(&self, address: &ResourceAddress) -> Result<Outcome> {
        let ctx = Context::for_operation("destroy");
        let span = operation_span(&ctx, address);
        self.destroy_inner(address, &ctx).instrument(span).await
    }

    async fn configure_inner(
        &mut self,
        config: DynamicValue,
        ctx: &Context,
    ) -> Result<Vec<Diagnostic>> {
        let schema_response = self
            .provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        schema_response.schema.validate()?;

        let mut diagnostics = schema_response.diagnostics;
        diagnostics.extend(schema_response.schema.validate_config(&config));
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let validate_response = self
            .provider
            .validate(
                ctx.clone(),
                ValidateProviderConfigRequest {
                    config: config.clone(),
                },
            )
            .await;
        diagnostics.extend(validate_response.diagnostics);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let response = self
            .provider
            .configure(ctx.clone(), ConfigureProviderRequest { config })
            .await;
        diagnostics.extend(response.diagnostics);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let data = response
            .provider_data
            .ok_or(TfplugError::ProviderNotConfigured)?;
        self.provider_data = Some(data);

        tracing::debug!(
            "provider {} configured in {}ms",
            self.provider.type_name(),
            ctx.elapsed_ms()
        );
        Ok(diagnostics)
    }

    async fn plan_inner(
        &self,
        address: &ResourceAddress,
        config: &DynamicValue,
        ctx: &Context,
    ) -> Result<Plan> {
        let resource = self.instantiate(&address.type_name)?;
        let schema = self.resource_schema(resource.as_ref(), ctx).await?;
        let prior = self.state(address).await?;
        Ok(self
            .plan_change(resource.as_ref(), &schema, prior, config, ctx)
            .await)
    }

    async fn apply_inner(
        &self,
        address: &ResourceAddress,
        config: DynamicValue,
        ctx: &Context,
    ) -> Result<Outcome> {
        let resource = self.instantiate(&address.type_name)?;
        let schema = self.resource_schema(resource.as_ref(), ctx).await?;
        let prior = self.state(address).await?;
        let plan = self
            .plan_change(resource.as_ref(), &schema, prior.clone(), &config, ctx)
            .await;

        if plan.has_errors() {
            return Ok(Outcome {
                diagnostics: plan.diagnostics,
                state: prior,
            });
        }

        tracing::info!("applying {:?}", plan.action);
        let outcome = match (plan.action, prior) {
            (PlanAction::NoOp, prior) => Outcome {
                diagnostics: plan.diagnostics,
                state: prior,
            },
            (PlanAction::Create, _) | (_, None) => {
                self.create(resource.as_ref(), &schema, address, plan, config, ctx)
                    .await?
            }
            (PlanAction::Update, Some(prior)) => {
                let response = resource
                    .update(
                        ctx.clone(),
                        UpdateResourceRequest {
                            type_name: address.type_name.clone(),
                            prior_state: prior.clone(),
                            planned_state: plan.planned_state,
                            config,
                        },
                    )
                    .await;
                let mut diagnostics = plan.diagnostics;
                diagnostics.extend(response.diagnostics);
                self.finish_write(&schema, address, diagnostics, response.new_state, Some(prior))
                    .await?
            }
            (PlanAction::Replace, Some(prior)) => {
                let response = resource
                    .delete(
                        ctx.clone(),
                        DeleteResourceRequest {
                            type_name: address.type_name.clone(),
                            prior_state: prior.clone(),
                        },
                    )
                    .await;
                if has_errors(&response.diagnostics) {
                    let mut diagnostics = plan.diagnostics;
                    diagnostics.extend(response.diagnostics);
                    return Ok(Outcome {
                        diagnostics,
                        state: Some(prior),
                    });
                }
                self.remove(address).await;

                let mut diagnostics = response.diagnostics;
                let mut outcome = self
                    .create(resource.as_ref(), &schema, address, plan, config, ctx)
                    .await?;
                diagnostics.append(&mut outcome.diagnostics);
                outcome.diagnostics = diagnostics;
                outcome
            }
        };

        tracing::debug!("apply finished in {}ms", ctx.elapsed_ms());
        Ok(outcome)
    }

    async fn refresh_inner(&self, address: &ResourceAddress, ctx: &Context) -> Result<Outcome> {
        let resource = self.instantiate(&address.type_name)?;
        let schema = self.resource_schema(resource.as_ref(), ctx).await?;
        let prior = self.tracked(address).await?;

        let response = resource
            .read(
                ctx.clone(),
                ReadResourceRequest {
                    type_name: address.type_name.clone(),
                    current_state: prior.clone(),
                },
            )
            .await;

        if has_errors(&response.diagnostics) {
            return Ok(Outcome {
                diagnostics: response.diagnostics,
                state: Some(prior),
            });
        }

        match response.new_state {
            Some(state) => {
                self.finish_write(&schema, address, response.diagnostics, state, Some(prior))
                    .await
            }
            None => {
                tracing::info!("remote object is gone, dropping state");
                self.remove(address).await;
                Ok(Outcome {
                    diagnostics: response.diagnostics,
                    state: None,
                })
            }
        }
    }

    async fn destroy_inner(&self, address: &ResourceAddress, ctx: &Context) -> Result<Outcome> {
        let resource = self.instantiate(&address.type_name)?;
        let prior = self.tracked(address).await?;

        let response = resource
            .delete(
                ctx.clone(),
                DeleteResourceRequest {
                    type_name: address.type_name.clone(),
                    prior_state: prior.clone(),
                },
            )
            .await;

        if has_errors(&response.diagnostics) {
            return Ok(Outcome {
                diagnostics: response.diagnostics,
                state: Some(prior),
            });
        }

        self.remove(address).await;
        Ok(Outcome {
            diagnostics: response.diagnostics,
            state: None,
        })
    }

    fn instantiate(&self, type_name: &str) -> Result<Box<dyn Resource>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))?;
        let data = self
            .provider_data
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;
        factory(data)
    }

    async fn resource_schema(&self, resource: &dyn Resource, ctx: &Context) -> Result<Schema> {
        let response = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        if let Some(diag) = response.diagnostics.iter().find(|d| d.is_error()) {
            return Err(TfplugError::InvalidSchema(diag.to_string()));
        }
        response.schema.validate()?;
        Ok(response.schema)
    }

    async fn plan_change(
        &self,
        resource: &dyn Resource,
        schema: &Schema,
        prior: Option<DynamicValue>,
        config: &DynamicValue,
        ctx: &Context,
    ) -> Plan {
        let mut diagnostics = schema.validate_config(config);
        if !has_errors(&diagnostics) {
            let response = resource
                .validate(
                    ctx.clone(),
                    ValidateResourceConfigRequest {
                        type_name: resource.type_name().to_string(),
                        config: config.clone(),
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
        }

        let mut planned = DynamicValue::new(Dynamic::Map(HashMap::new()));
        for attr in &schema.block.attributes {
            let path = AttributePath::new(&attr.name);
            let mut value = config.get(&path).cloned().unwrap_or(Dynamic::Null);
            if attr.computed && matches!(value, Dynamic::Null) {
                value = match &prior {
                    Some(prior) => prior.get(&path).cloned().unwrap_or(Dynamic::Null),
                    None => Dynamic::Unknown,
                };
            }
            // Paths built from schema attribute names always land in the root object.
            let _ = planned.set_value(&path, value);
        }

        let Some(prior_state) = prior.as_ref() else {
            return Plan {
                action: PlanAction::Create,
                prior_state: None,
                planned_state: planned,
                requires_replace: vec![],
                diagnostics,
            };
        };

        let mut requires_replace = vec![];
        for attr in &schema.block.attributes {
            let path = AttributePath::new(&attr.name);
            for modifier in &attr.plan_modifiers {
                let response = modifier.modify_plan(PlanModifierRequest {
                    path: path.clone(),
                    config_value: config.get(&path).cloned().unwrap_or(Dynamic::Null),
                    state_value: prior_state.get(&path).cloned().unwrap_or(Dynamic::Null),
                    plan_value: planned.get(&path).cloned().unwrap_or(Dynamic::Null),
                });
                let _ = planned.set_value(&path, response.plan_value);
                diagnostics.extend(response.diagnostics);
                if response.requires_replace && !requires_replace.contains(&path) {
                    requires_replace.push(path.clone());
                }
            }
        }

        let action = if &planned == prior_state {
            PlanAction::NoOp
        } else if !requires_replace.is_empty() {
            for attr in schema.block.attributes.iter().filter(|a| a.is_computed_only()) {
                let _ = planned.set_value(&AttributePath::new(&attr.name), Dynamic::Unknown);
            }
            PlanAction::Replace
        } else {
            PlanAction::Update
        };

        Plan {
            action,
            prior_state: prior,
            planned_state: planned,
            requires_replace,
            diagnostics,
        }
    }

    async fn create(
        &self,
        resource: &dyn Resource,
        schema: &Schema,
        address: &ResourceAddress,
        plan: Plan,
        config: DynamicValue,
        ctx: &Context,
    ) -> Result<Outcome> {
        let response = resource
            .create(
                ctx.clone(),
                CreateResourceRequest {
                    type_name: address.type_name.clone(),
                    planned_state: plan.planned_state,
                    config,
                },
            )
            .await;

        let mut diagnostics = plan.diagnostics;
        diagnostics.extend(response.diagnostics);
        self.finish_write(schema, address, diagnostics, response.new_state, None)
            .await
    }

    /// Persist `new_state` unless the operation failed; otherwise keep `fallback`
    async fn finish_write(
        &self,
        schema: &Schema,
        address: &ResourceAddress,
        mut diagnostics: Vec<Diagnostic>,
        new_state: DynamicValue,
        fallback: Option<DynamicValue>,
    ) -> Result<Outcome> {
        if !has_errors(&diagnostics) && new_state.value.contains_unknown() {
            diagnostics.push(Diagnostic::error(
                "Provider returned invalid result object after apply",
                "The new state still contains unknown values",
            ));
        }

        if has_errors(&diagnostics) {
            return Ok(Outcome {
                diagnostics,
                state: fallback,
            });
        }

        self.store(address, schema.version, &new_state).await?;
        Ok(Outcome {
            diagnostics,
            state: Some(new_state),
        })
    }

    async fn tracked(&self, address: &ResourceAddress) -> Result<DynamicValue> {
        self.state(address)
            .await?
            .ok_or_else(|| TfplugError::InvalidState(format!("no state tracked for {}", address)))
    }

    async fn store(
        &self,
        address: &ResourceAddress,
        schema_version: i64,
        state: &DynamicValue,
    ) -> Result<()> {
        let encoded = state.encode_msgpack()?;
        let mut states = self.states.write().await;
        if let Some(previous) = states.get(address) {
            if previous.schema_version != schema_version {
                tracing::debug!(
                    "schema version for {} moved from {} to {}",
                    address,
                    previous.schema_version,
                    schema_version
                );
            }
        }
        states.insert(
            address.clone(),
            StoredState {
                schema_version,
                encoded,
            },
        );
        Ok(())
    }

    async fn remove(&self, address: &ResourceAddress) {
        self.states.write().await.remove(address);
    }
}

fn operation_span(ctx: &Context, address: &ResourceAddress) -> tracing::Span {
    tracing::info_span!(
        "resource",
        request_id = %ctx.request_id(),
        operation = %ctx.operation(),
        address = %address
    )
}

#[cfg(test)]
#[path = "./host_test.rs"]
mod host_test;
