//! Provider for servers managed through the UCA control-plane API
//!
//! The provider serves one resource type, `uca_server`. Connection settings
//! come from provider configuration, falling back to the `UCA_USER_TOKEN`
//! and `UCA_ENDPOINT` environment variables.

pub mod api;
pub mod provider_data;
pub mod resources;

pub use provider_data::UcaProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderData,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::Resource;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::TfplugError;

pub const ENDPOINT_ENV: &str = "UCA_ENDPOINT";
pub const USER_TOKEN_ENV: &str = "UCA_USER_TOKEN";

#[derive(Default)]
pub struct UcaProvider {
    provider_data: Option<UcaProviderData>,
}

impl UcaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings fixed by the first successful configure, if any
    pub fn provider_data(&self) -> Option<&UcaProviderData> {
        self.provider_data.as_ref()
    }
}

/// Non-empty string from configuration, else from the environment
fn setting(config: &DynamicValue, attribute: &str, env_var: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(attribute))
        .ok()
        .filter(|value| !value.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|value| !value.is_empty()))
}

#[async_trait]
impl Provider for UcaProvider {
    fn type_name(&self) -> &str {
        "uca"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Manage servers through the UCA API")
            .attribute(
                AttributeBuilder::new("user_token", AttributeType::String)
                    .description("Your auth token")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("API Endpoint")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        // Values may still come from the environment, so presence is checked in configure.
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        if let Some(existing) = &self.provider_data {
            tracing::debug!("provider already configured, keeping existing settings");
            return ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(existing.clone())),
            };
        }

        let endpoint = setting(&request.config, "endpoint", ENDPOINT_ENV);
        let user_token = setting(&request.config, "user_token", USER_TOKEN_ENV);

        let mut diagnostics = vec![];

        match (endpoint, user_token) {
            (Some(endpoint), Some(user_token)) => {
                match api::ConnectionConfig::new(&endpoint, &user_token).and_then(api::Client::new)
                {
                    Ok(client) => {
                        tracing::debug!("configured UCA endpoint {}", client.config().endpoint());
                        self.provider_data = Some(UcaProviderData::new(client));
                    }
                    Err(e) => {
                        diagnostics.push(Diagnostic::error(
                            "Failed to create API client",
                            e.to_string(),
                        ));
                    }
                }
            }
            (None, _) => {
                diagnostics.push(
                    Diagnostic::error(
                        "endpoint is required (set in provider config or UCA_ENDPOINT env var)",
                        "",
                    )
                    .with_attribute(AttributePath::new("endpoint")),
                );
            }
            (_, None) => {
                diagnostics.push(
                    Diagnostic::error(
                        "user_token is required (set in provider config or UCA_USER_TOKEN env var)",
                        "",
                    )
                    .with_attribute(AttributePath::new("user_token")),
                );
            }
        }

        ConfigureProviderResponse {
            diagnostics,
            provider_data: self
                .provider_data
                .clone()
                .map(|data| Arc::new(data) as ProviderData),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "uca_server".to_string(),
            Box::new(|data: ProviderData| -> tfplug::Result<Box<dyn Resource>> {
                let data = data.downcast::<UcaProviderData>().map_err(|_| {
                    TfplugError::InvalidConfiguration(
                        "provider data is not UCA provider data".to_string(),
                    )
                })?;
                Ok(Box::new(resources::ServerResource::new(
                    UcaProviderData::clone(&data),
                )))
            }),
        );
        resources
    }
}
