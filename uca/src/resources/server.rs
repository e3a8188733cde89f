//! Server resource implementation
//!
//! A server is created with one POST, refreshed by scanning the server
//! listing for its id and removed with one DELETE. It is never modified in
//! place: every user-supplied attribute forces replacement, and a direct
//! update call always fails.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::{ApiError, CreateServerRequest, ServerListing, ServerRecord};
use crate::UcaProviderData;

const UPDATE_UNSUPPORTED: &str = "Cannot update resource. Please run destroy then apply again.";

pub struct ServerResource {
    provider_data: UcaProviderData,
}

impl ServerResource {
    pub fn new(provider_data: UcaProviderData) -> Self {
        Self { provider_data }
    }
}

#[async_trait]
impl Resource for ServerResource {
    fn type_name(&self) -> &str {
        "uca_server"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: format!("{}_server", request.provider_type_name),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manage server")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Server ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name for the server")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ssh_key", AttributeType::String)
                    .description("The public key for the server")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("The server's configured username")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv4", AttributeType::String)
                    .description("The server's IPv4")
                    .computed()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        for name in ["name", "ssh_key", "username"] {
            let path = AttributePath::new(name);
            if let Ok(value) = request.config.get_string(&path) {
                if value.is_empty() {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid attribute value",
                            format!("\"{}\" must not be empty", name),
                        )
                        .with_attribute(path),
                    );
                }
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let create_request = match extract_create_request(&request.planned_state) {
            Ok(create_request) => create_request,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                };
            }
        };

        match self
            .provider_data
            .client
            .servers()
            .create(&create_request)
            .await
        {
            Ok(record) => {
                tracing::debug!("created server {}", record.id);
                CreateResourceResponse {
                    new_state: state_from_record(&record),
                    diagnostics: vec![],
                }
            }
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![api_diagnostic(&e, "Error sending request")],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.provider_data.client.servers().list().await {
            Ok(ServerListing::NotFound) => {
                tracing::debug!("server listing is empty, removing server");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                }
            }
            Ok(listing) => {
                let id = match extract_id(&request.current_state) {
                    Ok(id) => id,
                    Err(diagnostic) => {
                        return ReadResourceResponse {
                            new_state: Some(request.current_state),
                            diagnostics: vec![diagnostic],
                        }
                    }
                };
                match listing.find(&id) {
                    Some(record) => ReadResourceResponse {
                        new_state: Some(state_from_record(record)),
                        diagnostics: vec![],
                    },
                    None => {
                        tracing::warn!("server {} not in listing, keeping prior state", id);
                        ReadResourceResponse {
                            new_state: Some(request.current_state),
                            diagnostics: vec![],
                        }
                    }
                }
            }
            Err(ApiError::UnexpectedStatus { status, .. }) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    "HTTP Error",
                    format!("Received bad HTTP status: {}", status),
                )],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_diagnostic(&e, "Unable to read server, got error")],
            },
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.prior_state,
            diagnostics: vec![Diagnostic::error(UPDATE_UNSUPPORTED, UPDATE_UNSUPPORTED)],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let id = match extract_id(&request.prior_state) {
            Ok(id) => id,
            Err(diagnostic) => {
                return DeleteResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diagnostic],
                }
            }
        };

        match self.provider_data.client.servers().delete(&id).await {
            Ok(()) => {
                let mut new_state = request.prior_state;
                let _ = new_state.set_string(&AttributePath::new("id"), "");
                let _ = new_state.set_string(&AttributePath::new("name"), "");
                DeleteResourceResponse {
                    new_state,
                    diagnostics: vec![],
                }
            }
            Err(e) => DeleteResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic(&e, "Unable to delete server, got error")],
            },
        }
    }
}

/// Server id recorded in state; an empty id never names a server
fn extract_id(state: &DynamicValue) -> Result<String, Diagnostic> {
    state
        .get_string(&AttributePath::new("id"))
        .ok()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Diagnostic::error("Missing id", "The server id is not recorded in state")
                .with_attribute(AttributePath::new("id"))
        })
}

/// Build the POST body from planned name, ssh_key and username
fn extract_create_request(planned: &DynamicValue) -> Result<CreateServerRequest, Diagnostic> {
    let get = |name: &str| {
        planned.get_string(&AttributePath::new(name)).map_err(|_| {
            Diagnostic::error(
                format!("Missing {}", name),
                format!("The '{}' attribute is required", name),
            )
            .with_attribute(AttributePath::new(name))
        })
    };

    Ok(CreateServerRequest {
        instance_name: get("name")?,
        ssh_key: get("ssh_key")?,
        user: get("username")?,
    })
}

fn state_from_record(record: &ServerRecord) -> DynamicValue {
    DynamicValue::object([
        ("id", Dynamic::from(record.id.as_str())),
        ("name", Dynamic::from(record.instance_name.as_str())),
        ("ssh_key", Dynamic::from(record.ssh_key.as_str())),
        ("username", Dynamic::from(record.user.as_str())),
        ("ipv4", Dynamic::from(record.ipv4.as_str())),
    ])
}

/// Transport failures get `context` as a prefix; status and decode errors speak for themselves
fn api_diagnostic(err: &ApiError, context: &str) -> Diagnostic {
    let detail = match err {
        ApiError::RequestError(e) => format!("{}: {}", context, e),
        ApiError::ParseError(e) => format!("Could not decode response body: {}", e),
        other => other.to_string(),
    };
    Diagnostic::error(err.summary(), detail)
}

#[cfg(test)]
#[path = "./server_test.rs"]
mod server_test;
