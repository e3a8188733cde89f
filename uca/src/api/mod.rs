pub mod client;
pub mod config;
pub mod error;
pub mod servers;

pub use client::Client;
pub use config::{normalize_endpoint, ConnectionConfig};
pub use error::ApiError;
pub use servers::{CreateServerRequest, ServerListing, ServerRecord, ServersApi};
