//! Provider data handed to every resource the provider builds

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct UcaProviderData {
    pub client: Arc<Client>,
}

impl UcaProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
