use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::config::ConnectionConfig;
use super::error::ApiError;
use super::servers::ServersApi;

const AUTH_HEADER: &str = "X-Auth-Token";

/// UCA API client. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ConnectionConfig,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder().build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Server API operations
    pub fn servers(&self) -> ServersApi<'_> {
        ServersApi::new(self)
    }

    /// Start a request to `path`, relative to the endpoint, with auth headers attached
    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.config.endpoint(), path);

        tracing::debug!("{} request to: {}", method, url);

        self.inner
            .http_client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTH_HEADER, self.inner.config.token())
    }

    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        tracing::debug!("Response status: {}", response.status());
        Ok(response)
    }

    /// Decode a JSON body. Missing keys are left to the target type's defaults.
    pub(crate) async fn parse<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            ApiError::BodyReadError(e)
        })?;

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(e.to_string())
        })
    }

    pub(crate) async fn unexpected_status<T>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::error!("API error response ({}): {}", status, body);

        Err(ApiError::UnexpectedStatus { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client_for(url: &str) -> Client {
        Client::new(ConnectionConfig::new(url, "secret-token").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn requests_carry_auth_and_content_type_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/servers")
            .match_header("x-auth-token", "secret-token")
            .match_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let response = client
            .send(client.request(Method::GET, "servers"))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn endpoint_with_trailing_slashes_does_not_double_up() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/servers")
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&format!("{}//", server.url()));
        let _ = client.send(client.request(Method::GET, "servers")).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn network_errors_are_request_errors() {
        let client = client_for("http://127.0.0.1:1");

        let result = client.send(client.request(Method::GET, "servers")).await;
        assert!(matches!(result, Err(ApiError::RequestError(_))));
    }
}
