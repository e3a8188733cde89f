//! Server API implementation

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::client::Client;
use super::error::ApiError;

/// A server as the API reports it. Keys missing from a response are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRecord {
    pub id: String,
    pub instance_name: String,
    pub user: String,
    pub ipv4: String,
    pub ssh_key: String,
}

/// Request body for POST /servers
#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub user: String,
    pub ssh_key: String,
    pub instance_name: String,
}

/// Result of GET /servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerListing {
    Found(Vec<ServerRecord>),
    /// The API answered 404: there are no servers
    NotFound,
}

impl ServerListing {
    /// First server in response order with a matching id
    pub fn find(&self, id: &str) -> Option<&ServerRecord> {
        match self {
            ServerListing::Found(servers) => servers.iter().find(|server| server.id == id),
            ServerListing::NotFound => None,
        }
    }
}

pub struct ServersApi<'a> {
    client: &'a Client,
}

impl<'a> ServersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateServerRequest) -> Result<ServerRecord, ApiError> {
        let response = self
            .client
            .send(self.client.request(Method::POST, "servers").json(request))
            .await?;

        if response.status() != StatusCode::OK {
            return self.client.unexpected_status(response).await;
        }

        self.client.parse(response).await
    }

    pub async fn list(&self) -> Result<ServerListing, ApiError> {
        let response = self
            .client
            .send(self.client.request(Method::GET, "servers"))
            .await?;

        match response.status() {
            StatusCode::OK => Ok(ServerListing::Found(self.client.parse(response).await?)),
            StatusCode::NOT_FOUND => Ok(ServerListing::NotFound),
            _ => self.client.unexpected_status(response).await,
        }
    }

    /// Already-deleted servers (404) count as deleted
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("servers/{}", urlencoding::encode(id));
        let response = self
            .client
            .send(self.client.request(Method::DELETE, &path))
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            _ => self.client.unexpected_status(response).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ConnectionConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(url: &str) -> Client {
        Client::new(ConnectionConfig::new(url, "token").unwrap()).unwrap()
    }

    fn web1_request() -> CreateServerRequest {
        CreateServerRequest {
            user: "deploy".to_string(),
            ssh_key: "ssh-rsa AAA".to_string(),
            instance_name: "web1".to_string(),
        }
    }

    #[tokio::test]
    async fn create_posts_body_and_decodes_record() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/servers")
            .match_header("x-auth-token", "token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "user": "deploy",
                "ssh_key": "ssh-rsa AAA",
                "instance_name": "web1"
            })))
            .with_body(
                r#"{"id":"42","instance_name":"web1","user":"deploy","ipv4":"10.0.0.5","ssh_key":"ssh-rsa AAA"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let record = client.servers().create(&web1_request()).await.unwrap();

        assert_eq!(
            record,
            ServerRecord {
                id: "42".to_string(),
                instance_name: "web1".to_string(),
                user: "deploy".to_string(),
                ipv4: "10.0.0.5".to_string(),
                ssh_key: "ssh-rsa AAA".to_string(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_only_accepts_200() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/servers")
            .with_status(201)
            .with_body(r#"{"id":"42"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let result = client.servers().create(&web1_request()).await;

        match result {
            Err(ApiError::UnexpectedStatus { status, .. }) => assert_eq!(status, 201),
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_with_missing_keys_defaults_them_to_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/servers")
            .with_body(r#"{"id":"42","instance_name":"web1"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let record = client.servers().create(&web1_request()).await.unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.ipv4, "");
        assert_eq!(record.user, "");
    }

    #[tokio::test]
    async fn create_with_malformed_body_is_a_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/servers")
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let result = client.servers().create(&web1_request()).await;

        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }

    #[tokio::test]
    async fn list_returns_servers_in_response_order() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/servers")
            .match_header("x-auth-token", "token")
            .with_body(
                r#"[{"id":"7","instance_name":"first"},{"id":"7","instance_name":"second"},{"id":"8"}]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let listing = client.servers().list().await.unwrap();

        assert_eq!(listing.find("7").unwrap().instance_name, "first");
        assert_eq!(listing.find("8").unwrap().instance_name, "");
        assert!(listing.find("9").is_none());
    }

    #[tokio::test]
    async fn list_404_means_no_servers() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/servers")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let listing = client.servers().list().await.unwrap();

        assert_eq!(listing, ServerListing::NotFound);
        assert!(listing.find("42").is_none());
    }

    #[tokio::test]
    async fn list_server_error_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/servers")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let result = client.servers().list().await;

        match result {
            Err(ApiError::UnexpectedStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_with_object_instead_of_array_is_a_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/servers")
            .with_body(r#"{"id":"42"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        assert!(matches!(
            client.servers().list().await,
            Err(ApiError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn delete_treats_200_204_and_404_as_success() {
        for status in [200, 204, 404] {
            let mut server = Server::new_async().await;
            let mock = server
                .mock("DELETE", "/servers/42")
                .match_header("x-auth-token", "token")
                .with_status(status)
                .create_async()
                .await;

            let client = client_for(&server.url());
            assert!(
                client.servers().delete("42").await.is_ok(),
                "status {} should count as deleted",
                status
            );
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/servers/42")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let result = client.servers().delete("42").await;

        assert!(matches!(
            result,
            Err(ApiError::UnexpectedStatus { status, .. })
                if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_a_request_error() {
        let client = client_for("http://127.0.0.1:1");

        assert!(matches!(
            client.servers().list().await,
            Err(ApiError::RequestError(_))
        ));
    }
}
