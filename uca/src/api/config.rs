//! Connection settings shared by every request

use super::error::ApiError;
use url::Url;

/// Validated token and endpoint. The endpoint always ends with a single `/`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    endpoint: String,
    token: String,
}

impl ConnectionConfig {
    pub fn new(endpoint: &str, token: &str) -> Result<Self, ApiError> {
        if token.is_empty() {
            return Err(ApiError::MissingToken);
        }

        let endpoint = normalize_endpoint(endpoint);
        let parsed = Url::parse(&endpoint).map_err(|e| ApiError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint {
                endpoint,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            endpoint,
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Strip every trailing `/` and append exactly one
pub fn normalize_endpoint(endpoint: &str) -> String {
    format!("{}/", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_appends_single_separator() {
        assert_eq!(
            normalize_endpoint("https://api.example.com"),
            "https://api.example.com/"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com/v1"),
            "https://api.example.com/v1/"
        );
    }

    #[test]
    fn normalize_collapses_repeated_separators() {
        assert_eq!(
            normalize_endpoint("https://api.example.com///"),
            "https://api.example.com/"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for endpoint in [
            "http://localhost:8080",
            "http://localhost:8080/",
            "https://api.example.com/v1//",
        ] {
            let once = normalize_endpoint(endpoint);
            assert_eq!(normalize_endpoint(&once), once);
            assert!(once.ends_with('/'));
            assert!(!once.ends_with("//"));
        }
    }

    #[test]
    fn config_normalizes_endpoint() {
        let config = ConnectionConfig::new("https://api.example.com/v1", "secret").unwrap();
        assert_eq!(config.endpoint(), "https://api.example.com/v1/");
        assert_eq!(config.token(), "secret");
    }

    #[test]
    fn config_rejects_bad_endpoints() {
        assert!(matches!(
            ConnectionConfig::new("not a url", "secret"),
            Err(ApiError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            ConnectionConfig::new("ftp://files.example.com", "secret"),
            Err(ApiError::InvalidEndpoint { reason, .. }) if reason.contains("ftp")
        ));
    }

    #[test]
    fn config_rejects_empty_token() {
        assert!(matches!(
            ConnectionConfig::new("https://api.example.com", ""),
            Err(ApiError::MissingToken)
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ConnectionConfig::new("https://api.example.com", "hunter2").unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
