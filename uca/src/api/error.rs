use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Could not read response body: {0}")]
    BodyReadError(reqwest::Error),

    #[error("Received non-OK HTTP status: {status}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("user_token must not be empty")]
    MissingToken,
}

impl ApiError {
    /// Diagnostic summary shown to the user for this class of failure
    pub fn summary(&self) -> &'static str {
        match self {
            ApiError::RequestError(_) => "Client Error",
            ApiError::BodyReadError(_) => "Failed to Read Response Body",
            ApiError::UnexpectedStatus { .. } => "HTTP Error",
            ApiError::ParseError(_) => "Invalid Response Body",
            ApiError::InvalidEndpoint { .. } | ApiError::MissingToken => {
                "Invalid provider configuration"
            }
        }
    }
}
