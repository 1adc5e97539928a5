//! Error types for the store REST client

use kiosk_api_contract::StoreProblem;
use kiosk_client_api::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the store
#[derive(Debug, Error)]
pub enum RestClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("API contract error: {0}")]
    ApiContract(#[from] kiosk_api_contract::ApiContractError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Server returned error status {status}: {details:?}")]
    ServerError {
        status: StatusCode,
        details: StoreProblem,
    },

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("Change feed error: {0}")]
    Sse(String),
}

/// Result type alias for REST client operations
pub type RestClientResult<T> = Result<T, RestClientError>;

impl From<RestClientError> for StoreError {
    fn from(error: RestClientError) -> Self {
        match error {
            RestClientError::ServerError { details, .. } if details.is_unique_violation() => {
                StoreError::UniqueViolation(details.details.unwrap_or(details.message))
            }
            RestClientError::ServerError { status, details } => StoreError::Server {
                status: status.as_u16(),
                message: details.message,
            },
            RestClientError::ApiContract(e) => StoreError::Contract(e.to_string()),
            RestClientError::Http(e) => StoreError::Transport(e.to_string()),
            RestClientError::Sse(message) => StoreError::Transport(message),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_mapping() {
        let error = RestClientError::ServerError {
            status: StatusCode::CONFLICT,
            details: StoreProblem {
                code: Some("23505".into()),
                message: "duplicate key value violates unique constraint".into(),
                details: Some("Key (code)=(K7QX) already exists.".into()),
                hint: None,
            },
        };

        assert!(matches!(StoreError::from(error), StoreError::UniqueViolation(_)));
    }

    #[test]
    fn test_other_server_errors_map_to_server() {
        let error = RestClientError::ServerError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            details: StoreProblem {
                code: None,
                message: "upstream unavailable".into(),
                details: None,
                hint: None,
            },
        };

        assert_eq!(
            StoreError::from(error),
            StoreError::Server {
                status: 503,
                message: "upstream unavailable".into()
            }
        );
    }
}
