//! Contract-level error types

use thiserror::Error;

/// Errors raised when a payload violates the store contract
#[derive(Debug, Error)]
pub enum ApiContractError {
    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("invalid pairing code {code:?}: {reason}")]
    InvalidCode { code: String, reason: &'static str },
}

/// Result type alias for contract checks
pub type ApiContractResult<T> = Result<T, ApiContractError>;
