//! Error types for the grid-tiles services.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tile operations.
///
/// Cloneable so that a single failed computation can be reported to every
/// request coalesced onto it.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    // === Request errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Tile outside dataset coverage: {0}")]
    TileOutOfCoverage(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    // === Storage errors ===
    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    // === Rendering errors ===
    #[error("Image encoding failed: {0}")]
    EncodeError(String),

    // === Infrastructure errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl TileError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidParameter { .. } | TileError::Ingestion(_) => 400,

            TileError::VariableNotFound(_) | TileError::TileOutOfCoverage(_) => 404,

            TileError::StoreUnavailable(_) => 503,

            TileError::DataReadError(_)
            | TileError::EncodeError(_)
            | TileError::InternalError(_) => 500,
        }
    }

    /// Whether a client may reasonably retry the request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TileError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TileError::VariableNotFound("t2m".into()).http_status_code(),
            404
        );
        assert_eq!(
            TileError::StoreUnavailable("conn refused".into()).http_status_code(),
            503
        );
        assert_eq!(TileError::Ingestion("bad file".into()).http_status_code(), 400);
        assert_eq!(TileError::EncodeError("oops".into()).http_status_code(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(TileError::StoreUnavailable("x".into()).is_retryable());
        assert!(!TileError::VariableNotFound("x".into()).is_retryable());
    }
}
