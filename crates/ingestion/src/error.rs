//! Error types for the ingestion crate.

use thiserror::Error;
use tiles_common::TileError;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read upload: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse NetCDF data: {0}")]
    NetcdfParse(String),

    #[error("Missing required dimension: {0}")]
    MissingDimension(String),

    #[error("Missing coordinate variable: {0}")]
    MissingCoordinate(String),

    #[error("Grid too small: {0}")]
    GridTooSmall(String),

    #[error("No gridded variables over (latitude, longitude) found")]
    NoVariables,

    #[error("Failed to write to store: {0}")]
    StoreWrite(TileError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

impl From<IngestionError> for TileError {
    fn from(err: IngestionError) -> Self {
        match err {
            // Store failures keep their own taxonomy (retryable 5xx)
            IngestionError::StoreWrite(inner) => inner,
            // Everything else is a malformed upload
            other => TileError::Ingestion(other.to_string()),
        }
    }
}
