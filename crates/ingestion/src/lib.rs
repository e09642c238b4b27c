//! Dataset ingestion: one-shot transform of an uploaded NetCDF file into
//! the chunked store's canonical layout.
//!
//! The pipeline parses the upload, renames latitude/longitude dimensions to
//! the canonical names, enforces descending latitude order, and replaces
//! any prior contents at the target prefix.

pub mod error;
pub mod ingester;
pub mod upload;

pub use error::{IngestionError, Result};
pub use ingester::{Ingester, IngestionResult};
pub use upload::{parse_netcdf, GridFile, GridVariable};
