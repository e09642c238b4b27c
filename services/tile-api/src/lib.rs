//! Tile API service library.
//!
//! HTTP server that renders 512x512 PNG map tiles and tile metadata from
//! chunked grids in the backing store.

pub mod caches;
pub mod handlers;
pub mod pipeline;
pub mod state;

pub use handlers::router;
pub use state::AppState;
