//! Tile rendering for gridded geospatial data.
//!
//! The pipeline stages live here:
//! - Intensity normalization and resampling to the canonical tile raster
//! - Color gradient construction and application
//! - PNG encoding (grayscale and RGB)

pub mod colormaps;
pub mod gradient;
pub mod normalize;
pub mod png;

pub use colormaps::Colormaps;
pub use gradient::{apply_gradient, build_gradient, GradientCache, GradientLut, Rgb};
pub use normalize::{normalize, resample_bilinear};
