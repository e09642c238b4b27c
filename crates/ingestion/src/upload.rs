//! NetCDF upload parsing.
//!
//! The netcdf library wraps libnetcdf/HDF5, which need a file handle, so
//! uploads are staged through a temp file first. On Linux the memory-backed
//! `/dev/shm` is preferred to keep that staging off disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IngestionError, Result};

/// Accepted spellings for the latitude dimension, canonical name first.
const LATITUDE_NAMES: [&str; 2] = ["latitude", "lat"];
/// Accepted spellings for the longitude dimension, canonical name first.
const LONGITUDE_NAMES: [&str; 2] = ["longitude", "lon"];

/// One gridded variable from an upload: row-major samples over
/// (latitude, longitude).
#[derive(Debug, Clone)]
pub struct GridVariable {
    pub name: String,
    pub units: String,
    pub description: String,
    pub data: Vec<f32>,
}

/// A parsed upload: coordinate axes plus every conforming 2-D variable.
///
/// Dimension names are already canonical (`latitude`/`longitude`); latitude
/// ordering is whatever the source used until [`GridFile::canonicalize`]
/// runs.
#[derive(Debug, Clone)]
pub struct GridFile {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub variables: Vec<GridVariable>,
}

impl GridFile {
    /// Enforce descending latitude order.
    ///
    /// Sources that store latitude ascending get their latitude axis and
    /// every variable's rows reversed, so that row 0 is always the
    /// northmost row.
    pub fn canonicalize(mut self) -> Self {
        let rows = self.lat.len();
        let cols = self.lon.len();
        if rows >= 2 && self.lat[0] < self.lat[rows - 1] {
            debug!("source latitude is ascending; reversing rows");
            self.lat.reverse();
            for variable in &mut self.variables {
                // Malformed variables are dropped later by the writer.
                if variable.data.len() == rows * cols {
                    reverse_rows(&mut variable.data, rows, cols);
                }
            }
        }
        self
    }
}

fn reverse_rows(data: &mut [f32], rows: usize, cols: usize) {
    for r in 0..rows / 2 {
        let (top, rest) = data.split_at_mut((rows - 1 - r) * cols);
        top[r * cols..r * cols + cols].swap_with_slice(&mut rest[..cols]);
    }
}

/// Parse an uploaded NetCDF file from raw bytes.
///
/// Accepts `lat`/`latitude` and `lon`/`longitude` dimension names and
/// collects every 2-D variable shaped (latitude, longitude). Variables
/// with any other shape are skipped.
pub fn parse_netcdf(data: &[u8]) -> Result<GridFile> {
    let temp_dir = optimal_temp_dir();
    let temp = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(".nc")
        .tempfile_in(temp_dir)?;
    temp.as_file().write_all(data)?;

    let file = netcdf::open(temp.path())
        .map_err(|e| IngestionError::NetcdfParse(format!("failed to open NetCDF: {}", e)))?;

    let lat_dim = find_dimension(&file, &LATITUDE_NAMES)
        .ok_or_else(|| IngestionError::MissingDimension("latitude".to_string()))?;
    let lon_dim = find_dimension(&file, &LONGITUDE_NAMES)
        .ok_or_else(|| IngestionError::MissingDimension("longitude".to_string()))?;

    let lat = read_axis(&file, &lat_dim)?;
    let lon = read_axis(&file, &lon_dim)?;
    if lat.len() < 2 || lon.len() < 2 {
        return Err(IngestionError::GridTooSmall(format!(
            "{}x{} grid; need at least 2x2",
            lat.len(),
            lon.len()
        )));
    }

    let mut variables = Vec::new();
    for variable in file.variables() {
        let name = variable.name();
        if name == lat_dim || name == lon_dim {
            continue;
        }

        let dims: Vec<String> = variable.dimensions().iter().map(|d| d.name()).collect();
        if dims.len() != 2 || dims[0] != lat_dim || dims[1] != lon_dim {
            debug!(variable = %name, ?dims, "skipping non-(lat, lon) variable");
            continue;
        }

        let values: Vec<f32> = variable.get_values(..).map_err(|e| {
            IngestionError::NetcdfParse(format!("failed to read '{}': {}", name, e))
        })?;

        variables.push(GridVariable {
            units: string_attr(&variable, "units").unwrap_or_default(),
            description: string_attr(&variable, "long_name").unwrap_or_else(|| name.clone()),
            name,
            data: values,
        });
    }

    if variables.is_empty() {
        return Err(IngestionError::NoVariables);
    }

    Ok(GridFile {
        lat,
        lon,
        variables,
    })
}

fn find_dimension(file: &netcdf::File, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|name| file.dimension(name).is_some())
        .map(|name| name.to_string())
}

fn read_axis(file: &netcdf::File, dim: &str) -> Result<Vec<f64>> {
    let variable = file
        .variable(dim)
        .ok_or_else(|| IngestionError::MissingCoordinate(dim.to_string()))?;
    variable
        .get_values(..)
        .map_err(|e| IngestionError::NetcdfParse(format!("failed to read '{}': {}", dim, e)))
}

fn string_attr(variable: &netcdf::Variable, name: &str) -> Option<String> {
    let has_attr = variable.attributes().any(|attr| attr.name() == name);
    if !has_attr {
        return None;
    }
    match variable.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// On Linux, prefer /dev/shm (memory-backed tmpfs) for staging uploads;
/// fall back to the system temp directory elsewhere.
fn optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = Path::new("/dev/shm");
        if shm.is_dir() {
            let probe = shm.join(format!(".tiles_probe_{}", std::process::id()));
            if std::fs::write(&probe, b"probe").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return shm.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}
