//! Board temperature, read once at startup.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermalError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected contents in {path}: {value:?}")]
    Parse { path: PathBuf, value: String },
}

/// Format a thermal zone reading (millidegrees Celsius) as `"47.2 °C"`.
pub fn format_millidegrees(raw: &str) -> Option<String> {
    let milli: f64 = raw.trim().parse().ok()?;
    Some(format!("{:.1} °C", milli / 1000.0))
}

/// Read and format the thermal pseudo-file. Failure is fatal for the caller.
pub async fn read_temperature(path: &Path) -> Result<String, ThermalError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ThermalError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    format_millidegrees(&raw).ok_or_else(|| ThermalError::Parse {
        path: path.to_path_buf(),
        value: raw.trim().to_string(),
    })
}
