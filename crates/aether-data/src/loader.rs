//! Config file discovery, format detection and loading.

use aether_core::config::{ConfigError, SimConfig};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::schema::ConfigData;

/// Base name looked up by [`load_config_from_dir`].
pub const CONFIG_BASE_NAME: &str = "sim";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Parsed, but a value cannot be represented or is out of range.
    #[error("invalid config in {file}: {detail}")]
    Invalid { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataLoadError {
    fn invalid(file: &Path, error: impl std::fmt::Display) -> Self {
        Self::Invalid {
            file: file.to_path_buf(),
            detail: error.to_string(),
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [(Format, &'static str); 3] =
        [(Format::Ron, "ron"), (Format::Toml, "toml"), (Format::Json, "json")];
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .iter()
        .find(|(_, name)| Some(*name) == ext)
        .map(|&(format, _)| format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` and `.json` in `dir`.
///
/// `Ok(None)` when none exists; `ConflictingFormats` when more than one
/// does, since it would be ambiguous which one wins.
pub fn find_config_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for (_, ext) in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Parse `content` as `format`. `file` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Config loading
// ===========================================================================

fn finish(data: ConfigData, file: &Path) -> Result<SimConfig, DataLoadError> {
    let config = data
        .to_config()
        .map_err(|e| DataLoadError::invalid(file, e))?;
    config
        .validate()
        .map_err(|e: ConfigError| DataLoadError::invalid(file, e))?;
    Ok(config)
}

/// Parse and validate a config held in memory.
pub fn parse_config(content: &str, format: Format) -> Result<SimConfig, DataLoadError> {
    let label = Path::new("<memory>");
    finish(deserialize_str(content, format, label)?, label)
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<SimConfig, DataLoadError> {
    let data: ConfigData = deserialize_file(path)?;
    let config = finish(data, path)?;
    info!(file = %path.display(), "simulation config loaded");
    Ok(config)
}

/// Load `sim.{ron,toml,json}` from `dir`, or the stock config when the
/// directory has none.
pub fn load_config_from_dir(dir: &Path) -> Result<SimConfig, DataLoadError> {
    match find_config_file(dir, CONFIG_BASE_NAME)? {
        Some(path) => load_config(&path),
        None => {
            debug!(dir = %dir.display(), "no config file, using defaults");
            Ok(SimConfig::default())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
