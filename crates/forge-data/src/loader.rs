//! Data file discovery and decoding.
//!
//! Data files are looked up by base name; the extension picks the format
//! (RON, TOML, or JSON). Two files sharing a base name is an error rather
//! than a silent preference.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A value parsed but makes no sense (negative capacity, inverted band).
    #[error("invalid value in {file}: {detail}")]
    Invalid { file: PathBuf, detail: String },

    #[error("unknown {kind} '{name}' in {file}")]
    UnknownName {
        file: PathBuf,
        name: String,
        kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
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
    /// Every format, in lookup order.
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.{ron,toml,json}` in `dir`. `Ok(None)` when absent.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found.take() {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Decode `content` as `format`. `path` only labels errors.
pub fn parse_str<T: DeserializeOwned>(format: Format, content: &str, path: &Path) -> Result<T, DataLoadError> {
    let parsed = match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

/// Read a file and decode it in the format its extension names.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(format, &content, path)
}

// ===========================================================================
// Name helpers
// ===========================================================================

pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnknownName {
        file: file.to_path_buf(),
        name: name.to_string(),
        kind,
    })
}

pub fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
