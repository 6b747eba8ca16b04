//! Serialization format definitions

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported text formats for statistics, topologies and artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// JSON format (human-readable, default for artifacts)
    #[default]
    Json,

    /// YAML format (human-readable, good for configs)
    Yaml,
}

impl FileFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
        }
    }

    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }

    /// Detect format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}
