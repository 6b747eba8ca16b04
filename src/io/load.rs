//! Document loading

use super::format::FileFormat;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load a JSON or YAML document, detecting the format from the extension
///
/// # Example
///
/// ```no_run
/// use qcapsnets::io::load_document;
/// use qcapsnets::stats::WeightStatistics;
///
/// let stats: WeightStatistics = load_document("ShallowCapsNet_mnist_w_info.json").unwrap();
/// ```
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization(format!("File has no extension: {}", path.display())))?;
    let format = FileFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("Unsupported file extension: {ext}")))?;

    let content = fs::read_to_string(path)?;
    parse_document(&content, format)
}

/// Parse a document already read into memory
pub fn parse_document<T: DeserializeOwned>(content: &str, format: FileFormat) -> Result<T> {
    match format {
        FileFormat::Json => serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}"))),
        FileFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}"))),
    }
}
