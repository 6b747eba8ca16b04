//! Persisting search results
//!
//! Each run writes one artifact per labelled configuration next to the
//! checkpoint (or into an explicit directory), named
//! `<checkpoint stem>_quantized_<label>.<ext>`.

use super::format::FileFormat;
use crate::model::LayerDescriptor;
use crate::search::{ArtifactLabel, QuantizationOutcome, SearchResult};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bit-widths of one layer in a saved artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerBits {
    pub name: String,
    pub weight_bits: u32,
    pub act_bits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr_bits: Option<u32>,
}

/// Contents of a saved artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedArtifact {
    pub label: ArtifactLabel,
    pub checkpoint: PathBuf,
    /// Bits used for the network input
    pub input_act_bits: u32,
    pub layers: Vec<LayerBits>,
    pub accuracy: f64,
    pub memory_bits: u64,
    pub memory_reduction: f64,
    /// RFC 3339 creation time
    pub created_at: String,
}

impl QuantizedArtifact {
    pub fn new(
        label: ArtifactLabel,
        result: &SearchResult,
        layers: &[LayerDescriptor],
        checkpoint: &Path,
    ) -> Result<Self> {
        if result.weight_bits.len() != layers.len() || result.act_bits.len() != layers.len() {
            return Err(Error::Alignment {
                what: "result bits vs layers",
                expected: layers.len(),
                got: result.weight_bits.len(),
            });
        }

        let mut dr = result.dr_bits.iter();
        let layers = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerBits {
                name: layer.name.clone(),
                weight_bits: result.weight_bits[i],
                act_bits: result.act_bits[i],
                dr_bits: if layer.is_capsule_with_routing {
                    dr.next().copied()
                } else {
                    None
                },
            })
            .collect();

        Ok(Self {
            label,
            checkpoint: checkpoint.to_path_buf(),
            input_act_bits: result.act_bits.first().copied().unwrap_or(0),
            layers,
            accuracy: result.accuracy,
            memory_bits: result.memory_bits,
            memory_reduction: result.memory_reduction,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Path of the artifact for `label`
pub fn artifact_path(
    checkpoint: &Path,
    dir: Option<&Path>,
    label: ArtifactLabel,
    format: FileFormat,
) -> PathBuf {
    let stem = checkpoint
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(|| checkpoint.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!(
        "{stem}_quantized_{}.{}",
        label.suffix(),
        format.extension()
    ))
}

/// Serialize any document to `path`
pub fn save_document<T: Serialize>(value: &T, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
    let data = match format {
        FileFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?,
        FileFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };
    fs::write(path, data)?;
    Ok(())
}

/// Write every labelled configuration of `outcome`, returning the paths
pub fn save_outcome(
    outcome: &QuantizationOutcome,
    layers: &[LayerDescriptor],
    checkpoint: &Path,
    dir: Option<&Path>,
    format: FileFormat,
) -> Result<Vec<PathBuf>> {
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }

    outcome
        .artifacts()
        .into_iter()
        .map(|(label, result)| {
            let artifact = QuantizedArtifact::new(label, result, layers, checkpoint)?;
            let path = artifact_path(checkpoint, dir, label, format);
            save_document(&artifact, &path, format)?;
            tracing::info!(%label, path = %path.display(), "saved quantized configuration");
            Ok(path)
        })
        .collect()
}
