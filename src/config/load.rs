//! Loading a search configuration and the documents it points to

use super::schema::QuantizeSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use crate::io::load_document;
use crate::model::{LayerDescriptor, ModuleNode};
use crate::sensitivity::SensitivityRanking;
use crate::stats::{ActivationStatistics, ResolvedStatistics, WeightStatistics};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load, validate and resolve a YAML search configuration
///
/// Relative paths inside the file are taken relative to the file's
/// directory.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<QuantizeSpec> {
    let config_path = config_path.as_ref();
    let yaml_content = fs::read_to_string(config_path).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    let mut spec: QuantizeSpec = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    if let Some(base) = config_path.parent() {
        spec.resolve_paths(base);
    }
    Ok(spec)
}

/// Everything derived once from the full-precision model
#[derive(Debug, Clone)]
pub struct SearchInputs {
    /// Leaf layers in traversal order, scale factors filled in
    pub layers: Vec<LayerDescriptor>,
    pub statistics: ResolvedStatistics,
    pub ranking: SensitivityRanking,
}

/// Load the topology and statistics named by `spec`
pub fn load_inputs(spec: &QuantizeSpec) -> Result<SearchInputs> {
    let topology: ModuleNode = load_document(&spec.model.topology)?;
    let mut layers = topology.leaf_layers();
    if layers.is_empty() {
        return Err(Error::ConfigError(format!(
            "topology {} has no leaf layers",
            spec.model.topology.display()
        )));
    }

    let weights = WeightStatistics::load(&spec.statistics.weights)?;
    let activations = ActivationStatistics::load(&spec.statistics.activations)?;
    let statistics = ResolvedStatistics::resolve(
        &mut layers,
        &weights,
        &activations,
        spec.search.std_multiplier,
    )?;
    let ranking = SensitivityRanking::from_statistics(&statistics);
    debug!(
        layers = layers.len(),
        weight_rank = ?ranking.weight_rank,
        act_groups = ?ranking.act_groups,
        "loaded search inputs"
    );

    Ok(SearchInputs {
        layers,
        statistics,
        ranking,
    })
}
