//! Pre-computed per-layer statistics
//!
//! Produced by the profiling pass over the full-precision model:
//! - weight statistics: `"<layer>.<param>" -> { range, std, sqnr }`
//! - activation statistics: per-layer SQNR plus the activation scaling
//!   factors, input first
//!
//! Statistics are matched to layers by name, never by file order.

use crate::io::load_document;
use crate::model::LayerDescriptor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default multiplier applied to the std-based clipping bound
pub const DEFAULT_STD_MULTIPLIER: f32 = 100.0;

/// Statistics of one weight tensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorStats {
    /// Statistical range bound (max |w|)
    pub range: f32,
    /// Standard deviation bound
    pub std: f32,
    /// Signal-to-quantization-noise ratio
    pub sqnr: f64,
}

impl TensorStats {
    /// Clipping scale: the smaller of the range and the scaled std bound
    pub fn scale_factor(&self, std_multiplier: f32) -> f32 {
        self.range.min(self.std * std_multiplier)
    }
}

/// Weight statistics keyed by fully-qualified parameter name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightStatistics {
    pub tensors: BTreeMap<String, TensorStats>,
}

impl WeightStatistics {
    pub fn get(&self, key: &str) -> Option<&TensorStats> {
        self.tensors.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, stats: TensorStats) {
        self.tensors.insert(key.into(), stats);
    }

    /// Load from a JSON or YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_document(path)
    }
}

/// SQNR of one layer's output activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSqnr {
    pub layer: String,
    pub sqnr: f64,
}

/// Activation statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationStatistics {
    /// Activation scaling factors: input first, then one per layer
    pub scaling_factors: Vec<f32>,
    /// Per-layer activation SQNR
    pub sqnr: Vec<LayerSqnr>,
}

impl ActivationStatistics {
    /// Load from a JSON or YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_document(path)
    }
}

/// Statistics resolved against the traversal order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStatistics {
    /// Weight SQNR per layer, index-aligned with the layers
    pub weight_sqnr: Vec<f64>,
    /// `(layer index, activation SQNR)` in file order
    pub activation_sqnr: Vec<(usize, f64)>,
    /// Scale factor per fully-qualified weight parameter
    pub weight_scales: BTreeMap<String, f32>,
    /// Activation scaling factors, input first
    pub activation_scales: Vec<f32>,
}

impl ResolvedStatistics {
    /// Match statistics to layers and fill each layer's weight scale factor.
    ///
    /// Every weight-quantized parameter needs an entry in `weights`; the
    /// layer's SQNR is taken from its `weight` tensor (or its first weight
    /// parameter when it has none named `weight`).
    pub fn resolve(
        layers: &mut [LayerDescriptor],
        weights: &WeightStatistics,
        activations: &ActivationStatistics,
        std_multiplier: f32,
    ) -> Result<Self> {
        let mut weight_sqnr = Vec::with_capacity(layers.len());
        let mut weight_scales = BTreeMap::new();

        for layer in layers.iter_mut() {
            let primary = layer
                .weight_parameters
                .iter()
                .find(|p| p.as_str() == "weight")
                .or_else(|| layer.weight_parameters.first())
                .cloned()
                .ok_or_else(|| {
                    Error::MissingStatistics(format!("layer {} has no weight parameters", layer.name))
                })?;

            for param in &layer.weight_parameters {
                let key = layer.parameter_key(param);
                let stats = weights
                    .get(&key)
                    .ok_or_else(|| Error::MissingStatistics(format!("weight statistics for {key}")))?;
                weight_scales.insert(key, stats.scale_factor(std_multiplier));
            }

            let key = layer.parameter_key(&primary);
            let stats = weights
                .get(&key)
                .ok_or_else(|| Error::MissingStatistics(format!("weight statistics for {key}")))?;
            layer.weight_scale_factor = Some(stats.scale_factor(std_multiplier));
            weight_sqnr.push(stats.sqnr);
        }

        let mut activation_sqnr: Vec<(usize, f64)> = Vec::with_capacity(activations.sqnr.len());
        for entry in &activations.sqnr {
            let index = layers
                .iter()
                .find(|l| l.name == entry.layer)
                .map(|l| l.index)
                .ok_or_else(|| {
                    Error::MissingStatistics(format!(
                        "activation statistics name unknown layer {}",
                        entry.layer
                    ))
                })?;
            if activation_sqnr.iter().any(|&(seen, _)| seen == index) {
                return Err(Error::InvalidParameter(format!(
                    "activation statistics list layer {} more than once",
                    entry.layer
                )));
            }
            activation_sqnr.push((index, entry.sqnr));
        }

        if activations.scaling_factors.len() != layers.len() + 1 {
            return Err(Error::Alignment {
                what: "activation scaling factors (input + layers)",
                expected: layers.len() + 1,
                got: activations.scaling_factors.len(),
            });
        }

        Ok(Self {
            weight_sqnr,
            activation_sqnr,
            weight_scales,
            activation_scales: activations.scaling_factors.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layers() -> Vec<LayerDescriptor> {
        vec![
            LayerDescriptor::new(0, "conv", 10),
            LayerDescriptor::new(1, "primary", 20),
            LayerDescriptor::new(2, "digit", 30).with_routing(3),
        ]
    }

    fn weight_stats() -> WeightStatistics {
        let mut stats = WeightStatistics::default();
        stats.insert("conv.weight", TensorStats { range: 0.5, std: 0.001, sqnr: 30.0 });
        stats.insert("primary.weight", TensorStats { range: 0.2, std: 0.01, sqnr: 25.0 });
        stats.insert("digit.weight", TensorStats { range: 0.8, std: 0.1, sqnr: 40.0 });
        stats
    }

    fn act_stats() -> ActivationStatistics {
        ActivationStatistics {
            scaling_factors: vec![1.0, 2.0, 3.0, 4.0],
            sqnr: vec![
                LayerSqnr { layer: "digit".into(), sqnr: 12.0 },
                LayerSqnr { layer: "conv".into(), sqnr: 8.0 },
            ],
        }
    }

    #[test]
    fn test_scale_factor_is_min_of_bounds() {
        let stats = TensorStats { range: 0.5, std: 0.001, sqnr: 0.0 };
        assert_relative_eq!(stats.scale_factor(100.0), 0.1);
        assert_relative_eq!(stats.scale_factor(1000.0), 0.5);
    }

    #[test]
    fn test_resolve_fills_layers() {
        let mut layers = layers();
        let resolved =
            ResolvedStatistics::resolve(&mut layers, &weight_stats(), &act_stats(), 100.0).unwrap();
        assert_eq!(resolved.weight_sqnr, vec![30.0, 25.0, 40.0]);
        assert_eq!(resolved.activation_sqnr, vec![(2, 12.0), (0, 8.0)]);
        assert_relative_eq!(layers[0].weight_scale_factor.unwrap(), 0.1);
        assert_relative_eq!(layers[1].weight_scale_factor.unwrap(), 0.2);
    }

    #[test]
    fn test_missing_weight_stats() {
        let mut layers = layers();
        let mut stats = weight_stats();
        stats.tensors.remove("primary.weight");
        let err = ResolvedStatistics::resolve(&mut layers, &stats, &act_stats(), 100.0).unwrap_err();
        assert!(matches!(err, Error::MissingStatistics(_)));
    }

    #[test]
    fn test_unknown_activation_layer() {
        let mut layers = layers();
        let mut acts = act_stats();
        acts.sqnr.push(LayerSqnr { layer: "decoder".into(), sqnr: 1.0 });
        let err = ResolvedStatistics::resolve(&mut layers, &weight_stats(), &acts, 100.0).unwrap_err();
        assert!(matches!(err, Error::MissingStatistics(_)));
    }

    #[test]
    fn test_duplicate_activation_layer() {
        let mut layers = layers();
        let mut acts = act_stats();
        acts.sqnr.push(LayerSqnr { layer: "conv".into(), sqnr: 9.0 });
        let err = ResolvedStatistics::resolve(&mut layers, &weight_stats(), &acts, 100.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("conv")));
    }

    #[test]
    fn test_scaling_factor_alignment() {
        let mut layers = layers();
        let mut acts = act_stats();
        acts.scaling_factors.pop();
        let err = ResolvedStatistics::resolve(&mut layers, &weight_stats(), &acts, 100.0).unwrap_err();
        assert!(matches!(err, Error::Alignment { expected: 4, got: 3, .. }));
    }

    #[test]
    fn test_weight_stats_json_shape() {
        let json = r#"{ "conv.weight": { "range": 0.5, "std": 0.01, "sqnr": 31.5 } }"#;
        let stats: WeightStatistics = serde_json::from_str(json).unwrap();
        assert_eq!(stats.get("conv.weight").unwrap().sqnr, 31.5);
    }
}
