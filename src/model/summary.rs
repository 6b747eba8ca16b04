//! Memory accounting over the leaf layers

use super::layer::LayerDescriptor;
use serde::{Deserialize, Serialize};

/// Bits per parameter of the full-precision baseline
pub const BASELINE_BITS: u32 = 32;

/// Bytes in one MB as used by memory budgets (2^20)
pub const BYTES_PER_MB: u64 = 1 << 20;

/// Convert a budget in MB to bits
pub fn mb_to_bits(mb: f64) -> u64 {
    (mb * 8.0 * BYTES_PER_MB as f64).floor() as u64
}

/// Convert bits to MB
pub fn bits_to_mb(bits: u64) -> f64 {
    bits as f64 / 8.0 / BYTES_PER_MB as f64
}

/// Per-layer weight counts and the full-precision footprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Quantized weights per layer, index-aligned with the layers
    pub weight_counts: Vec<u64>,

    /// Total parameters (normalization included)
    pub total_parameters: u64,
}

impl ModelSummary {
    pub fn from_layers(layers: &[LayerDescriptor]) -> Self {
        Self {
            weight_counts: layers.iter().map(|l| l.weight_count).collect(),
            total_parameters: layers.iter().map(|l| l.parameter_count).sum(),
        }
    }

    /// Number of leaf layers
    pub fn num_layers(&self) -> usize {
        self.weight_counts.len()
    }

    /// Full-precision footprint in bits
    pub fn baseline_bits(&self) -> u64 {
        self.total_parameters * BASELINE_BITS as u64
    }

    /// Full-precision footprint in MB
    pub fn baseline_mb(&self) -> f64 {
        bits_to_mb(self.baseline_bits())
    }

    /// Memory needed at 1 bit per weight
    pub fn min_required_bits(&self) -> u64 {
        self.weight_counts.iter().sum()
    }

    /// Weight memory of a per-layer bit assignment
    pub fn memory_bits(&self, weight_bits: &[u32]) -> u64 {
        debug_assert_eq!(weight_bits.len(), self.weight_counts.len());
        self.weight_counts
            .iter()
            .zip(weight_bits)
            .map(|(&count, &bits)| count * bits as u64)
            .sum()
    }

    /// Baseline memory divided by the memory of `weight_bits`
    pub fn reduction_factor(&self, weight_bits: &[u32]) -> f64 {
        let memory = self.memory_bits(weight_bits);
        if memory == 0 {
            return f64::INFINITY;
        }
        self.baseline_bits() as f64 / memory as f64
    }
}
