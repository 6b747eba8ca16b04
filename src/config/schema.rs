//! YAML schema definitions for declarative search configuration

use crate::io::FileFormat;
use crate::search::SearchSettings;
use crate::stats::DEFAULT_STD_MULTIPLIER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete search specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeSpec {
    /// Model checkpoint and layer topology
    pub model: ModelRef,

    /// Pre-computed statistics files
    pub statistics: StatisticsRef,

    /// Accuracy and memory targets
    pub search: SearchParams,

    /// External accuracy oracle
    pub evaluator: EvaluatorSpec,

    /// Artifact output
    #[serde(default)]
    pub output: OutputSpec,
}

/// Model checkpoint and topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Full-precision checkpoint; artifact names are derived from it
    pub checkpoint: PathBuf,

    /// Module tree (YAML or JSON)
    pub topology: PathBuf,
}

/// Statistics files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRef {
    /// Per-weight-tensor range, std and SQNR
    pub weights: PathBuf,

    /// Activation SQNR and scaling factors
    pub activations: PathBuf,
}

/// Search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Full-precision accuracy (percent)
    pub top_accuracy: f64,

    /// Allowed accuracy loss, percent of `top_accuracy`
    pub accuracy_tolerance: f64,

    /// Weight memory budget (MB)
    pub memory_budget_mb: f64,

    /// Quantization scheme name
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Multiplier on the std-based clipping bound
    #[serde(default = "default_std_multiplier")]
    pub std_multiplier: f32,
}

impl SearchParams {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            top_accuracy: self.top_accuracy,
            accuracy_tolerance: self.accuracy_tolerance,
            memory_budget_mb: self.memory_budget_mb,
        }
    }
}

/// External evaluator process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSpec {
    /// Program followed by its arguments
    pub command: Vec<String>,
}

/// Artifact output options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Artifact format
    #[serde(default)]
    pub format: FileFormat,

    /// Output directory (defaults to the checkpoint's directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl QuantizeSpec {
    /// Resolve relative paths against `base`, usually the config file's
    /// directory
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.model.checkpoint);
        resolve(&mut self.model.topology);
        resolve(&mut self.statistics.weights);
        resolve(&mut self.statistics.activations);
        if let Some(dir) = self.output.dir.as_mut() {
            resolve(dir);
        }
    }
}

fn default_scheme() -> String {
    "round_to_nearest".to_string()
}

fn default_std_multiplier() -> f32 {
    DEFAULT_STD_MULTIPLIER
}
