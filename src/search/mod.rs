//! Mixed-precision bit-width search
//!
//! Four stages run in sequence, each refining the previous stage's
//! configuration against the accuracy oracle:
//!
//! 1. [`uniform_search`]: binary search over one global bit-width
//! 2. [`memory_search`]: fit the weight memory budget, raising then lowering
//!    per-layer weight bits, possibly ending in a trade-off
//! 3. [`refine_activations`]: grouped activation bit lowering (Stage 3A)
//! 4. [`refine_routing`]: per-layer dynamic-routing bit lowering (Stage 4A)
//!
//! [`QCapsNets`] drives the stages and assembles the
//! [`QuantizationOutcome`].

mod bits;
mod budget;
mod memory;
mod pipeline;
mod refine;
mod result;
mod uniform;

pub use bits::{BitConfiguration, BitLayout};
pub use budget::{AccuracyBudget, MemoryBudget, ACTIVATION_SHARE, UNIFORM_SHARE};
pub use memory::{memory_search, MemoryOutcome, MemorySearch};
pub use pipeline::{quantize, QCapsNets, SearchSettings};
pub use refine::{refine_activations, refine_routing, Refinement};
pub use result::{
    ArtifactLabel, QuantizationOutcome, QuantizationReport, SearchResult, StageReport,
};
pub use uniform::{uniform_search, UniformSearch, UniformTrial};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest bit-width any stage assigns
pub const MAX_BITS: u32 = 32;

/// Absolute lowest bit-width (Stages 1 and 2)
pub const MIN_BITS: u32 = 1;

/// Lowest bit-width the fine-grained refinements descend to
pub const REFINE_MIN_BITS: u32 = 3;

/// Search stage, used to attribute oracle calls and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uniform,
    Memory,
    Activation,
    Routing,
}

impl Stage {
    /// Short stage label as used in the Q-CapsNets paper
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Uniform => "1",
            Stage::Memory => "2",
            Stage::Activation => "3A",
            Stage::Routing => "4A",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Uniform => "uniform",
            Stage::Memory => "memory",
            Stage::Activation => "activation",
            Stage::Routing => "routing",
        };
        write!(f, "stage {} ({name})", self.label())
    }
}

/// A configuration paired with its measured accuracy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub config: BitConfiguration,
    pub accuracy: f64,
}

impl Candidate {
    pub fn new(config: BitConfiguration, accuracy: f64) -> Self {
        Self { config, accuracy }
    }
}
