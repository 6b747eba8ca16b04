//! Model description used by the search
//!
//! The capsule network itself is an external collaborator. The search only
//! sees its leaf layers, as typed [`LayerDescriptor`]s produced once by a
//! traversal of the [`ModuleNode`] hierarchy, plus memory accounting over
//! them. [`WeightSnapshot`] holds pristine weights for oracles that quantize
//! in-process.

mod layer;
mod snapshot;
mod summary;

pub use layer::{
    routing_positions, LayerDescriptor, LeafInfo, ModuleNode, ParameterInfo, NORMALIZATION_MARKER,
};
pub use snapshot::{LayerWeights, NamedTensor, WeightSnapshot};
pub use summary::{bits_to_mb, mb_to_bits, ModelSummary, BASELINE_BITS, BYTES_PER_MB};
