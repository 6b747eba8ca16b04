//! # Q-CapsNets: Mixed-Precision Quantization for Capsule Networks
//!
//! Searches per-layer bit-widths for the weights, activations and dynamic
//! routing of a trained capsule network so that weight memory fits a budget
//! while accuracy stays within a tolerance of the full-precision model.
//!
//! ## Architecture
//!
//! - **model**: leaf-layer descriptors, memory accounting, weight snapshots
//! - **stats**: pre-computed weight/activation statistics and scale factors
//! - **sensitivity**: SQNR-based layer orderings
//! - **quant**: quantization scheme registry
//! - **oracle**: accuracy oracles (closure, in-process, external command)
//! - **search**: the four-stage bit-width search
//! - **config**: declarative YAML configuration and CLI definitions
//! - **io**: statistics loading and artifact saving (JSON, YAML formats)
//!
//! ## Example
//!
//! ```
//! use qcapsnets::model::LayerDescriptor;
//! use qcapsnets::oracle::from_fn;
//! use qcapsnets::search::{BitConfiguration, QCapsNets, SearchSettings};
//! use qcapsnets::sensitivity::SensitivityRanking;
//!
//! let layers: Vec<_> = (0..3)
//!     .map(|i| LayerDescriptor::new(i, format!("layer{i}"), 1000))
//!     .collect();
//! let ranking = SensitivityRanking::new(&[30.0, 10.0, 20.0], &[(0, 5.0), (1, 9.0), (2, 7.0)]);
//! let settings = SearchSettings {
//!     top_accuracy: 99.0,
//!     accuracy_tolerance: 1.0,
//!     memory_budget_mb: 0.01,
//! };
//!
//! let search = QCapsNets::new(layers, ranking, &settings)?;
//! let oracle = from_fn(|c: &BitConfiguration| {
//!     let bits: u32 = c.weight_bits().iter().chain(c.act_bits()).sum();
//!     (80.0 + bits as f64).min(99.0)
//! });
//! let report = search.run(oracle)?;
//! assert!(report.evaluations() > 0);
//! # Ok::<(), qcapsnets::Error>(())
//! ```

pub mod config;
pub mod io;
pub mod model;
pub mod oracle;
pub mod quant;
pub mod search;
pub mod sensitivity;
pub mod stats;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
pub use search::{quantize, BitConfiguration, QCapsNets, QuantizationOutcome, SearchSettings};
