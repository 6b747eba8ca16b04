//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! model:
//!   checkpoint: trained_models/ShallowCapsNet_mnist.pt
//!   topology: shallowcaps.yaml
//!
//! statistics:
//!   weights: ShallowCapsNet_mnist_w_info.json
//!   activations: ShallowCapsNet_mnist_a_info.json
//!
//! search:
//!   top_accuracy: 99.67
//!   accuracy_tolerance: 0.2
//!   memory_budget_mb: 0.2
//!   scheme: round_to_nearest
//!
//! evaluator:
//!   command: [python, evaluate.py]
//! ```

mod cli;
mod load;
mod schema;
mod validate;



pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, RankArgs, SearchArgs,
    ValidateArgs,
};
pub use load::{load_config, load_inputs, SearchInputs};
pub use schema::{EvaluatorSpec, ModelRef, OutputSpec, QuantizeSpec, SearchParams, StatisticsRef};
pub use validate::{validate_config, ValidationError};
