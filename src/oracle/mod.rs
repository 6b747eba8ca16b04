//! Accuracy oracles
//!
//! The search never touches tensors. Every candidate is scored by an
//! [`AccuracyOracle`], which must be deterministic for a fixed configuration
//! and must start from the full-precision weights on every call.
//!
//! - [`FnOracle`]: closure adapter, mostly for synthetic responses
//! - [`SnapshotOracle`]: requantizes a [`WeightSnapshot`](crate::model::WeightSnapshot)
//!   and delegates inference to an [`InferenceModel`]
//! - [`CommandOracle`]: scores candidates with an external evaluator process
//! - [`TracedOracle`]: records every evaluation for the final report

mod command;
mod snapshot;
mod trace;

pub use command::{parse_accuracy, CommandOracle, EvaluationRequest, LayerRequest};
pub use snapshot::{ActivationPrecision, InferenceModel, SnapshotOracle};
pub use trace::{Evaluation, EvaluationTrace, TracedOracle};

use crate::search::BitConfiguration;
use crate::{Error, Result};

/// Scores a bit configuration with one pass over the validation set
pub trait AccuracyOracle {
    /// Classification accuracy in percent
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64>;
}

impl<O: AccuracyOracle + ?Sized> AccuracyOracle for &mut O {
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        (**self).evaluate(config)
    }
}

impl<O: AccuracyOracle + ?Sized> AccuracyOracle for Box<O> {
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        (**self).evaluate(config)
    }
}

/// Reject accuracies outside `[0, 100]` or not finite
pub(crate) fn checked_accuracy(accuracy: f64) -> Result<f64> {
    if accuracy.is_finite() && (0.0..=100.0).contains(&accuracy) {
        Ok(accuracy)
    } else {
        Err(Error::Evaluation(format!(
            "accuracy {accuracy} is not a percentage"
        )))
    }
}

/// Oracle backed by a closure
///
/// The closure's value goes through the same percentage check as every
/// other oracle.
pub struct FnOracle<F> {
    f: F,
}

impl<F> AccuracyOracle for FnOracle<F>
where
    F: FnMut(&BitConfiguration) -> f64,
{
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        checked_accuracy((self.f)(config))
    }
}

/// Wrap a closure as an oracle
pub fn from_fn<F>(f: F) -> FnOracle<F>
where
    F: FnMut(&BitConfiguration) -> f64,
{
    FnOracle { f }
}
