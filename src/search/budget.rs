//! Accuracy and memory budgets

use crate::model::mb_to_bits;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Share of the accuracy gap Stage 1 may consume
pub const UNIFORM_SHARE: f64 = 0.05;

/// Share of the remaining slack Stage 3A spreads over activation groups
pub const ACTIVATION_SHARE: f64 = 0.55;

/// Accuracy floors derived from the full-precision accuracy and tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyBudget {
    /// Full-precision accuracy (percent)
    pub top_accuracy: f64,
    /// Allowed degradation, percent of `top_accuracy`
    pub tolerance: f64,
}

impl AccuracyBudget {
    pub fn new(top_accuracy: f64, tolerance: f64) -> Result<Self> {
        if !(top_accuracy > 0.0 && top_accuracy <= 100.0) {
            return Err(Error::InvalidParameter(format!(
                "top accuracy {top_accuracy} must be in (0, 100]"
            )));
        }
        if !(0.0..=100.0).contains(&tolerance) {
            return Err(Error::InvalidParameter(format!(
                "accuracy tolerance {tolerance} must be in [0, 100]"
            )));
        }
        Ok(Self {
            top_accuracy,
            tolerance,
        })
    }

    /// Global floor: `A0 - tolerance/100 * A0`
    pub fn min_accuracy(&self) -> f64 {
        self.top_accuracy - self.tolerance / 100.0 * self.top_accuracy
    }

    /// Stage 1 floor: `A0 - 5% of (A0 - minAcc)`
    pub fn uniform_floor(&self) -> f64 {
        self.top_accuracy - UNIFORM_SHARE * (self.top_accuracy - self.min_accuracy())
    }
}

/// Weight memory budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBudget {
    pub budget_bits: u64,
}

impl MemoryBudget {
    pub fn from_bits(budget_bits: u64) -> Self {
        Self { budget_bits }
    }

    pub fn from_mb(mb: f64) -> Result<Self> {
        if !(mb.is_finite() && mb > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "memory budget {mb} MB must be positive"
            )));
        }
        Ok(Self::from_bits(mb_to_bits(mb)))
    }

    /// Whether `memory_bits` fits
    pub fn fits(&self, memory_bits: u64) -> bool {
        memory_bits <= self.budget_bits
    }

    /// Reject budgets below one bit per weight
    pub fn check_feasible(&self, min_required_bits: u64) -> Result<()> {
        if self.budget_bits < min_required_bits {
            return Err(Error::MemoryBudgetInfeasible {
                budget_bits: self.budget_bits,
                required_bits: min_required_bits,
            });
        }
        Ok(())
    }
}
