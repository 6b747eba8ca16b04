//! Stage 1: uniform bit-width binary search
//!
//! One global bit-width is applied to every weight, activation and routing
//! entry. The search halves its step after every trial and moves down on a
//! pass, up on a failure; the answer is read back from the recorded history
//! so a non-monotonic accuracy response cannot derail it.

use super::{AccuracyBudget, BitLayout, Candidate, MAX_BITS};
use crate::oracle::AccuracyOracle;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One evaluated uniform bit-width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformTrial {
    pub bits: u32,
    pub accuracy: f64,
    pub passed: bool,
}

/// Stage 1 output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformSearch {
    /// Selected uniform bit-width
    pub bits: u32,
    /// Uniform configuration at `bits` with its accuracy
    pub candidate: Candidate,
    /// Every trial in evaluation order
    pub trials: Vec<UniformTrial>,
}

/// Find the lowest uniform bit-width meeting the Stage 1 floor.
///
/// 32 bits is evaluated first; if even that misses the floor, 32 is kept.
/// Otherwise the search starts at 16 with a step of 16, halving the step
/// after each trial until a 1-bit step has been taken.
pub fn uniform_search<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    layout: &BitLayout,
    budget: &AccuracyBudget,
) -> Result<UniformSearch> {
    let floor = budget.uniform_floor();
    info!(floor, "stage 1: uniform binary search");

    let mut trials = Vec::new();
    let mut evaluate = |bits: u32, trials: &mut Vec<UniformTrial>| -> Result<bool> {
        let accuracy = oracle.evaluate(&layout.uniform(bits))?;
        let passed = accuracy >= floor;
        debug!(bits, accuracy, passed, "uniform trial");
        trials.push(UniformTrial {
            bits,
            accuracy,
            passed,
        });
        Ok(passed)
    };

    if evaluate(MAX_BITS, &mut trials)? {
        let mut step = MAX_BITS / 2;
        let mut bits = step;
        loop {
            let passed = evaluate(bits, &mut trials)?;
            if step == 1 {
                break;
            }
            step /= 2;
            bits = if passed { bits - step } else { bits + step };
        }
    } else {
        info!("full precision misses the uniform floor, keeping {MAX_BITS} bits");
    }

    let selected = select(&trials).unwrap_or(UniformTrial {
        bits: MAX_BITS,
        accuracy: trials.first().map_or(0.0, |t| t.accuracy),
        passed: false,
    });

    info!(
        bits = selected.bits,
        accuracy = selected.accuracy,
        trials = trials.len(),
        "stage 1 done"
    );

    Ok(UniformSearch {
        bits: selected.bits,
        candidate: Candidate::new(layout.uniform(selected.bits), selected.accuracy),
        trials,
    })
}

/// Lowest passing bit-width; among equals the most recent trial wins.
fn select(trials: &[UniformTrial]) -> Option<UniformTrial> {
    trials
        .iter()
        .filter(|t| t.passed)
        .fold(None, |best: Option<&UniformTrial>, t| match best {
            Some(b) if b.bits < t.bits => Some(b),
            _ => Some(t),
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::from_fn;
    use crate::search::BitConfiguration;
    use approx::assert_relative_eq;

    fn layout() -> BitLayout {
        BitLayout {
            num_layers: 10,
            dr_positions: vec![9],
            active_routing: vec![0],
        }
    }

    fn linear(c: &BitConfiguration) -> f64 {
        (60.0 + 1.5 * c.weight(0) as f64).min(100.0)
    }

    #[test]
    fn test_linear_response_selects_26() {
        let budget = AccuracyBudget::new(99.0, 5.0).unwrap();
        let mut oracle = from_fn(linear);
        let result = uniform_search(&mut oracle, &layout(), &budget).unwrap();

        assert_eq!(result.bits, 26);
        assert_relative_eq!(result.candidate.accuracy, 99.0);
        assert_eq!(result.candidate.config, layout().uniform(26));

        let tried: Vec<u32> = result.trials.iter().map(|t| t.bits).collect();
        assert_eq!(tried, vec![32, 16, 24, 28, 26, 25]);
    }

    #[test]
    fn test_full_precision_failure_keeps_32() {
        let budget = AccuracyBudget::new(99.0, 5.0).unwrap();
        let mut oracle = from_fn(|_: &BitConfiguration| 50.0);
        let result = uniform_search(&mut oracle, &layout(), &budget).unwrap();

        assert_eq!(result.bits, 32);
        assert_eq!(result.trials.len(), 1);
        assert!(!result.trials[0].passed);
    }

    #[test]
    fn test_everything_passes_reaches_one_bit() {
        let budget = AccuracyBudget::new(99.0, 5.0).unwrap();
        let mut oracle = from_fn(|_: &BitConfiguration| 99.0);
        let result = uniform_search(&mut oracle, &layout(), &budget).unwrap();

        assert_eq!(result.bits, 1);
        let tried: Vec<u32> = result.trials.iter().map(|t| t.bits).collect();
        assert_eq!(tried, vec![32, 16, 8, 4, 2, 1]);
    }

    #[test]
    fn test_only_full_precision_passes() {
        let budget = AccuracyBudget::new(99.0, 5.0).unwrap();
        let mut oracle = from_fn(|c: &BitConfiguration| if c.weight(0) == 32 { 99.0 } else { 10.0 });
        let result = uniform_search(&mut oracle, &layout(), &budget).unwrap();

        assert_eq!(result.bits, 32);
        assert_eq!(result.trials.last().map(|t| t.bits), Some(31));
    }

    #[test]
    fn test_non_monotonic_picks_from_history() {
        // 16 passes, 8 fails, 12 fails, 14 passes, 13 fails: 14 is not the
        // lowest pass ever seen below 16, but it is the lowest recorded pass.
        let budget = AccuracyBudget::new(99.0, 5.0).unwrap();
        let mut oracle = from_fn(|c: &BitConfiguration| match c.weight(0) {
            32 | 16 | 14 => 99.0,
            _ => 10.0,
        });
        let result = uniform_search(&mut oracle, &layout(), &budget).unwrap();
        assert_eq!(result.bits, 14);
    }

    #[test]
    fn test_select_prefers_lowest_then_latest() {
        let trial = |bits, accuracy, passed| UniformTrial {
            bits,
            accuracy,
            passed,
        };
        let trials = [
            trial(32, 99.0, true),
            trial(20, 98.0, true),
            trial(10, 50.0, false),
            trial(20, 98.5, true),
        ];
        let picked = select(&trials).unwrap();
        assert_eq!(picked.bits, 20);
        assert_eq!(picked.accuracy, 98.5);
        assert!(select(&trials[2..3]).is_none());
    }
}
