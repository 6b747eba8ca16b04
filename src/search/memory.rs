//! Stage 2: memory-constrained weight search
//!
//! The memory budget fixes a uniform weight bit-width `b2`. When `b2` misses
//! the accuracy floor, weights are raised together until the floor holds and
//! then lowered layer by layer, most tolerant layer first, until the budget
//! fits. If no layer order recovers the budget the stage ends in a trade-off
//! between the two constraints.

use super::{AccuracyBudget, Candidate, MemoryBudget, MAX_BITS, MIN_BITS};
use crate::model::ModelSummary;
use crate::oracle::AccuracyOracle;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How Stage 2 ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryOutcome {
    /// Budget and accuracy floor hold together
    Satisfied(Candidate),
    /// The constraints conflict
    Tradeoff {
        /// Fits the budget, accuracy may be below the floor
        memory_optimal: Candidate,
        /// Meets the floor, memory may exceed the budget
        accuracy_optimal: Candidate,
    },
}

/// Stage 2 output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySearch {
    /// Uniform weight bit-width implied by the budget
    pub budget_bits_per_weight: u32,
    /// Accuracy at that bit-width
    pub memory_accuracy: f64,
    pub outcome: MemoryOutcome,
}

/// Run Stage 2 from the Stage 1 candidate.
///
/// Activation and routing bits are carried over from `start` unchanged.
/// Fails with [`Error::MemoryBudgetInfeasible`](crate::Error) when the
/// budget cannot hold one bit per weight.
pub fn memory_search<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    start: &Candidate,
    summary: &ModelSummary,
    weight_rank: &[usize],
    memory: &MemoryBudget,
    accuracy: &AccuracyBudget,
) -> Result<MemorySearch> {
    let min_required = summary.min_required_bits();
    memory.check_feasible(min_required)?;
    let min_acc = accuracy.min_accuracy();

    let b2 = if min_required == 0 {
        MAX_BITS
    } else {
        (memory.budget_bits / min_required).min(u64::from(MAX_BITS)) as u32
    };
    info!(
        budget_bits = memory.budget_bits,
        min_required, b2, min_acc, "stage 2: memory-constrained search"
    );

    let mut config = start.config.clone();
    config.set_all_weights(b2);
    let acc_mem = oracle.evaluate(&config)?;
    let memory_optimal = Candidate::new(config, acc_mem);

    if acc_mem >= min_acc {
        info!(b2, accuracy = acc_mem, "stage 2 done: uniform budget bits meet the floor");
        return Ok(MemorySearch {
            budget_bits_per_weight: b2,
            memory_accuracy: acc_mem,
            outcome: MemoryOutcome::Satisfied(memory_optimal),
        });
    }

    let raised = raise_phase(oracle, &memory_optimal, min_acc)?;
    let outcome = if raised.accuracy < min_acc {
        warn!(
            accuracy = raised.accuracy,
            min_acc, "floor unreachable even at {MAX_BITS}-bit weights"
        );
        MemoryOutcome::Tradeoff {
            memory_optimal,
            accuracy_optimal: raised,
        }
    } else {
        match lower_phase(oracle, raised, summary, weight_rank, memory, min_acc)? {
            Ok(fitted) => MemoryOutcome::Satisfied(fitted),
            Err(exhausted) => {
                warn!(
                    memory_bits = summary.memory_bits(exhausted.config.weight_bits()),
                    budget_bits = memory.budget_bits,
                    "accuracy and memory constraints conflict, returning both trade-off points"
                );
                MemoryOutcome::Tradeoff {
                    memory_optimal,
                    accuracy_optimal: exhausted,
                }
            }
        }
    };

    if let MemoryOutcome::Satisfied(c) = &outcome {
        info!(weight_bits = ?c.config.weight_bits(), accuracy = c.accuracy, "stage 2 done");
    }

    Ok(MemorySearch {
        budget_bits_per_weight: b2,
        memory_accuracy: acc_mem,
        outcome,
    })
}

/// Raise every weight by one bit until the floor holds or weights hit
/// [`MAX_BITS`].
fn raise_phase<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    from: &Candidate,
    min_acc: f64,
) -> Result<Candidate> {
    let mut current = from.clone();
    while current.accuracy < min_acc {
        if current.config.weight_bits().iter().all(|&b| b >= MAX_BITS) {
            break;
        }
        current.config.raise_all_weights(MAX_BITS);
        current.accuracy = oracle.evaluate(&current.config)?;
        debug!(
            weight_bits = ?current.config.weight_bits(),
            accuracy = current.accuracy,
            "raise phase"
        );
    }
    Ok(current)
}

/// Lower weights layer by layer in rank order.
///
/// `Ok(Ok(_))` once memory fits the budget, `Ok(Err(_))` with the final
/// configuration when every layer has been lowered as far as the floor
/// allows.
fn lower_phase<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    mut current: Candidate,
    summary: &ModelSummary,
    weight_rank: &[usize],
    memory: &MemoryBudget,
    min_acc: f64,
) -> Result<std::result::Result<Candidate, Candidate>> {
    for &layer in weight_rank {
        while current.config.weight(layer) > MIN_BITS {
            let kept = current.config.weight(layer);
            current.config.set_weight(layer, kept - 1);
            let accuracy = oracle.evaluate(&current.config)?;
            debug!(layer, bits = kept - 1, accuracy, "lower phase probe");
            if accuracy >= min_acc {
                current.accuracy = accuracy;
            } else {
                current.config.set_weight(layer, kept);
                break;
            }
        }

        let memory_bits = summary.memory_bits(current.config.weight_bits());
        if memory.fits(memory_bits) {
            debug!(layer, memory_bits, "budget fits after lowering");
            return Ok(Ok(current));
        }
    }
    Ok(Err(current))
}
