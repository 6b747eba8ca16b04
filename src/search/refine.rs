//! Stages 3A and 4A: slack-driven refinement
//!
//! The accuracy left above the global floor after Stage 2 is split into equal
//! shares. Each activation group (3A) or routing layer (4A) lowers its floor
//! by one share and then drops its bits one at a time until the next step
//! would cross that floor or go below [`REFINE_MIN_BITS`]. A failed probe is
//! always rolled back before moving on.

use super::{AccuracyBudget, BitLayout, Candidate, ACTIVATION_SHARE, REFINE_MIN_BITS};
use crate::oracle::AccuracyOracle;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Output of one refinement stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub candidate: Candidate,
    /// Accuracy share granted to each group or layer
    pub share: f64,
    /// Floor each group or layer was held to, in processing order
    pub floors: Vec<f64>,
}

impl Refinement {
    fn unchanged(from: &Candidate) -> Self {
        Self {
            candidate: from.clone(),
            share: 0.0,
            floors: Vec::new(),
        }
    }
}

/// Stage 3A: lower activation bits group by group.
///
/// Groups are processed in the given order (ascending SQNR). All layers of a
/// group are decremented together, one oracle call per joint step.
pub fn refine_activations<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    from: &Candidate,
    act_groups: &[Vec<usize>],
    budget: &AccuracyBudget,
) -> Result<Refinement> {
    let groups: Vec<&Vec<usize>> = act_groups.iter().filter(|g| !g.is_empty()).collect();
    if groups.is_empty() {
        warn!("no activation groups, skipping stage 3A");
        return Ok(Refinement::unchanged(from));
    }

    let slack = from.accuracy - budget.min_accuracy();
    let share = slack * ACTIVATION_SHARE / groups.len() as f64;
    info!(slack, share, groups = groups.len(), "stage 3A: activation refinement");

    let mut current = from.clone();
    let mut floor = from.accuracy;
    let mut floors = Vec::with_capacity(groups.len());

    for group in groups {
        floor -= share;
        floors.push(floor);

        loop {
            if group.iter().any(|&l| current.config.act(l) <= REFINE_MIN_BITS) {
                break;
            }
            let mut probe = current.config.clone();
            for &l in group {
                probe.set_act(l, current.config.act(l) - 1);
            }
            let accuracy = oracle.evaluate(&probe)?;
            debug!(group = ?group, act_bits = ?probe.act_bits(), accuracy, floor, "activation probe");
            if accuracy < floor {
                break;
            }
            current = Candidate::new(probe, accuracy);
        }
    }

    info!(
        act_bits = ?current.config.act_bits(),
        accuracy = current.accuracy,
        "stage 3A done"
    );
    Ok(Refinement {
        candidate: current,
        share,
        floors,
    })
}

/// Stage 4A: lower routing bits of every layer that iterates routing.
///
/// The whole remaining slack is split evenly over those layers.
pub fn refine_routing<O: AccuracyOracle + ?Sized>(
    oracle: &mut O,
    from: &Candidate,
    layout: &BitLayout,
    budget: &AccuracyBudget,
) -> Result<Refinement> {
    if layout.active_routing.is_empty() {
        warn!("no layers iterate dynamic routing, skipping stage 4A");
        return Ok(Refinement::unchanged(from));
    }

    let slack = from.accuracy - budget.min_accuracy();
    let share = slack / layout.active_routing.len() as f64;
    info!(
        slack,
        share,
        layers = layout.active_routing.len(),
        "stage 4A: dynamic routing refinement"
    );

    let mut current = from.clone();
    let mut floor = from.accuracy;
    let mut floors = Vec::with_capacity(layout.active_routing.len());

    for &k in &layout.active_routing {
        floor -= share;
        floors.push(floor);

        while current.config.dr(k) > REFINE_MIN_BITS {
            let mut probe = current.config.clone();
            probe.set_dr(k, current.config.dr(k) - 1);
            let accuracy = oracle.evaluate(&probe)?;
            debug!(
                layer = layout.dr_positions[k],
                bits = probe.dr(k),
                accuracy,
                floor,
                "routing probe"
            );
            if accuracy < floor {
                break;
            }
            current = Candidate::new(probe, accuracy);
        }
    }

    info!(
        dr_bits = ?current.config.dr_bits(),
        accuracy = current.accuracy,
        "stage 4A done"
    );
    Ok(Refinement {
        candidate: current,
        share,
        floors,
    })
}
