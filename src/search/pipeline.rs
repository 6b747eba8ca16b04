//! Pipeline driver
//!
//! [`QCapsNets`] holds everything derived once from the full-precision model
//! (layers, memory summary, sensitivity ranking, budgets) and runs the four
//! stages against an oracle.

use super::memory::MemoryOutcome;
use super::{
    memory_search, refine_activations, refine_routing, uniform_search, AccuracyBudget, BitLayout,
    Candidate, MemoryBudget, QuantizationOutcome, QuantizationReport, SearchResult, Stage,
    StageReport,
};
use crate::model::{LayerDescriptor, ModelSummary};
use crate::oracle::{AccuracyOracle, TracedOracle};
use crate::quant::{lookup_scheme, QuantScheme};
use crate::sensitivity::SensitivityRanking;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Accuracy and memory targets of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Full-precision accuracy (percent)
    pub top_accuracy: f64,
    /// Allowed accuracy loss, percent of `top_accuracy`
    pub accuracy_tolerance: f64,
    /// Weight memory budget in MB
    pub memory_budget_mb: f64,
}

/// Q-CapsNets search over a fixed model description
#[derive(Debug, Clone)]
pub struct QCapsNets {
    layers: Vec<LayerDescriptor>,
    layout: BitLayout,
    summary: ModelSummary,
    ranking: SensitivityRanking,
    accuracy: AccuracyBudget,
    memory: MemoryBudget,
}

impl QCapsNets {
    /// Validate the ranking against the layers and derive the budgets
    pub fn new(
        layers: Vec<LayerDescriptor>,
        ranking: SensitivityRanking,
        settings: &SearchSettings,
    ) -> Result<Self> {
        check_layers(&layers)?;
        check_ranking(&ranking, layers.len())?;
        Ok(Self {
            layout: BitLayout::from_layers(&layers),
            summary: ModelSummary::from_layers(&layers),
            accuracy: AccuracyBudget::new(settings.top_accuracy, settings.accuracy_tolerance)?,
            memory: MemoryBudget::from_mb(settings.memory_budget_mb)?,
            layers,
            ranking,
        })
    }

    /// Override the memory budget with an exact bit count
    pub fn with_memory_bits(mut self, budget_bits: u64) -> Self {
        self.memory = MemoryBudget::from_bits(budget_bits);
        self
    }

    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn layout(&self) -> &BitLayout {
        &self.layout
    }

    pub fn summary(&self) -> &ModelSummary {
        &self.summary
    }

    pub fn ranking(&self) -> &SensitivityRanking {
        &self.ranking
    }

    pub fn accuracy_budget(&self) -> &AccuracyBudget {
        &self.accuracy
    }

    pub fn memory_budget(&self) -> &MemoryBudget {
        &self.memory
    }

    /// Run all stages.
    ///
    /// Stages 3A and 4A only run when Stage 2 meets both constraints.
    pub fn run<O: AccuracyOracle>(&self, oracle: O) -> Result<QuantizationReport> {
        // Fail before spending any evaluations on Stage 1
        self.memory.check_feasible(self.summary.min_required_bits())?;

        info!(
            layers = self.layers.len(),
            routing_layers = self.layout.dr_positions.len(),
            baseline_mb = self.summary.baseline_mb(),
            min_accuracy = self.accuracy.min_accuracy(),
            "starting Q-CapsNets search"
        );

        let mut oracle = TracedOracle::new(oracle);
        let mut stages: Vec<(Stage, Candidate)> = Vec::with_capacity(4);

        oracle.set_stage(Stage::Uniform);
        let uniform = uniform_search(&mut oracle, &self.layout, &self.accuracy)?;
        stages.push((Stage::Uniform, uniform.candidate.clone()));

        oracle.set_stage(Stage::Memory);
        let memory = memory_search(
            &mut oracle,
            &uniform.candidate,
            &self.summary,
            &self.ranking.weight_rank,
            &self.memory,
            &self.accuracy,
        )?;

        let outcome = match memory.outcome {
            MemoryOutcome::Tradeoff {
                memory_optimal,
                accuracy_optimal,
            } => {
                stages.push((Stage::Memory, accuracy_optimal.clone()));
                QuantizationOutcome::Tradeoff {
                    memory_optimal: self.result(&memory_optimal),
                    accuracy_optimal: self.result(&accuracy_optimal),
                }
            }
            MemoryOutcome::Satisfied(fitted) => {
                stages.push((Stage::Memory, fitted.clone()));

                oracle.set_stage(Stage::Activation);
                let activations = refine_activations(
                    &mut oracle,
                    &fitted,
                    &self.ranking.act_groups,
                    &self.accuracy,
                )?;
                stages.push((Stage::Activation, activations.candidate.clone()));

                oracle.set_stage(Stage::Routing);
                let routing = refine_routing(
                    &mut oracle,
                    &activations.candidate,
                    &self.layout,
                    &self.accuracy,
                )?;
                stages.push((Stage::Routing, routing.candidate.clone()));

                QuantizationOutcome::Satisfied(self.result(&routing.candidate))
            }
        };

        let trace = oracle.into_trace();
        let stages = stages
            .iter()
            .map(|(stage, candidate)| StageReport::new(*stage, candidate, &trace))
            .collect();

        for (label, result) in outcome.artifacts() {
            info!(
                %label,
                weight_bits = ?result.weight_bits,
                act_bits = ?result.act_bits,
                dr_bits = ?result.dr_bits,
                accuracy = result.accuracy,
                memory_reduction = result.memory_reduction,
                "search finished"
            );
        }
        info!(evaluations = trace.len(), "oracle calls");

        Ok(QuantizationReport {
            outcome,
            stages,
            trace,
        })
    }

    fn result(&self, candidate: &Candidate) -> SearchResult {
        SearchResult::from_candidate(candidate, &self.summary)
    }
}

/// Look up `scheme`, build the oracle with it, and run the search.
///
/// An unknown scheme is rejected before any layer is evaluated.
pub fn quantize<O, F>(
    layers: Vec<LayerDescriptor>,
    ranking: SensitivityRanking,
    settings: &SearchSettings,
    scheme: &str,
    build_oracle: F,
) -> Result<QuantizationReport>
where
    O: AccuracyOracle,
    F: FnOnce(&'static dyn QuantScheme) -> Result<O>,
{
    let scheme = lookup_scheme(scheme)?;
    let search = QCapsNets::new(layers, ranking, settings)?;
    let oracle = build_oracle(scheme)?;
    search.run(oracle)
}

fn check_layers(layers: &[LayerDescriptor]) -> Result<()> {
    match layers.iter().enumerate().find(|(i, l)| l.index != *i) {
        Some((i, layer)) => Err(Error::InvalidParameter(format!(
            "layer {} has index {} but sits at position {i}",
            layer.name, layer.index
        ))),
        None => Ok(()),
    }
}

fn check_ranking(ranking: &SensitivityRanking, num_layers: usize) -> Result<()> {
    if ranking.weight_rank.len() != num_layers {
        return Err(Error::Alignment {
            what: "weight rank",
            expected: num_layers,
            got: ranking.weight_rank.len(),
        });
    }
    let mut seen = vec![false; num_layers];
    for &layer in &ranking.weight_rank {
        match seen.get_mut(layer) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(Error::InvalidParameter(format!(
                    "weight rank is not a permutation of the layers (index {layer})"
                )))
            }
        }
    }
    let mut grouped = vec![false; num_layers];
    for &layer in ranking.act_groups.iter().flatten() {
        match grouped.get_mut(layer) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(Error::InvalidParameter(format!(
                    "activation layer {layer} appears in more than one group"
                )))
            }
            None => {
                return Err(Error::InvalidParameter(format!(
                    "activation group names layer {layer}, model has {num_layers}"
                )))
            }
        }
    }
    Ok(())
}
