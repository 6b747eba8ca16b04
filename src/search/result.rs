//! Search deliverables

use super::{BitConfiguration, Candidate, Stage};
use crate::model::ModelSummary;
use crate::oracle::EvaluationTrace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A finished configuration with its accuracy and memory footprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub weight_bits: Vec<u32>,
    pub act_bits: Vec<u32>,
    pub dr_bits: Vec<u32>,
    /// Accuracy in percent
    pub accuracy: f64,
    /// `Σ weight_bits[i] * weight_count[i]`
    pub memory_bits: u64,
    /// Baseline bits over `memory_bits`
    pub memory_reduction: f64,
}

impl SearchResult {
    pub fn from_candidate(candidate: &Candidate, summary: &ModelSummary) -> Self {
        let config = &candidate.config;
        Self {
            weight_bits: config.weight_bits().to_vec(),
            act_bits: config.act_bits().to_vec(),
            dr_bits: config.dr_bits().to_vec(),
            accuracy: candidate.accuracy,
            memory_bits: summary.memory_bits(config.weight_bits()),
            memory_reduction: summary.reduction_factor(config.weight_bits()),
        }
    }
}

/// Stable label of a persisted configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLabel {
    /// Fits the memory budget, may miss the accuracy floor
    Memory,
    /// Meets the accuracy floor, may exceed the memory budget
    Accuracy,
    /// Meets both constraints
    Satisfied,
}

impl ArtifactLabel {
    /// Suffix appended to the checkpoint stem
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactLabel::Memory => "memory",
            ArtifactLabel::Accuracy => "accuracy",
            ArtifactLabel::Satisfied => "satisfied",
        }
    }
}

impl fmt::Display for ArtifactLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactLabel::Memory => "memory-optimal",
            ArtifactLabel::Accuracy => "accuracy-optimal",
            ArtifactLabel::Satisfied => "satisfied",
        };
        f.write_str(name)
    }
}

/// Final answer of a search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantizationOutcome {
    /// Accuracy and memory constraints met together
    Satisfied(SearchResult),
    /// Constraints conflict; both trade-off points are reported
    Tradeoff {
        memory_optimal: SearchResult,
        accuracy_optimal: SearchResult,
    },
}

impl QuantizationOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, QuantizationOutcome::Satisfied(_))
    }

    /// Labelled results, in persistence order
    pub fn artifacts(&self) -> Vec<(ArtifactLabel, &SearchResult)> {
        match self {
            QuantizationOutcome::Satisfied(result) => vec![(ArtifactLabel::Satisfied, result)],
            QuantizationOutcome::Tradeoff {
                memory_optimal,
                accuracy_optimal,
            } => vec![
                (ArtifactLabel::Memory, memory_optimal),
                (ArtifactLabel::Accuracy, accuracy_optimal),
            ],
        }
    }
}

/// Configuration in force at the end of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub weight_bits: Vec<u32>,
    pub act_bits: Vec<u32>,
    pub dr_bits: Vec<u32>,
    pub accuracy: f64,
    /// Oracle calls made by this stage
    pub evaluations: usize,
}

impl StageReport {
    pub fn new(stage: Stage, candidate: &Candidate, trace: &EvaluationTrace) -> Self {
        let config: &BitConfiguration = &candidate.config;
        Self {
            stage,
            weight_bits: config.weight_bits().to_vec(),
            act_bits: config.act_bits().to_vec(),
            dr_bits: config.dr_bits().to_vec(),
            accuracy: candidate.accuracy,
            evaluations: trace.count_for(stage),
        }
    }
}

/// Outcome plus per-stage snapshots and the full evaluation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationReport {
    pub outcome: QuantizationOutcome,
    pub stages: Vec<StageReport>,
    pub trace: EvaluationTrace,
}

impl QuantizationReport {
    /// Total oracle calls over the whole run
    pub fn evaluations(&self) -> usize {
        self.trace.len()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}
