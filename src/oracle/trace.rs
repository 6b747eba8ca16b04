//! Evaluation history
//!
//! Every oracle call made during a search is kept, in call order, together
//! with the stage that requested it.

use super::AccuracyOracle;
use crate::search::{BitConfiguration, Stage};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One oracle call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Call number, starting at 0
    pub id: usize,
    /// Stage that requested the evaluation
    pub stage: Stage,
    /// Evaluated configuration
    pub config: BitConfiguration,
    /// Measured accuracy (percent)
    pub accuracy: f64,
}

/// Ordered record of oracle calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTrace {
    evaluations: Vec<Evaluation>,
}

impl EvaluationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter()
    }

    /// Number of evaluations requested by `stage`
    pub fn count_for(&self, stage: Stage) -> usize {
        self.evaluations.iter().filter(|e| e.stage == stage).count()
    }

    fn push(&mut self, stage: Stage, config: &BitConfiguration, accuracy: f64) {
        let id = self.evaluations.len();
        self.evaluations.push(Evaluation {
            id,
            stage,
            config: config.clone(),
            accuracy,
        });
    }
}

/// Oracle wrapper that logs and records each evaluation
pub struct TracedOracle<O> {
    inner: O,
    stage: Stage,
    trace: EvaluationTrace,
}

impl<O: AccuracyOracle> TracedOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            stage: Stage::Uniform,
            trace: EvaluationTrace::new(),
        }
    }

    /// Attribute subsequent evaluations to `stage`
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn into_trace(self) -> EvaluationTrace {
        self.trace
    }
}

impl<O: AccuracyOracle> AccuracyOracle for TracedOracle<O> {
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        let accuracy = self.inner.evaluate(config)?;
        debug!(
            stage = %self.stage,
            weight_bits = ?config.weight_bits(),
            act_bits = ?config.act_bits(),
            dr_bits = ?config.dr_bits(),
            accuracy,
            "evaluated candidate"
        );
        self.trace.push(self.stage, config, accuracy);
        Ok(accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::from_fn;
    use crate::search::BitLayout;

    #[test]
    fn test_trace_records_stage_and_order() {
        let layout = BitLayout {
            num_layers: 2,
            dr_positions: vec![],
            active_routing: vec![],
        };
        let mut oracle = TracedOracle::new(from_fn(|c: &BitConfiguration| c.weight(0) as f64));
        oracle.evaluate(&layout.uniform(32)).unwrap();
        oracle.set_stage(Stage::Memory);
        oracle.evaluate(&layout.uniform(4)).unwrap();

        let trace = oracle.into_trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.count_for(Stage::Uniform), 1);
        assert_eq!(trace.count_for(Stage::Memory), 1);
        let last = trace.iter().last().unwrap();
        assert_eq!(last.id, 1);
        assert_eq!(last.accuracy, 4.0);
    }
}
