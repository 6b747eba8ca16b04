//! End-to-end scenarios for the four-stage search against synthetic oracles.

use qcapsnets::model::LayerDescriptor;
use qcapsnets::oracle::from_fn;
use qcapsnets::search::{
    BitConfiguration, QCapsNets, QuantizationOutcome, SearchSettings, Stage,
};
use qcapsnets::sensitivity::SensitivityRanking;
use qcapsnets::Error;

const MIN_ACC: f64 = 94.05;

/// Ten layers of 100 weights; the last one iterates dynamic routing.
fn layers() -> Vec<LayerDescriptor> {
    (0..10)
        .map(|i| {
            let layer = LayerDescriptor::new(i, format!("layer{i}"), 100);
            if i == 9 {
                layer.with_routing(3)
            } else {
                layer
            }
        })
        .collect()
}

/// Layers 0..5 are the most tolerant to weight quantization.
fn ranking() -> SensitivityRanking {
    let weight_sqnr: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
    let act_sqnr: Vec<(usize, f64)> = (0..10).map(|i| (i, i as f64)).collect();
    SensitivityRanking::new(&weight_sqnr, &act_sqnr)
}

fn search(budget_bits: u64) -> QCapsNets {
    let settings = SearchSettings {
        top_accuracy: 99.0,
        accuracy_tolerance: 5.0,
        memory_budget_mb: 1.0,
    };
    QCapsNets::new(layers(), ranking(), &settings)
        .unwrap()
        .with_memory_bits(budget_bits)
}

/// `60 + 1.5 b` where `b` is the narrowest weight width among `layers`
fn linear_in(layers: std::ops::Range<usize>) -> impl FnMut(&BitConfiguration) -> f64 {
    move |c: &BitConfiguration| {
        let b = layers.clone().map(|i| c.weight(i)).min().unwrap_or(32);
        (60.0 + 1.5 * b as f64).min(100.0)
    }
}

#[test]
fn test_linear_response_full_pipeline() {
    let report = search(26 * 1000).run(from_fn(linear_in(0..10))).unwrap();

    let uniform = report.stage(Stage::Uniform).unwrap();
    assert_eq!(uniform.weight_bits, vec![26; 10]);
    assert_eq!(uniform.evaluations, 6);

    match &report.outcome {
        QuantizationOutcome::Satisfied(result) => {
            assert_eq!(result.weight_bits, vec![26; 10]);
            // the oracle ignores activations and routing
            assert_eq!(result.act_bits, vec![3; 10]);
            assert_eq!(result.dr_bits, vec![3]);
            assert_eq!(result.accuracy, 99.0);
            assert_eq!(result.memory_bits, 26_000);
            assert!((result.memory_reduction - 32.0 / 26.0).abs() < 1e-12);
        }
        other => panic!("expected satisfied outcome, got {other:?}"),
    }
    assert_eq!(report.stage(Stage::Memory).unwrap().evaluations, 1);
}

#[test]
fn test_exact_minimum_budget_satisfied_at_one_bit() {
    let report = search(1000).run(from_fn(|_: &BitConfiguration| 95.0)).unwrap();

    let memory = report.stage(Stage::Memory).unwrap();
    assert_eq!(memory.weight_bits, vec![1; 10]);
    assert_eq!(memory.evaluations, 1);
    assert!(report.outcome.is_satisfied());
}

#[test]
fn test_exact_minimum_budget_branches() {
    let report = search(1000).run(from_fn(linear_in(0..10))).unwrap();

    let artifacts = report.outcome.artifacts();
    assert_eq!(artifacts.len(), 2);
    match &report.outcome {
        QuantizationOutcome::Tradeoff {
            memory_optimal,
            accuracy_optimal,
        } => {
            assert_eq!(memory_optimal.weight_bits, vec![1; 10]);
            assert_eq!(memory_optimal.memory_bits, 1000);
            assert!(memory_optimal.accuracy < MIN_ACC);

            // raised from 1 to 23, the first width reaching 94.05
            assert_eq!(accuracy_optimal.weight_bits, vec![23; 10]);
            assert!(accuracy_optimal.accuracy >= MIN_ACC);
            assert!(accuracy_optimal.memory_bits > 1000);
        }
        other => panic!("expected trade-off, got {other:?}"),
    }
    // Stages 3A and 4A do not run on a trade-off
    assert!(report.stage(Stage::Activation).is_none());
    assert_eq!(report.trace.count_for(Stage::Activation), 0);
}

#[test]
fn test_lower_phase_follows_weight_rank() {
    // only layers 5..10 matter; 0..5 rank first and drop to 1 bit
    let budget = 20_000;
    let report = search(budget).run(from_fn(linear_in(5..10))).unwrap();

    match &report.outcome {
        QuantizationOutcome::Satisfied(result) => {
            assert_eq!(&result.weight_bits[..2], &[1, 1]);
            assert_eq!(&result.weight_bits[2..], &[23; 8]);
            assert!(result.memory_bits <= budget);
            assert_eq!(
                result.memory_bits,
                result.weight_bits.iter().map(|&b| b as u64 * 100).sum::<u64>()
            );
        }
        other => panic!("expected satisfied outcome, got {other:?}"),
    }
}

#[test]
fn test_infeasible_budget_is_fatal() {
    let err = search(999)
        .run(from_fn(|_: &BitConfiguration| 99.0))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MemoryBudgetInfeasible {
            budget_bits: 999,
            required_bits: 1000
        }
    ));
    assert!(err.to_string().contains("increase it to"));
}

#[test]
fn test_rerun_is_identical() {
    let first = search(20_000).run(from_fn(linear_in(5..10))).unwrap();
    let second = search(20_000).run(from_fn(linear_in(5..10))).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_trace_matches_stage_counts() {
    let report = search(20_000).run(from_fn(linear_in(5..10))).unwrap();
    let per_stage: usize = report.stages.iter().map(|s| s.evaluations).sum();
    assert_eq!(per_stage, report.evaluations());
    for (i, evaluation) in report.trace.iter().enumerate() {
        assert_eq!(evaluation.id, i);
    }
}
