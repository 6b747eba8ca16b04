//! Integration tests for file I/O

use super::*;
use crate::model::LayerDescriptor;
use crate::search::{ArtifactLabel, QuantizationOutcome, SearchResult};
use crate::stats::{ActivationStatistics, WeightStatistics};
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile, TempDir};

fn temp_with_suffix(suffix: &str) -> NamedTempFile {
    Builder::new().suffix(suffix).tempfile().unwrap()
}

fn layers() -> Vec<LayerDescriptor> {
    vec![
        LayerDescriptor::new(0, "conv1", 100),
        LayerDescriptor::new(1, "digitcaps", 300).with_routing(3),
    ]
}

fn result(bits: u32, accuracy: f64) -> SearchResult {
    SearchResult {
        weight_bits: vec![bits, bits],
        act_bits: vec![8, 8],
        dr_bits: vec![6],
        accuracy,
        memory_bits: 400 * bits as u64,
        memory_reduction: 32.0 / bits as f64,
    }
}

#[test]
fn test_tradeoff_writes_two_artifacts() {
    let dir = TempDir::new().unwrap();
    let outcome = QuantizationOutcome::Tradeoff {
        memory_optimal: result(2, 91.0),
        accuracy_optimal: result(5, 98.0),
    };

    let paths = save_outcome(
        &outcome,
        &layers(),
        Path::new("trained/DeepCaps_cifar10.pt"),
        Some(dir.path()),
        FileFormat::Json,
    )
    .unwrap();

    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("DeepCaps_cifar10_quantized_memory.json"));
    assert!(paths[1].ends_with("DeepCaps_cifar10_quantized_accuracy.json"));

    let memory: QuantizedArtifact = load_document(&paths[0]).unwrap();
    assert_eq!(memory.label, ArtifactLabel::Memory);
    assert_eq!(memory.layers[0].weight_bits, 2);
    assert_eq!(memory.layers[1].dr_bits, Some(6));
    assert_eq!(memory.accuracy, 91.0);
}

#[test]
fn test_satisfied_yaml_artifact() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("nested");
    let outcome = QuantizationOutcome::Satisfied(result(4, 99.1));

    let paths = save_outcome(&outcome, &layers(), Path::new("m.pt"), Some(&out), FileFormat::Yaml)
        .unwrap();

    assert_eq!(paths, vec![out.join("m_quantized_satisfied.yaml")]);
    let artifact: QuantizedArtifact = load_document(&paths[0]).unwrap();
    assert_eq!(artifact.memory_bits, 1600);
    assert!(!artifact.created_at.is_empty());
}

#[test]
fn test_load_statistics_yaml_and_json() {
    let mut weights = temp_with_suffix(".yaml");
    writeln!(
        weights,
        "conv1.weight: {{range: 0.8, std: 0.01, sqnr: 41.5}}\ndigitcaps.weight: {{range: 0.3, std: 0.05, sqnr: 20.0}}"
    )
    .unwrap();
    let stats: WeightStatistics = load_document(weights.path()).unwrap();
    assert_eq!(stats.get("conv1.weight").map(|s| s.sqnr), Some(41.5));

    let mut acts = temp_with_suffix(".json");
    write!(
        acts,
        r#"{{"scaling_factors": [1.0, 2.0, 3.0], "sqnr": [{{"layer": "conv1", "sqnr": 12.0}}]}}"#
    )
    .unwrap();
    let stats: ActivationStatistics = load_document(acts.path()).unwrap();
    assert_eq!(stats.scaling_factors.len(), 3);
    assert_eq!(stats.sqnr[0].layer, "conv1");
}

#[test]
fn test_unknown_extension_rejected() {
    let file = temp_with_suffix(".pt");
    let err = load_document::<WeightStatistics>(file.path()).unwrap_err();
    assert!(matches!(err, crate::Error::Serialization(_)));
}
