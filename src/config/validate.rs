//! Configuration validation

use super::schema::QuantizeSpec;
use crate::quant::{lookup_scheme, AVAILABLE_SCHEMES};

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid top accuracy: {0} (must be in (0, 100])")]
    InvalidTopAccuracy(f64),

    #[error("Invalid accuracy tolerance: {0} (must be in [0, 100])")]
    InvalidTolerance(f64),

    #[error("Invalid memory budget: {0} MB (must be > 0)")]
    InvalidMemoryBudget(f64),

    #[error("Invalid std multiplier: {0} (must be > 0)")]
    InvalidStdMultiplier(f32),

    #[error("Unknown quantization scheme: {0} (must be one of: {schemes})", schemes = AVAILABLE_SCHEMES.join(", "))]
    UnknownScheme(String),

    #[error("Evaluator command is empty")]
    EmptyEvaluatorCommand,
}

/// Validate a search configuration
///
/// Checks:
/// - Accuracy, tolerance and budget are in range
/// - The scheme is registered
/// - An evaluator command is given
pub fn validate_config(spec: &QuantizeSpec) -> Result<(), ValidationError> {
    let search = &spec.search;

    if !(search.top_accuracy > 0.0 && search.top_accuracy <= 100.0) {
        return Err(ValidationError::InvalidTopAccuracy(search.top_accuracy));
    }

    if !(0.0..=100.0).contains(&search.accuracy_tolerance) {
        return Err(ValidationError::InvalidTolerance(search.accuracy_tolerance));
    }

    if !(search.memory_budget_mb.is_finite() && search.memory_budget_mb > 0.0) {
        return Err(ValidationError::InvalidMemoryBudget(search.memory_budget_mb));
    }

    if !(search.std_multiplier.is_finite() && search.std_multiplier > 0.0) {
        return Err(ValidationError::InvalidStdMultiplier(search.std_multiplier));
    }

    if lookup_scheme(&search.scheme).is_err() {
        return Err(ValidationError::UnknownScheme(search.scheme.clone()));
    }

    if spec.evaluator.command.first().map_or(true, |p| p.trim().is_empty()) {
        return Err(ValidationError::EmptyEvaluatorCommand);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;
    use std::path::PathBuf;

    fn create_valid_spec() -> QuantizeSpec {
        QuantizeSpec {
            model: ModelRef {
                checkpoint: PathBuf::from("model.pt"),
                topology: PathBuf::from("topology.yaml"),
            },
            statistics: StatisticsRef {
                weights: PathBuf::from("w_info.json"),
                activations: PathBuf::from("a_info.json"),
            },
            search: SearchParams {
                top_accuracy: 99.67,
                accuracy_tolerance: 0.2,
                memory_budget_mb: 0.2,
                scheme: "round_to_nearest".to_string(),
                std_multiplier: 100.0,
            },
            evaluator: EvaluatorSpec {
                command: vec!["python".to_string(), "evaluate.py".to_string()],
            },
            output: OutputSpec::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&create_valid_spec()).is_ok());
    }

    #[test]
    fn test_top_accuracy_bounds() {
        let mut spec = create_valid_spec();
        spec.search.top_accuracy = 0.0;
        assert_eq!(
            validate_config(&spec),
            Err(ValidationError::InvalidTopAccuracy(0.0))
        );
        spec.search.top_accuracy = 100.0;
        assert!(validate_config(&spec).is_ok());
        spec.search.top_accuracy = 100.5;
        assert!(validate_config(&spec).is_err());
    }

    #[test]
    fn test_invalid_tolerance() {
        let mut spec = create_valid_spec();
        spec.search.accuracy_tolerance = -1.0;
        assert_eq!(
            validate_config(&spec),
            Err(ValidationError::InvalidTolerance(-1.0))
        );
    }

    #[test]
    fn test_invalid_memory_budget() {
        let mut spec = create_valid_spec();
        spec.search.memory_budget_mb = 0.0;
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidMemoryBudget(_))
        ));
    }

    #[test]
    fn test_unknown_scheme() {
        let mut spec = create_valid_spec();
        spec.search.scheme = "stochastic_rounding".to_string();
        let err = validate_config(&spec).unwrap_err();
        assert!(err.to_string().contains("truncation"));
    }

    #[test]
    fn test_empty_command() {
        let mut spec = create_valid_spec();
        spec.evaluator.command.clear();
        assert_eq!(
            validate_config(&spec),
            Err(ValidationError::EmptyEvaluatorCommand)
        );
    }
}
