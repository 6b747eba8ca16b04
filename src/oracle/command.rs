//! External evaluator process
//!
//! The capsule network and its validation set live outside this crate. The
//! command oracle spawns the configured evaluator once per candidate, writes
//! an [`EvaluationRequest`] as JSON on its stdin, and reads the accuracy back
//! from the last non-empty stdout line, either a bare number or
//! `{"accuracy": <number>}`.

use super::{checked_accuracy, AccuracyOracle};
use crate::model::LayerDescriptor;
use crate::search::{BitConfiguration, BitLayout};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Bit-widths and scale of one layer as seen by the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRequest {
    pub name: String,
    pub weight_bits: u32,
    pub act_bits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr_bits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_scale: Option<f32>,
}

/// Payload written to the evaluator's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PathBuf>,
    pub scheme: String,
    /// Bits used for the network input
    pub input_act_bits: u32,
    /// Activation scaling factors, input first
    pub activation_scales: Vec<f32>,
    pub layers: Vec<LayerRequest>,
}

#[derive(Deserialize)]
struct EvaluatorReply {
    accuracy: f64,
}

/// Oracle delegating every evaluation to an external command
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    scheme: String,
    checkpoint: Option<PathBuf>,
    layers: Vec<LayerDescriptor>,
    layout: BitLayout,
    activation_scales: Vec<f32>,
}

impl CommandOracle {
    /// `command[0]` is the program, the rest its arguments
    pub fn new(
        command: &[String],
        scheme: impl Into<String>,
        layers: Vec<LayerDescriptor>,
        activation_scales: Vec<f32>,
    ) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::ConfigError("evaluator command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            scheme: scheme.into(),
            checkpoint: None,
            layout: BitLayout::from_layers(&layers),
            layers,
            activation_scales,
        })
    }

    pub fn with_checkpoint(mut self, checkpoint: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    /// Request payload for `config`
    pub fn request(&self, config: &BitConfiguration) -> Result<EvaluationRequest> {
        config.check_layout(&self.layout)?;
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerRequest {
                name: layer.name.clone(),
                weight_bits: config.weight(i),
                act_bits: config.act(i),
                dr_bits: config.dr_for_layer(&self.layout, i),
                weight_scale: layer.weight_scale_factor,
            })
            .collect();
        Ok(EvaluationRequest {
            checkpoint: self.checkpoint.clone(),
            scheme: self.scheme.clone(),
            input_act_bits: config.act_bits().first().copied().unwrap_or(0),
            activation_scales: self.activation_scales.clone(),
            layers,
        })
    }
}

impl AccuracyOracle for CommandOracle {
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        let payload = serde_json::to_vec(&self.request(config)?)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Evaluation(format!("failed to run {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .map_err(|e| Error::Evaluation(format!("failed to write request: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Evaluation(format!("evaluator did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Evaluation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_accuracy(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Read the accuracy from the evaluator's stdout
pub fn parse_accuracy(stdout: &str) -> Result<f64> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| Error::Evaluation("evaluator printed nothing".into()))?;

    let accuracy = if line.starts_with('{') {
        serde_json::from_str::<EvaluatorReply>(line)
            .map(|r| r.accuracy)
            .map_err(|e| Error::Evaluation(format!("unreadable evaluator reply {line:?}: {e}")))?
    } else {
        line.parse::<f64>()
            .map_err(|e| Error::Evaluation(format!("unreadable evaluator reply {line:?}: {e}")))?
    };
    checked_accuracy(accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> Vec<LayerDescriptor> {
        vec![
            LayerDescriptor::new(0, "conv1", 10),
            LayerDescriptor::new(1, "digitcaps", 20).with_routing(3),
        ]
    }

    #[test]
    fn test_parse_plain_and_json() {
        assert_eq!(parse_accuracy("loading...\n98.5\n").unwrap(), 98.5);
        assert_eq!(parse_accuracy("epoch 1\n{\"accuracy\": 97.25}\n\n").unwrap(), 97.25);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_accuracy(""), Err(Error::Evaluation(_))));
        assert!(matches!(parse_accuracy("done"), Err(Error::Evaluation(_))));
        assert!(matches!(parse_accuracy("101.0"), Err(Error::Evaluation(_))));
        assert!(matches!(parse_accuracy("NaN"), Err(Error::Evaluation(_))));
    }

    #[test]
    fn test_request_maps_routing_bits() {
        let oracle = CommandOracle::new(
            &["python".to_string(), "eval.py".to_string()],
            "round_to_nearest",
            layers(),
            vec![1.0, 2.0, 3.0],
        )
        .unwrap()
        .with_checkpoint("model.pt");
        let layout = BitLayout::from_layers(&layers());
        let mut config = layout.uniform(8);
        config.set_dr(0, 5);

        let request = oracle.request(&config).unwrap();
        assert_eq!(request.layers[0].dr_bits, None);
        assert_eq!(request.layers[1].dr_bits, Some(5));
        assert_eq!(request.input_act_bits, 8);

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["layers"][0].get("dr_bits").is_none());
        assert_eq!(json["checkpoint"], "model.pt");
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = CommandOracle::new(&[], "truncation", layers(), vec![]).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_evaluates_with_shell_command() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat > /dev/null; echo 96.5".to_string(),
        ];
        let mut oracle =
            CommandOracle::new(&command, "truncation", layers(), vec![1.0, 1.0, 1.0]).unwrap();
        let config = BitLayout::from_layers(&layers()).uniform(8);
        assert_eq!(oracle.evaluate(&config).unwrap(), 96.5);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_evaluation_error() {
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let mut oracle = CommandOracle::new(&command, "truncation", layers(), vec![]).unwrap();
        let config = BitLayout::from_layers(&layers()).uniform(8);
        assert!(matches!(oracle.evaluate(&config), Err(Error::Evaluation(_))));
    }
}
