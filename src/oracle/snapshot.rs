//! In-process oracle over a pristine weight snapshot

use super::{checked_accuracy, AccuracyOracle};
use crate::model::{LayerWeights, WeightSnapshot};
use crate::quant::QuantScheme;
use crate::search::{BitConfiguration, BitLayout};
use crate::{Error, Result};

/// Activation and routing quantization handed to the model for one pass.
///
/// `scales[0]` and `act_bits[0]` quantize the network input; the output of
/// layer `i` is quantized with `scales[i + 1]` and `act_bits[i]`.
#[derive(Debug, Clone, Copy)]
pub struct ActivationPrecision<'a> {
    pub scheme: &'a dyn QuantScheme,
    pub scales: &'a [f32],
    pub act_bits: &'a [u32],
    pub dr_bits: &'a [u32],
    pub dr_positions: &'a [usize],
}

impl<'a> ActivationPrecision<'a> {
    pub fn quantize_input(&self, values: &mut [f32]) {
        if let (Some(&scale), Some(&bits)) = (self.scales.first(), self.act_bits.first()) {
            self.scheme.quantize_inplace(values, scale, bits);
        }
    }

    pub fn quantize_layer_output(&self, layer: usize, values: &mut [f32]) {
        if let (Some(&scale), Some(&bits)) = (self.scales.get(layer + 1), self.act_bits.get(layer))
        {
            self.scheme.quantize_inplace(values, scale, bits);
        }
    }

    /// Routing bit-width of `layer`, if it carries dynamic routing
    pub fn routing_bits(&self, layer: usize) -> Option<u32> {
        self.dr_positions
            .iter()
            .position(|&p| p == layer)
            .and_then(|k| self.dr_bits.get(k).copied())
    }

    /// Quantize intermediate routing values of `layer` with its output scale
    pub fn quantize_routing(&self, layer: usize, values: &mut [f32]) {
        if let (Some(bits), Some(&scale)) = (self.routing_bits(layer), self.scales.get(layer + 1)) {
            self.scheme.quantize_inplace(values, scale, bits);
        }
    }
}

/// Forward pass over the validation set
pub trait InferenceModel {
    /// Accuracy in percent with the given quantized weights and activation
    /// precision
    fn accuracy(
        &mut self,
        weights: &[LayerWeights],
        activations: &ActivationPrecision<'_>,
    ) -> Result<f64>;
}

/// Oracle that requantizes from pristine weights on every call
pub struct SnapshotOracle<M> {
    model: M,
    snapshot: WeightSnapshot,
    scheme: &'static dyn QuantScheme,
    act_scales: Vec<f32>,
    layout: BitLayout,
}

impl<M: InferenceModel> SnapshotOracle<M> {
    pub fn new(
        model: M,
        snapshot: WeightSnapshot,
        scheme: &'static dyn QuantScheme,
        act_scales: Vec<f32>,
        layout: BitLayout,
    ) -> Result<Self> {
        if snapshot.num_layers() != layout.num_layers {
            return Err(Error::Alignment {
                what: "snapshot layers",
                expected: layout.num_layers,
                got: snapshot.num_layers(),
            });
        }
        if act_scales.len() != layout.num_layers + 1 {
            return Err(Error::Alignment {
                what: "activation scaling factors (input + layers)",
                expected: layout.num_layers + 1,
                got: act_scales.len(),
            });
        }
        Ok(Self {
            model,
            snapshot,
            scheme,
            act_scales,
            layout,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: InferenceModel> AccuracyOracle for SnapshotOracle<M> {
    fn evaluate(&mut self, config: &BitConfiguration) -> Result<f64> {
        config.check_layout(&self.layout)?;
        let weights = self.snapshot.requantize(config.weight_bits(), self.scheme)?;
        let precision = ActivationPrecision {
            scheme: self.scheme,
            scales: &self.act_scales,
            act_bits: config.act_bits(),
            dr_bits: config.dr_bits(),
            dr_positions: &self.layout.dr_positions,
        };
        checked_accuracy(self.model.accuracy(weights, &precision)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NamedTensor;
    use crate::quant::RoundToNearest;

    /// Scores by how far the quantized weights drift from the originals
    struct DriftModel {
        reference: Vec<f32>,
        calls: usize,
    }

    impl InferenceModel for DriftModel {
        fn accuracy(
            &mut self,
            weights: &[LayerWeights],
            activations: &ActivationPrecision<'_>,
        ) -> Result<f64> {
            self.calls += 1;
            let drift: f32 = weights[0].tensors[0]
                .values
                .iter()
                .zip(&self.reference)
                .map(|(q, r)| (q - r).abs())
                .sum();
            let mut input = vec![0.37f32];
            activations.quantize_input(&mut input);
            Ok((100.0 - 100.0 * drift as f64).max(0.0) - (0.37 - input[0] as f64).abs())
        }
    }

    fn oracle() -> SnapshotOracle<DriftModel> {
        let values = vec![0.3, -0.7, 0.55];
        let snapshot = WeightSnapshot::new(vec![LayerWeights {
            name: "fc".into(),
            tensors: vec![NamedTensor::new("weight", values.clone(), 1.0)],
        }]);
        let layout = BitLayout {
            num_layers: 1,
            dr_positions: vec![],
            active_routing: vec![],
        };
        SnapshotOracle::new(
            DriftModel {
                reference: values,
                calls: 0,
            },
            snapshot,
            &RoundToNearest,
            vec![1.0, 1.0],
            layout,
        )
        .unwrap()
    }

    #[test]
    fn test_repeated_evaluation_is_deterministic() {
        let mut oracle = oracle();
        let layout = oracle.layout.clone();
        let coarse = oracle.evaluate(&layout.uniform(2)).unwrap();
        let fine = oracle.evaluate(&layout.uniform(16)).unwrap();
        let coarse_again = oracle.evaluate(&layout.uniform(2)).unwrap();

        assert_eq!(coarse, coarse_again);
        assert!(fine > coarse);
        assert_eq!(oracle.model().calls, 3);
    }

    #[test]
    fn test_misaligned_config_rejected() {
        let mut oracle = oracle();
        let other = BitLayout {
            num_layers: 2,
            dr_positions: vec![],
            active_routing: vec![],
        };
        assert!(matches!(
            oracle.evaluate(&other.uniform(8)),
            Err(Error::Alignment { .. })
        ));
    }

    #[test]
    fn test_routing_bits_lookup() {
        let scales = [1.0, 2.0, 4.0];
        let precision = ActivationPrecision {
            scheme: &RoundToNearest,
            scales: &scales,
            act_bits: &[8, 8],
            dr_bits: &[5],
            dr_positions: &[1],
        };
        assert_eq!(precision.routing_bits(1), Some(5));
        assert_eq!(precision.routing_bits(0), None);

        let mut values = [1.3f32];
        precision.quantize_routing(0, &mut values);
        assert_eq!(values, [1.3]);
    }
}
