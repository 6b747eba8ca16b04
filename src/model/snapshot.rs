//! Full-precision weight arena
//!
//! Quantization error must never compound across evaluations, so each
//! candidate is quantized from the pristine weights into a scratch copy that
//! is overwritten on the next call.

use super::layer::LayerDescriptor;
use crate::quant::QuantScheme;
use crate::{Error, Result};
use ndarray::Array1;
use std::collections::BTreeMap;

/// One weight tensor with its clipping scale
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    /// Local parameter name (e.g. "weight")
    pub name: String,
    /// Flattened values
    pub values: Array1<f32>,
    /// Scale factor used for quantization
    pub scale: f32,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, values: Vec<f32>, scale: f32) -> Self {
        Self {
            name: name.into(),
            values: Array1::from(values),
            scale,
        }
    }
}

/// Weight tensors of one leaf layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerWeights {
    pub name: String,
    pub tensors: Vec<NamedTensor>,
}

impl LayerWeights {
    pub fn tensor(&self, name: &str) -> Option<&NamedTensor> {
        self.tensors.iter().find(|t| t.name == name)
    }
}

/// Immutable full-precision weights plus a per-call scratch buffer
#[derive(Debug, Clone)]
pub struct WeightSnapshot {
    pristine: Vec<LayerWeights>,
    scratch: Vec<LayerWeights>,
}

impl WeightSnapshot {
    pub fn new(layers: Vec<LayerWeights>) -> Self {
        let scratch = layers.clone();
        Self {
            pristine: layers,
            scratch,
        }
    }

    /// Assemble a snapshot for `layers` from flat tensors keyed by
    /// fully-qualified parameter name, using the resolved weight scales.
    pub fn from_tensors(
        layers: &[LayerDescriptor],
        tensors: &BTreeMap<String, Vec<f32>>,
        scales: &BTreeMap<String, f32>,
    ) -> Result<Self> {
        let weights = layers
            .iter()
            .map(|layer| {
                let tensors = layer
                    .weight_parameters
                    .iter()
                    .map(|param| {
                        let key = layer.parameter_key(param);
                        let values = tensors
                            .get(&key)
                            .ok_or_else(|| Error::MissingStatistics(format!("weights for {key}")))?;
                        let scale = scales
                            .get(&key)
                            .ok_or_else(|| Error::MissingStatistics(format!("scale for {key}")))?;
                        Ok(NamedTensor::new(param.clone(), values.clone(), *scale))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(LayerWeights {
                    name: layer.name.clone(),
                    tensors,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(weights))
    }

    pub fn num_layers(&self) -> usize {
        self.pristine.len()
    }

    /// Full-precision weights
    pub fn pristine(&self) -> &[LayerWeights] {
        &self.pristine
    }

    /// Quantize every layer from its pristine weights at `weight_bits[i]`
    pub fn requantize(
        &mut self,
        weight_bits: &[u32],
        scheme: &dyn QuantScheme,
    ) -> Result<&[LayerWeights]> {
        if weight_bits.len() != self.pristine.len() {
            return Err(Error::Alignment {
                what: "weight bits vs snapshot layers",
                expected: self.pristine.len(),
                got: weight_bits.len(),
            });
        }

        for ((source, target), &bits) in self.pristine.iter().zip(&mut self.scratch).zip(weight_bits)
        {
            for (src, dst) in source.tensors.iter().zip(&mut target.tensors) {
                dst.values.assign(&src.values);
                match dst.values.as_slice_mut() {
                    Some(values) => scheme.quantize_inplace(values, src.scale, bits),
                    None => {
                        let quantized = scheme.quantize(&src.values.to_vec(), src.scale, bits);
                        dst.values = Array1::from(quantized);
                    }
                }
            }
        }

        Ok(&self.scratch)
    }
}
