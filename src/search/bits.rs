//! Per-layer bit-width assignments
//!
//! `weight_bits` and `act_bits` hold one entry per leaf layer. `dr_bits`
//! lives in the sparser dynamic-routing index space: entry `k` belongs to
//! layer `dr_positions[k]`.

use crate::model::{routing_positions, LayerDescriptor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of a bit configuration, derived once from the layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitLayout {
    /// Number of leaf layers
    pub num_layers: usize,
    /// Layer index of each dynamic-routing entry
    pub dr_positions: Vec<usize>,
    /// Dynamic-routing entries whose layer iterates routing more than once
    pub active_routing: Vec<usize>,
}

impl BitLayout {
    pub fn from_layers(layers: &[LayerDescriptor]) -> Self {
        let dr_positions = routing_positions(layers);
        let active_routing = dr_positions
            .iter()
            .enumerate()
            .filter(|(_, &layer)| layers.get(layer).is_some_and(LayerDescriptor::routing_active))
            .map(|(k, _)| k)
            .collect();
        Self {
            num_layers: layers.len(),
            dr_positions,
            active_routing,
        }
    }

    /// Every layer and every routing entry at `bits`
    pub fn uniform(&self, bits: u32) -> BitConfiguration {
        BitConfiguration {
            weight_bits: vec![bits; self.num_layers],
            act_bits: vec![bits; self.num_layers],
            dr_bits: vec![bits; self.dr_positions.len()],
        }
    }
}

/// Weight, activation and dynamic-routing bit-widths
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitConfiguration {
    weight_bits: Vec<u32>,
    act_bits: Vec<u32>,
    dr_bits: Vec<u32>,
}

impl BitConfiguration {
    /// Build from explicit vectors, checking the alignment invariant
    pub fn new(
        layout: &BitLayout,
        weight_bits: Vec<u32>,
        act_bits: Vec<u32>,
        dr_bits: Vec<u32>,
    ) -> Result<Self> {
        let config = Self {
            weight_bits,
            act_bits,
            dr_bits,
        };
        config.check_layout(layout)?;
        Ok(config)
    }

    /// Verify the vectors match `layout`
    pub fn check_layout(&self, layout: &BitLayout) -> Result<()> {
        if self.weight_bits.len() != layout.num_layers {
            return Err(Error::Alignment {
                what: "weight bits",
                expected: layout.num_layers,
                got: self.weight_bits.len(),
            });
        }
        if self.act_bits.len() != layout.num_layers {
            return Err(Error::Alignment {
                what: "activation bits",
                expected: layout.num_layers,
                got: self.act_bits.len(),
            });
        }
        if self.dr_bits.len() != layout.dr_positions.len() {
            return Err(Error::Alignment {
                what: "dynamic routing bits",
                expected: layout.dr_positions.len(),
                got: self.dr_bits.len(),
            });
        }
        Ok(())
    }

    pub fn weight_bits(&self) -> &[u32] {
        &self.weight_bits
    }

    pub fn act_bits(&self) -> &[u32] {
        &self.act_bits
    }

    pub fn dr_bits(&self) -> &[u32] {
        &self.dr_bits
    }

    pub fn num_layers(&self) -> usize {
        debug_assert_eq!(self.weight_bits.len(), self.act_bits.len());
        self.weight_bits.len()
    }

    pub fn weight(&self, layer: usize) -> u32 {
        self.weight_bits[layer]
    }

    pub fn set_weight(&mut self, layer: usize, bits: u32) {
        self.weight_bits[layer] = bits;
    }

    /// Set every layer's weight bit-width
    pub fn set_all_weights(&mut self, bits: u32) {
        self.weight_bits.iter_mut().for_each(|b| *b = bits);
    }

    /// Raise every layer's weight bit-width by one, saturating at `max`
    pub fn raise_all_weights(&mut self, max: u32) {
        self.weight_bits.iter_mut().for_each(|b| *b = (*b + 1).min(max));
    }

    pub fn act(&self, layer: usize) -> u32 {
        self.act_bits[layer]
    }

    pub fn set_act(&mut self, layer: usize, bits: u32) {
        self.act_bits[layer] = bits;
    }

    /// Routing bit-width of dynamic-routing entry `k`
    pub fn dr(&self, k: usize) -> u32 {
        self.dr_bits[k]
    }

    pub fn set_dr(&mut self, k: usize, bits: u32) {
        self.dr_bits[k] = bits;
    }

    /// Routing bit-width of a layer, if the layer carries routing bits
    pub fn dr_for_layer(&self, layout: &BitLayout, layer: usize) -> Option<u32> {
        layout
            .dr_positions
            .iter()
            .position(|&p| p == layer)
            .map(|k| self.dr_bits[k])
    }

    /// Smallest bit-width anywhere in the configuration
    pub fn min_bits(&self) -> Option<u32> {
        self.weight_bits
            .iter()
            .chain(&self.act_bits)
            .chain(&self.dr_bits)
            .copied()
            .min()
    }
}
