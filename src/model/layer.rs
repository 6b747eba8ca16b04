//! Layer hierarchy and the leaf traversal that produces `LayerDescriptor`s
//!
//! A capsule network is described as a tree of named modules. Only leaf
//! modules carry quantizable parameters; every per-layer bit-width vector in
//! the search is indexed by the position of a leaf in the pre-order
//! depth-first traversal produced by [`ModuleNode::leaf_layers`].

use serde::{Deserialize, Serialize};

/// Parameters whose name contains this marker are not weight-quantized.
pub const NORMALIZATION_MARKER: &str = "batchnorm";

/// A named parameter tensor of a leaf layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name local to its layer (e.g. "weight", "batchnorm.bias")
    pub name: String,

    /// Number of scalar elements
    pub numel: usize,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, numel: usize) -> Self {
        Self {
            name: name.into(),
            numel,
        }
    }

    /// Whether this parameter belongs to a normalization sublayer
    pub fn is_normalization(&self) -> bool {
        self.name.contains(NORMALIZATION_MARKER)
    }
}

/// Typed attributes of a quantizable leaf module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafInfo {
    /// Parameter tensors owned by the layer
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,

    /// Whether the layer is a capsule layer
    #[serde(default)]
    pub capsule_layer: bool,

    /// Whether the capsule layer implements dynamic routing
    #[serde(default)]
    pub dynamic_routing: bool,

    /// Routing iterations executed at inference (routing is active when > 1)
    #[serde(default = "default_routing_iterations")]
    pub routing_iterations: usize,
}

fn default_routing_iterations() -> usize {
    1
}

/// A node of the module hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleNode {
    /// Local module name
    pub name: String,

    /// Leaf attributes; `None` for container modules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<LeafInfo>,

    /// Child modules, in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ModuleNode>,
}

impl ModuleNode {
    /// Create a container node
    pub fn container(name: impl Into<String>, children: Vec<ModuleNode>) -> Self {
        Self {
            name: name.into(),
            leaf: None,
            children,
        }
    }

    /// Create a leaf node
    pub fn leaf(name: impl Into<String>, info: LeafInfo) -> Self {
        Self {
            name: name.into(),
            leaf: Some(info),
            children: Vec::new(),
        }
    }

    /// Collect the leaf layers in pre-order depth-first order.
    ///
    /// The root's own name is not part of the dotted path, so a root with a
    /// child `block1` holding a leaf `l1` yields `block1.l1`.
    pub fn leaf_layers(&self) -> Vec<LayerDescriptor> {
        let mut layers = Vec::new();
        if let Some(info) = &self.leaf {
            layers.push(LayerDescriptor::from_leaf(0, self.name.clone(), info));
            return layers;
        }
        for child in &self.children {
            child.collect_leaves("", &mut layers);
        }
        layers
    }

    fn collect_leaves(&self, prefix: &str, out: &mut Vec<LayerDescriptor>) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}.{}", self.name)
        };

        match &self.leaf {
            Some(info) => {
                let index = out.len();
                out.push(LayerDescriptor::from_leaf(index, path, info));
            }
            None => {
                for child in &self.children {
                    child.collect_leaves(&path, out);
                }
            }
        }
    }
}

/// One quantizable leaf layer, produced once by the traversal pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Position in the traversal; index into every per-layer vector
    pub index: usize,

    /// Dotted path of the layer (e.g. "block1.l1")
    pub name: String,

    /// Scalar weights subject to weight quantization
    pub weight_count: u64,

    /// All scalar parameters, normalization included
    pub parameter_count: u64,

    /// Capsule layer with a dynamic routing stage
    pub is_capsule_with_routing: bool,

    /// Routing iterations executed at inference
    pub routing_iterations: usize,

    /// Scale factor of the layer's `weight` tensor, filled from statistics
    #[serde(default)]
    pub weight_scale_factor: Option<f32>,

    /// Local names of the weight-quantized parameters
    #[serde(default)]
    pub weight_parameters: Vec<String>,
}

impl LayerDescriptor {
    /// Plain layer with `weight_count` weights and no routing
    pub fn new(index: usize, name: impl Into<String>, weight_count: u64) -> Self {
        Self {
            index,
            name: name.into(),
            weight_count,
            parameter_count: weight_count,
            is_capsule_with_routing: false,
            routing_iterations: 1,
            weight_scale_factor: None,
            weight_parameters: vec!["weight".to_string()],
        }
    }

    /// Mark the layer as a capsule layer with dynamic routing
    pub fn with_routing(mut self, iterations: usize) -> Self {
        self.is_capsule_with_routing = true;
        self.routing_iterations = iterations;
        self
    }

    fn from_leaf(index: usize, name: String, info: &LeafInfo) -> Self {
        let weight_parameters: Vec<String> = info
            .parameters
            .iter()
            .filter(|p| !p.is_normalization())
            .map(|p| p.name.clone())
            .collect();
        let weight_count = info
            .parameters
            .iter()
            .filter(|p| !p.is_normalization())
            .map(|p| p.numel as u64)
            .sum();
        let parameter_count = info.parameters.iter().map(|p| p.numel as u64).sum();

        Self {
            index,
            name,
            weight_count,
            parameter_count,
            is_capsule_with_routing: info.capsule_layer && info.dynamic_routing,
            routing_iterations: info.routing_iterations,
            weight_scale_factor: None,
            weight_parameters,
        }
    }

    /// Whether routing actually iterates at inference
    pub fn routing_active(&self) -> bool {
        self.is_capsule_with_routing && self.routing_iterations > 1
    }

    /// Fully-qualified name of one of this layer's parameters
    pub fn parameter_key(&self, parameter: &str) -> String {
        format!("{}.{}", self.name, parameter)
    }
}

/// Indices of the layers that carry dynamic-routing bits.
///
/// `drBits[k]` belongs to layer `positions[k]`.
pub fn routing_positions(layers: &[LayerDescriptor]) -> Vec<usize> {
    layers
        .iter()
        .filter(|l| l.is_capsule_with_routing)
        .map(|l| l.index)
        .collect()
}
