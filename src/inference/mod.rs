//! Approximate two-branch forward pass over decoded layers.
//!
//! Results are indicative only: activations are guessed from the layer type
//! and kernels are assumed to be row-major `[nIn, nOut]`.

mod engine;

pub use engine::{run_inference, select_starts};

use crate::ir::LayerNode;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Tanh,
    Identity,
}

impl Activation {
    pub fn for_layer_type(layer_type: &str) -> Self {
        let lower = layer_type.to_ascii_lowercase();
        if lower.contains("outputlayer") {
            Activation::Identity
        } else if lower.contains("denselayer") || lower.contains("convolutionlayer") {
            Activation::Tanh
        } else {
            Activation::Identity
        }
    }

    pub fn apply(self, values: &mut [f32]) {
        if self == Activation::Tanh {
            values.iter_mut().for_each(|v| *v = v.tanh());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceInput {
    pub branch_a: Vec<f32>,
    pub branch_b: Vec<f32>,
}

/// Optional start layers. Names that are unknown or unweighted fall back to
/// the automatically detected entry points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceOptions {
    pub start_a: Option<String>,
    pub start_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOutput {
    pub layer: String,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// One entry per evaluated step, in execution order.
    pub layer_outputs: Vec<LayerOutput>,
    pub final_output: Vec<f32>,
    pub warnings: Vec<String>,
}

impl InferenceResult {
    /// Latest output recorded for `layer`.
    pub fn output_of(&self, layer: &str) -> Option<&[f32]> {
        self.layer_outputs
            .iter()
            .rev()
            .find(|o| o.layer == layer)
            .map(|o| o.values.as_slice())
    }
}

/// Kernel present and bias non-empty.
pub fn is_weighted(layer: &LayerNode) -> bool {
    layer.kernel_values.is_some() && layer.bias_values.as_ref().is_some_and(|b| !b.is_empty())
}

/// Input length implied by a weighted layer: kernel length over bias length.
pub fn expected_input_len(layer: &LayerNode) -> Option<usize> {
    if !is_weighted(layer) {
        return None;
    }
    let kernel = layer.kernel_values.as_ref()?.len();
    let bias = layer.bias_values.as_ref()?.len();
    Some(kernel / bias)
}

/// Truncates or zero-pads `values` to `expected`; `None` leaves it as is.
pub fn fit_length(mut values: Vec<f32>, expected: Option<usize>) -> Vec<f32> {
    if let Some(expected) = expected.filter(|&e| e > 0) {
        values.resize(expected, 0.0);
    }
    values
}

/// `len` values uniform in `±scale / 2`.
pub fn random_input<R: Rng>(len: usize, scale: f32, rng: &mut R) -> Vec<f32> {
    (0..len).map(|_| (rng.gen::<f32>() - 0.5) * scale).collect()
}
