//! Attaches weight values to decoded layers and summarizes them.
//!
//! Real values are sliced out of the flat parameter array whenever the
//! variable list accounts for every element. Otherwise each layer with a
//! nonzero parameter count gets seeded synthetic values, and every
//! substitution is reported both as a diagnostic and through
//! [`WeightProvenance::Synthetic`] on the resulting statistics.

pub mod slicer;
pub mod stats;
pub mod synthetic;

use crate::ir::normalize::LayerDescriptor;
use crate::ir::{LayerNode, ParameterGroup, WeightProvenance, WeightStat};
use crate::options::DecodeOptions;
use self::slicer::{plan_slots, slice_flat};
use self::stats::{compute_histogram, compute_stats};
use self::synthetic::SyntheticGenerator;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

pub const NO_VARIABLE_MAPPING: &str =
    "No variable mapping available; attached synthetic weights for visualization and inference.";

/// What the decoder recovered from the parameter blob.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatWeights {
    Extracted(Vec<f32>),
    /// A blob was present but its framing could not be decoded.
    Undecodable { byte_len: usize },
    Absent { no_params_marker: bool },
}

impl FlatWeights {
    fn describe(&self) -> Option<String> {
        match self {
            FlatWeights::Extracted(_) => None,
            FlatWeights::Undecodable { byte_len } => Some(format!(
                "Structured weight data could not be decoded from coefficients.bin ({} bytes); attached synthetic weights.",
                byte_len
            )),
            FlatWeights::Absent { no_params_marker: true } => {
                Some("Archive is marked as having no parameters; attached synthetic weights.".to_string())
            }
            FlatWeights::Absent { no_params_marker: false } => {
                Some("No binary weight data available; attached synthetic weights.".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightAttachment {
    pub stats: Vec<WeightStat>,
    pub diagnostics: Vec<String>,
}

impl WeightAttachment {
    pub fn layers_with_weights(&self) -> usize {
        let mut ids: Vec<Uuid> = self.stats.iter().map(|s| s.layer_node_id).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

pub struct WeightAttacher<'a> {
    options: &'a DecodeOptions,
    synthetic: SyntheticGenerator,
    attachment: WeightAttachment,
}

impl<'a> WeightAttacher<'a> {
    pub fn new(options: &'a DecodeOptions) -> Self {
        Self {
            options,
            synthetic: SyntheticGenerator::new(options.seed, options.max_synthetic_kernel, options.max_synthetic_bias),
            attachment: WeightAttachment::default(),
        }
    }

    /// Runs every fallback tier over `layers`. `descriptors` holds each
    /// layer's resolved dimensions keyed by layer name.
    pub fn attach(
        mut self,
        layers: &mut [LayerNode],
        descriptors: &HashMap<String, LayerDescriptor>,
        variables: Option<&[String]>,
        flat: &FlatWeights,
    ) -> WeightAttachment {
        match (flat, variables) {
            (FlatWeights::Extracted(values), Some(variables)) => {
                let slots = plan_slots(variables, descriptors);
                match slice_flat(values, &slots) {
                    Ok(segments) => {
                        debug!(segments = segments.len(), "sliced real weights");
                        let index: HashMap<&str, usize> =
                            layers.iter().enumerate().map(|(i, l)| (l.name.as_str(), i)).collect();
                        let placements: Vec<(usize, _)> = segments
                            .into_iter()
                            .filter_map(|s| index.get(s.slot.layer.as_str()).map(|&i| (i, s)))
                            .collect();
                        for (i, segment) in placements {
                            self.place(&mut layers[i], segment.slot.group, segment.values, WeightProvenance::Real);
                        }
                    }
                    Err(mismatch) => {
                        warn!(flat_len = mismatch.flat_len, expected = mismatch.expected_total, "weight slicing abandoned");
                        self.attachment.diagnostics.push(mismatch.to_string());
                        self.synthesize_all(layers);
                    }
                }
            }
            (FlatWeights::Extracted(_), None) => {
                debug!("flat weights present without a variable list");
            }
            (other, _) => {
                if let Some(reason) = other.describe() {
                    warn!("{}", reason);
                    self.attachment.diagnostics.push(reason);
                }
                self.synthesize_all(layers);
            }
        }

        if !layers.iter().any(LayerNode::has_weights) {
            warn!("no layer carries weights after slicing");
            self.attachment.diagnostics.push(NO_VARIABLE_MAPPING.to_string());
            self.synthesize_all(layers);
        }

        self.attachment
    }

    fn synthesize_all(&mut self, layers: &mut [LayerNode]) {
        for layer in layers.iter_mut().filter(|l| l.num_parameters > 0) {
            let weights = self.synthetic.generate(layer.num_parameters, layer.output_dim());
            if !weights.kernel.is_empty() {
                self.place(layer, ParameterGroup::Kernel, weights.kernel, WeightProvenance::Synthetic);
            }
            if !weights.bias.is_empty() {
                self.place(layer, ParameterGroup::Bias, weights.bias, WeightProvenance::Synthetic);
            }
        }
    }

    fn place(&mut self, layer: &mut LayerNode, group: ParameterGroup, values: Vec<f32>, provenance: WeightProvenance) {
        self.attachment.stats.push(summarize(layer.id, group, provenance, &values, self.options.histogram_bins));
        match group {
            ParameterGroup::Kernel => layer.kernel_values = Some(values),
            ParameterGroup::Bias => layer.bias_values = Some(values),
        }
    }
}

pub fn summarize(
    layer_node_id: Uuid,
    group: ParameterGroup,
    provenance: WeightProvenance,
    values: &[f32],
    histogram_bins: usize,
) -> WeightStat {
    let stats = compute_stats(values);
    WeightStat {
        id: Uuid::new_v4(),
        layer_node_id,
        parameter_group: group,
        provenance,
        min: stats.min,
        max: stats.max,
        mean: stats.mean,
        std_dev: stats.std_dev,
        num_values: values.len(),
        histogram_bins: compute_histogram(values, histogram_bins),
    }
}
