use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use crate::ir::config::ModelConfig;
use crate::ir::graph::{assign_names, LayerGraph};
use crate::ir::normalize::{normalize, LayerDescriptor, LayerKind};
use crate::ir::shape_inference::{ShapeInference, ShapeTable};
use crate::ir::{ImportResult, ImportSummary, LayerNode, Model};
use crate::loader::archive::{is_zip, read_archive};
use crate::loader::coefficients::{estimate_float_count, extract_flat_weights};
use crate::loader::{LoaderError, ModelLoader};
use crate::options::DecodeOptions;
use crate::weights::{FlatWeights, WeightAttacher};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Decodes exported model archives (bare configuration JSON or a zip
/// container) into an [`ImportResult`].
#[derive(Debug, Clone, Default)]
pub struct Dl4jDecoder {
    options: DecodeOptions,
}

/// Inputs gathered from the file before the configuration is interpreted.
struct RawModel {
    config_text: String,
    coefficients: Option<Vec<u8>>,
    no_params_marker: bool,
    has_updater_state: bool,
}

impl ModelLoader for Dl4jDecoder {
    fn load<P: AsRef<Path>>(&self, path: P) -> Result<ImportResult, LoaderError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.decode(&file_name, &bytes)
    }
}

impl Dl4jDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn decode(&self, file_name: &str, bytes: &[u8]) -> Result<ImportResult, LoaderError> {
        info!(file = file_name, bytes = bytes.len(), "decoding model");

        let raw = if is_zip(file_name, bytes) {
            let entries = read_archive(Cursor::new(bytes), &self.options)?;
            RawModel {
                config_text: entries.config_text,
                coefficients: entries.coefficients,
                no_params_marker: entries.no_params_marker,
                has_updater_state: entries.has_updater_state,
            }
        } else {
            let config_text = String::from_utf8(bytes.to_vec())
                .map_err(|e| LoaderError::InvalidFormat(format!("configuration is not UTF-8: {}", e)))?;
            RawModel {
                config_text,
                coefficients: None,
                no_params_marker: false,
                has_updater_state: false,
            }
        };

        self.decode_raw(file_name, raw)
    }

    fn decode_raw(&self, file_name: &str, raw: RawModel) -> Result<ImportResult, LoaderError> {
        let has_binary_weights = raw.coefficients.as_ref().is_some_and(|b| !b.is_empty());
        let (flat, binary_parameters) = match &raw.coefficients {
            Some(blob) => match extract_flat_weights(blob) {
                Some(values) => {
                    let count = values.len() as u64;
                    (FlatWeights::Extracted(values), Some(count))
                }
                None => {
                    debug!(byte_len = blob.len(), "falling back to byte-length estimate");
                    (FlatWeights::Undecodable { byte_len: blob.len() }, estimate_float_count(blob.len()))
                }
            },
            None => (
                FlatWeights::Absent {
                    no_params_marker: raw.no_params_marker,
                },
                None,
            ),
        };

        let config = ModelConfig::parse(&raw.config_text)?;
        let mut skipped_items: Vec<String> = config.rejected.iter().map(|r| r.describe()).collect();
        for rejected in &config.rejected {
            warn!(index = rejected.index, reason = %rejected.reason, "skipping vertex");
        }

        let names = assign_names(&config.vertices);
        let graph = LayerGraph::build(
            names
                .iter()
                .zip(&config.vertices)
                .map(|(name, vertex)| (name.as_str(), vertex.inputs.as_slice())),
        );

        let mut table = ShapeTable::new(&graph);
        let mut slots = Vec::with_capacity(names.len());
        for (name, vertex) in names.iter().zip(&config.vertices) {
            if let Some(idx) = graph.index_of(name) {
                let kind = LayerKind::classify(vertex.layer.type_tag());
                table.declare(idx, kind, vertex.layer.n_in, vertex.layer.n_out);
                slots.push(idx);
            }
        }
        let report = ShapeInference::infer(&graph, &mut table);

        let mut model = Model::new(&display_name(file_name), file_name);
        model.raw_config_json = Some(raw.config_text.clone());
        model.binary_parameters = binary_parameters;

        let mut unresolved_dimensions = report.describe_unresolved();
        let mut layers = Vec::with_capacity(config.vertices.len());
        let mut descriptors: HashMap<String, LayerDescriptor> = HashMap::new();
        for (vertex, &idx) in config.vertices.iter().zip(&slots) {
            let name = &graph.node(idx).name;
            match normalize(&vertex.layer, Some(table.inferred(idx))) {
                Ok(descriptor) => {
                    let missing_kernel = descriptor.kind == LayerKind::Convolution
                        && descriptor.kernel_hw.is_none()
                        && descriptor.output_shape.is_some();
                    if missing_kernel {
                        unresolved_dimensions.push(format!(
                            "Layer {}: kernelSize is missing; parameter count left at 0",
                            name
                        ));
                    }
                    layers.push(LayerNode {
                        id: Uuid::new_v4(),
                        model_id: model.id,
                        name: name.clone(),
                        layer_type: descriptor.layer_type.clone(),
                        input_shape: descriptor.input_shape.clone(),
                        output_shape: descriptor.output_shape.clone(),
                        num_parameters: descriptor.num_parameters,
                        inbound_nodes: graph.inbound_names(name),
                        outbound_nodes: graph.outbound_names(name),
                        kernel_values: None,
                        bias_values: None,
                    });
                    descriptors.insert(name.clone(), descriptor);
                }
                Err(e) => {
                    warn!(layer = %name, error = %e, "skipping layer");
                    skipped_items.push(format!("Layer {}: {}", name, e));
                }
            }
        }

        let attachment = WeightAttacher::new(&self.options).attach(
            &mut layers,
            &descriptors,
            config.variables.as_deref(),
            &flat,
        );
        skipped_items.extend(attachment.diagnostics.iter().cloned());

        let model = model.with_recomputed_totals(&layers);
        let summary = ImportSummary {
            num_layers: layers.len(),
            total_parameters: model.total_parameters,
            layers_with_weights: attachment.layers_with_weights(),
            skipped_items,
            unresolved_dimensions,
            shape_inference_passes: report.passes,
            has_binary_weights,
            has_updater_state: raw.has_updater_state,
            binary_parameters: model.binary_parameters,
            expected_parameters: model.total_parameters,
            parameter_mismatch: model.parameter_mismatch,
            parameter_match_ratio: model.parameter_match_ratio,
        };

        info!(
            model = %model.name,
            layers = summary.num_layers,
            parameters = summary.total_parameters,
            skipped = summary.skipped_items.len(),
            "decoded model"
        );

        Ok(ImportResult {
            model,
            layers,
            weight_stats: attachment.stats,
            summary,
        })
    }
}

/// File name with a trailing `.json` or `.zip` removed, case-insensitively.
pub fn display_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    [".json", ".zip"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| file_name[..file_name.len() - ext.len()].to_string())
        .unwrap_or_else(|| file_name.to_string())
}
