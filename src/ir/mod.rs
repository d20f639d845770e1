use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;
pub mod graph;
pub mod normalize;
pub mod shape_inference;
pub mod sort;

/// Element type tag of a serialized data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Double,
    Float,
    Int,
    Long,
    Short,
    UInt64,
    UInt32,
    UInt16,
    Compressed,
    Other,
}

impl DataType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "DOUBLE" => Self::Double,
            "FLOAT" => Self::Float,
            "INT" => Self::Int,
            "LONG" => Self::Long,
            "SHORT" => Self::Short,
            "UINT64" => Self::UInt64,
            "UINT32" => Self::UInt32,
            "UINT16" => Self::UInt16,
            "COMPRESSED" => Self::Compressed,
            _ => Self::Other,
        }
    }

    /// Width of one element in bytes. `None` for compressed buffers, which
    /// cannot be walked element by element.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            Self::Double | Self::Long | Self::UInt64 => Some(8),
            Self::Float | Self::Int | Self::UInt32 => Some(4),
            Self::Short | Self::UInt16 => Some(2),
            Self::Compressed => None,
            Self::Other => Some(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterGroup {
    Kernel,
    Bias,
}

impl ParameterGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Bias => "bias",
        }
    }
}

/// Where a layer's weight values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightProvenance {
    /// Sliced out of the archive's weight blob.
    Real,
    /// Generated placeholder values; statistics do not describe trained weights.
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub source_file_name: String,
    pub num_layers: usize,
    pub total_parameters: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_config_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_parameters: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_parameters: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_mismatch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_match_ratio: Option<f64>,
}

impl Model {
    pub fn new(name: &str, source_file_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            source_file_name: source_file_name.to_string(),
            num_layers: 0,
            total_parameters: 0,
            raw_config_json: None,
            binary_parameters: None,
            expected_parameters: None,
            parameter_mismatch: None,
            parameter_match_ratio: None,
        }
    }

    /// Returns a replacement record whose layer count and parameter totals are
    /// recomputed from `layers`. Layers owned by other models are ignored.
    pub fn with_recomputed_totals(&self, layers: &[LayerNode]) -> Self {
        let owned: Vec<&LayerNode> = layers.iter().filter(|l| l.model_id == self.id).collect();
        let total: u64 = owned.iter().map(|l| l.num_parameters).sum();

        let mut model = self.clone();
        model.num_layers = owned.len();
        model.total_parameters = total;
        model.expected_parameters = Some(total);
        if let Some(binary) = model.binary_parameters {
            model.parameter_mismatch = Some(binary != total);
            model.parameter_match_ratio = Some(match_ratio(binary, total));
        }
        model
    }
}

pub(crate) fn match_ratio(binary: u64, expected: u64) -> f64 {
    if expected > 0 {
        binary as f64 / expected as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNode {
    pub id: Uuid,
    pub model_id: Uuid,
    pub name: String,
    pub layer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_shape: Option<String>,
    pub num_parameters: u64,
    pub inbound_nodes: Vec<String>,
    pub outbound_nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_values: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_values: Option<Vec<f32>>,
}

impl LayerNode {
    pub fn has_weights(&self) -> bool {
        self.kernel_values.as_ref().is_some_and(|k| !k.is_empty())
            || self.bias_values.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Trailing dimension of the textual output shape, e.g. `10` for `"[10]"`.
    pub fn output_dim(&self) -> Option<usize> {
        let shape = self.output_shape.as_deref()?.trim();
        let inner = shape.strip_suffix(']')?;
        let last = inner.rsplit(|c| c == '[' || c == ',').next()?;
        last.trim().parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightStat {
    pub id: Uuid,
    pub layer_node_id: Uuid,
    pub parameter_group: ParameterGroup,
    pub provenance: WeightProvenance,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub num_values: usize,
    pub histogram_bins: Vec<HistogramBin>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub num_layers: usize,
    pub total_parameters: u64,
    pub layers_with_weights: usize,
    pub skipped_items: Vec<String>,
    pub unresolved_dimensions: Vec<String>,
    pub shape_inference_passes: usize,
    pub has_binary_weights: bool,
    pub has_updater_state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_parameters: Option<u64>,
    pub expected_parameters: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_mismatch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_match_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub model: Model,
    pub layers: Vec<LayerNode>,
    pub weight_stats: Vec<WeightStat>,
    pub summary: ImportSummary,
}

impl ImportResult {
    pub fn layer(&self, name: &str) -> Option<&LayerNode> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn stats_for(&self, layer: &LayerNode) -> impl Iterator<Item = &WeightStat> {
        let id = layer.id;
        self.weight_stats.iter().filter(move |s| s.layer_node_id == id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn layer(model_id: Uuid, name: &str, num_parameters: u64) -> LayerNode {
        LayerNode {
            id: Uuid::new_v4(),
            model_id,
            name: name.to_string(),
            layer_type: "org.deeplearning4j.nn.conf.layers.DenseLayer".to_string(),
            input_shape: None,
            output_shape: None,
            num_parameters,
            inbound_nodes: Vec::new(),
            outbound_nodes: Vec::new(),
            kernel_values: None,
            bias_values: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::layer;
    use super::*;

    #[test]
    fn test_data_type_widths() {
        assert_eq!(DataType::from_tag("DOUBLE").element_size(), Some(8));
        assert_eq!(DataType::from_tag("FLOAT").element_size(), Some(4));
        assert_eq!(DataType::from_tag("SHORT").element_size(), Some(2));
        assert_eq!(DataType::from_tag("UTF8").element_size(), Some(4));
        assert_eq!(DataType::from_tag("COMPRESSED").element_size(), None);
    }

    #[test]
    fn test_output_dim_parses_trailing_dimension() {
        let mut node = layer(Uuid::new_v4(), "dense", 0);
        node.output_shape = Some("[128]".to_string());
        assert_eq!(node.output_dim(), Some(128));

        node.output_shape = Some("[3, 32]".to_string());
        assert_eq!(node.output_dim(), Some(32));

        node.output_shape = None;
        assert_eq!(node.output_dim(), None);
    }

    #[test]
    fn test_recomputed_totals_replace_record() {
        let mut model = Model::new("m", "m.zip");
        model.binary_parameters = Some(30);
        let other = Uuid::new_v4();
        let layers = vec![
            layer(model.id, "a", 10),
            layer(model.id, "b", 20),
            layer(other, "c", 999),
        ];

        let updated = model.with_recomputed_totals(&layers);

        assert_eq!(updated.id, model.id);
        assert_eq!(updated.num_layers, 2);
        assert_eq!(updated.total_parameters, 30);
        assert_eq!(updated.parameter_mismatch, Some(false));
        assert_eq!(updated.parameter_match_ratio, Some(1.0));
        assert_eq!(model.total_parameters, 0);
    }

    #[test]
    fn test_group_and_provenance_serialize_lowercase() {
        let json = serde_json::to_string(&(ParameterGroup::Kernel, WeightProvenance::Synthetic)).unwrap();
        assert_eq!(json, r#"["kernel","synthetic"]"#);
    }
}
