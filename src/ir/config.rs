//! Typed view of a model configuration document.
//!
//! Exported configurations come in several shapes: computation graphs list
//! `vertices` (as an array or a name-keyed map), some exports use `layers`,
//! and sequential networks list `confs`. Field names also drifted between
//! releases (`nIn`/`nin`, `layerConf.layer`/`layer`). Everything is decoded
//! here, once, into explicit optional fields; nothing downstream touches
//! `serde_json::Value`.

use crate::ir::graph::NameAllocator;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration root must be a JSON object")]
    NotAnObject,
    #[error("Field `{field}` has an unexpected type: expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Layer configuration fields needed for parameter counting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerConf {
    pub class: Option<String>,
    pub n_in: Option<u64>,
    pub n_out: Option<u64>,
    pub kernel_size: Option<Vec<u64>>,
    pub has_bias: Option<bool>,
    pub layer_name: Option<String>,
}

impl LayerConf {
    pub fn type_tag(&self) -> &str {
        self.class.as_deref().unwrap_or("Unknown")
    }

    fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Null => return Ok(Self::default()),
            _ => {
                return Err(ConfigError::FieldType {
                    field: "layer",
                    expected: "object",
                })
            }
        };

        let class = ["@class", "type"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        let n_in = first_dim(obj, &["nIn", "nin"])?;
        let n_out = first_dim(obj, &["nOut", "nout"])?;

        let kernel_size = match obj.get("kernelSize") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => {
                let mut dims = Vec::with_capacity(items.len());
                for item in items {
                    dims.push(as_dim(item).ok_or(ConfigError::FieldType {
                        field: "kernelSize",
                        expected: "array of non-negative integers",
                    })?);
                }
                Some(dims)
            }
            Some(_) => {
                return Err(ConfigError::FieldType {
                    field: "kernelSize",
                    expected: "array",
                })
            }
        };

        let has_bias = match obj.get("hasBias") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                return Err(ConfigError::FieldType {
                    field: "hasBias",
                    expected: "boolean",
                })
            }
        };

        Ok(Self {
            class,
            n_in,
            n_out,
            kernel_size,
            has_bias,
            layer_name: optional_str(obj, "layerName")?,
        })
    }
}

/// One vertex as declared in the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexConfig {
    /// Position in the declared vertex list; drives `layer_<index>` naming.
    pub index: usize,
    pub declared_name: Option<String>,
    pub inputs: Vec<String>,
    pub layer: LayerConf,
}

/// A vertex whose fields could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedVertex {
    pub index: usize,
    pub declared_name: Option<String>,
    pub reason: String,
}

impl RejectedVertex {
    pub fn describe(&self) -> String {
        format!(
            "Layer {}: {}",
            self.declared_name.as_deref().unwrap_or("unknown"),
            self.reason
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    pub vertices: Vec<VertexConfig>,
    pub rejected: Vec<RejectedVertex>,
    pub variables: Option<Vec<String>>,
    pub network_inputs: Vec<String>,
    pub network_outputs: Vec<String>,
}

impl ModelConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> Result<Self, ConfigError> {
        let root = root.as_object().ok_or(ConfigError::NotAnObject)?;

        let raw: Vec<(Option<String>, &Value)> = match root.get("vertices").or_else(|| root.get("layers")) {
            Some(Value::Array(items)) => items.iter().map(|v| (None, v)).collect(),
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
            _ => Vec::new(),
        };

        let vertex_inputs = root.get("vertexInputs").and_then(Value::as_object);

        let mut config = ModelConfig {
            variables: variables(root),
            network_inputs: string_list(root.get("networkInputs")).unwrap_or_default(),
            network_outputs: string_list(root.get("networkOutputs")).unwrap_or_default(),
            ..Default::default()
        };

        if raw.is_empty() {
            if let Some(Value::Array(confs)) = root.get("confs") {
                config.decode_sequential(confs);
                return Ok(config);
            }
        }

        for (index, (key, value)) in raw.into_iter().enumerate() {
            let declared_name = declared_name(value).or(key);
            match decode_vertex(value) {
                Ok((layer, inputs)) => {
                    let inputs = match inputs {
                        Some(inputs) => inputs,
                        None => declared_name
                            .as_deref()
                            .and_then(|name| string_list(vertex_inputs.and_then(|m| m.get(name))))
                            .unwrap_or_default(),
                    };
                    config.vertices.push(VertexConfig {
                        index,
                        declared_name,
                        inputs,
                        layer,
                    });
                }
                Err(e) => config.rejected.push(RejectedVertex {
                    index,
                    declared_name,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(config)
    }

    /// Sequential configurations become a linear chain, each entry wired to
    /// its predecessor under the key [`assign_names`] will give it.
    ///
    /// [`assign_names`]: crate::ir::graph::assign_names
    fn decode_sequential(&mut self, confs: &[Value]) {
        let mut names = NameAllocator::new();
        let mut previous: Option<String> = None;
        for (index, conf) in confs.iter().enumerate() {
            let name_in_layer = conf
                .get("layer")
                .and_then(|l| l.get("layerName"))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string);
            let inputs: Vec<String> = previous.iter().cloned().collect();

            match layer_value(conf).map(LayerConf::from_value).transpose() {
                Ok(layer) => {
                    previous = Some(names.assign(name_in_layer.as_deref(), index));
                    self.vertices.push(VertexConfig {
                        index,
                        declared_name: name_in_layer,
                        inputs,
                        layer: layer.unwrap_or_default(),
                    });
                }
                Err(e) => {
                    // No node; the successor links to a dangling name.
                    previous = Some(name_in_layer.clone().unwrap_or_else(|| format!("layer_{}", index)));
                    self.rejected.push(RejectedVertex {
                        index,
                        declared_name: name_in_layer,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

fn decode_vertex(value: &Value) -> Result<(LayerConf, Option<Vec<String>>), ConfigError> {
    if !value.is_object() {
        return Err(ConfigError::FieldType {
            field: "vertex",
            expected: "object",
        });
    }

    let layer = match layer_value(value) {
        Some(v) => LayerConf::from_value(v)?,
        None => LayerConf::default(),
    };

    let inputs = match value.get("inputs") {
        None | Some(Value::Null) => None,
        Some(v) => Some(string_list(Some(v)).ok_or(ConfigError::FieldType {
            field: "inputs",
            expected: "array of strings",
        })?),
    };

    Ok((layer, inputs))
}

fn layer_value(vertex: &Value) -> Option<&Value> {
    vertex
        .get("layerConf")
        .and_then(|c| c.get("layer"))
        .or_else(|| vertex.get("layer"))
}

fn declared_name(vertex: &Value) -> Option<String> {
    ["vertexName", "name"]
        .iter()
        .filter_map(|key| vertex.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn variables(root: &Map<String, Value>) -> Option<Vec<String>> {
    root.get("defaultConfiguration")
        .and_then(|c| c.get("variables"))
        .and_then(|v| string_list(Some(v)))
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn optional_str(obj: &Map<String, Value>, key: &'static str) -> Result<Option<String>, ConfigError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::FieldType {
            field: key,
            expected: "string",
        }),
    }
}

/// First present dimension under any of `keys`. A present key with a
/// non-numeric value is skipped in favour of the next alias; a negative or
/// fractional number is an error.
fn first_dim(obj: &Map<String, Value>, keys: &[&'static str]) -> Result<Option<u64>, ConfigError> {
    for key in keys {
        match obj.get(*key) {
            Some(v @ Value::Number(_)) => {
                return as_dim(v).map(Some).ok_or(ConfigError::FieldType {
                    field: *key,
                    expected: "non-negative integer",
                })
            }
            _ => continue,
        }
    }
    Ok(None)
}

fn as_dim(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vertices_array_with_both_naming_conventions() {
        let text = r#"{
            "vertices": [
                {"vertexName": "in", "layer": {"@class": "InputType", "nIn": 4, "nOut": 4}, "inputs": []},
                {"name": "dense", "layerConf": {"layer": {"type": "DenseLayer", "nin": 4, "nout": 3, "hasBias": false}}, "inputs": ["in"]}
            ],
            "defaultConfiguration": {"variables": ["dense_W"]}
        }"#;

        let config = ModelConfig::parse(text).unwrap();

        assert_eq!(config.vertices.len(), 2);
        assert!(config.rejected.is_empty());
        let dense = &config.vertices[1];
        assert_eq!(dense.declared_name.as_deref(), Some("dense"));
        assert_eq!(dense.inputs, vec!["in".to_string()]);
        assert_eq!(dense.layer.type_tag(), "DenseLayer");
        assert_eq!(dense.layer.n_in, Some(4));
        assert_eq!(dense.layer.n_out, Some(3));
        assert_eq!(dense.layer.has_bias, Some(false));
        assert_eq!(config.variables, Some(vec!["dense_W".to_string()]));
    }

    #[test]
    fn test_parse_name_keyed_map_uses_key_and_vertex_inputs() {
        let text = r#"{
            "vertices": {
                "a": {"layerConf": {"layer": {"@class": "DenseLayer", "nIn": 2, "nOut": 2}}},
                "b": {"layerConf": {"layer": {"@class": "OutputLayer", "nOut": 1}}}
            },
            "vertexInputs": {"a": ["input"], "b": ["a"]},
            "networkInputs": ["input"],
            "networkOutputs": ["b"]
        }"#;

        let config = ModelConfig::parse(text).unwrap();

        let names: Vec<_> = config.vertices.iter().map(|v| v.declared_name.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(config.vertices[1].inputs, vec!["a".to_string()]);
        assert_eq!(config.network_inputs, vec!["input".to_string()]);
        assert_eq!(config.network_outputs, vec!["b".to_string()]);
    }

    #[test]
    fn test_parse_sequential_confs_builds_chain() {
        let text = r#"{
            "confs": [
                {"layer": {"@class": "DenseLayer", "layerName": "first", "nIn": 4, "nOut": 3}},
                {"layer": {"@class": "DenseLayer", "nIn": 3, "nOut": 3}},
                {"layer": {"@class": "OutputLayer", "nIn": 3, "nOut": 2}}
            ]
        }"#;

        let config = ModelConfig::parse(text).unwrap();

        assert_eq!(config.vertices.len(), 3);
        assert!(config.vertices[0].inputs.is_empty());
        assert_eq!(config.vertices[1].inputs, vec!["first".to_string()]);
        assert_eq!(config.vertices[1].declared_name, None);
        assert_eq!(config.vertices[2].inputs, vec!["layer_1".to_string()]);
    }

    #[test]
    fn test_sequential_duplicate_names_stay_a_chain() {
        let text = r#"{
            "confs": [
                {"layer": {"@class": "DenseLayer", "layerName": "x", "nIn": 4, "nOut": 3}},
                {"layer": {"@class": "DenseLayer", "layerName": "x", "nIn": 3, "nOut": 3}},
                {"layer": {"@class": "OutputLayer", "nIn": 3, "nOut": 2}}
            ]
        }"#;

        let config = ModelConfig::parse(text).unwrap();
        let names = crate::ir::graph::assign_names(&config.vertices);

        assert_eq!(names, vec!["x", "layer_1", "layer_2"]);
        assert!(config.vertices[0].inputs.is_empty());
        assert_eq!(config.vertices[1].inputs, vec!["x".to_string()]);
        assert_eq!(config.vertices[2].inputs, vec!["layer_1".to_string()]);
    }

    #[test]
    fn test_malformed_vertex_is_rejected_not_fatal() {
        let text = r#"{
            "vertices": [
                {"vertexName": "bad", "layer": {"@class": "DenseLayer", "nIn": -3, "nOut": 2}},
                {"vertexName": "worse", "inputs": "not-a-list"},
                {"vertexName": "good", "layer": {"@class": "DenseLayer", "nIn": 1, "nOut": 1}}
            ]
        }"#;

        let config = ModelConfig::parse(text).unwrap();

        assert_eq!(config.vertices.len(), 1);
        assert_eq!(config.vertices[0].index, 2);
        assert_eq!(config.rejected.len(), 2);
        assert!(config.rejected[0].describe().starts_with("Layer bad:"));
        assert!(config.rejected[1].reason.contains("inputs"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(ModelConfig::parse("{not json"), Err(ConfigError::Json(_))));
        assert!(matches!(ModelConfig::parse("[1, 2]"), Err(ConfigError::NotAnObject)));
    }

    #[test]
    fn test_kernel_size_and_float_dims() {
        let text = r#"{"vertices": [{"layer": {"@class": "ConvolutionLayer", "nIn": 3.0, "nOut": 8, "kernelSize": [3, 3]}}]}"#;

        let config = ModelConfig::parse(text).unwrap();

        let layer = &config.vertices[0].layer;
        assert_eq!(layer.n_in, Some(3));
        assert_eq!(layer.kernel_size, Some(vec![3, 3]));
        assert_eq!(config.vertices[0].declared_name, None);
    }
}
