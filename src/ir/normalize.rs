use crate::ir::config::LayerConf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("Parameter count overflows for {0}")]
    Overflow(String),
}

/// Layer families with a known parameter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Convolution,
    Dense,
    Output,
    Embedding,
    Recurrent,
    Other,
}

impl LayerKind {
    /// Case-insensitive suffix match on the type tag, so both fully-qualified
    /// class names and bare type names classify the same way.
    pub fn classify(type_tag: &str) -> Self {
        let lower = type_tag.to_ascii_lowercase();
        if lower.ends_with("convolutionlayer") {
            LayerKind::Convolution
        } else if lower.ends_with("denselayer") {
            LayerKind::Dense
        } else if lower.ends_with("outputlayer") {
            LayerKind::Output
        } else if lower.ends_with("embeddinglayer") {
            LayerKind::Embedding
        } else if lower.ends_with("lstm") {
            LayerKind::Recurrent
        } else {
            LayerKind::Other
        }
    }

    pub fn is_dense_like(&self) -> bool {
        matches!(self, LayerKind::Dense | LayerKind::Output)
    }

    /// Kinds whose parameter count is computed from `nIn`/`nOut`.
    pub fn is_parameterized(&self) -> bool {
        !matches!(self, LayerKind::Other)
    }
}

/// Dimensions recovered by shape inference for a vertex whose configuration
/// left them out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferredDims {
    pub n_in: Option<u64>,
    pub n_out: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub layer_type: String,
    pub kind: LayerKind,
    pub n_in: Option<u64>,
    pub n_out: Option<u64>,
    pub kernel_hw: Option<(u64, u64)>,
    pub has_bias: bool,
    pub input_shape: Option<String>,
    pub output_shape: Option<String>,
    pub num_parameters: u64,
}

impl LayerDescriptor {
    /// Expected length of the `<name>_W` variable.
    pub fn kernel_len(&self) -> Option<u64> {
        let (n_in, n_out) = (self.n_in?, self.n_out?);
        match (self.kind, self.kernel_hw) {
            (LayerKind::Convolution, Some((kh, kw))) => product(&[n_out, n_in, kh, kw]),
            (LayerKind::Convolution, None) => None,
            _ => n_in.checked_mul(n_out),
        }
    }

    /// Expected length of the `<name>_b` variable.
    pub fn bias_len(&self) -> Option<u64> {
        self.n_out
    }
}

/// Canonicalizes one vertex's layer configuration. Declared dimensions win;
/// `inferred` only fills gaps.
pub fn normalize(conf: &LayerConf, inferred: Option<InferredDims>) -> Result<LayerDescriptor, NormalizeError> {
    let layer_type = conf.type_tag().to_string();
    let kind = LayerKind::classify(&layer_type);
    let inferred = inferred.unwrap_or_default();
    let n_in = conf.n_in.or(inferred.n_in);
    let n_out = conf.n_out.or(inferred.n_out);
    let has_bias = conf.has_bias.unwrap_or(true);

    let kernel_hw = conf
        .kernel_size
        .as_deref()
        .and_then(|k| k.first().map(|&kh| (kh, k.get(1).copied().unwrap_or(kh))));

    let (input_shape, output_shape) = match (n_in, n_out) {
        (Some(i), Some(o)) => (Some(format!("[{}]", i)), Some(format!("[{}]", o))),
        _ => (None, None),
    };

    let overflow = || NormalizeError::Overflow(layer_type.clone());
    let num_parameters = match (kind, n_in, n_out) {
        (LayerKind::Convolution, Some(i), Some(o)) => match kernel_hw {
            Some((kh, kw)) => {
                let weights = product(&[o, i, kh, kw]).ok_or_else(overflow)?;
                with_bias(weights, o, has_bias).ok_or_else(overflow)?
            }
            None => 0,
        },
        (LayerKind::Dense | LayerKind::Output, Some(i), Some(o)) => {
            let weights = i.checked_mul(o).ok_or_else(overflow)?;
            with_bias(weights, o, has_bias).ok_or_else(overflow)?
        }
        (LayerKind::Embedding, Some(i), Some(o)) => i.checked_mul(o).ok_or_else(overflow)?,
        (LayerKind::Recurrent, Some(i), Some(o)) => {
            let gates = i.checked_add(o).and_then(|s| s.checked_add(1)).ok_or_else(overflow)?;
            product(&[4, gates, o]).ok_or_else(overflow)?
        }
        _ => 0,
    };

    Ok(LayerDescriptor {
        layer_type,
        kind,
        n_in,
        n_out,
        kernel_hw,
        has_bias,
        input_shape,
        output_shape,
        num_parameters,
    })
}

fn product(factors: &[u64]) -> Option<u64> {
    factors.iter().try_fold(1u64, |acc, &f| acc.checked_mul(f))
}

fn with_bias(weights: u64, n_out: u64, has_bias: bool) -> Option<u64> {
    if has_bias {
        weights.checked_add(n_out)
    } else {
        Some(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(class: &str, n_in: Option<u64>, n_out: Option<u64>) -> LayerConf {
        LayerConf {
            class: Some(class.to_string()),
            n_in,
            n_out,
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_suffixes() {
        assert_eq!(LayerKind::classify("org.deeplearning4j.nn.conf.layers.ConvolutionLayer"), LayerKind::Convolution);
        assert_eq!(LayerKind::classify("denselayer"), LayerKind::Dense);
        assert_eq!(LayerKind::classify("org.deeplearning4j.nn.conf.layers.RnnOutputLayer"), LayerKind::Output);
        assert_eq!(LayerKind::classify("EmbeddingLayer"), LayerKind::Embedding);
        assert_eq!(LayerKind::classify("org.deeplearning4j.nn.conf.layers.GravesLSTM"), LayerKind::Recurrent);
        assert_eq!(LayerKind::classify("SubsamplingLayer"), LayerKind::Other);
        assert_eq!(LayerKind::classify("DenseLayerWrapper"), LayerKind::Other);
    }

    #[test]
    fn test_parameterized_kinds() {
        assert!(LayerKind::Recurrent.is_parameterized());
        assert!(LayerKind::Embedding.is_parameterized());
        assert!(LayerKind::Convolution.is_parameterized());
        assert!(!LayerKind::Other.is_parameterized());
    }

    #[test]
    fn test_dense_with_and_without_bias() {
        let d = normalize(&conf("DenseLayer", Some(784), Some(128)), None).unwrap();
        assert_eq!(d.num_parameters, 100_480);
        assert_eq!(d.input_shape.as_deref(), Some("[784]"));
        assert_eq!(d.output_shape.as_deref(), Some("[128]"));

        let mut no_bias = conf("OutputLayer", Some(128), Some(10));
        no_bias.has_bias = Some(false);
        assert_eq!(normalize(&no_bias, None).unwrap().num_parameters, 1_280);
    }

    #[test]
    fn test_convolution_kernel_defaults_width_to_height() {
        let mut c = conf("ConvolutionLayer", Some(3), Some(16));
        c.kernel_size = Some(vec![5]);
        let d = normalize(&c, None).unwrap();
        assert_eq!(d.kernel_hw, Some((5, 5)));
        assert_eq!(d.num_parameters, 16 * 3 * 5 * 5 + 16);
        assert_eq!(d.kernel_len(), Some(16 * 3 * 25));
        assert_eq!(d.bias_len(), Some(16));

        c.kernel_size = None;
        assert_eq!(normalize(&c, None).unwrap().num_parameters, 0);
    }

    #[test]
    fn test_embedding_and_lstm() {
        let e = normalize(&conf("EmbeddingLayer", Some(1000), Some(32)), None).unwrap();
        assert_eq!(e.num_parameters, 32_000);

        let l = normalize(&conf("LSTM", Some(10), Some(20)), None).unwrap();
        assert_eq!(l.num_parameters, 4 * (10 + 20 + 1) * 20);
    }

    #[test]
    fn test_missing_dims_yield_zero_and_no_shapes() {
        let d = normalize(&conf("DenseLayer", None, Some(10)), None).unwrap();
        assert_eq!(d.num_parameters, 0);
        assert_eq!(d.input_shape, None);
        assert_eq!(d.output_shape, None);

        let unknown = normalize(&LayerConf::default(), None).unwrap();
        assert_eq!(unknown.layer_type, "Unknown");
        assert_eq!(unknown.num_parameters, 0);
    }

    #[test]
    fn test_inferred_dims_fill_gaps_only() {
        let inferred = InferredDims {
            n_in: Some(64),
            n_out: Some(999),
        };
        let d = normalize(&conf("DenseLayer", None, Some(10)), Some(inferred)).unwrap();
        assert_eq!(d.n_in, Some(64));
        assert_eq!(d.n_out, Some(10));
        assert_eq!(d.num_parameters, 64 * 10 + 10);
    }

    #[test]
    fn test_overflow_is_reported() {
        let d = normalize(&conf("DenseLayer", Some(u64::MAX), Some(2)), None);
        assert!(matches!(d, Err(NormalizeError::Overflow(_))));
    }
}
