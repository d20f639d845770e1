use super::{expected_input_len, is_weighted, Activation, InferenceInput, InferenceOptions, InferenceResult, LayerOutput};
use crate::ir::LayerNode;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const NO_WEIGHTED_LAYERS: &str = "No weighted layers available for inference.";
pub const MERGE_NOT_FOUND: &str = "Merge node not found; proceeding with concatenated vector.";

struct Chain<'a> {
    steps: Vec<&'a LayerNode>,
    last: &'a LayerNode,
}

struct Run<'a> {
    by_name: HashMap<&'a str, &'a LayerNode>,
    result: InferenceResult,
}

impl<'a> Run<'a> {
    fn lookup(&self, name: &str) -> Option<&'a LayerNode> {
        self.by_name.get(name).copied()
    }

    fn first_weighted_outbound(&self, layer: &LayerNode) -> Option<&'a LayerNode> {
        layer
            .outbound_nodes
            .iter()
            .filter_map(|n| self.lookup(n))
            .find(|l| is_weighted(l))
    }

    /// Follows the first weighted outbound neighbor that has at most one
    /// inbound connection. A neighbor with several inputs is a merge point
    /// and ends the chain.
    fn chain_from(&self, start: &'a LayerNode) -> Chain<'a> {
        let mut steps = vec![start];
        let mut visited: HashSet<&str> = HashSet::from([start.name.as_str()]);
        let mut last = start;

        loop {
            let next = last
                .outbound_nodes
                .iter()
                .filter_map(|n| self.lookup(n))
                .filter(|l| is_weighted(l))
                .find(|l| l.inbound_nodes.len() <= 1);
            match next {
                Some(next) if visited.insert(next.name.as_str()) => {
                    steps.push(next);
                    last = next;
                }
                _ => break,
            }
        }

        Chain { steps, last }
    }

    fn forward(&mut self, input: Vec<f32>, layers: &[&'a LayerNode]) -> Vec<f32> {
        layers.iter().fold(input, |values, layer| {
            let out = dense_forward(&values, layer, &mut self.result.warnings);
            self.record(&layer.name, out.clone());
            out
        })
    }

    fn record(&mut self, layer: &str, values: Vec<f32>) {
        self.result.layer_outputs.push(LayerOutput {
            layer: layer.to_string(),
            values,
        });
    }
}

/// One dense step: `out[j] = bias[j] + Σ_i input[i]·kernel[i·nOut + j]`,
/// then the layer's activation. Missing weights or a kernel that does not
/// match `input.len() × bias.len()` pass the input through unchanged and
/// record a warning.
pub(crate) fn dense_forward(input: &[f32], layer: &LayerNode, warnings: &mut Vec<String>) -> Vec<f32> {
    let (kernel, bias) = match (&layer.kernel_values, &layer.bias_values) {
        (Some(kernel), Some(bias)) => (kernel, bias),
        _ => {
            warnings.push(format!("Missing weights for layer {}", layer.name));
            return input.to_vec();
        }
    };

    let n_out = bias.len();
    let expected = input.len() * n_out;
    if kernel.len() != expected {
        warnings.push(format!(
            "Kernel size mismatch for {} expected {} got {}",
            layer.name,
            expected,
            kernel.len()
        ));
        return input.to_vec();
    }

    let mut out = vec![0f32; n_out];
    for (i, &x) in input.iter().enumerate() {
        let row = &kernel[i * n_out..(i + 1) * n_out];
        for (o, &k) in out.iter_mut().zip(row) {
            *o += x * k;
        }
    }
    for (o, &b) in out.iter_mut().zip(bias) {
        *o += b;
    }

    Activation::for_layer_type(&layer.layer_type).apply(&mut out);
    out
}

/// Start layers for branch A and branch B: the requested names when they
/// are weighted, otherwise weighted layers fed by no weighted layer.
/// `None` when no layer carries weights.
pub fn select_starts<'a>(layers: &'a [LayerNode], options: &InferenceOptions) -> Option<(&'a LayerNode, &'a LayerNode)> {
    let by_name: HashMap<&str, &LayerNode> = layers.iter().map(|l| (l.name.as_str(), l)).collect();
    let lookup = |name: &str| by_name.get(name).copied();

    let weighted: Vec<&LayerNode> = layers.iter().filter(|l| is_weighted(l)).collect();
    let first = *weighted.first()?;

    let candidates: Vec<&LayerNode> = weighted
        .iter()
        .copied()
        .filter(|l| l.inbound_nodes.iter().all(|n| !lookup(n.as_str()).is_some_and(is_weighted)))
        .collect();

    let requested = |name: &Option<String>| name.as_deref().and_then(lookup).filter(|l| is_weighted(l));
    let start_a = requested(&options.start_a)
        .or_else(|| candidates.first().copied())
        .unwrap_or(first);
    let start_b = requested(&options.start_b)
        .or_else(|| candidates.iter().copied().find(|l| l.name != start_a.name))
        .or_else(|| weighted.iter().copied().find(|l| l.name != start_a.name))
        .unwrap_or(start_a);

    Some((start_a, start_b))
}

/// Runs both branches from their start layers, concatenates the branch
/// outputs (A then B) and continues through the post-merge chain.
pub fn run_inference(layers: &[LayerNode], input: &InferenceInput, options: &InferenceOptions) -> InferenceResult {
    let mut run = Run {
        by_name: layers.iter().map(|l| (l.name.as_str(), l)).collect(),
        result: InferenceResult::default(),
    };

    let (start_a, start_b) = match select_starts(layers, options) {
        Some(starts) => starts,
        None => {
            run.result.warnings.push(NO_WEIGHTED_LAYERS.to_string());
            return run.result;
        }
    };

    for (label, start, branch) in [("branchA", start_a, &input.branch_a), ("branchB", start_b, &input.branch_b)] {
        if let Some(expected) = expected_input_len(start) {
            if branch.len() != expected {
                run.result
                    .warnings
                    .push(format!("{} length {} != expected {}", label, branch.len(), expected));
            }
        }
    }

    let chain_a = run.chain_from(start_a);
    let chain_b = run.chain_from(start_b);
    debug!(
        start_a = %start_a.name,
        start_b = %start_b.name,
        len_a = chain_a.steps.len(),
        len_b = chain_b.steps.len(),
        "inference chains"
    );

    let out_a = run.forward(input.branch_a.clone(), &chain_a.steps);
    let out_b = run.forward(input.branch_b.clone(), &chain_b.steps);
    let mut merged = out_a;
    merged.extend(out_b);

    let merge_node = layers.iter().find(|l| {
        l.inbound_nodes.contains(&chain_a.last.name) && l.inbound_nodes.contains(&chain_b.last.name)
    });

    let post_start = match merge_node {
        Some(node) => {
            run.record(&node.name, merged.clone());
            if is_weighted(node) {
                Some(node)
            } else {
                run.first_weighted_outbound(node)
            }
        }
        None => {
            run.result.warnings.push(MERGE_NOT_FOUND.to_string());
            layers
                .iter()
                .filter(|l| is_weighted(l))
                .find(|l| expected_input_len(l) == Some(merged.len()))
        }
    };

    let mut current = merged;
    let mut visited: HashSet<&str> = HashSet::new();
    let mut node = post_start;
    while let Some(layer) = node {
        if !visited.insert(layer.name.as_str()) {
            break;
        }
        current = dense_forward(&current, layer, &mut run.result.warnings);
        run.record(&layer.name, current.clone());
        node = run.first_weighted_outbound(layer);
    }

    run.result.final_output = current;
    run.result
}
