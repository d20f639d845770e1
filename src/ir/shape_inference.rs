use crate::ir::graph::LayerGraph;
use crate::ir::normalize::{InferredDims, LayerKind};
use tracing::debug;

/// Per-node dimension state, indexed like the graph arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDims {
    pub kind: Option<LayerKind>,
    pub declared_n_in: Option<u64>,
    pub declared_n_out: Option<u64>,
    pub n_in: Option<u64>,
    pub n_out: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeTable {
    dims: Vec<NodeDims>,
}

impl ShapeTable {
    /// One slot per graph node; implicit nodes start with no kind and no dims.
    pub fn new(graph: &LayerGraph) -> Self {
        Self {
            dims: vec![NodeDims::default(); graph.len()],
        }
    }

    pub fn declare(&mut self, idx: usize, kind: LayerKind, n_in: Option<u64>, n_out: Option<u64>) {
        self.dims[idx] = NodeDims {
            kind: Some(kind),
            declared_n_in: n_in,
            declared_n_out: n_out,
            n_in,
            n_out,
        };
    }

    pub fn get(&self, idx: usize) -> &NodeDims {
        &self.dims[idx]
    }

    pub fn inferred(&self, idx: usize) -> InferredDims {
        let d = &self.dims[idx];
        InferredDims {
            n_in: d.n_in,
            n_out: d.n_out,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceReport {
    pub passes: usize,
    pub resolved: usize,
    /// Names of parameterized vertices still missing a dimension.
    pub unresolved: Vec<String>,
}

impl InferenceReport {
    pub fn describe_unresolved(&self) -> Vec<String> {
        self.unresolved
            .iter()
            .map(|name| format!("Layer {}: input/output dimension could not be inferred; parameter count left at 0", name))
            .collect()
    }
}

pub struct ShapeInference;

impl ShapeInference {
    /// Propagates output dimensions along edges until a pass changes nothing,
    /// or the number of passes reaches the number of declared vertices.
    pub fn infer(graph: &LayerGraph, table: &mut ShapeTable) -> InferenceReport {
        let declared: Vec<usize> = (0..graph.len()).filter(|&i| graph.node(i).declared).collect();
        let bound = declared.len();
        let mut report = InferenceReport::default();

        for _ in 0..bound {
            report.passes += 1;
            let mut changed = false;

            for &idx in &declared {
                let kind = match table.dims[idx].kind {
                    Some(kind) => kind,
                    None => continue,
                };
                let inbound = &graph.node(idx).inbound;

                match kind {
                    k if k.is_dense_like() => {
                        if table.dims[idx].n_in.is_none() && !inbound.is_empty() {
                            let sum = inbound
                                .iter()
                                .map(|&i| table.dims[i].n_out)
                                .try_fold(0u64, |acc, d| d.and_then(|d| acc.checked_add(d)));
                            if let Some(sum) = sum {
                                table.dims[idx].n_in = Some(sum);
                                report.resolved += 1;
                                changed = true;
                            }
                        }
                        if table.dims[idx].n_out.is_none() && table.dims[idx].declared_n_out.is_some() {
                            table.dims[idx].n_out = table.dims[idx].declared_n_out;
                            changed = true;
                        }
                    }
                    LayerKind::Convolution => {
                        if table.dims[idx].n_out.is_none() && table.dims[idx].declared_n_out.is_some() {
                            table.dims[idx].n_out = table.dims[idx].declared_n_out;
                            changed = true;
                        }
                        if table.dims[idx].n_in.is_none() && inbound.len() == 1 {
                            if let Some(channels) = table.dims[inbound[0]].n_out {
                                table.dims[idx].n_in = Some(channels);
                                report.resolved += 1;
                                changed = true;
                            }
                        }
                    }
                    _ => {}
                }
            }

            if !changed {
                break;
            }
        }

        report.unresolved = declared
            .iter()
            .filter(|&&idx| {
                let d = &table.dims[idx];
                matches!(d.kind, Some(k) if k.is_parameterized()) && (d.n_in.is_none() || d.n_out.is_none())
            })
            .map(|&idx| graph.node(idx).name.clone())
            .collect();

        debug!(
            passes = report.passes,
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            "shape inference finished"
        );
        report
    }
}
