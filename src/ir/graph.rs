use crate::ir::config::VertexConfig;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    /// False for names that only appear in some vertex's input list.
    pub declared: bool,
    pub inbound: Vec<usize>,
    pub outbound: Vec<usize>,
}

/// Arena of named nodes with index-based, insertion-ordered edge sets.
#[derive(Debug, Clone, Default)]
pub struct LayerGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
}

/// Hands out unique graph keys: the declared name, or `layer_<index>` when
/// the name is missing, blank, or already taken.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, declared: Option<&str>, index: usize) -> String {
        let declared = declared
            .map(str::trim)
            .filter(|n| !n.is_empty() && !self.taken.contains(*n));

        let name = match declared {
            Some(n) => n.to_string(),
            None => {
                let base = format!("layer_{}", index);
                let mut candidate = base.clone();
                let mut suffix = 1;
                while self.taken.contains(&candidate) {
                    candidate = format!("{}_{}", base, suffix);
                    suffix += 1;
                }
                candidate
            }
        };

        self.taken.insert(name.clone());
        name
    }
}

/// Resolves the graph key of every vertex, in declaration order.
pub fn assign_names(vertices: &[VertexConfig]) -> Vec<String> {
    let mut names = NameAllocator::new();
    vertices
        .iter()
        .map(|v| names.assign(v.declared_name.as_deref(), v.index))
        .collect()
}

impl LayerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from `(name, inputs)` pairs. Every pair adds a
    /// declared node; every input name adds an edge `input -> name`.
    pub fn build<'a, I>(vertices: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut graph = Self::new();
        let vertices: Vec<_> = vertices.into_iter().collect();

        for (name, _) in &vertices {
            let idx = graph.intern(name);
            graph.nodes[idx].declared = true;
        }

        for (name, inputs) in &vertices {
            let to = graph.intern(name);
            for input in inputs.iter() {
                let from = graph.intern(input);
                graph.add_edge(from, to);
            }
        }

        graph
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(GraphNode {
            name: name.to_string(),
            declared: false,
            inbound: Vec::new(),
            outbound: Vec::new(),
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.nodes[to].inbound.contains(&from) {
            self.nodes[to].inbound.push(from);
        }
        if !self.nodes[from].outbound.contains(&to) {
            self.nodes[from].outbound.push(to);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn inbound_names(&self, name: &str) -> Vec<String> {
        self.names_of(name, |n| &n.inbound)
    }

    pub fn outbound_names(&self, name: &str) -> Vec<String> {
        self.names_of(name, |n| &n.outbound)
    }

    fn names_of(&self, name: &str, edges: impl Fn(&GraphNode) -> &Vec<usize>) -> Vec<String> {
        match self.index_of(name) {
            Some(idx) => edges(&self.nodes[idx])
                .iter()
                .map(|&i| self.nodes[i].name.clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(index: usize, name: Option<&str>) -> VertexConfig {
        VertexConfig {
            index,
            declared_name: name.map(str::to_string),
            ..Default::default()
        }
    }

    fn build(pairs: &[(&str, Vec<String>)]) -> LayerGraph {
        LayerGraph::build(pairs.iter().map(|(n, i)| (*n, i.as_slice())))
    }

    #[test]
    fn test_assign_names_falls_back_to_position() {
        let vertices = vec![
            vertex(0, Some("input")),
            vertex(1, None),
            vertex(2, Some("  ")),
            vertex(3, Some("input")),
        ];

        let names = assign_names(&vertices);

        assert_eq!(names, vec!["input", "layer_1", "layer_2", "layer_3"]);
    }

    #[test]
    fn test_assign_names_never_duplicates() {
        let vertices = vec![vertex(0, Some("layer_1")), vertex(1, None)];

        let names = assign_names(&vertices);

        assert_eq!(names, vec!["layer_1", "layer_1_1"]);
    }

    #[test]
    fn test_build_is_symmetric() {
        let graph = build(&[
            ("in", vec![]),
            ("a", vec!["in".to_string()]),
            ("b", vec!["in".to_string()]),
            ("merge", vec!["a".to_string(), "b".to_string(), "a".to_string()]),
        ]);

        assert_eq!(graph.outbound_names("in"), vec!["a", "b"]);
        assert_eq!(graph.inbound_names("merge"), vec!["a", "b"]);

        for node in graph.nodes() {
            for &out in &node.outbound {
                assert!(graph.node(out).inbound.iter().any(|&i| graph.node(i).name == node.name));
            }
            for &inb in &node.inbound {
                assert!(graph.node(inb).outbound.iter().any(|&o| graph.node(o).name == node.name));
            }
        }
    }

    #[test]
    fn test_dangling_input_becomes_implicit_node() {
        let graph = build(&[("dense", vec!["external".to_string()])]);

        let idx = graph.index_of("external").unwrap();
        assert!(!graph.node(idx).declared);
        assert_eq!(graph.outbound_names("external"), vec!["dense"]);
        assert!(graph.inbound_names("external").is_empty());
        assert!(graph.node(graph.index_of("dense").unwrap()).declared);
    }

    #[test]
    fn test_cycles_are_preserved() {
        let graph = build(&[("a", vec!["b".to_string()]), ("b", vec!["a".to_string()])]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.inbound_names("a"), vec!["b"]);
        assert_eq!(graph.inbound_names("b"), vec!["a"]);
    }
}
