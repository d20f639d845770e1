//! Stable orderings for tabular display of models and layers.

use crate::ir::{LayerNode, Model};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSortKey {
    Name,
    CreatedAt,
    SourceFileName,
    NumLayers,
    TotalParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSortKey {
    Name,
    LayerType,
    NumParameters,
}

pub fn compare_models(a: &Model, b: &Model, key: ModelSortKey) -> Ordering {
    match key {
        ModelSortKey::Name => a.name.cmp(&b.name),
        ModelSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        ModelSortKey::SourceFileName => a.source_file_name.cmp(&b.source_file_name),
        ModelSortKey::NumLayers => a.num_layers.cmp(&b.num_layers),
        ModelSortKey::TotalParameters => a.total_parameters.cmp(&b.total_parameters),
    }
}

pub fn compare_layers(a: &LayerNode, b: &LayerNode, key: LayerSortKey) -> Ordering {
    match key {
        LayerSortKey::Name => a.name.cmp(&b.name),
        LayerSortKey::LayerType => a.layer_type.cmp(&b.layer_type),
        LayerSortKey::NumParameters => a.num_parameters.cmp(&b.num_parameters),
    }
}

/// Stable: records with equal keys keep their relative order in both directions.
pub fn sort_models(models: &mut [Model], key: ModelSortKey, direction: SortDirection) {
    models.sort_by(|a, b| direction.apply(compare_models(a, b, key)));
}

pub fn sort_layers(layers: &mut [LayerNode], key: LayerSortKey, direction: SortDirection) {
    layers.sort_by(|a, b| direction.apply(compare_layers(a, b, key)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::test_support::layer;
    use uuid::Uuid;

    #[test]
    fn test_sort_layers_by_parameters_descending_is_stable() {
        let model_id = Uuid::new_v4();
        let mut layers = vec![
            layer(model_id, "a", 10),
            layer(model_id, "b", 30),
            layer(model_id, "c", 10),
        ];

        sort_layers(&mut layers, LayerSortKey::NumParameters, SortDirection::Descending);

        let names: Vec<_> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_models_by_name_and_total() {
        let mut a = Model::new("beta", "beta.zip");
        a.total_parameters = 5;
        let mut b = Model::new("alpha", "alpha.json");
        b.total_parameters = 50;
        let mut models = vec![a, b];

        sort_models(&mut models, ModelSortKey::Name, SortDirection::Ascending);
        assert_eq!(models[0].name, "alpha");

        sort_models(&mut models, ModelSortKey::TotalParameters, SortDirection::Ascending);
        assert_eq!(models[0].name, "beta");
    }
}
