use crate::ir::normalize::LayerDescriptor;
use crate::ir::ParameterGroup;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Flattened weight length ({flat_len}) does not match expected variable sizes total ({expected_total})")]
pub struct SizeMismatch {
    pub flat_len: usize,
    pub expected_total: usize,
}

/// One named variable mapped onto a layer, with its expected length.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSlot {
    pub variable: String,
    pub layer: String,
    pub group: ParameterGroup,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub slot: VariableSlot,
    pub values: Vec<f32>,
}

/// Splits `<layer>_W` / `<layer>_b` into the layer name and group.
pub fn parse_variable(name: &str) -> Option<(&str, ParameterGroup)> {
    if let Some(layer) = name.strip_suffix("_W") {
        Some((layer, ParameterGroup::Kernel))
    } else {
        name.strip_suffix("_b").map(|layer| (layer, ParameterGroup::Bias))
    }
}

/// Maps declared variables onto layers. Variables that follow neither
/// naming convention, name no known layer, or have a zero or unknown size
/// are dropped.
pub fn plan_slots(variables: &[String], layers: &HashMap<String, LayerDescriptor>) -> Vec<VariableSlot> {
    variables
        .iter()
        .filter_map(|variable| {
            let (layer, group) = parse_variable(variable)?;
            let descriptor = layers.get(layer)?;
            let size = match group {
                ParameterGroup::Kernel => descriptor.kernel_len(),
                ParameterGroup::Bias => descriptor.bias_len(),
            }?;
            let size = usize::try_from(size).ok().filter(|&s| s > 0)?;
            Some(VariableSlot {
                variable: variable.clone(),
                layer: layer.to_string(),
                group,
                size,
            })
        })
        .collect()
}

/// Cuts `flat` into per-variable segments in declaration order. All or
/// nothing: the slot sizes must add up to the flat length exactly.
pub fn slice_flat(flat: &[f32], slots: &[VariableSlot]) -> Result<Vec<Segment>, SizeMismatch> {
    let expected_total = slots.iter().fold(0usize, |acc, s| acc.saturating_add(s.size));
    if expected_total != flat.len() {
        return Err(SizeMismatch {
            flat_len: flat.len(),
            expected_total,
        });
    }

    let mut cursor = 0;
    Ok(slots
        .iter()
        .map(|slot| {
            let values = flat[cursor..cursor + slot.size].to_vec();
            cursor += slot.size;
            Segment {
                slot: slot.clone(),
                values,
            }
        })
        .collect())
}
