//! Small demonstration archive: a 784-128-64-10 dense classifier with real
//! framed coefficients and an empty updater state.

use crate::loader::archive::UPDATER_STATE;
use crate::loader::coefficients::write_flat_weights;
use crate::loader::LoaderError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const SAMPLE_FILE_NAME: &str = "sample_dl4j_model.zip";

const INPUT_CLASS: &str = "org.deeplearning4j.nn.conf.layers.InputType";
const DENSE_CLASS: &str = "org.deeplearning4j.nn.conf.layers.DenseLayer";
const OUTPUT_CLASS: &str = "org.deeplearning4j.nn.conf.layers.OutputLayer";

struct SampleLayer {
    name: &'static str,
    class: &'static str,
    n_in: u64,
    n_out: u64,
    activation: &'static str,
    input: Option<&'static str>,
}

static LAYERS: [SampleLayer; 4] = [
    SampleLayer { name: "input_data", class: INPUT_CLASS, n_in: 784, n_out: 784, activation: "identity", input: None },
    SampleLayer { name: "layer_1_dense", class: DENSE_CLASS, n_in: 784, n_out: 128, activation: "relu", input: Some("input_data") },
    SampleLayer { name: "layer_2_dense", class: DENSE_CLASS, n_in: 128, n_out: 64, activation: "relu", input: Some("layer_1_dense") },
    SampleLayer { name: "output_layer", class: OUTPUT_CLASS, n_in: 64, n_out: 10, activation: "softmax", input: Some("layer_2_dense") },
];

pub fn sample_configuration() -> Value {
    let vertices: Vec<Value> = LAYERS
        .iter()
        .map(|l| {
            json!({
                "vertexName": l.name,
                "layer": {
                    "@class": l.class,
                    "nIn": l.n_in,
                    "nOut": l.n_out,
                    "activation": l.activation,
                    "hasBias": true
                },
                "inputs": l.input.into_iter().collect::<Vec<_>>()
            })
        })
        .collect();

    let variables: Vec<String> = parameterized()
        .flat_map(|l| [format!("{}_W", l.name), format!("{}_b", l.name)])
        .collect();

    json!({
        "vertices": vertices,
        "networkInputs": ["input_data"],
        "networkOutputs": ["output_layer"],
        "defaultConfiguration": { "variables": variables }
    })
}

fn parameterized() -> impl Iterator<Item = &'static SampleLayer> {
    LAYERS.iter().filter(|l| l.class != INPUT_CLASS)
}

/// Flat parameters in variable order: each layer's kernel (±0.025) then its
/// bias (±0.005).
pub fn sample_parameters(seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values = Vec::new();
    for layer in parameterized() {
        let kernel = (layer.n_in * layer.n_out) as usize;
        values.extend((0..kernel).map(|_| (rng.gen::<f32>() - 0.5) * 0.05));
        values.extend((0..layer.n_out as usize).map(|_| (rng.gen::<f32>() - 0.5) * 0.01));
    }
    values
}

/// Zip bytes of the sample archive.
pub fn build_sample_archive(seed: u64) -> Result<Vec<u8>, LoaderError> {
    let config = serde_json::to_string_pretty(&sample_configuration())
        .map_err(|e| LoaderError::InvalidFormat(e.to_string()))?;
    let params = sample_parameters(seed);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();

    writer.start_file("configuration.json", options)?;
    writer.write_all(config.as_bytes())?;

    writer.start_file("coefficients.bin", options)?;
    write_flat_weights(&mut writer, &[1, params.len() as i64], &params)?;

    writer.start_file(UPDATER_STATE, options)?;

    Ok(writer.finish()?.into_inner())
}
