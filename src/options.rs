use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid options file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Knobs for a decode run. Every field has a default, so an options file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Seed for synthetic weight generation.
    pub seed: u64,
    pub histogram_bins: usize,
    pub max_synthetic_kernel: usize,
    pub max_synthetic_bias: usize,
    /// Preferred configuration entry inside a zip container.
    pub configuration_entry: String,
    pub coefficients_entry: String,
    /// Largest zip entry read into memory, in bytes.
    pub max_entry_bytes: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            histogram_bins: 20,
            max_synthetic_kernel: 10_000,
            max_synthetic_bias: 1_000,
            configuration_entry: "configuration.json".to_string(),
            coefficients_entry: "coefficients.bin".to_string(),
            max_entry_bytes: 1 << 30,
        }
    }
}

impl DecodeOptions {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
