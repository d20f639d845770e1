//! Decoder for exported DL4J model archives.
//!
//! A configuration document (optionally zipped with a `coefficients.bin`
//! parameter blob) becomes an [`ir::ImportResult`]: a named layer graph with
//! parameter counts, per-layer weight statistics and diagnostics for anything
//! that had to be skipped or synthesized. [`inference`] runs an approximate
//! forward pass over the decoded layers.

pub mod inference;
pub mod ir;
pub mod loader;
pub mod options;
pub mod weights;

pub use inference::{run_inference, InferenceInput, InferenceOptions, InferenceResult};
pub use ir::{ImportResult, ImportSummary, LayerNode, Model, WeightProvenance, WeightStat};
pub use loader::dl4j::Dl4jDecoder;
pub use loader::{LoaderError, ModelLoader};
pub use options::DecodeOptions;
