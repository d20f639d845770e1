use std::path::Path;
use crate::ir::config::ConfigError;
use crate::ir::ImportResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid zip container: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("No configuration.json or other JSON file found in the archive")]
    MissingConfiguration,
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

pub trait ModelLoader {
    fn load<P: AsRef<Path>>(&self, path: P) -> Result<ImportResult, LoaderError>;
}

pub mod archive;
pub mod binary;
pub mod coefficients;
pub mod dl4j;
pub mod sample;
