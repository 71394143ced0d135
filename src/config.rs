//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `VectConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a YAML file. Every field
//! has a default, so a partial file (or none at all) is valid.
//!
//! # Examples
//!
//! ```no_run
//! use vect::config::{VectConfig, load_config};
//!
//! let config: VectConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, str::FromStr};
use tracing::debug;

use crate::chunking::{Chunker, DelimiterChunker, FixedChunker};
use crate::error::Result;
use crate::vector_store::StoreConfig;

/// Environment variable overriding [`VectConfig::vector_path`].
pub const VECTOR_PATH_ENV: &str = "VECT_VECTOR_PATH";
/// Environment variable overriding [`VectConfig::metadata_path`].
pub const METADATA_PATH_ENV: &str = "VECT_METADATA_PATH";

/// Represents the application's configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct VectConfig {
    /// Vector dimensionality; must match the embedding model.
    pub dimension: usize,

    /// Location of the binary vector file.
    pub vector_path: PathBuf,

    /// Location of the JSON-lines metadata log.
    pub metadata_path: PathBuf,

    // Characters per chunk for the fixed-size chunker.
    pub chunk_size: usize,

    // When set, split on this single character instead of by size.
    pub delimiter: Option<String>,

    // Default number of search results.
    pub top_k: usize,

    // Hugging Face model repository and revision.
    pub model_id: String,
    pub model_revision: String,
}

fn default_data_dir() -> PathBuf {
    crate::data_dir().unwrap_or_else(|_| PathBuf::from("vect-data"))
}

impl Default for VectConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            dimension: 384,
            vector_path: data_dir.join("vectors.bin"),
            metadata_path: data_dir.join("metadata.jsonl"),
            chunk_size: 150,
            delimiter: None,
            top_k: 10,
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_revision: "main".to_string(),
        }
    }
}

impl VectConfig {
    /// The subset of the configuration the store needs.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(
            self.dimension,
            self.vector_path.clone(),
            self.metadata_path.clone(),
        )
    }

    /// Build the configured chunker: by delimiter if one is set, by size otherwise.
    ///
    /// # Errors
    /// [`crate::error::VectError::InvalidChunker`] if `delimiter` is not exactly one character.
    pub fn chunker(&self) -> Result<Box<dyn Chunker>> {
        match &self.delimiter {
            Some(d) => Ok(Box::new(DelimiterChunker::from_str(d)?)),
            None => Ok(Box::new(FixedChunker::new(self.chunk_size))),
        }
    }

    /// Replace the store paths with any values `lookup` returns for
    /// [`VECTOR_PATH_ENV`] / [`METADATA_PATH_ENV`].
    ///
    /// ```rust
    /// use vect::config::VectConfig;
    ///
    /// let mut config = VectConfig::default();
    /// config.apply_overrides(|key| (key == "VECT_VECTOR_PATH").then(|| "/tmp/v.bin".into()));
    /// assert_eq!(config.vector_path, std::path::PathBuf::from("/tmp/v.bin"));
    /// ```
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(VECTOR_PATH_ENV).filter(|p| !p.is_empty()) {
            self.vector_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(METADATA_PATH_ENV).filter(|p| !p.is_empty()) {
            self.metadata_path = PathBuf::from(path);
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
/// An I/O error if the file cannot be read, a YAML error if it does not parse.
pub fn load_config(file: &str) -> Result<VectConfig> {
    debug!("Loading config: {:?}", file);
    let content = fs::read_to_string(file)?;
    let config: VectConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}
