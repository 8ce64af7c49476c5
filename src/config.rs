use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::ExecutionMode;

/// Knobs for the experiment run. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data_dir: PathBuf,
    pub weights_path: PathBuf,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub execution_mode: ExecutionMode,
    /// Training images rendered before training starts.
    pub preview_images: usize,
    pub train_limit: Option<usize>,
    pub test_limit: Option<usize>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            data_dir: PathBuf::from("./mnist"),
            weights_path: PathBuf::from("FC.json.gz"),
            epochs: 10,
            batch_size: 200,
            seed: 42,
            execution_mode: ExecutionMode::Parallel,
            preview_images: 4,
            train_limit: None,
            test_limit: None,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        serde_json::from_str(&text)
            .map_err(|source| Error::Serialization { path: path.to_path_buf(), source })
    }
}
