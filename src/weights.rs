//! Parameter file: every dense layer's kernel and bias, in layer order,
//! stored as gzip-compressed JSON.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mlp::MLP;
use crate::tensor::Tensor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseRecord {
    pub name: String,
    pub kernel: Tensor,
    pub bias: Tensor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsRecord {
    pub layers: Vec<DenseRecord>,
}

impl WeightsRecord {
    pub fn from_model(model: &MLP) -> Self {
        let layers = model.layers.iter()
            .zip(model.layer_names().iter())
            .filter_map(|(layer, name)| layer.as_dense().map(|dense| (dense, name)))
            .map(|(dense, name)| DenseRecord {
                name: name.clone(),
                kernel: dense.weights.clone(),
                bias: dense.bias.clone(),
            })
            .collect();
        WeightsRecord { layers }
    }

    /// Copies the record into `model` after checking every shape, leaving the
    /// model untouched on error.
    pub fn apply(self, model: &mut MLP) -> Result<()> {
        let expected = model.dense_layers().len();
        if self.layers.len() != expected {
            return Err(Error::LayerCountMismatch {
                expected,
                found: self.layers.len(),
            });
        }

        for (record, dense) in self.layers.iter().zip(model.dense_layers()) {
            check_tensor(&record.name, &record.kernel, &dense.weights)?;
            check_tensor(&record.name, &record.bias, &dense.bias)?;
        }

        for (record, dense) in self.layers.into_iter().zip(model.dense_layers_mut()) {
            dense.weights = record.kernel;
            dense.bias = record.bias;
        }
        Ok(())
    }
}

fn check_tensor(name: &str, stored: &Tensor, current: &Tensor) -> Result<()> {
    if stored.data.len() != stored.shape.iter().product::<usize>() {
        return Err(Error::CorruptTensor(name.to_string()));
    }
    if stored.shape != current.shape {
        return Err(Error::ShapeMismatch {
            context: "load_weights",
            expected: current.shape.clone(),
            found: stored.shape.clone(),
        });
    }
    Ok(())
}

/// Writes next to `path` first and renames into place, so a failed save
/// leaves any previous file intact.
pub fn save(model: &MLP, path: &Path) -> Result<()> {
    if path.exists() {
        log::warn!("File '{}' exists, replacing", path.display());
    }
    let staging = staging_path(path);
    if let Err(err) = write_record(&WeightsRecord::from_model(model), &staging) {
        if staging.exists() {
            let _ = fs::remove_file(&staging);
        }
        return Err(err);
    }
    fs::rename(&staging, path).map_err(|err| Error::io(path, err))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn write_record(record: &WeightsRecord, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    let mut writer = GzEncoder::new(BufWriter::new(file), Compression::default());

    serde_json::to_writer(&mut writer, record)
        .map_err(|source| Error::Serialization { path: path.to_path_buf(), source })?;

    let mut inner = writer.finish().map_err(|err| Error::io(path, err))?;
    inner.flush().map_err(|err| Error::io(path, err))?;
    Ok(())
}

pub fn load(model: &mut MLP, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let reader = GzDecoder::new(BufReader::new(file));
    let record: WeightsRecord = serde_json::from_reader(reader)
        .map_err(|source| Error::Serialization { path: path.to_path_buf(), source })?;
    record.apply(model)?;
    log::info!("Loaded weights from '{}'", path.display());
    Ok(())
}
