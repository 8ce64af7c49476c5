use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mlp::MLP;

/// Metrics recorded at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    /// 1-based.
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

impl EpochLogs {
    pub fn get(&self, monitor: Monitor) -> Option<f32> {
        match monitor {
            Monitor::Loss => Some(self.loss),
            Monitor::Accuracy => Some(self.accuracy),
            Monitor::ValLoss => self.val_loss,
            Monitor::ValAccuracy => self.val_accuracy,
        }
    }
}

impl fmt::Display for EpochLogs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss: {:.4} - accuracy: {:.4}", self.loss, self.accuracy)?;
        if let (Some(val_loss), Some(val_accuracy)) = (self.val_loss, self.val_accuracy) {
            write!(f, " - val_loss: {:.4} - val_accuracy: {:.4}", val_loss, val_accuracy)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub epochs: Vec<EpochLogs>,
}

impl History {
    pub fn push(&mut self, logs: EpochLogs) {
        self.epochs.push(logs);
    }

    pub fn last(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }

    pub fn values(&self, monitor: Monitor) -> Vec<Option<f32>> {
        self.epochs.iter().map(|logs| logs.get(monitor)).collect()
    }
}

pub trait Callback {
    fn on_epoch_end(&mut self, logs: &EpochLogs, model: &MLP) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Monitor {
    Loss,
    Accuracy,
    ValLoss,
    ValAccuracy,
}

impl Monitor {
    pub fn name(&self) -> &'static str {
        match self {
            Monitor::Loss => "loss",
            Monitor::Accuracy => "accuracy",
            Monitor::ValLoss => "val_loss",
            Monitor::ValAccuracy => "val_accuracy",
        }
    }
}

/// Direction of improvement. `Auto` maximises accuracies and minimises losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    Min,
    Max,
    #[default]
    Auto,
}

impl Mode {
    fn resolve(self, monitor: Monitor) -> Mode {
        match (self, monitor) {
            (Mode::Auto, Monitor::Accuracy | Monitor::ValAccuracy) => Mode::Max,
            (Mode::Auto, _) => Mode::Min,
            (mode, _) => mode,
        }
    }

    fn improves(self, current: f32, best: f32) -> bool {
        match self {
            Mode::Max => current > best,
            _ => current < best,
        }
    }
}

/// Writes the model weights at the end of an epoch, optionally only when the
/// monitored metric beats the best value seen so far.
pub struct ModelCheckpoint {
    path: PathBuf,
    monitor: Monitor,
    mode: Mode,
    save_best_only: bool,
    best: Option<f32>,
}

impl ModelCheckpoint {
    pub fn new(path: impl Into<PathBuf>, monitor: Monitor) -> Self {
        ModelCheckpoint {
            path: path.into(),
            monitor,
            mode: Mode::Auto.resolve(monitor),
            save_best_only: false,
            best: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode.resolve(self.monitor);
        self
    }

    pub fn with_save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    /// Checkpoint path for `epoch`, with `{epoch}` substituted.
    pub fn file_path(&self, epoch: usize) -> PathBuf {
        let raw = self.path.to_string_lossy();
        if raw.contains("{epoch}") {
            PathBuf::from(raw.replace("{epoch}", &format!("{:02}", epoch)))
        } else {
            self.path.clone()
        }
    }

    fn save(&self, model: &MLP, path: &Path) -> Result<()> {
        model.save_weights(path)?;
        log::info!("Saved checkpoint to '{}'", path.display());
        Ok(())
    }
}

impl Callback for ModelCheckpoint {
    fn on_epoch_end(&mut self, logs: &EpochLogs, model: &MLP) -> Result<()> {
        let path = self.file_path(logs.epoch);

        if !self.save_best_only {
            return self.save(model, &path);
        }

        let Some(current) = logs.get(self.monitor) else {
            log::warn!(
                "Can save best model only with {} available, skipping",
                self.monitor.name()
            );
            return Ok(());
        };

        let improved = self.best.map_or(true, |best| self.mode.improves(current, best));
        if improved {
            log::info!(
                "Epoch {}: {} improved from {:?} to {:.5}",
                logs.epoch,
                self.monitor.name(),
                self.best,
                current
            );
            self.best = Some(current);
            self.save(model, &path)?;
        } else {
            log::info!(
                "Epoch {}: {} did not improve from {:.5}",
                logs.epoch,
                self.monitor.name(),
                self.best.unwrap_or(current)
            );
        }
        Ok(())
    }
}
