use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::activation_functions::ActivationType;
use crate::callbacks::{Callback, EpochLogs, History};
use crate::error::{Error, Result};
use crate::layer::{Dense, Dropout, Layer, LayerConfig};
use crate::loss_functions::{CategoricalCrossEntropy, Loss, LossFunction};
use crate::optimizers::{Optimizer, OptimizerConfig};
use crate::tensor::{ExecutionMode, Tensor};
use crate::weights;

pub struct FitOptions<'a> {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    pub validation: Option<(&'a Tensor, &'a Tensor)>,
}

impl<'a> FitOptions<'a> {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        FitOptions {
            epochs,
            batch_size,
            shuffle: true,
            validation: None,
        }
    }

    pub fn with_validation(mut self, images: &'a Tensor, labels: &'a Tensor) -> Self {
        self.validation = Some((images, labels));
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
}

impl Evaluation {
    pub fn error_percent(&self) -> f32 {
        100.0 - self.accuracy * 100.0
    }
}

struct Compilation {
    loss: Loss,
    optimizer: Box<dyn Optimizer>,
}

/// Ordered stack of dense and dropout layers.
pub struct MLP {
    pub input_dim: usize,
    pub layers: Vec<Layer>,
    pub execution_mode: ExecutionMode,
    names: Vec<String>,
    seed: u64,
    rng: Pcg64,
    compilation: Option<Compilation>,
}

impl MLP {
    pub fn new(input_dim: usize, seed: u64, execution_mode: ExecutionMode) -> Self {
        MLP {
            input_dim,
            layers: Vec::new(),
            execution_mode,
            names: Vec::new(),
            seed,
            rng: Pcg64::seed_from_u64(seed),
            compilation: None,
        }
    }

    /// Builds a model from a list of layer configs in one go.
    pub fn sequential(
        input_dim: usize,
        layers: Vec<LayerConfig>,
        seed: u64,
        execution_mode: ExecutionMode,
    ) -> Result<Self> {
        let mut mlp = MLP::new(input_dim, seed, execution_mode);
        for layer in layers {
            mlp.add(layer)?;
        }
        Ok(mlp)
    }

    /// Appends a layer whose input width is the current output width.
    pub fn add(&mut self, layer: impl Into<LayerConfig>) -> Result<()> {
        let index = self.layers.len();
        let config: LayerConfig = layer.into();
        let layer = match config {
            LayerConfig::Dense(config) => {
                let seed = self.seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                log::debug!(
                    "Adding dense layer {} -> {} ({})",
                    self.output_dim(),
                    config.units,
                    config.activation.name()
                );
                Layer::Dense(config.init(self.output_dim(), seed))
            }
            LayerConfig::Dropout(rate) => Layer::Dropout(Dropout::new(rate)?),
        };
        self.names.push(self.next_name(layer.kind()));
        self.layers.push(layer);
        Ok(())
    }

    fn next_name(&self, kind: &str) -> String {
        let base = kind.to_lowercase();
        let seen = self.layers.iter().filter(|layer| layer.kind() == kind).count();
        if seen == 0 { base } else { format!("{}_{}", base, seen) }
    }

    pub fn layer_names(&self) -> &[String] {
        &self.names
    }

    pub fn output_dim(&self) -> usize {
        self.dense_layers().last().map_or(self.input_dim, |dense| dense.units())
    }

    pub fn dense_layers(&self) -> Vec<&Dense> {
        self.layers.iter().filter_map(Layer::as_dense).collect()
    }

    pub fn dense_layers_mut(&mut self) -> Vec<&mut Dense> {
        self.layers.iter_mut().filter_map(Layer::as_dense_mut).collect()
    }

    pub fn count_params(&self) -> usize {
        self.layers.iter().map(Layer::count_params).sum()
    }

    /// Sets the loss and a freshly initialised optimizer.
    pub fn compile(&mut self, loss: Loss, optimizer: impl Into<OptimizerConfig>) {
        let config: OptimizerConfig = optimizer.into();
        let optimizer = config.init();
        log::info!("Compiling model with {} loss and {} optimizer", loss.name(), optimizer.name());
        log::debug!("Optimizer config: {:?}", config);
        self.compilation = Some(Compilation { loss, optimizer });
    }

    pub fn is_compiled(&self) -> bool {
        self.compilation.is_some()
    }

    pub fn fit(
        &mut self,
        images: &Tensor,
        labels: &Tensor,
        options: &FitOptions,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<History> {
        if self.compilation.is_none() {
            return Err(Error::NotCompiled("fit"));
        }
        if options.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        self.check_data("fit", images, labels)?;
        if let Some((val_images, val_labels)) = options.validation {
            self.check_data("validation", val_images, val_labels)?;
        }

        let samples = images.rows();
        let mut indices: Vec<usize> = (0..samples).collect();
        let mut history = History::default();

        for epoch in 1..=options.epochs {
            if options.shuffle {
                indices.shuffle(&mut self.rng);
            }

            let mut loss_sum = 0.0;
            let mut correct = 0;
            for batch in indices.chunks(options.batch_size) {
                let batch_images = images.select_rows(batch);
                let batch_labels = labels.select_rows(batch);
                let (loss, hits) = self.train_batch(&batch_images, &batch_labels)?;
                loss_sum += loss * batch.len() as f32;
                correct += hits;
            }

            let mut logs = EpochLogs {
                epoch,
                loss: loss_sum / samples as f32,
                accuracy: correct as f32 / samples as f32,
                val_loss: None,
                val_accuracy: None,
            };
            if let Some((val_images, val_labels)) = options.validation {
                let evaluation = self.evaluate(val_images, val_labels, options.batch_size)?;
                logs.val_loss = Some(evaluation.loss);
                logs.val_accuracy = Some(evaluation.accuracy);
            }

            log::info!("Epoch {}/{} - {}", epoch, options.epochs, logs);
            for callback in callbacks.iter_mut() {
                callback.on_epoch_end(&logs, self)?;
            }
            history.push(logs);
        }

        Ok(history)
    }

    // Returns the batch loss (including penalties) and the number of hits.
    fn train_batch(&mut self, images: &Tensor, labels: &Tensor) -> Result<(f32, usize)> {
        let compilation = self.compilation.as_mut().ok_or(Error::NotCompiled("fit"))?;
        let mode = self.execution_mode;

        let mut activation = images.clone();
        for layer in self.layers.iter_mut() {
            activation = layer.forward(&activation, mode, &mut self.rng);
        }

        let penalty: f32 = self.layers.iter()
            .filter_map(Layer::as_dense)
            .map(Dense::regularization_penalty)
            .sum();
        let loss = compilation.loss.forward(&activation, labels) + penalty;
        let hits = count_hits(&activation, labels);

        // softmax + cross-entropy collapses to (p - y) / n on the logits
        let fused = compilation.loss == Loss::CategoricalCrossEntropy
            && matches!(self.layers.last(), Some(Layer::Dense(dense)) if dense.activation == ActivationType::Softmax);

        let mut layers = self.layers.iter_mut().rev();
        let mut grad = if fused {
            let grad_z = CategoricalCrossEntropy::softmax_backward(&activation, labels);
            match layers.next() {
                Some(Layer::Dense(dense)) => dense.backward_from_logits(&grad_z, mode)?,
                _ => grad_z,
            }
        } else {
            compilation.loss.backward(&activation, labels)
        };
        for layer in layers {
            grad = layer.backward(&grad, mode)?;
        }

        let optimizer = compilation.optimizer.as_mut();
        for (index, dense) in self.layers.iter_mut().filter_map(Layer::as_dense_mut).enumerate() {
            dense.apply_gradients(&mut *optimizer, index);
        }
        optimizer.finish_iteration();

        Ok((loss, hits))
    }

    pub fn evaluate(&self, images: &Tensor, labels: &Tensor, batch_size: usize) -> Result<Evaluation> {
        let compilation = self.compilation.as_ref().ok_or(Error::NotCompiled("evaluate"))?;
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        self.check_data("evaluate", images, labels)?;

        let samples = images.rows();
        let indices: Vec<usize> = (0..samples).collect();
        let mut loss_sum = 0.0;
        let mut correct = 0;
        for batch in indices.chunks(batch_size) {
            let batch_labels = labels.select_rows(batch);
            let predictions = self.infer(&images.select_rows(batch));
            loss_sum += compilation.loss.forward(&predictions, &batch_labels) * batch.len() as f32;
            correct += count_hits(&predictions, &batch_labels);
        }

        let penalty: f32 = self.dense_layers().iter().map(|dense| dense.regularization_penalty()).sum();
        Ok(Evaluation {
            loss: loss_sum / samples as f32 + penalty,
            accuracy: correct as f32 / samples as f32,
        })
    }

    pub fn predict(&self, images: &Tensor, batch_size: usize) -> Result<Tensor> {
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        self.check_input("predict", images)?;

        let samples = images.rows();
        let indices: Vec<usize> = (0..samples).collect();
        let mut data = Vec::with_capacity(samples * self.output_dim());
        for batch in indices.chunks(batch_size) {
            data.extend(self.infer(&images.select_rows(batch)).data);
        }
        Ok(Tensor::new(data, vec![samples, self.output_dim()]))
    }

    fn infer(&self, images: &Tensor) -> Tensor {
        self.layers.iter().fold(images.clone(), |activation, layer| {
            layer.infer(&activation, self.execution_mode)
        })
    }

    fn check_input(&self, context: &'static str, images: &Tensor) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::EmptyModel);
        }
        if !images.is_matrix() || images.cols() != self.input_dim {
            return Err(Error::ShapeMismatch {
                context,
                expected: vec![images.rows(), self.input_dim],
                found: images.shape.clone(),
            });
        }
        Ok(())
    }

    fn check_data(&self, context: &'static str, images: &Tensor, labels: &Tensor) -> Result<()> {
        self.check_input(context, images)?;
        if images.rows() == 0 {
            return Err(Error::EmptyData(context));
        }
        let expected = vec![images.rows(), self.output_dim()];
        if labels.shape != expected {
            return Err(Error::ShapeMismatch {
                context,
                expected,
                found: labels.shape.clone(),
            });
        }
        Ok(())
    }

    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        weights::save(self, path.as_ref())
    }

    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        weights::load(self, path.as_ref())
    }

    /// Layer table with output shapes and parameter counts.
    pub fn summary(&self) -> String {
        let rule = "_".repeat(65);
        let double_rule = "=".repeat(65);
        let mut lines = vec![
            "Model: \"sequential\"".to_string(),
            rule.clone(),
            format!(" {:<28}{:<26}{}", "Layer (type)", "Output Shape", "Param #"),
            double_rule.clone(),
        ];

        let mut width = self.input_dim;
        for (layer, name) in self.layers.iter().zip(self.names.iter()) {
            if let Some(dense) = layer.as_dense() {
                width = dense.units();
            }
            lines.push(format!(
                " {:<28}{:<26}{}",
                format!("{} ({})", name, layer.kind()),
                format!("(None, {})", width),
                layer.count_params(),
            ));
        }

        let total = self.count_params();
        lines.push(double_rule);
        lines.push(format!("Total params: {}", group_thousands(total)));
        lines.push(format!("Trainable params: {}", group_thousands(total)));
        lines.push("Non-trainable params: 0".to_string());
        lines.push(rule);
        lines.join("\n")
    }
}

fn count_hits(predictions: &Tensor, labels: &Tensor) -> usize {
    predictions.argmax_rows().iter()
        .zip(labels.argmax_rows().iter())
        .filter(|(p, t)| p == t)
        .count()
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
