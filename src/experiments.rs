//! The tutorial run: a sequence of increasingly complex classifiers trained
//! on the same data, each reported as a test-set error.

use crate::callbacks::{Callback, Mode, ModelCheckpoint, Monitor};
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::helpers::baseline_error;
use crate::initializers::Initializer;
use crate::layer::{ActivationType, DenseConfig, LayerConfig};
use crate::loss_functions::Loss;
use crate::mlp::{Evaluation, FitOptions, MLP};
use crate::mnist_data::MnistDataset;
use crate::optimizers::{AdamConfig, OptimizerConfig, SgdConfig};
use crate::preprocessing::{flatten_images, to_categorical};
use crate::regularizers::Regularizer;
use crate::tensor::Tensor;

const NUM_DIGITS: usize = 10;

/// Flattened, scaled images and one-hot labels for both splits.
pub struct PreparedData {
    pub train_images: Tensor,
    pub train_labels: Tensor,
    pub test_images: Tensor,
    pub test_labels: Tensor,
}

impl PreparedData {
    /// Both splits are encoded with the same class count, taken from the
    /// widest label in either split and never below the ten digits.
    pub fn from_dataset(dataset: &MnistDataset) -> Self {
        let num_classes = dataset.train.labels.iter()
            .chain(dataset.test.labels.iter())
            .max()
            .map_or(NUM_DIGITS, |&max| (max as usize + 1).max(NUM_DIGITS));
        PreparedData {
            train_images: flatten_images(&dataset.train),
            train_labels: to_categorical(&dataset.train.labels, Some(num_classes)),
            test_images: flatten_images(&dataset.test),
            test_labels: to_categorical(&dataset.test.labels, Some(num_classes)),
        }
    }

    pub fn num_pixels(&self) -> usize {
        self.train_images.cols()
    }

    pub fn num_classes(&self) -> usize {
        self.test_labels.cols()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub name: &'static str,
    pub evaluation: Evaluation,
}

pub struct Experiments<'a> {
    config: &'a ExperimentConfig,
    data: &'a PreparedData,
}

impl<'a> Experiments<'a> {
    pub fn new(config: &'a ExperimentConfig, data: &'a PreparedData) -> Self {
        Experiments { config, data }
    }

    fn fit_options(&self) -> FitOptions<'a> {
        FitOptions::new(self.config.epochs, self.config.batch_size)
            .with_validation(&self.data.test_images, &self.data.test_labels)
    }

    fn new_model(&self, layers: Vec<LayerConfig>, seed_offset: u64) -> Result<MLP> {
        MLP::sequential(
            self.data.num_pixels(),
            layers,
            self.config.seed.wrapping_add(seed_offset),
            self.config.execution_mode,
        )
    }

    fn train(&self, model: &mut MLP, callbacks: &mut [&mut dyn Callback]) -> Result<()> {
        model.fit(
            &self.data.train_images,
            &self.data.train_labels,
            &self.fit_options(),
            callbacks,
        )?;
        Ok(())
    }

    fn report(&self, name: &'static str, model: &MLP) -> Result<Report> {
        let evaluation = model.evaluate(
            &self.data.test_images,
            &self.data.test_labels,
            self.config.batch_size,
        )?;
        log::info!("{}: loss {:.4}, accuracy {:.4}", name, evaluation.loss, evaluation.accuracy);
        println!("{}", baseline_error(&evaluation));
        Ok(Report { name, evaluation })
    }

    /// `500 -> 100 -> 50` sigmoid stack with a softmax output.
    fn deep_layers(&self, initializer: Initializer) -> Vec<LayerConfig> {
        let mut layers: Vec<LayerConfig> = [500, 100, 50]
            .iter()
            .map(|&units| {
                LayerConfig::from(
                    DenseConfig::new(units, ActivationType::Sigmoid).with_initializer(initializer),
                )
            })
            .collect();
        layers.push(
            DenseConfig::new(self.data.num_classes(), ActivationType::Softmax)
                .with_initializer(initializer)
                .into(),
        );
        layers
    }

    pub fn single_layer(&self) -> Result<Report> {
        let mut model = self.new_model(
            vec![DenseConfig::new(self.data.num_classes(), ActivationType::Softmax).into()],
            1,
        )?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::sgd());
        self.train(&mut model, &mut [])?;
        self.report("single layer", &model)
    }

    pub fn multi_layer(&self) -> Result<Report> {
        let mut model = self.new_model(
            vec![
                DenseConfig::new(500, ActivationType::ReLU).into(),
                DenseConfig::new(100, ActivationType::ReLU).into(),
                DenseConfig::new(self.data.num_classes(), ActivationType::Softmax).into(),
            ],
            2,
        )?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        self.train(&mut model, &mut [])?;
        self.report("multi layer", &model)
    }

    pub fn deep(&self) -> Result<(MLP, Report)> {
        let mut model = self.new_model(self.deep_layers(Initializer::GlorotUniform), 3)?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        self.train(&mut model, &mut [])?;
        let report = self.report("deep", &model)?;
        println!("{}", model.summary());
        Ok((model, report))
    }

    /// Recompiles and trains `model` further, then writes its weights.
    pub fn save(&self, model: &mut MLP) -> Result<Report> {
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        self.train(model, &mut [])?;
        model.save_weights(&self.config.weights_path)?;
        self.report("saved", model)
    }

    /// Fresh deep model scored before and after loading the saved weights.
    pub fn restore(&self) -> Result<(MLP, Report, Report)> {
        let mut model = self.new_model(self.deep_layers(Initializer::GlorotUniform), 5)?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        let random = self.report("random", &model)?;
        model.load_weights(&self.config.weights_path)?;
        let restored = self.report("restored", &model)?;
        Ok((model, random, restored))
    }

    /// Trains `model` keeping only the best validation accuracy on disk.
    pub fn checkpoint(&self, model: &mut MLP) -> Result<Option<f32>> {
        let mut checkpoint = ModelCheckpoint::new(&self.config.weights_path, Monitor::ValAccuracy)
            .with_mode(Mode::Max)
            .with_save_best_only(true);
        self.train(model, &mut [&mut checkpoint])?;
        log::info!("Best val_accuracy: {:?}", checkpoint.best());
        Ok(checkpoint.best())
    }

    pub fn decay(&self, model: &mut MLP) -> Result<Report> {
        let sgd = SgdConfig::new(0.001).with_momentum(0.0005).with_decay(0.0005);
        let adam = AdamConfig::new(0.001).with_betas(0.9, 0.999).with_decay(0.0005);
        log::info!("Decaying optimizers: {:?} / {:?}", sgd, adam);
        model.compile(Loss::CategoricalCrossEntropy, adam);
        self.train(model, &mut [])?;
        self.report("decay", model)
    }

    pub fn regularized(&self) -> Result<Report> {
        let l2 = Regularizer::L2(1e-4);
        let mut model = self.new_model(
            vec![
                DenseConfig::new(500, ActivationType::Sigmoid).with_regularizer(l2).into(),
                LayerConfig::Dropout(0.3),
                DenseConfig::new(100, ActivationType::Sigmoid).with_regularizer(l2).into(),
                LayerConfig::Dropout(0.25),
                DenseConfig::new(50, ActivationType::Sigmoid).with_regularizer(l2).into(),
                LayerConfig::Dropout(0.3),
                DenseConfig::new(self.data.num_classes(), ActivationType::Softmax)
                    .with_regularizer(l2)
                    .into(),
            ],
            8,
        )?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        self.train(&mut model, &mut [])?;
        self.report("regularized", &model)
    }

    pub fn glorot(&self) -> Result<Report> {
        let mut model = self.new_model(self.deep_layers(Initializer::GlorotNormal), 9)?;
        model.compile(Loss::CategoricalCrossEntropy, OptimizerConfig::adam());
        self.train(&mut model, &mut [])?;
        self.report("glorot normal", &model)
    }

    pub fn run_all(&self) -> Result<Vec<Report>> {
        let mut reports = vec![self.single_layer()?, self.multi_layer()?];

        let (mut deep, report) = self.deep()?;
        reports.push(report);
        reports.push(self.save(&mut deep)?);
        drop(deep);

        let (mut restored, random, loaded) = self.restore()?;
        reports.push(random);
        reports.push(loaded);
        self.checkpoint(&mut restored)?;
        reports.push(self.decay(&mut restored)?);

        reports.push(self.regularized()?);
        reports.push(self.glorot()?);
        Ok(reports)
    }
}
