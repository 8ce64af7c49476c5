use rand::distributions::{Distribution, Uniform};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

pub use crate::activation_functions::ActivationType;
use crate::activation_functions::ActivationFunction;
use crate::error::{Error, Result};
use crate::initializers::Initializer;
use crate::optimizers::Optimizer;
use crate::regularizers::Regularizer;
use crate::tensor::{ExecutionMode, Tensor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    pub units: usize,
    pub activation: ActivationType,
    pub kernel_initializer: Initializer,
    pub kernel_regularizer: Option<Regularizer>,
}

impl DenseConfig {
    pub fn new(units: usize, activation: ActivationType) -> Self {
        DenseConfig {
            units,
            activation,
            kernel_initializer: Initializer::default(),
            kernel_regularizer: None,
        }
    }

    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.kernel_initializer = initializer;
        self
    }

    pub fn with_regularizer(mut self, regularizer: Regularizer) -> Self {
        self.kernel_regularizer = Some(regularizer);
        self
    }

    pub fn init(&self, input_dim: usize, seed: u64) -> Dense {
        Dense {
            weights: self.kernel_initializer.init(input_dim, self.units, seed),
            bias: Tensor::zeros_2d(1, self.units),
            activation: self.activation,
            kernel_regularizer: self.kernel_regularizer,
            input: None,
            output: None,
            grad_weights: None,
            grad_bias: None,
        }
    }
}

/// Fully connected layer: `activation(x · W + b)`, with `W` of shape
/// `[input_dim, units]`.
pub struct Dense {
    pub weights: Tensor,
    pub bias: Tensor,
    pub activation: ActivationType,
    pub kernel_regularizer: Option<Regularizer>,
    input: Option<Tensor>,
    output: Option<Tensor>,
    grad_weights: Option<Tensor>,
    grad_bias: Option<Tensor>,
}

impl Dense {
    pub fn input_dim(&self) -> usize {
        self.weights.rows()
    }

    pub fn units(&self) -> usize {
        self.weights.cols()
    }

    pub fn count_params(&self) -> usize {
        self.weights.size() + self.bias.size()
    }

    pub fn infer(&self, input: &Tensor, execution_mode: ExecutionMode) -> Tensor {
        let z = input.mul(&self.weights, execution_mode).add_row(&self.bias);
        self.activation.activate(&z)
    }

    pub fn forward(&mut self, input: &Tensor, execution_mode: ExecutionMode) -> Tensor {
        let output = self.infer(input, execution_mode);
        self.input = Some(input.clone());
        self.output = Some(output.clone());
        output
    }

    /// Back-propagates a gradient w.r.t. this layer's output.
    pub fn backward(&mut self, grad: &Tensor, execution_mode: ExecutionMode) -> Result<Tensor> {
        let output = self.output.take().ok_or(Error::MissingForwardPass)?;
        let grad_z = self.activation.backward(&output, grad);
        self.backward_from_logits(&grad_z, execution_mode)
    }

    /// Back-propagates a gradient w.r.t. the pre-activation `x · W + b`.
    pub fn backward_from_logits(&mut self, grad_z: &Tensor, execution_mode: ExecutionMode) -> Result<Tensor> {
        let input = self.input.take().ok_or(Error::MissingForwardPass)?;
        self.output = None;

        let mut grad_weights = input.transpose().mul(grad_z, execution_mode);
        if let Some(regularizer) = &self.kernel_regularizer {
            grad_weights = &grad_weights + &regularizer.gradient(&self.weights);
        }
        self.grad_weights = Some(grad_weights);
        self.grad_bias = Some(grad_z.sum_rows());

        Ok(grad_z.mul(&self.weights.transpose(), execution_mode))
    }

    pub fn regularization_penalty(&self) -> f32 {
        self.kernel_regularizer
            .map_or(0.0, |regularizer| regularizer.penalty(&self.weights))
    }

    /// Hands the stored gradients to `optimizer`. Slots `2i` and `2i + 1`
    /// belong to the kernel and bias of the `i`-th dense layer.
    pub fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer, index: usize) {
        if let Some(grad) = self.grad_weights.take() {
            optimizer.step(2 * index, &mut self.weights, &grad);
        }
        if let Some(grad) = self.grad_bias.take() {
            optimizer.step(2 * index + 1, &mut self.bias, &grad);
        }
    }
}

/// Inverted dropout: kept activations are scaled by `1 / (1 - rate)` during
/// training so inference is the identity.
pub struct Dropout {
    pub rate: f32,
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(rate: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(Error::InvalidDropoutRate(rate));
        }
        Ok(Dropout { rate, mask: None })
    }

    pub fn forward(&mut self, input: &Tensor, rng: &mut Pcg64) -> Tensor {
        if self.rate == 0.0 {
            self.mask = None;
            return input.clone();
        }
        let keep = 1.0 - self.rate;
        let uniform = Uniform::new(0.0f32, 1.0);
        let data = (0..input.size())
            .map(|_| if uniform.sample(rng) < keep { 1.0 / keep } else { 0.0 })
            .collect();
        let mask = Tensor::new(data, input.shape.clone());
        let output = input.hadamard(&mask);
        self.mask = Some(mask);
        output
    }

    pub fn backward(&mut self, grad: &Tensor) -> Tensor {
        match self.mask.take() {
            Some(mask) => grad.hadamard(&mask),
            None => grad.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerConfig {
    Dense(DenseConfig),
    Dropout(f32),
}

impl From<DenseConfig> for LayerConfig {
    fn from(config: DenseConfig) -> Self {
        LayerConfig::Dense(config)
    }
}

pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "Dense",
            Layer::Dropout(_) => "Dropout",
        }
    }

    pub fn as_dense(&self) -> Option<&Dense> {
        match self {
            Layer::Dense(dense) => Some(dense),
            Layer::Dropout(_) => None,
        }
    }

    pub fn as_dense_mut(&mut self) -> Option<&mut Dense> {
        match self {
            Layer::Dense(dense) => Some(dense),
            Layer::Dropout(_) => None,
        }
    }

    pub fn count_params(&self) -> usize {
        self.as_dense().map_or(0, Dense::count_params)
    }

    pub fn infer(&self, input: &Tensor, execution_mode: ExecutionMode) -> Tensor {
        match self {
            Layer::Dense(dense) => dense.infer(input, execution_mode),
            Layer::Dropout(_) => input.clone(),
        }
    }

    pub fn forward(&mut self, input: &Tensor, execution_mode: ExecutionMode, rng: &mut Pcg64) -> Tensor {
        match self {
            Layer::Dense(dense) => dense.forward(input, execution_mode),
            Layer::Dropout(dropout) => dropout.forward(input, rng),
        }
    }

    pub fn backward(&mut self, grad: &Tensor, execution_mode: ExecutionMode) -> Result<Tensor> {
        match self {
            Layer::Dense(dense) => dense.backward(grad, execution_mode),
            Layer::Dropout(dropout) => Ok(dropout.backward(grad)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn backward_needs_forward() {
        let mut dense = DenseConfig::new(3, ActivationType::ReLU).init(2, 1);
        let grad = Tensor::ones_2d(1, 3);
        assert!(matches!(
            dense.backward(&grad, ExecutionMode::Sequential),
            Err(Error::MissingForwardPass)
        ));

        dense.forward(&Tensor::ones_2d(1, 2), ExecutionMode::Sequential);
        let grad_input = dense.backward(&grad, ExecutionMode::Sequential).unwrap();
        assert_eq!(grad_input.shape, vec![1, 2]);
    }

    #[test]
    fn dropout_scales_kept_units() {
        let mut dropout = Dropout::new(0.5).unwrap();
        let mut rng = Pcg64::seed_from_u64(3);
        let output = dropout.forward(&Tensor::ones_2d(10, 10), &mut rng);

        assert!(output.data.iter().all(|&v| v == 0.0 || v == 2.0));
        let grad = dropout.backward(&Tensor::ones_2d(10, 10));
        assert_eq!(grad, output);
    }
}
