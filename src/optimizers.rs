use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Per-parameter update rule. Each trainable tensor is addressed by a stable
/// `slot` so optimizers can keep state between iterations.
pub trait Optimizer: Send {

    fn step(&mut self, slot: usize, param: &mut Tensor, grad: &Tensor);

    /// Called once after every parameter of a mini-batch has been stepped.
    fn finish_iteration(&mut self);

    /// Learning rate for the current iteration, after decay.
    fn learning_rate(&self) -> f32;

    fn name(&self) -> &'static str;

}

// lr / (1 + decay * iterations)
fn decayed(learning_rate: f32, decay: f32, iterations: u64) -> f32 {
    learning_rate / (1.0 + decay * iterations as f32)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub learning_rate: f32,
    pub momentum: f32,
    pub decay: f32,
    pub nesterov: bool,
}

impl Default for SgdConfig {
    fn default() -> Self {
        SgdConfig {
            learning_rate: 0.01,
            momentum: 0.0,
            decay: 0.0,
            nesterov: false,
        }
    }
}

impl SgdConfig {
    pub fn new(learning_rate: f32) -> Self {
        SgdConfig { learning_rate, ..Default::default() }
    }

    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn init(&self) -> Sgd {
        Sgd {
            config: *self,
            iterations: 0,
            velocities: HashMap::new(),
        }
    }
}

pub struct Sgd {
    config: SgdConfig,
    iterations: u64,
    velocities: HashMap<usize, Vec<f32>>,
}

impl Optimizer for Sgd {

    fn step(&mut self, slot: usize, param: &mut Tensor, grad: &Tensor) {
        assert_eq!(param.shape, grad.shape, "Sgd step: shape mismatch {:?} vs {:?}", param.shape, grad.shape);
        let lr = self.learning_rate();
        let momentum = self.config.momentum;

        if momentum == 0.0 {
            for (p, g) in param.data.iter_mut().zip(grad.data.iter()) {
                *p -= lr * g;
            }
            return;
        }

        let velocity = self.velocities
            .entry(slot)
            .or_insert_with(|| vec![0.0; grad.size()]);
        for ((p, g), v) in param.data.iter_mut().zip(grad.data.iter()).zip(velocity.iter_mut()) {
            *v = momentum * *v - lr * g;
            if self.config.nesterov {
                *p += momentum * *v - lr * g;
            } else {
                *p += *v;
            }
        }
    }

    fn finish_iteration(&mut self) {
        self.iterations += 1;
    }

    fn learning_rate(&self) -> f32 {
        decayed(self.config.learning_rate, self.config.decay, self.iterations)
    }

    fn name(&self) -> &'static str {
        "sgd"
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta_1: f32,
    pub beta_2: f32,
    /// A value required for numerical stability.
    pub epsilon: f32,
    pub decay: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
            decay: 0.0,
        }
    }
}

impl AdamConfig {
    pub fn new(learning_rate: f32) -> Self {
        AdamConfig { learning_rate, ..Default::default() }
    }

    pub fn with_betas(mut self, beta_1: f32, beta_2: f32) -> Self {
        self.beta_1 = beta_1;
        self.beta_2 = beta_2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    pub fn init(&self) -> Adam {
        Adam {
            config: *self,
            iterations: 0,
            moments: HashMap::new(),
        }
    }
}

struct AdaptiveMomentState {
    first: Vec<f32>,
    second: Vec<f32>,
}

/// Adam as described in [Adam: A Method for Stochastic Optimization](https://arxiv.org/pdf/1412.6980.pdf).
pub struct Adam {
    config: AdamConfig,
    iterations: u64,
    moments: HashMap<usize, AdaptiveMomentState>,
}

impl Optimizer for Adam {

    fn step(&mut self, slot: usize, param: &mut Tensor, grad: &Tensor) {
        assert_eq!(param.shape, grad.shape, "Adam step: shape mismatch {:?} vs {:?}", param.shape, grad.shape);
        let AdamConfig { beta_1, beta_2, epsilon, .. } = self.config;

        let t = (self.iterations + 1) as i32;
        let correction = (1.0 - beta_2.powi(t)).sqrt() / (1.0 - beta_1.powi(t));
        let step_size = self.learning_rate() * correction;

        let state = self.moments.entry(slot).or_insert_with(|| AdaptiveMomentState {
            first: vec![0.0; grad.size()],
            second: vec![0.0; grad.size()],
        });

        for (((p, &g), m), v) in param.data.iter_mut()
            .zip(grad.data.iter())
            .zip(state.first.iter_mut())
            .zip(state.second.iter_mut())
        {
            *m = beta_1 * *m + (1.0 - beta_1) * g;
            *v = beta_2 * *v + (1.0 - beta_2) * g * g;
            *p -= step_size * *m / (v.sqrt() + epsilon);
        }
    }

    fn finish_iteration(&mut self) {
        self.iterations += 1;
    }

    fn learning_rate(&self) -> f32 {
        decayed(self.config.learning_rate, self.config.decay, self.iterations)
    }

    fn name(&self) -> &'static str {
        "adam"
    }

}

/// Serializable choice of optimizer; `init` always starts from fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OptimizerConfig {
    Sgd(SgdConfig),
    Adam(AdamConfig),
}

impl OptimizerConfig {
    pub fn sgd() -> Self {
        OptimizerConfig::Sgd(SgdConfig::default())
    }

    pub fn adam() -> Self {
        OptimizerConfig::Adam(AdamConfig::default())
    }

    pub fn init(&self) -> Box<dyn Optimizer> {
        match self {
            OptimizerConfig::Sgd(config) => Box::new(config.init()),
            OptimizerConfig::Adam(config) => Box::new(config.init()),
        }
    }
}

impl From<SgdConfig> for OptimizerConfig {
    fn from(config: SgdConfig) -> Self {
        OptimizerConfig::Sgd(config)
    }
}

impl From<AdamConfig> for OptimizerConfig {
    fn from(config: AdamConfig) -> Self {
        OptimizerConfig::Adam(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param() -> Tensor {
        Tensor::new_2d(vec![1.0, -1.0, 0.5], 1, 3)
    }

    fn grad() -> Tensor {
        Tensor::new_2d(vec![0.5, -0.25, 0.0], 1, 3)
    }

    #[test]
    fn plain_sgd_moves_against_the_gradient() {
        let mut sgd = SgdConfig::new(0.1).init();
        let mut p = param();
        sgd.step(0, &mut p, &grad());
        let expected = Tensor::new_2d(vec![0.95, -0.975, 0.5], 1, 3);
        assert!(p.approx_eq(&expected, 1e-6));
    }

    #[test]
    fn sgd_momentum_accumulates_velocity() {
        let mut sgd = SgdConfig::new(0.1).with_momentum(0.5).init();
        let mut p = Tensor::scalar(1.0);
        let g = Tensor::scalar(1.0);

        sgd.step(0, &mut p, &g);
        sgd.finish_iteration();
        // v1 = -0.1
        assert!((p.data[0] - 0.9).abs() < 1e-6);

        sgd.step(0, &mut p, &g);
        // v2 = 0.5 * -0.1 - 0.1 = -0.15
        assert!((p.data[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn nesterov_looks_ahead_along_velocity() {
        let mut sgd = SgdConfig::new(0.1).with_momentum(0.5).with_nesterov(true).init();
        let mut p = Tensor::scalar(1.0);
        let g = Tensor::scalar(1.0);

        sgd.step(0, &mut p, &g);
        sgd.finish_iteration();
        // v1 = -0.1, p += 0.5 * -0.1 - 0.1
        assert!((p.data[0] - 0.85).abs() < 1e-6);

        sgd.step(0, &mut p, &g);
        // v2 = -0.15, p += 0.5 * -0.15 - 0.1
        assert!((p.data[0] - 0.675).abs() < 1e-6);
    }

    #[test]
    fn time_based_decay_shrinks_learning_rate() {
        let mut sgd = SgdConfig::new(0.001).with_momentum(0.0005).with_decay(0.0005).init();
        assert!((sgd.learning_rate() - 0.001).abs() < 1e-9);
        for _ in 0..2000 {
            sgd.finish_iteration();
        }
        // 0.001 / (1 + 0.0005 * 2000)
        assert!((sgd.learning_rate() - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn first_adam_step_has_learning_rate_magnitude() {
        let mut adam = AdamConfig::default().init();
        let mut p = param();
        adam.step(3, &mut p, &grad());
        assert!((p.data[0] - (1.0 - 0.001)).abs() < 1e-5);
        assert!((p.data[1] - (-1.0 + 0.001)).abs() < 1e-5);
        // zero gradient leaves the parameter untouched
        assert_eq!(p.data[2], 0.5);
    }

    #[test]
    fn optimizer_state_is_kept_per_slot() {
        let mut adam = AdamConfig::default().init();
        let mut a = Tensor::scalar(0.0);
        let mut b = Tensor::scalar(0.0);
        adam.step(0, &mut a, &Tensor::scalar(1.0));
        adam.step(1, &mut b, &Tensor::scalar(-1.0));
        assert!((a.data[0] + b.data[0]).abs() < 1e-7);
        assert_eq!(adam.moments.len(), 2);
    }
}
