use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Kernel penalty added to the training loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Regularizer {
    L2(f32),
}

impl Regularizer {
    pub fn penalty(&self, kernel: &Tensor) -> f32 {
        match self {
            Regularizer::L2(factor) => factor * kernel.square().sum(),
        }
    }

    pub fn gradient(&self, kernel: &Tensor) -> Tensor {
        match self {
            Regularizer::L2(factor) => kernel.scale(2.0 * factor),
        }
    }
}
