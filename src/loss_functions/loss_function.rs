use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Predictions are clipped to `[EPSILON, 1 - EPSILON]` before the log.
pub const EPSILON: f32 = 1e-7;

pub trait LossFunction {

    /// Mean loss over the batch.
    fn forward(&self, predicted: &Tensor, target: &Tensor) -> f32;

    /// Gradient of the mean loss w.r.t. the predictions.
    fn backward(&self, predicted: &Tensor, target: &Tensor) -> Tensor;

}

pub struct MSE;

impl LossFunction for MSE {

    fn forward(&self, predicted: &Tensor, target: &Tensor) -> f32 {
        let diff = predicted - target;
        diff.square().sum() / predicted.size().max(1) as f32
    }

    fn backward(&self, predicted: &Tensor, target: &Tensor) -> Tensor {
        let diff = predicted - target;
        diff.scale(2.0 / predicted.size().max(1) as f32)
    }

}

pub struct CategoricalCrossEntropy;

impl LossFunction for CategoricalCrossEntropy {

    // sum of -y*log(y_hat), averaged over rows
    fn forward(&self, predicted: &Tensor, target: &Tensor) -> f32 {
        assert_eq!(predicted.shape, target.shape, "Shape mismatch {:?} vs {:?}", predicted.shape, target.shape);

        let mut total_loss = 0.0;
        for (&y_pred, &y_true) in predicted.data.iter().zip(target.data.iter()) {
            if y_true != 0.0 {
                total_loss -= y_true * y_pred.clamp(EPSILON, 1.0 - EPSILON).ln();
            }
        }

        total_loss / predicted.rows().max(1) as f32
    }

    fn backward(&self, predicted: &Tensor, target: &Tensor) -> Tensor {
        assert_eq!(predicted.shape, target.shape, "Shape mismatch {:?} vs {:?}", predicted.shape, target.shape);

        let n = predicted.rows().max(1) as f32;
        let data = predicted.data.iter().zip(target.data.iter())
            .map(|(&p, &y)| -y / (p.clamp(EPSILON, 1.0 - EPSILON) * n))
            .collect();
        Tensor::new(data, predicted.shape.clone())
    }

}

impl CategoricalCrossEntropy {

    /// Gradient w.r.t. the logits of a softmax output: `(p - y) / n`.
    pub fn softmax_backward(predicted: &Tensor, target: &Tensor) -> Tensor {
        assert_eq!(predicted.shape, target.shape, "Shape mismatch {:?} vs {:?}", predicted.shape, target.shape);
        let diff = predicted - target;
        diff.scale(1.0 / predicted.rows().max(1) as f32)
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    MeanSquaredError,
    CategoricalCrossEntropy,
}

impl Loss {
    pub fn name(&self) -> &'static str {
        match self {
            Loss::MeanSquaredError => "mean_squared_error",
            Loss::CategoricalCrossEntropy => "categorical_crossentropy",
        }
    }
}

impl LossFunction for Loss {

    fn forward(&self, predicted: &Tensor, target: &Tensor) -> f32 {
        match self {
            Loss::MeanSquaredError => MSE.forward(predicted, target),
            Loss::CategoricalCrossEntropy => CategoricalCrossEntropy.forward(predicted, target),
        }
    }

    fn backward(&self, predicted: &Tensor, target: &Tensor) -> Tensor {
        match self {
            Loss::MeanSquaredError => MSE.backward(predicted, target),
            Loss::CategoricalCrossEntropy => CategoricalCrossEntropy.backward(predicted, target),
        }
    }

}
