use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

pub trait ActivationFunction {

    fn activate(&self, layer: &Tensor) -> Tensor;

    /// Gradient w.r.t. the pre-activation, given the activated output and the
    /// upstream gradient w.r.t. that output.
    fn backward(&self, activated: &Tensor, grad: &Tensor) -> Tensor;

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationType {
    Linear,
    ReLU,
    Sigmoid,
    Tanh,
    Softmax,
}

impl ActivationType {
    pub fn name(&self) -> &'static str {
        match self {
            ActivationType::Linear => "linear",
            ActivationType::ReLU => "relu",
            ActivationType::Sigmoid => "sigmoid",
            ActivationType::Tanh => "tanh",
            ActivationType::Softmax => "softmax",
        }
    }
}

impl ActivationFunction for ActivationType {

    fn activate(&self, layer: &Tensor) -> Tensor {
        match self {
            ActivationType::Linear => layer.clone(),
            ActivationType::ReLU => layer.relu(),
            ActivationType::Sigmoid => layer.sigmoid(),
            ActivationType::Tanh => layer.tanh(),
            ActivationType::Softmax => layer.softmax_rows(),
        }
    }

    fn backward(&self, activated: &Tensor, grad: &Tensor) -> Tensor {
        assert_eq!(activated.shape, grad.shape, "Activation backward: shape mismatch {:?} vs {:?}", activated.shape, grad.shape);
        match self {
            ActivationType::Linear => grad.clone(),
            // relu(x) > 0 exactly when x > 0
            ActivationType::ReLU => {
                let data = activated.data.iter().zip(grad.data.iter())
                    .map(|(&a, &g)| if a > 0.0 { g } else { 0.0 })
                    .collect();
                Tensor::new(data, grad.shape.clone())
            }
            ActivationType::Sigmoid => {
                let data = activated.data.iter().zip(grad.data.iter())
                    .map(|(&s, &g)| g * s * (1.0 - s))
                    .collect();
                Tensor::new(data, grad.shape.clone())
            }
            ActivationType::Tanh => {
                let data = activated.data.iter().zip(grad.data.iter())
                    .map(|(&t, &g)| g * (1.0 - t * t))
                    .collect();
                Tensor::new(data, grad.shape.clone())
            }
            // Jacobian-vector product per row: s * (g - <g, s>)
            ActivationType::Softmax => {
                let cols = activated.cols();
                let mut data = vec![0.0; activated.size()];
                if cols > 0 {
                    for ((out, s), g) in data.chunks_mut(cols)
                        .zip(activated.data.chunks(cols))
                        .zip(grad.data.chunks(cols))
                    {
                        let dot: f32 = s.iter().zip(g.iter()).map(|(a, b)| a * b).sum();
                        for ((o, &si), &gi) in out.iter_mut().zip(s.iter()).zip(g.iter()) {
                            *o = si * (gi - dot);
                        }
                    }
                }
                Tensor::new(data, grad.shape.clone())
            }
        }
    }

}
