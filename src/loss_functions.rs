mod loss_function;

pub use loss_function::{CategoricalCrossEntropy, Loss, LossFunction, MSE};
