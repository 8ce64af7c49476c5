pub mod activation_functions;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod experiments;
pub mod helpers;
pub mod initializers;
pub mod layer;
pub mod loss_functions;
pub mod mlp;
pub mod mnist_data;
pub mod optimizers;
pub mod preprocessing;
pub mod regularizers;
pub mod tensor;
pub mod weights;

pub use error::{Error, Result};
pub use tensor::Tensor;
