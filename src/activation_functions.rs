mod activation_function;

pub use activation_function::{ActivationFunction, ActivationType};
