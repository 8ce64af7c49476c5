mod basic_ops;
mod tensor;
mod tensor_2d;

pub use tensor::{ExecutionMode, Tensor};
