mod state;
mod tensor;

pub use state::ParameterState;
pub use tensor::{DType, Tensor};
