mod batch_norm;
mod dense;
mod layer;

pub use batch_norm::BatchNorm;
pub use dense::Dense;
pub use layer::Layer;
