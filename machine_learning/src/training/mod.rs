mod evaluation;
mod model_trainer;

pub use evaluation::{Accuracy, evaluate};
pub use model_trainer::ModelTrainer;
