mod label_encoder;
mod scaler;

pub use label_encoder::LabelEncoder;
pub use scaler::StandardScaler;
