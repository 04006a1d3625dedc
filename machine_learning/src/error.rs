use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    BackwardBeforeForward,
    EmptyDataset,
    EmptyBatch,
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    MissingParameter {
        key: String,
    },
    IncompatibleTensor {
        key: String,
        expected: String,
        got: String,
    },
    InvalidShape(String),
    InvalidDistribution(String),
    UnknownLabel(String),
    UnknownClass(usize),
    Parse {
        line: usize,
        msg: String,
    },
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::BackwardBeforeForward => {
                f.write_str("Asked for a backward pass without a training forward pass")
            }
            MlErr::EmptyDataset => f.write_str("The dataset has no samples"),
            MlErr::EmptyBatch => f.write_str("Received an empty batch"),
            MlErr::LabelOutOfRange { label, classes } => write!(
                f,
                "Label {label} is out of range for a model with {classes} output classes"
            ),
            MlErr::MissingParameter { key } => {
                write!(f, "The parameter state has no entry for `{key}`")
            }
            MlErr::IncompatibleTensor { key, expected, got } => write!(
                f,
                "Tensor `{key}` is incompatible, expected {expected} and got {got}"
            ),
            MlErr::InvalidShape(msg) => write!(f, "Invalid shape: {msg}"),
            MlErr::InvalidDistribution(msg) => write!(f, "Invalid distribution: {msg}"),
            MlErr::UnknownLabel(label) => write!(f, "The label `{label}` was never seen"),
            MlErr::UnknownClass(class) => write!(f, "There's no label for class {class}"),
            MlErr::Parse { line, msg } => write!(f, "Parse error at line {line}: {msg}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ndarray::ShapeError> for MlErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::InvalidShape(value.to_string())
    }
}
