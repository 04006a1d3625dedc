use std::{
    error::Error,
    fmt::{self, Display},
    io,
    time::Duration,
};

use machine_learning::MlErr;

/// The result type used in the entire federated module.
pub type Result<T> = std::result::Result<T, FederatedErr>;

/// All errors that can occur while simulating federated training. Any of them aborts the
/// current round.
#[derive(Debug)]
pub enum FederatedErr {
    /// Invalid configuration, caught before training starts.
    Configuration(String),
    /// A client couldn't complete it's local training.
    Training { client_id: usize, source: MlErr },
    /// The collected states can't be averaged.
    Aggregation(String),
    /// A round failed because of one of it's clients.
    Round {
        round: usize,
        client_id: usize,
        source: Box<FederatedErr>,
    },
    /// A round didn't finish in time.
    RoundTimeout { round: usize, timeout: Duration },
    /// A client task panicked or was cancelled.
    WorkerPanic { client_id: usize, msg: String },
    /// An error of the global model outside of local training.
    Model(MlErr),
    Io(io::Error),
}

impl FederatedErr {
    /// The id of the client that caused this error, if any.
    pub fn client_id(&self) -> Option<usize> {
        match self {
            Self::Training { client_id, .. }
            | Self::Round { client_id, .. }
            | Self::WorkerPanic { client_id, .. } => Some(*client_id),
            _ => None,
        }
    }
}

impl Display for FederatedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Training { client_id, source } => {
                write!(f, "client {client_id} failed to train: {source}")
            }
            Self::Aggregation(msg) => write!(f, "aggregation failed: {msg}"),
            Self::Round {
                round,
                client_id,
                source,
            } => write!(f, "round {round} failed on client {client_id}: {source}"),
            Self::RoundTimeout { round, timeout } => {
                write!(f, "round {round} timed out after {timeout:?}")
            }
            Self::WorkerPanic { client_id, msg } => {
                write!(f, "the task of client {client_id} panicked: {msg}")
            }
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for FederatedErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Training { source, .. } => Some(source),
            Self::Round { source, .. } => Some(source.as_ref()),
            Self::Model(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for FederatedErr {
    fn from(e: MlErr) -> Self {
        Self::Model(e)
    }
}

impl From<io::Error> for FederatedErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
