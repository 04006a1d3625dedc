mod concurrent;
mod executor;
mod serial;

pub use concurrent::ConcurrentExec;
pub use executor::Executor;
pub use serial::SerialExec;
