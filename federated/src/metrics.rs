use std::{
    fmt::{self, Display},
    time::Duration,
};

use serde::Serialize;

/// What happened in a single round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoundRecord {
    /// The index of the round, starting at 1.
    pub round: usize,
    /// The validation accuracy after the round, as a percentage.
    pub accuracy: f64,
    /// The wall clock duration of the entire round.
    pub duration: Duration,
    /// The mean of the clients' last epoch losses.
    pub mean_loss: f32,
}

/// The records of a full run of rounds with one execution strategy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetrics {
    pub strategy: String,
    pub records: Vec<RoundRecord>,
    /// The wall clock duration of the entire run.
    pub total: Duration,
}

impl RunMetrics {
    pub fn new<S: Into<String>>(strategy: S) -> Self {
        Self {
            strategy: strategy.into(),
            records: Vec::new(),
            total: Duration::ZERO,
        }
    }

    pub fn push(&mut self, record: RoundRecord) {
        self.records.push(record);
    }

    /// The accuracy of every round, in order.
    pub fn accuracies(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.accuracy).collect()
    }

    pub fn final_accuracy(&self) -> Option<f64> {
        self.records.last().map(|r| r.accuracy)
    }
}

impl Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(
                f,
                "[{}] round {}: accuracy {:.2}%, loss {:.4}, took {:.2}s",
                self.strategy,
                record.round,
                record.accuracy,
                record.mean_loss,
                record.duration.as_secs_f64()
            )?;
        }

        write!(
            f,
            "[{}] total time: {:.2}s",
            self.strategy,
            self.total.as_secs_f64()
        )
    }
}

/// The outcome of running the same simulation serially and concurrently.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comparison {
    pub serial: RunMetrics,
    pub concurrent: RunMetrics,
    pub num_clients: usize,
    pub speedup: f64,
    pub efficiency: f64,
}

impl Comparison {
    /// Compares two runs.
    ///
    /// `speedup = serial / concurrent` total time and `efficiency = speedup / num_clients`.
    pub fn new(serial: RunMetrics, concurrent: RunMetrics, num_clients: usize) -> Self {
        // Durations are clamped to a nanosecond so the ratios stay finite.
        let serial_secs = serial.total.max(Duration::from_nanos(1)).as_secs_f64();
        let concurrent_secs = concurrent.total.max(Duration::from_nanos(1)).as_secs_f64();

        let speedup = serial_secs / concurrent_secs;
        let efficiency = speedup / num_clients.max(1) as f64;

        Self {
            serial,
            concurrent,
            num_clients,
            speedup,
            efficiency,
        }
    }

    /// The report as pretty printed json.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.serial)?;
        writeln!(f, "{}", self.concurrent)?;
        writeln!(f, "Clients: {}", self.num_clients)?;
        writeln!(f, "Speedup: {:.2}", self.speedup)?;
        write!(f, "Efficiency: {:.2}", self.efficiency)
    }
}
