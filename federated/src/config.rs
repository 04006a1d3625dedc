use std::{fs, num::NonZeroUsize, path::PathBuf, time::Duration};

use machine_learning::arch::activations::ActFn;
use serde::{Deserialize, Serialize};

use crate::{FederatedErr, Result};

/// Where the samples of a simulation come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// A csv file with a header row, numeric feature columns and the label in the last one.
    Csv { path: PathBuf },
    /// Seeded gaussian blobs, one per class.
    Synthetic {
        samples: usize,
        features: usize,
        classes: usize,
        std_dev: f32,
    },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Synthetic {
            samples: 5000,
            features: 11,
            classes: 2,
            std_dev: 2.,
        }
    }
}

/// The activation applied after every hidden block of the classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenActivation {
    #[default]
    Relu,
    Sigmoid,
}

impl HiddenActivation {
    pub fn act_fn(self) -> ActFn {
        match self {
            Self::Relu => ActFn::relu(),
            Self::Sigmoid => ActFn::sigmoid(1.),
        }
    }
}

const DEFAULT_CLIENTS: NonZeroUsize = NonZeroUsize::new(4).unwrap();
const DEFAULT_ROUNDS: NonZeroUsize = NonZeroUsize::new(5).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// The configuration of a federated training simulation.
///
/// Can be built in code, starting from `FederatedConfig::default()`, or read from a json
/// file where every missing field takes it's default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FederatedConfig {
    pub num_clients: NonZeroUsize,
    pub round_count: NonZeroUsize,
    pub local_epochs_per_round: NonZeroUsize,
    pub learning_rate: f32,
    pub batch_size: NonZeroUsize,
    pub eval_batch_size: NonZeroUsize,
    pub random_seed: u64,
    pub validation_ratio: f64,
    /// Seconds a concurrent round may take before failing, unbounded if absent.
    pub round_timeout_secs: Option<f64>,
    pub hidden_layers: Vec<usize>,
    pub hidden_activation: HiddenActivation,
    /// Whether to shuffle the training set before cutting it into shards.
    pub shuffle_partition: bool,
    pub dataset: DatasetConfig,
}

impl Default for FederatedConfig {
    fn default() -> Self {
        Self {
            num_clients: DEFAULT_CLIENTS,
            round_count: DEFAULT_ROUNDS,
            local_epochs_per_round: NonZeroUsize::MIN,
            learning_rate: 0.001,
            batch_size: DEFAULT_BATCH_SIZE,
            eval_batch_size: DEFAULT_BATCH_SIZE,
            random_seed: 42,
            validation_ratio: 0.2,
            round_timeout_secs: None,
            hidden_layers: vec![64, 32],
            hidden_activation: HiddenActivation::Relu,
            shuffle_partition: true,
            dataset: DatasetConfig::default(),
        }
    }
}

impl FederatedConfig {
    /// Reads and validates the json configuration at `path`.
    pub fn from_json_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let raw = fs::read_to_string(&path)?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a json configuration.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| FederatedErr::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value the type system can't.
    ///
    /// # Errors
    /// `FederatedErr::Configuration` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FederatedErr::Configuration(msg));

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return invalid(format!(
                "the learning rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if !(self.validation_ratio > 0. && self.validation_ratio < 1.) {
            return invalid(format!(
                "the validation ratio must be in (0, 1), got {}",
                self.validation_ratio
            ));
        }

        if let Some(secs) = self
            .round_timeout_secs
            .filter(|secs| !(secs.is_finite() && *secs > 0.))
        {
            return invalid(format!("the round timeout must be positive, got {secs}"));
        }

        if self.hidden_layers.contains(&0) {
            return invalid("hidden layers can't be empty".into());
        }

        if let DatasetConfig::Synthetic {
            samples,
            features,
            classes,
            std_dev,
        } = self.dataset
        {
            if samples == 0 || features == 0 || classes == 0 {
                return invalid("synthetic datasets need samples, features and classes".into());
            }

            if !(std_dev.is_finite() && std_dev >= 0.) {
                return invalid(format!("invalid synthetic std dev {std_dev}"));
            }
        }

        Ok(())
    }

    /// The per round timeout of the concurrent strategy.
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_secs.map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FederatedConfig::default();
        config.validate().unwrap();

        assert_eq!(config.num_clients.get(), 4);
        assert_eq!(config.round_count.get(), 5);
        assert_eq!(config.local_epochs_per_round.get(), 1);
        assert_eq!(config.batch_size.get(), 1000);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.round_timeout(), None);
    }

    #[test]
    fn partial_json() {
        let config = FederatedConfig::from_json_str(
            r#"{
                "num_clients": 8,
                "round_timeout_secs": 2.5,
                "dataset": { "kind": "csv", "path": "data/winequality-red.csv" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.num_clients.get(), 8);
        assert_eq!(config.round_count.get(), 5);
        assert_eq!(config.round_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(
            config.dataset,
            DatasetConfig::Csv {
                path: "data/winequality-red.csv".into()
            }
        );
    }

    #[test]
    fn hidden_activation_by_name() {
        let config = FederatedConfig::from_json_str(r#"{ "hidden_activation": "sigmoid" }"#).unwrap();
        assert_eq!(config.hidden_activation, HiddenActivation::Sigmoid);
        assert!(matches!(config.hidden_activation.act_fn(), ActFn::Sigmoid(_)));

        let res = FederatedConfig::from_json_str(r#"{ "hidden_activation": "tanh" }"#);
        assert!(matches!(res, Err(FederatedErr::Configuration(_))));
    }

    #[test]
    fn zero_counts_are_rejected() {
        let res = FederatedConfig::from_json_str(r#"{ "round_count": 0 }"#);
        assert!(matches!(res, Err(FederatedErr::Configuration(_))));
    }

    #[test]
    fn invalid_values() {
        let configs = [
            FederatedConfig {
                learning_rate: 0.,
                ..Default::default()
            },
            FederatedConfig {
                learning_rate: f32::NAN,
                ..Default::default()
            },
            FederatedConfig {
                validation_ratio: 1.,
                ..Default::default()
            },
            FederatedConfig {
                round_timeout_secs: Some(-1.),
                ..Default::default()
            },
            FederatedConfig {
                hidden_layers: vec![16, 0],
                ..Default::default()
            },
        ];

        for config in configs {
            assert!(
                matches!(config.validate(), Err(FederatedErr::Configuration(_))),
                "{config:?}"
            );
        }
    }
}
