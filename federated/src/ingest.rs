use log::info;
use machine_learning::{
    dataset::{Dataset, make_blobs, read_csv},
    preprocessing::{LabelEncoder, StandardScaler},
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    config::{DatasetConfig, FederatedConfig},
};

/// A loaded, encoded, standardized and split dataset, together with everything needed to
/// preprocess new samples the same way.
#[derive(Clone, Debug)]
pub struct PreparedData {
    pub train: Dataset,
    pub validation: Dataset,
    pub scaler: StandardScaler,
    pub encoder: LabelEncoder,
    pub feature_names: Vec<String>,
    pub label_name: String,
}

impl PreparedData {
    /// Encodes `labels`, standardizes `features` and splits them in a training and a
    /// validation set with a shuffle seeded by `seed`.
    pub fn from_raw<S: AsRef<str>>(
        features: Array2<f32>,
        labels: &[S],
        feature_names: Vec<String>,
        label_name: String,
        validation_ratio: f64,
        seed: u64,
    ) -> Result<Self> {
        let encoder = LabelEncoder::fit(labels);
        let y = encoder.encode_all(labels)?;

        let scaler = StandardScaler::fit(features.view())?;
        let x = scaler.transform(features.view())?;

        let mut rng = StdRng::seed_from_u64(seed);
        let (train, validation) = Dataset::new(x, y)?.split(validation_ratio, &mut rng)?;

        Ok(Self {
            train,
            validation,
            scaler,
            encoder,
            feature_names,
            label_name,
        })
    }

    /// The amount of classes of the dataset.
    pub fn num_classes(&self) -> usize {
        self.encoder.len()
    }
}

/// Loads the dataset described by `config` and prepares it for training.
pub fn prepare(config: &FederatedConfig) -> Result<PreparedData> {
    let (features, labels, feature_names, label_name) = match &config.dataset {
        DatasetConfig::Csv { path } => {
            info!("reading {}", path.display());
            let table = read_csv(path)?;
            (table.features, table.labels, table.feature_names, table.label_name)
        }
        DatasetConfig::Synthetic {
            samples,
            features,
            classes,
            std_dev,
        } => {
            let mut rng = StdRng::seed_from_u64(config.random_seed);
            let blobs = make_blobs(*samples, *features, *classes, *std_dev, &mut rng)?;
            let labels = blobs.y().iter().map(usize::to_string).collect();
            let names = (0..*features).map(|i| format!("feature_{i}")).collect();
            (blobs.x().to_owned(), labels, names, "class".to_string())
        }
    };

    let data = PreparedData::from_raw(
        features,
        &labels,
        feature_names,
        label_name,
        config.validation_ratio,
        config.random_seed,
    )?;

    info!(
        train = data.train.len(),
        validation = data.validation.len(),
        classes = data.num_classes();
        "prepared dataset"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn from_raw() {
        let features = array![[1f32, 10.], [2., 20.], [3., 30.], [4., 40.], [5., 50.]];
        let labels = ["high", "low", "low", "high", "low"];
        let data = PreparedData::from_raw(
            features,
            &labels,
            vec!["a".into(), "b".into()],
            "level".into(),
            0.2,
            42,
        )
        .unwrap();

        assert_eq!(data.train.len(), 4);
        assert_eq!(data.validation.len(), 1);
        assert_eq!(data.num_classes(), 2);
        assert_eq!(data.encoder.classes(), ["high", "low"]);
        assert_eq!(data.scaler.mean()[0], 3.);
    }

    #[test]
    fn synthetic() {
        let config = FederatedConfig {
            dataset: DatasetConfig::Synthetic {
                samples: 100,
                features: 3,
                classes: 3,
                std_dev: 1.,
            },
            ..Default::default()
        };

        let data = prepare(&config).unwrap();
        assert_eq!(data.train.len() + data.validation.len(), 100);
        assert_eq!(data.validation.len(), 20);
        assert_eq!(data.feature_names, ["feature_0", "feature_1", "feature_2"]);
        assert_eq!(data.train.x_size(), 3);
    }
}
