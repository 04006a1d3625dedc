use std::collections::BTreeSet;

use crate::{MlErr, Result};

/// Maps raw class labels to `0..n` and back.
///
/// Classes are sorted numerically when every label is a number and lexicographically
/// otherwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        let mut classes: Vec<String> = unique.into_iter().collect();

        let numeric: Option<Vec<f64>> = classes.iter().map(|c| c.parse().ok()).collect();
        if let Some(values) = numeric {
            let mut pairs: Vec<_> = values.into_iter().zip(classes).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            classes = pairs.into_iter().map(|(_, c)| c).collect();
        }

        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| MlErr::UnknownLabel(label.to_string()))
    }

    pub fn encode_all<I, S>(&self, labels: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|label| self.encode(label.as_ref()))
            .collect()
    }

    pub fn decode(&self, class: usize) -> Result<&str> {
        self.classes
            .get(class)
            .map(String::as_str)
            .ok_or(MlErr::UnknownClass(class))
    }
}
