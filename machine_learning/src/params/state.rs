use std::collections::{BTreeMap, btree_map};

use super::Tensor;
use crate::{MlErr, Result};

/// The complete named set of tensors that define a model at a point in time.
///
/// Keys are kept ordered so that iterating two compatible states always yields their
/// entries in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterState {
    tensors: BTreeMap<String, Tensor>,
}

impl ParameterState {
    /// Creates a new empty `ParameterState`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tensor under `key`, returning the previous one if present.
    pub fn insert<K: Into<String>>(&mut self, key: K, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(key.into(), tensor)
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }

    /// Gets the tensor under `key`.
    ///
    /// # Returns
    /// The tensor or a `MissingParameter` error.
    pub fn require(&self, key: &str) -> Result<&Tensor> {
        self.get(key).ok_or_else(|| MlErr::MissingParameter {
            key: key.to_string(),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Tensor> {
        self.tensors.iter()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Checks that `other` has exactly the same keys as `self` and that every pair of
    /// tensors shares type and shape.
    ///
    /// # Returns
    /// An error describing the first incompatibility found.
    pub fn check_compatible(&self, other: &ParameterState) -> Result<()> {
        if let Some(key) = other.keys().find(|key| self.get(key).is_none()) {
            return Err(MlErr::MissingParameter {
                key: key.to_string(),
            });
        }

        for (key, tensor) in self.iter() {
            let theirs = other.require(key)?;

            if !tensor.same_layout(theirs) {
                return Err(MlErr::IncompatibleTensor {
                    key: key.clone(),
                    expected: tensor.describe(),
                    got: theirs.describe(),
                });
            }
        }

        Ok(())
    }

    /// The largest absolute elementwise difference across all the tensors of two
    /// compatible states.
    ///
    /// # Returns
    /// `None` if the states aren't compatible.
    pub fn max_abs_diff(&self, other: &ParameterState) -> Option<f64> {
        self.check_compatible(other).ok()?;

        self.iter().try_fold(0f64, |acc, (key, tensor)| {
            let diff = tensor.max_abs_diff(other.get(key)?)?;
            Some(acc.max(diff))
        })
    }
}

impl FromIterator<(String, Tensor)> for ParameterState {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ParameterState {
    type Item = (String, Tensor);
    type IntoIter = btree_map::IntoIter<String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParameterState {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = btree_map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(entries: &[(&str, Tensor)]) -> ParameterState {
        entries
            .iter()
            .map(|(k, t)| (k.to_string(), t.clone()))
            .collect()
    }

    #[test]
    fn compatible_states() {
        let a = state(&[
            ("w", Tensor::from_f32(&[2], vec![1., 2.]).unwrap()),
            ("n", Tensor::scalar_i64(3)),
        ]);
        let b = state(&[
            ("n", Tensor::scalar_i64(5)),
            ("w", Tensor::from_f32(&[2], vec![0., 0.]).unwrap()),
        ]);

        assert!(a.check_compatible(&b).is_ok());
        assert_eq!(a.max_abs_diff(&b), Some(2.0));
    }

    #[test]
    fn missing_and_extra_keys_are_incompatible() {
        let a = state(&[("w", Tensor::from_f32(&[1], vec![1.]).unwrap())]);
        let b = state(&[
            ("w", Tensor::from_f32(&[1], vec![1.]).unwrap()),
            ("b", Tensor::from_f32(&[1], vec![1.]).unwrap()),
        ]);

        assert!(matches!(
            a.check_compatible(&b),
            Err(MlErr::MissingParameter { .. })
        ));
        assert!(matches!(
            b.check_compatible(&a),
            Err(MlErr::MissingParameter { .. })
        ));
    }

    #[test]
    fn shape_and_dtype_mismatches_are_incompatible() {
        let a = state(&[("w", Tensor::from_f32(&[2], vec![1., 2.]).unwrap())]);
        let b = state(&[("w", Tensor::from_f32(&[1, 2], vec![1., 2.]).unwrap())]);
        let c = state(&[("w", Tensor::from_i64(&[2], vec![1, 2]).unwrap())]);

        assert!(matches!(
            a.check_compatible(&b),
            Err(MlErr::IncompatibleTensor { .. })
        ));
        assert!(matches!(
            a.check_compatible(&c),
            Err(MlErr::IncompatibleTensor { .. })
        ));
    }
}
