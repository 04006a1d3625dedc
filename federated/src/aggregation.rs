use machine_learning::params::{ParameterState, Tensor};
use ndarray::{ArrayD, ArrayViewD, Axis, stack};
use rayon::prelude::*;

use crate::{FederatedErr, Result};

/// Federated averaging: fuses the states of every client in a single one by taking the
/// elementwise mean of each tensor.
///
/// Float tensors are averaged in their own precision. Integer tensors are averaged as `f64`
/// and cast back, truncating towards zero.
///
/// # Arguments
/// * `states` - The states to average, all with the same keys, shapes and dtypes.
///
/// # Returns
/// The averaged state or a `FederatedErr::Aggregation` error if there are no states or
/// they aren't compatible.
pub fn aggregate(states: &[ParameterState]) -> Result<ParameterState> {
    let (first, rest) = states
        .split_first()
        .ok_or_else(|| FederatedErr::Aggregation("there are no states to aggregate".into()))?;

    for state in rest {
        first
            .check_compatible(state)
            .map_err(|e| FederatedErr::Aggregation(e.to_string()))?;
    }

    let keys: Vec<&str> = first.keys().collect();
    let averaged = keys
        .par_iter()
        .map(|&key| {
            let column: Vec<&Tensor> = states.iter().filter_map(|state| state.get(key)).collect();
            average(key, &column).map(|tensor| (key.to_string(), tensor))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(averaged.into_iter().collect())
}

fn average(key: &str, tensors: &[&Tensor]) -> Result<Tensor> {
    let empty = || FederatedErr::Aggregation(format!("there are no values for {key}"));

    match tensors.first() {
        Some(Tensor::F32(_)) => {
            let views = views(key, tensors, |t| match t {
                Tensor::F32(a) => Some(a.view()),
                _ => None,
            })?;
            let avg = stacked(key, &views)?.mean_axis(Axis(0)).ok_or_else(empty)?;
            Ok(Tensor::F32(avg))
        }
        Some(Tensor::F64(_)) => {
            let views = views(key, tensors, |t| match t {
                Tensor::F64(a) => Some(a.view()),
                _ => None,
            })?;
            let avg = stacked(key, &views)?.mean_axis(Axis(0)).ok_or_else(empty)?;
            Ok(Tensor::F64(avg))
        }
        Some(Tensor::I64(_)) => {
            let views = views(key, tensors, |t| match t {
                Tensor::I64(a) => Some(a.view()),
                _ => None,
            })?;
            let avg = stacked(key, &views)?
                .mapv(|v| v as f64)
                .mean_axis(Axis(0))
                .ok_or_else(empty)?;
            Ok(Tensor::I64(avg.mapv(|v| v as i64)))
        }
        None => Err(empty()),
    }
}

fn views<'a, A, F>(key: &str, tensors: &[&'a Tensor], view: F) -> Result<Vec<ArrayViewD<'a, A>>>
where
    F: Fn(&'a Tensor) -> Option<ArrayViewD<'a, A>>,
{
    tensors
        .iter()
        .map(|&t| view(t))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| FederatedErr::Aggregation(format!("{key} has mixed dtypes")))
}

/// Stacks the tensors along a new leading axis.
fn stacked<A: Clone>(key: &str, views: &[ArrayViewD<'_, A>]) -> Result<ArrayD<A>> {
    stack(Axis(0), views).map_err(|e| FederatedErr::Aggregation(format!("{key}: {e}")))
}
