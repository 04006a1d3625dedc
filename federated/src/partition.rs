use std::ops::Range;

use machine_learning::dataset::Dataset;
use rand::{Rng, seq::SliceRandom};

use crate::{FederatedErr, Result};

/// Splits `total` samples among `num_shards` and returns the range of `shard_id`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1, the first `total % num_shards` shards get the extra sample.
///
/// Out of range shard ids get an empty range.
pub fn shard_range(total: usize, shard_id: usize, num_shards: usize) -> Range<usize> {
    if num_shards == 0 || shard_id >= num_shards {
        return total..total;
    }

    let base = total / num_shards;
    let rem = total % num_shards;

    let start = shard_id * base + shard_id.min(rem);
    let extra = if shard_id < rem { 1 } else { 0 };
    let end = start + base + extra;

    start..end
}

/// The size of every shard when splitting `total` samples in `num_shards` shards.
///
/// # Errors
/// `FederatedErr::Configuration` if there are no shards or more shards than samples.
pub fn shard_sizes(total: usize, num_shards: usize) -> Result<Vec<usize>> {
    if num_shards == 0 || num_shards > total {
        return Err(FederatedErr::Configuration(format!(
            "can't split {total} samples in {num_shards} non empty shards"
        )));
    }

    Ok((0..num_shards)
        .map(|i| shard_range(total, i, num_shards).len())
        .collect())
}

/// Assigns every index of `0..total` to exactly one of `num_shards` shards, shuffling them
/// first when given a random number generator.
pub fn partition_indices<R>(
    total: usize,
    num_shards: usize,
    rng: Option<&mut R>,
) -> Result<Vec<Vec<usize>>>
where
    R: Rng + ?Sized,
{
    shard_sizes(total, num_shards)?;

    let mut indices: Vec<usize> = (0..total).collect();
    if let Some(rng) = rng {
        indices.shuffle(rng);
    }

    Ok((0..num_shards)
        .map(|i| indices[shard_range(total, i, num_shards)].to_vec())
        .collect())
}

/// Partitions `dataset` in `num_shards` disjoint shards that together hold every sample.
pub fn partition<R>(dataset: &Dataset, num_shards: usize, rng: Option<&mut R>) -> Result<Vec<Dataset>>
where
    R: Rng + ?Sized,
{
    partition_indices(dataset.len(), num_shards, rng)?
        .iter()
        .map(|indices| dataset.select(indices).map_err(FederatedErr::from))
        .collect()
}
