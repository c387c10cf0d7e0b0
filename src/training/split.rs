//! Stratified train/test splitting

use crate::error::{LabError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row indices of a single train/test split, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn validate_test_size(test_size: f64) -> Result<()> {
    if test_size > 0.0 && test_size < 1.0 {
        Ok(())
    } else {
        Err(LabError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        })
    }
}

/// Group row indices by integer class label, classes in ascending order
fn class_members(y: &Array1<f64>) -> Result<BTreeMap<i64, Vec<usize>>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        if !label.is_finite() || label.fract() != 0.0 {
            return Err(LabError::DataError(format!(
                "stratification label at row {} is not an integer class code: {}",
                i, label
            )));
        }
        classes.entry(label as i64).or_default().push(i);
    }
    Ok(classes)
}

/// Split rows so that every class keeps its share in both partitions.
///
/// The test partition holds `ceil(test_size * n)` rows. Per-class test counts
/// are allocated by largest remainder, and rows are drawn by shuffling each
/// class with a ChaCha8 generator seeded from `seed`, so the same inputs give
/// the same split.
pub fn stratified_split(y: &Array1<f64>, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    validate_test_size(test_size)?;

    let n_samples = y.len();
    let classes = class_members(y)?;

    if let Some((label, members)) = classes.iter().find(|(_, m)| m.len() < 2) {
        return Err(LabError::DataError(format!(
            "class {} has {} member(s); stratified splitting needs at least 2 per class",
            label,
            members.len()
        )));
    }

    let n_classes = classes.len();
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples - n_test;
    if n_test < n_classes || n_train < n_classes {
        return Err(LabError::DataError(format!(
            "a split of {} train / {} test rows cannot hold all {} classes",
            n_train, n_test, n_classes
        )));
    }

    // Largest-remainder allocation of the test rows across classes
    let mut allocation: Vec<(usize, f64)> = classes
        .values()
        .map(|members| {
            let quota = n_test as f64 * members.len() as f64 / n_samples as f64;
            (quota.floor() as usize, quota.fract())
        })
        .collect();
    let assigned: usize = allocation.iter().map(|(count, _)| count).sum();
    let mut by_remainder: Vec<usize> = (0..n_classes).collect();
    by_remainder.sort_by(|&a, &b| allocation[b].1.total_cmp(&allocation[a].1).then(a.cmp(&b)));
    for &class_idx in by_remainder.iter().take(n_test - assigned) {
        allocation[class_idx].0 += 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (members, (class_test, _)) in classes.values().zip(allocation) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        let (test_part, train_part) = shuffled.split_at(class_test.min(shuffled.len()));
        test.extend_from_slice(test_part);
        train.extend_from_slice(train_part);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(TrainTestSplit { train, test })
}
