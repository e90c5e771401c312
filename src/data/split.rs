use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{Error, Result};

/// Disjoint train / dev partition of a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub dev: Vec<T>,
}

/// Seeded shuffle-and-cut.
///
/// The dev set gets `ceil(len * holdout_fraction)` items. For a given seed
/// and input order the partition is always the same.
pub fn split<T>(mut items: Vec<T>, seed: u64, holdout_fraction: f64) -> Result<Split<T>> {
    if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return Err(Error::configuration(format!(
            "holdout fraction must be in (0, 1), got {holdout_fraction}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let total = items.len();
    let dev_len = ((total as f64) * holdout_fraction).ceil() as usize;
    let train = items.split_off(dev_len.min(total));
    let dev = items;

    tracing::debug!(
        "Dataset split: {} training, {} dev (holdout {})",
        train.len(),
        dev.len(),
        holdout_fraction
    );
    Ok(Split { train, dev })
}
