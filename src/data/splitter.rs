// ============================================================
// Layer 4 — Train/Test/Validation Splitter
// ============================================================
// Shuffles items and cuts them into evaluation sets.
//
// The shuffle is seeded (StdRng::seed_from_u64) so a run is
// reproducible: the same data and seed always give the same
// split, which matters when comparing architectures on the
// same held-out rows.
//
// split_three_way holds out `holdout_fraction` of the items
// and divides that part in half:
//
//   items ──shuffle──► [ train ........ | test | val ]
//                        1 - holdout      holdout/2 each
//
// Uses Fisher-Yates via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;

/// Shuffle `samples` and split into (train, validation).
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    // split_off(n) leaves [0..n] in samples and returns [n..]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

/// Result of a three-way split.
#[derive(Debug)]
pub struct Splits<T> {
    pub train: Vec<T>,
    pub test:  Vec<T>,
    pub val:   Vec<T>,
}

/// Hold out `holdout_fraction` of the items, half for test and half for validation.
pub fn split_three_way<T>(items: Vec<T>, holdout_fraction: f64, seed: u64) -> Splits<T> {
    let (train, holdout) = split_train_val(items, 1.0 - holdout_fraction, seed);
    let (test, val) = split_train_val(holdout, 0.5, seed);
    Splits { train, test, val }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8, DEFAULT_SEED);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..50).collect::<Vec<usize>>(), 0.7, 7);
        let b = split_train_val((0..50).collect::<Vec<usize>>(), 0.7, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.7, DEFAULT_SEED);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.8, DEFAULT_SEED);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_three_way_sizes() {
        let splits = split_three_way((0..200).collect::<Vec<usize>>(), 0.1, DEFAULT_SEED);
        assert_eq!(splits.train.len(), 180);
        assert_eq!(splits.test.len(),  10);
        assert_eq!(splits.val.len(),   10);
    }
}
