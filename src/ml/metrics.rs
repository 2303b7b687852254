// ============================================================
// Layer 5 — Evaluation Metrics (host side)
// ============================================================
// Metrics run on plain Vecs pulled off the device once per
// batch, then are computed over the whole epoch:
//
//   macro_f1          thresholded F1 per label column, averaged
//                     over every column (a label never seen nor
//                     predicted scores 0, like the soft-F1 cost)
//   macro_f1_classes  F1 per class index, averaged over the
//                     classes that occur in truth or prediction;
//                     used for thousands of next-word classes
//   hamming_score     per-row |T ∩ P| / |T ∪ P|, 1 when both
//                     sets are empty, averaged over rows
//   accuracy          binary/multi: element-wise, single: argmax

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::labels::LabelType;

pub const DEFAULT_THRESHOLD: f32 = 0.5;
const F1_EPSILON: f64 = 1e-16;

fn f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    let tp = tp as f64;
    2.0 * tp / (2.0 * tp + fn_ as f64 + fp as f64 + F1_EPSILON)
}

/// Macro F1 over label columns of multi-hot targets and probability rows.
pub fn macro_f1(y_true: &[Vec<f32>], y_prob: &[Vec<f32>], thresh: f32) -> f64 {
    let cols = y_true.first().map(Vec::len).unwrap_or(0);
    if cols == 0 {
        return 0.0;
    }

    let total: f64 = (0..cols)
        .map(|c| {
            let (mut tp, mut fp, mut fn_) = (0, 0, 0);
            for (t, p) in y_true.iter().zip(y_prob) {
                let truth = t[c] > 0.5;
                let pred  = p[c] > thresh;
                match (truth, pred) {
                    (true,  true)  => tp += 1,
                    (false, true)  => fp += 1,
                    (true,  false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            f1(tp, fp, fn_)
        })
        .sum();

    total / cols as f64
}

/// Macro F1 over class indices, averaged over classes seen in truth or prediction.
pub fn macro_f1_classes(y_true: &[usize], y_pred: &[usize]) -> f64 {
    // class → (tp, fp, fn)
    let mut counts: BTreeMap<usize, (usize, usize, usize)> = BTreeMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t == p {
            counts.entry(t).or_default().0 += 1;
        } else {
            counts.entry(p).or_default().1 += 1;
            counts.entry(t).or_default().2 += 1;
        }
    }
    if counts.is_empty() {
        return 0.0;
    }
    let total: f64 = counts.values().map(|&(tp, fp, fn_)| f1(tp, fp, fn_)).sum();
    total / counts.len() as f64
}

/// Label-based accuracy for multi-label predictions.
pub fn hamming_score(y_true: &[Vec<bool>], y_pred: &[Vec<bool>]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let active = |row: &[bool]| -> BTreeSet<usize> {
        row.iter().enumerate().filter(|(_, &on)| on).map(|(i, _)| i).collect()
    };

    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| {
            let set_true = active(t);
            let set_pred = active(p);
            if set_true.is_empty() && set_pred.is_empty() {
                1.0
            } else {
                let inter = set_true.intersection(&set_pred).count() as f64;
                let union = set_true.union(&set_pred).count() as f64;
                inter / union
            }
        })
        .sum();

    total / y_true.len() as f64
}

pub fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

pub fn accuracy(label_type: LabelType, y_true: &[Vec<f32>], y_prob: &[Vec<f32>]) -> f64 {
    match label_type {
        LabelType::SingleLabel => {
            if y_true.is_empty() {
                return 0.0;
            }
            let hits = y_true
                .iter()
                .zip(y_prob)
                .filter(|(t, p)| argmax(t) == argmax(p))
                .count();
            hits as f64 / y_true.len() as f64
        }
        LabelType::BinaryLabel | LabelType::MultiLabel => {
            let (mut hits, mut total) = (0usize, 0usize);
            for (t, p) in y_true.iter().zip(y_prob) {
                for (tv, pv) in t.iter().zip(p) {
                    hits  += usize::from((*tv > 0.5) == (*pv > DEFAULT_THRESHOLD));
                    total += 1;
                }
            }
            if total == 0 { 0.0 } else { hits as f64 / total as f64 }
        }
    }
}

// ─── Scores ───────────────────────────────────────────────────────────────────
/// Aggregated result of one pass over a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub loss:     f64,
    pub macro_f1: f64,
    pub accuracy: f64,
    /// Only meaningful for multi-label runs
    pub hamming:  Option<f64>,
}

/// Collects probability rows batch by batch (classification).
#[derive(Debug, Default)]
pub struct RowAccumulator {
    loss_sum: f64,
    batches:  usize,
    targets:  Vec<Vec<f32>>,
    probs:    Vec<Vec<f32>>,
}

impl RowAccumulator {
    pub fn add<B: Backend>(&mut self, loss: f64, targets: Tensor<B, 2>, probs: Tensor<B, 2>) -> Result<()> {
        self.loss_sum += loss;
        self.batches  += 1;
        self.targets.extend(to_rows(targets)?);
        self.probs.extend(to_rows(probs)?);
        Ok(())
    }

    pub fn finish(&self, label_type: LabelType) -> Scores {
        let loss = if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN };

        let macro_f1 = match label_type {
            LabelType::SingleLabel => {
                let truth: Vec<usize> = self.targets.iter().map(|r| argmax(r)).collect();
                let pred:  Vec<usize> = self.probs.iter().map(|r| argmax(r)).collect();
                macro_f1_classes(&truth, &pred)
            }
            _ => macro_f1(&self.targets, &self.probs, DEFAULT_THRESHOLD),
        };

        let hamming = (label_type == LabelType::MultiLabel).then(|| {
            let truth: Vec<Vec<bool>> = self.targets.iter()
                .map(|r| r.iter().map(|v| *v > 0.5).collect())
                .collect();
            let pred: Vec<Vec<bool>> = self.probs.iter()
                .map(|r| r.iter().map(|v| *v > DEFAULT_THRESHOLD).collect())
                .collect();
            hamming_score(&truth, &pred)
        });

        Scores {
            loss,
            macro_f1,
            accuracy: accuracy(label_type, &self.targets, &self.probs),
            hamming,
        }
    }
}

/// Collects predicted class indices batch by batch (next-word).
#[derive(Debug, Default)]
pub struct ClassAccumulator {
    loss_sum: f64,
    batches:  usize,
    truth:    Vec<usize>,
    pred:     Vec<usize>,
}

impl ClassAccumulator {
    pub fn add<B: Backend>(&mut self, loss: f64, targets: Tensor<B, 1, Int>, logits: Tensor<B, 2>) -> Result<()> {
        self.loss_sum += loss;
        self.batches  += 1;
        self.truth.extend(to_indices(targets)?);
        self.pred.extend(to_indices(logits.argmax(1).flatten::<1>(0, 1))?);
        Ok(())
    }

    pub fn finish(&self) -> Scores {
        let loss = if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN };
        let hits = self.truth.iter().zip(&self.pred).filter(|(t, p)| t == p).count();
        Scores {
            loss,
            macro_f1: macro_f1_classes(&self.truth, &self.pred),
            accuracy: if self.truth.is_empty() { 0.0 } else { hits as f64 / self.truth.len() as f64 },
            hamming:  None,
        }
    }
}

/// Pull a `[rows, cols]` float tensor into row vectors.
pub fn to_rows<B: Backend>(t: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, cols] = t.dims();
    let flat = t
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))?;
    Ok(flat.chunks(cols.max(1)).map(<[f32]>::to_vec).collect())
}

fn to_indices<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values = t
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))?;
    Ok(values.into_iter().map(|v| v.max(0) as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_macro_f1_perfect_and_absent_labels() {
        let y_true = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let y_prob = vec![vec![0.9, 0.1, 0.2], vec![0.2, 0.8, 0.1]];
        // labels 0 and 1 score 1, label 2 never appears and scores 0
        assert!((macro_f1(&y_true, &y_prob, 0.5) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_macro_f1_classes_ignores_unseen_classes() {
        // class 3: tp=1 → 1; class 1: fn=1 → 0; class 2: fp=1 → 0
        let score = macro_f1_classes(&[3, 1], &[3, 2]);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(macro_f1_classes(&[], &[]), 0.0);
    }

    #[test]
    fn test_hamming_score() {
        let y_true = vec![vec![true, false, true], vec![false, false, false], vec![true, true, false]];
        let y_pred = vec![vec![true, false, false], vec![false, false, false], vec![false, false, true]];
        // 1/2, 1 (both empty), 0/3
        let expected = (0.5 + 1.0 + 0.0) / 3.0;
        assert!((hamming_score(&y_true, &y_pred) - expected).abs() < 1e-9);
        assert_eq!(hamming_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_accuracy_modes() {
        let t = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let p = vec![vec![0.7, 0.6], vec![0.3, 0.9]];
        assert!((accuracy(LabelType::MultiLabel,  &t, &p) - 0.75).abs() < 1e-9);
        assert!((accuracy(LabelType::SingleLabel, &t, &p) - 1.0).abs()  < 1e-9);
    }

    #[test]
    fn test_row_accumulator_multi_label() {
        let device  = Default::default();
        let targets = Tensor::<NdArray, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);
        let probs   = Tensor::<NdArray, 2>::from_floats([[0.9, 0.2], [0.6, 0.7]], &device);

        let mut acc = RowAccumulator::default();
        acc.add(0.4, targets, probs).unwrap();
        let scores = acc.finish(LabelType::MultiLabel);

        assert!((scores.loss - 0.4).abs() < 1e-9);
        // row 1 exact, row 2 predicts {0, 1} for truth {1}
        assert!((scores.hamming.unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_row_accumulator_single_label_uses_argmax() {
        let device  = Default::default();
        let targets = Tensor::<NdArray, 2>::from_floats(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            &device,
        );
        // argmax predictions 0, 1, 0 against truth 0, 1, 1; class 2 never appears
        let probs = Tensor::<NdArray, 2>::from_floats(
            [[0.7, 0.2, 0.1], [0.1, 0.6, 0.3], [0.5, 0.3, 0.2]],
            &device,
        );

        let mut acc = RowAccumulator::default();
        acc.add(0.9, targets, probs).unwrap();
        let scores = acc.finish(LabelType::SingleLabel);

        assert!((scores.macro_f1 - 2.0 / 3.0).abs() < 1e-9);
        assert!((scores.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert!(scores.hamming.is_none());
    }

    #[test]
    fn test_class_accumulator() {
        let device  = Default::default();
        let targets = Tensor::<NdArray, 1, Int>::from_ints([1, 0], &device);
        let logits  = Tensor::<NdArray, 2>::from_floats([[0.1, 0.9], [0.2, 0.1]], &device);

        let mut acc = ClassAccumulator::default();
        acc.add(1.0, targets, logits).unwrap();
        let scores = acc.finish();
        assert!((scores.accuracy - 1.0).abs() < 1e-9);
        assert!(scores.hamming.is_none());
    }
}
