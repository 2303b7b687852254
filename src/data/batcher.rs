// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implements burn's Batcher trait for both tasks.
//
// ClassificationBatcher
//   Input:  N ClassificationSamples with D-dim features
//   Output: features [N, D]
//           targets  [N, U]  float, multi-hot over U output units
//           classes  [N]     int, first class of each row
//
//   The label type decides U and what the targets mean:
//     binary-label  U = 1, target 1.0 when the row is class 1
//     single-label  U = C, one-hot
//     multi-label   U = C, multi-hot
//   `classes` feeds the cross-entropy loss of single-label runs.
//
// SequenceBatcher
//   Input:  N SequenceSamples of S context ids
//   Output: input_ids [N, S] int, targets [N] int
//
// All samples are padded/embedded to the same size upstream,
// so batching is a flatten followed by a reshape.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{ClassificationSample, SequenceSample};
use crate::domain::labels::LabelType;

// ─── Classification ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    pub features: Tensor<B, 2>,
    pub targets:  Tensor<B, 2>,
    pub classes:  Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    device:        B::Device,
    label_type:    LabelType,
    number_labels: usize,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device, label_type: LabelType, number_labels: usize) -> Self {
        Self { device, label_type, number_labels }
    }

    fn target_row(&self, label_ids: &[usize]) -> Vec<f32> {
        match self.label_type {
            LabelType::BinaryLabel => {
                vec![if label_ids.contains(&1) { 1.0 } else { 0.0 }]
            }
            LabelType::SingleLabel | LabelType::MultiLabel => {
                let mut row = vec![0.0f32; self.number_labels];
                for &id in label_ids {
                    if id < self.number_labels {
                        row[id] = 1.0;
                    }
                }
                row
            }
        }
    }
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let dim        = items.first().map(|s| s.features.len()).unwrap_or(0);
        let units      = self.label_type.output_units(self.number_labels);

        let features_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();

        let targets_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| self.target_row(&s.label_ids))
            .collect();

        let classes: Vec<i32> = items
            .iter()
            .map(|s| s.label_ids.first().copied().unwrap_or(0) as i32)
            .collect();

        let features = Tensor::<B, 1>::from_floats(features_flat.as_slice(), &self.device)
            .reshape([batch_size, dim]);
        let targets = Tensor::<B, 1>::from_floats(targets_flat.as_slice(), &self.device)
            .reshape([batch_size, units]);
        let classes = Tensor::<B, 1, Int>::from_ints(classes.as_slice(), &self.device);

        ClassificationBatch { features, targets, classes }
    }
}

// ─── Next-word sequences ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,
    pub targets:   Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SequenceSample, SequenceBatch<B>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<SequenceSample>) -> SequenceBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map(|s| s.input_ids.len()).unwrap_or(0);

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();
        let targets: Vec<i32> = items.iter().map(|s| s.target as i32).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        SequenceBatch { input_ids, targets }
    }
}
