use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::embedder::fnv1a;

/// One embedded classification row.
/// `label_ids` holds every class index of the row (one for binary/single).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub features:  Vec<f32>,
    pub label_ids: Vec<usize>,
}

/// One next-word window: `input_ids` is the padded context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSample {
    pub input_ids: Vec<u32>,
    pub target:    u32,
}

/// Stable bytes for dataset fingerprinting.
pub trait Fingerprint {
    fn feed(&self, out: &mut Vec<u8>);
}

impl Fingerprint for ClassificationSample {
    fn feed(&self, out: &mut Vec<u8>) {
        self.features.iter().for_each(|f| out.extend_from_slice(&f.to_le_bytes()));
        self.label_ids.iter().for_each(|l| out.extend_from_slice(&(*l as u64).to_le_bytes()));
    }
}

impl Fingerprint for SequenceSample {
    fn feed(&self, out: &mut Vec<u8>) {
        self.input_ids.iter().for_each(|t| out.extend_from_slice(&t.to_le_bytes()));
        out.extend_from_slice(&self.target.to_le_bytes());
    }
}

pub struct TextDataset<S> {
    samples: Vec<S>,
}

impl<S> TextDataset<S> {
    pub fn new(samples: Vec<S>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn samples(&self) -> &[S] { &self.samples }
}

impl<S: Fingerprint> TextDataset<S> {
    /// Hex digest of every sample in order, logged to the experiment tracker.
    pub fn fingerprint(&self) -> String {
        let mut bytes = Vec::new();
        for sample in &self.samples {
            sample.feed(&mut bytes);
        }
        format!("{:016x}", fnv1a(&bytes))
    }
}

impl<S> Dataset<S> for TextDataset<S>
where
    S: Clone + Send + Sync,
{
    fn get(&self, index: usize) -> Option<S> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(ids: &[u32], target: u32) -> SequenceSample {
        SequenceSample { input_ids: ids.to_vec(), target }
    }

    #[test]
    fn test_dataset_get_and_len() {
        let ds = TextDataset::new(vec![seq(&[0, 2], 5), seq(&[2, 5], 7)]);
        assert_eq!(Dataset::len(&ds), 2);
        assert_eq!(ds.get(1).unwrap().target, 7);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_fingerprint_depends_on_content_and_order() {
        let a = TextDataset::new(vec![seq(&[0, 2], 5), seq(&[2, 5], 7)]);
        let b = TextDataset::new(vec![seq(&[0, 2], 5), seq(&[2, 5], 7)]);
        let c = TextDataset::new(vec![seq(&[2, 5], 7), seq(&[0, 2], 5)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
