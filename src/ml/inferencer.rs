// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a trained model on the inference backend.
//
//   ClassifierInferencer   text → embedding → probabilities
//                          → ranked (label, probability) list
//   GeneratorInferencer    prefix → "[CLS] prefix" → token ids
//                          → left-padded window → next word
//
// Decisions per label type (see `decide`):
//   binary-label   one label: the positive class when p ≥ threshold,
//                  otherwise the negative class with 1 − p
//   multi-label    every label with p ≥ threshold, highest first
//   single-label   the argmax class
//
// Next-word decoding is greedy and never emits padding or the
// out-of-vocabulary bucket. `complete` stops early on [END].

use anyhow::{bail, Result};
use burn::{prelude::*, tensor::activation::softmax};
use serde::Serialize;
use tokenizers::Tokenizer;

use crate::data::{
    normalizer::{TextNormalizer, END_TOKEN},
    windowing::{is_predictable, pad_pre},
};
use crate::domain::{
    labels::{LabelEncoder, LabelType},
    traits::TextEmbedder,
};
use crate::infra::tokenizer_store::encode;
use crate::ml::{
    loss::probabilities,
    metrics::{to_rows, DEFAULT_THRESHOLD},
    model::{ClassifierModel, GeneratorModel},
    Device, InnerBackend,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label:       String,
    pub probability: f32,
}

// ─── Classifier ───────────────────────────────────────────────────────────────
pub struct ClassifierInferencer {
    model:      ClassifierModel<InnerBackend>,
    embedder:   Box<dyn TextEmbedder>,
    normalizer: TextNormalizer,
    encoder:    LabelEncoder,
    label_type: LabelType,
    threshold:  f32,
    device:     Device,
}

impl ClassifierInferencer {
    pub fn new(
        model:      ClassifierModel<InnerBackend>,
        embedder:   Box<dyn TextEmbedder>,
        encoder:    LabelEncoder,
        label_type: LabelType,
        device:     Device,
    ) -> Self {
        Self {
            model,
            embedder,
            normalizer: TextNormalizer::new(),
            encoder,
            label_type,
            threshold: DEFAULT_THRESHOLD,
            device,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Class probabilities for one text, in encoder order
    /// (a single positive-class probability for binary runs).
    pub fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let features = self.embedder.embed(&self.normalizer.clean_basic(text));
        if features.len() != self.embedder.dim() {
            bail!("Embedder returned {} values, expected {}", features.len(), self.embedder.dim());
        }

        let dim   = features.len();
        let input = Tensor::<InnerBackend, 1>::from_floats(features.as_slice(), &self.device)
            .reshape([1, dim]);
        let probs = probabilities(self.label_type, self.model.forward(input));

        to_rows(probs)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Model returned no output row"))
    }

    pub fn predict(&self, text: &str) -> Result<Vec<Prediction>> {
        let probs = self.probabilities(text)?;
        Ok(decide(self.label_type, &probs, self.encoder.classes(), self.threshold))
    }
}

/// Turn one probability row into ranked predictions.
pub fn decide(label_type: LabelType, probs: &[f32], classes: &[String], threshold: f32) -> Vec<Prediction> {
    let name = |i: usize| classes.get(i).cloned().unwrap_or_else(|| i.to_string());

    match label_type {
        LabelType::BinaryLabel => {
            let Some(&p) = probs.first() else { return Vec::new() };
            let prediction = if p >= threshold {
                Prediction { label: name(1), probability: p }
            } else {
                Prediction { label: name(0), probability: 1.0 - p }
            };
            vec![prediction]
        }
        LabelType::MultiLabel => {
            let mut hits: Vec<Prediction> = probs
                .iter()
                .enumerate()
                .filter(|(_, &p)| p >= threshold)
                .map(|(i, &p)| Prediction { label: name(i), probability: p })
                .collect();
            hits.sort_by(|a, b| b.probability.total_cmp(&a.probability));
            hits
        }
        LabelType::SingleLabel => probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &p)| vec![Prediction { label: name(i), probability: p }])
            .unwrap_or_default(),
    }
}

// ─── Next-word generator ──────────────────────────────────────────────────────
pub struct GeneratorInferencer {
    model:         GeneratorModel<InnerBackend>,
    tokenizer:     Tokenizer,
    normalizer:    TextNormalizer,
    input_shape:   usize,
    number_labels: usize,
    device:        Device,
}

impl GeneratorInferencer {
    pub fn new(
        model:         GeneratorModel<InnerBackend>,
        tokenizer:     Tokenizer,
        input_shape:   usize,
        number_labels: usize,
        device:        Device,
    ) -> Self {
        Self {
            model,
            tokenizer,
            normalizer: TextNormalizer::new(),
            input_shape,
            number_labels,
            device,
        }
    }

    fn context_ids(&self, prefix: &str) -> Result<Vec<u32>> {
        encode(&self.tokenizer, &self.normalizer.clean_prefix(prefix))
    }

    fn next_id(&self, ids: &[u32]) -> Result<Option<(u32, f32)>> {
        let window: Vec<i32> = pad_pre(ids, self.input_shape).iter().map(|&id| id as i32).collect();
        let input = Tensor::<InnerBackend, 1, Int>::from_ints(window.as_slice(), &self.device)
            .reshape([1, self.input_shape]);

        let probs = softmax(self.model.forward(input), 1);
        let row   = to_rows(probs)?.into_iter().next().unwrap_or_default();
        Ok(pick_next(&row, self.number_labels))
    }

    fn word(&self, id: u32) -> String {
        self.tokenizer.id_to_token(id).unwrap_or_default()
    }

    /// Most likely next word after `prefix`, with its probability.
    pub fn next_word(&self, prefix: &str) -> Result<Option<Prediction>> {
        let ids = self.context_ids(prefix)?;
        Ok(self
            .next_id(&ids)?
            .map(|(id, p)| Prediction { label: self.word(id), probability: p }))
    }

    /// Greedily append up to `n` words; stops after the end marker.
    pub fn complete(&self, prefix: &str, n: usize) -> Result<Vec<String>> {
        let mut ids   = self.context_ids(prefix)?;
        let mut words = Vec::with_capacity(n);
        let end       = END_TOKEN.to_lowercase();

        for _ in 0..n {
            let Some((id, _)) = self.next_id(&ids)? else { break };
            let word = self.word(id);
            ids.push(id);
            if word == end {
                break;
            }
            words.push(word);
        }

        tracing::debug!("Completed '{}' with {} words", prefix, words.len());
        Ok(words)
    }
}

/// Highest-probability predictable id of a softmax row.
pub fn pick_next(probs: &[f32], number_labels: usize) -> Option<(u32, f32)> {
    probs
        .iter()
        .enumerate()
        .map(|(i, &p)| (i as u32, p))
        .filter(|(id, _)| is_predictable(*id, number_labels))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::embedder::HashingEmbedder;
    use crate::domain::labels::Architecture;
    use crate::infra::tokenizer_store::TokenizerStore;
    use crate::ml::{backbone::DENSE_UNITS, model::{ClassifierConfig, GeneratorConfig}};
    use burn::module::Param;

    /// Generator whose head ignores its input and always favours `word`.
    fn biased_generator(tokenizer: &Tokenizer, word: &str) -> GeneratorInferencer {
        let device = crate::ml::default_device();
        let labels = tokenizer.get_vocab_size(true);
        let mut model = GeneratorConfig::new(Architecture::Nn, labels, 4, labels)
            .with_embed_dim(4)
            .init::<InnerBackend>(&device);

        let mut bias = vec![0.0f32; labels];
        bias[tokenizer.token_to_id(word).unwrap() as usize] = 10.0;
        model.head.weight = Param::from_tensor(Tensor::zeros([DENSE_UNITS, labels], &device));
        model.head.bias   = Some(Param::from_tensor(Tensor::from_floats(bias.as_slice(), &device)));

        GeneratorInferencer::new(model, tokenizer.clone(), 4, labels, device)
    }

    fn corpus_tokenizer(dir: &tempfile::TempDir) -> Tokenizer {
        let texts = vec![TextNormalizer::new().clean_for_generation("the cat sat")];
        TokenizerStore::new(dir.path()).fit_and_save(&texts, 100).unwrap()
    }

    fn classes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decide_binary() {
        let c = classes(&["negative", "positive"]);
        let yes = decide(LabelType::BinaryLabel, &[0.8], &c, 0.5);
        assert_eq!(yes, vec![Prediction { label: "positive".into(), probability: 0.8 }]);

        let no = decide(LabelType::BinaryLabel, &[0.25], &c, 0.5);
        assert_eq!(no[0].label, "negative");
        assert!((no[0].probability - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_decide_multi_sorted_and_thresholded() {
        let c = classes(&["a", "b", "c"]);
        let p = decide(LabelType::MultiLabel, &[0.6, 0.1, 0.9], &c, 0.5);
        let labels: Vec<&str> = p.iter().map(|x| x.label.as_str()).collect();
        assert_eq!(labels, vec!["c", "a"]);
        assert!(decide(LabelType::MultiLabel, &[0.1, 0.2, 0.3], &c, 0.5).is_empty());
    }

    #[test]
    fn test_decide_single_argmax() {
        let c = classes(&["a", "b", "c"]);
        let p = decide(LabelType::SingleLabel, &[0.2, 0.5, 0.3], &c, 0.5);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].label, "b");
    }

    #[test]
    fn test_pick_next_skips_padding_and_oov() {
        // id 1 (oov) has the highest probability but is never chosen
        let probs = [0.3, 0.4, 0.1, 0.2];
        assert_eq!(pick_next(&probs, 4), Some((3, 0.2)));
        assert_eq!(pick_next(&[0.5, 0.5], 2), None);
    }

    #[test]
    fn test_generator_greedy_next_word_and_complete() {
        let dir   = tempfile::tempdir().unwrap();
        let infer = biased_generator(&corpus_tokenizer(&dir), "cat");

        let next = infer.next_word("the").unwrap().unwrap();
        assert_eq!(next.label, "cat");
        assert!(next.probability > 0.9);
        assert_eq!(infer.complete("the", 3).unwrap(), vec!["cat", "cat", "cat"]);
        assert!(infer.complete("the", 0).unwrap().is_empty());
    }

    #[test]
    fn test_generator_complete_stops_at_end_marker() {
        let dir   = tempfile::tempdir().unwrap();
        let infer = biased_generator(&corpus_tokenizer(&dir), "[end]");

        assert_eq!(infer.next_word("the cat").unwrap().unwrap().label, "[end]");
        assert!(infer.complete("the cat", 5).unwrap().is_empty());
    }

    #[test]
    fn test_classifier_inferencer_probabilities() {
        let device   = crate::ml::default_device();
        let model    = ClassifierConfig::new(Architecture::Nn, 16, 3).init::<InnerBackend>(&device);
        let encoder  = LabelEncoder::from_classes(classes(&["x", "y", "z"]));
        let infer    = ClassifierInferencer::new(
            model,
            Box::new(HashingEmbedder::new(16)),
            encoder,
            LabelType::SingleLabel,
            device,
        );

        let probs = infer.probabilities("hello there").unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(infer.predict("hello there").unwrap().len(), 1);
    }
}
