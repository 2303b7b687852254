// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Opens an exported run directory and answers with the model
// it holds:
//
//   classification run   classify(text)        → ranked labels
//   generation run       next_word(text)       → most likely word
//                        complete(text, n)     → next n words
//
// The model kind comes from model.json, so the caller only
// needs the run directory. The decision threshold only applies
// to binary and multi-label classifiers.

use anyhow::{bail, Result};
use std::path::Path;

use crate::data::embedder::HashingEmbedder;
use crate::domain::labels::Task;
use crate::infra::export::{ModelBundle, ModelSpec};
use crate::ml::{
    default_device,
    inferencer::{ClassifierInferencer, GeneratorInferencer, Prediction},
};

enum Loaded {
    Classifier(ClassifierInferencer),
    Generator(GeneratorInferencer),
}

pub struct PredictUseCase {
    bundle: ModelBundle,
    loaded: Loaded,
}

impl PredictUseCase {
    pub fn open(run_dir: impl AsRef<Path>) -> Result<Self> {
        let bundle = ModelBundle::open(run_dir)?;
        let device = default_device();

        let loaded = match &bundle.info.model {
            ModelSpec::Classifier(config) => {
                let model = bundle.load_classifier(&device)?;
                Loaded::Classifier(ClassifierInferencer::new(
                    model,
                    Box::new(HashingEmbedder::new(config.embedding_dim)),
                    bundle.encoder()?.clone(),
                    bundle.info.label_type,
                    device,
                ))
            }
            ModelSpec::Generator(config) => {
                let model = bundle.load_generator(&device)?;
                Loaded::Generator(GeneratorInferencer::new(
                    model,
                    bundle.tokenizer()?,
                    config.input_shape,
                    config.number_labels,
                    device,
                ))
            }
        };

        Ok(Self { bundle, loaded })
    }

    /// Replace the default 0.5 decision threshold of a classification run.
    pub fn with_threshold(mut self, threshold: f32) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("threshold must be in (0, 1], got {threshold}");
        }
        self.loaded = match self.loaded {
            Loaded::Classifier(inferencer) => Loaded::Classifier(inferencer.with_threshold(threshold)),
            Loaded::Generator(inferencer) => {
                tracing::warn!("Threshold ignored for generation run '{}'", self.bundle.info.name);
                Loaded::Generator(inferencer)
            }
        };
        Ok(self)
    }

    pub fn task(&self) -> Task {
        self.bundle.info.model.task()
    }

    pub fn classify(&self, text: &str) -> Result<Vec<Prediction>> {
        match &self.loaded {
            Loaded::Classifier(inferencer) => inferencer.predict(text),
            Loaded::Generator(_) => bail!("'{}' is a generation run; use `complete`", self.bundle.info.name),
        }
    }

    pub fn next_word(&self, text: &str) -> Result<Option<Prediction>> {
        match &self.loaded {
            Loaded::Generator(inferencer) => inferencer.next_word(text),
            Loaded::Classifier(_) => bail!("'{}' is a classification run; use `predict`", self.bundle.info.name),
        }
    }

    pub fn complete(&self, text: &str, words: usize) -> Result<Vec<String>> {
        match &self.loaded {
            Loaded::Generator(inferencer) => inferencer.complete(text, words),
            Loaded::Classifier(_) => bail!("'{}' is a classification run; use `predict`", self.bundle.info.name),
        }
    }
}
