// ============================================================
// Layer 2 — GenerateUseCase
// ============================================================
// Orchestrates a next-word generation run in order:
//
//   Step 1: Load the text corpus          (Layer 4 - data)
//   Step 2: Normalize "[CLS] … [END]"     (Layer 4 - data)
//   Step 3: Split texts train/test/val    (Layer 4 - data)
//   Step 4: Create run dir, tracker       (Layer 6 - infra)
//   Step 5: Fit tokenizer into the run    (Layer 6 - infra)
//   Step 6: Window each split             (Layer 4 - data)
//   Step 7: Train, evaluate on test       (Layer 5 - ml)
//   Step 8: Export and zip the run        (Layer 6 - infra)
//
// Texts are split before windowing so no sentence feeds both
// training and evaluation.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Instant};
use tokenizers::Tokenizer;

use crate::application::classify_use_case::class_parameters;
use crate::data::{
    dataset::{SequenceSample, TextDataset},
    loader::JsonlLoader,
    normalizer::TextNormalizer,
    splitter::{split_three_way, DEFAULT_SEED},
    windowing::{self, build_samples},
};
use crate::domain::{
    labels::{Architecture, LabelEncoder, LabelType},
    traits::RecordSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    export::{self, ModelInfo, ModelSpec, RunPaths},
    metrics::MetricsLogger,
    tokenizer_store::{encode, id_to_words, TokenizerStore},
    tracking::{open_tracker, TrackingConfig},
};
use crate::ml::{
    default_device,
    model::GeneratorConfig,
    trainer::{evaluate_generator, train_generator, FitOptions, TrainingContext},
};

/// Next-word runs are single-label over the predictable vocabulary.
const LABEL_TYPE: LabelType = LabelType::SingleLabel;

// ─── Generation Configuration ────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub data_path:        String,
    pub text_field:       String,
    pub architecture:     Architecture,
    pub model_root:       String,
    /// Tokenizer size, padding and unknown ids included
    pub num_words:        usize,
    /// Cap on the number of predictable words
    pub max_labels:       usize,
    /// Context window length
    pub input_shape:      usize,
    /// Number of words predicted, also the encoder id
    pub words_predict:    usize,
    pub holdout_fraction: f64,
    pub lang:             String,
    pub fit:              FitOptions,
    pub tracking:         TrackingConfig,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            data_path:        "data/corpus.txt".to_string(),
            text_field:       "text".to_string(),
            architecture:     Architecture::Gru,
            model_root:       "models".to_string(),
            num_words:        30_000,
            max_labels:       5_000,
            input_shape:      64,
            words_predict:    1,
            holdout_fraction: 0.1,
            lang:             "english".to_string(),
            fit:              FitOptions::default(),
            tracking:         TrackingConfig::default(),
        }
    }
}

impl GenerateConfig {
    pub fn validate(&self) -> Result<()> {
        self.fit.validate()?;
        self.tracking.check()?;
        if self.num_words < 3 || self.max_labels < 3 {
            bail!("num_words and max_labels must both be at least 3");
        }
        if self.input_shape == 0 {
            bail!("input shape must be at least 1");
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            bail!("holdout fraction must be in [0, 1), got {}", self.holdout_fraction);
        }
        Ok(())
    }
}

// ─── GenerateUseCase ──────────────────────────────────────────────────────────
pub struct GenerateUseCase {
    config: GenerateConfig,
}

impl GenerateUseCase {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PathBuf> {
        let cfg     = &self.config;
        let started = Instant::now();
        cfg.validate()?;

        // ── Step 1: Load corpus ───────────────────────────────────────────────
        tracing::info!("Loading corpus from '{}'", cfg.data_path);
        let records = JsonlLoader::new(&cfg.data_path, &cfg.text_field).load_all()?;
        if records.is_empty() {
            bail!("No usable texts in '{}'", cfg.data_path);
        }

        // ── Step 2: Normalize ─────────────────────────────────────────────────
        let normalizer = TextNormalizer::new();
        let texts: Vec<String> = records
            .iter()
            .map(|r| normalizer.clean_for_generation(&r.text))
            .collect();
        tracing::info!("Normalized {} texts", texts.len());

        // ── Step 3: Split texts ───────────────────────────────────────────────
        let splits = split_three_way(texts.clone(), cfg.holdout_fraction, DEFAULT_SEED);

        // ── Step 4: Run directory and tracker ─────────────────────────────────
        let paths = RunPaths::new(&cfg.model_root, LABEL_TYPE.as_str(), &cfg.text_field);
        paths.create()?;
        let mut tracker = open_tracker(&cfg.tracking, &paths.logs)?;

        // ── Step 5: Tokenizer ─────────────────────────────────────────────────
        let tokenizer  = TokenizerStore::new(&paths.dir).fit_and_save(&texts, cfg.num_words)?;
        let vocab_size = tokenizer.get_vocab_size(true);
        let labels     = windowing::number_labels(vocab_size.min(cfg.num_words), cfg.max_labels);
        if labels < 3 {
            bail!("Corpus vocabulary is too small: {} ids", vocab_size);
        }
        tracing::info!("Vocabulary: {} ids, {} predictable labels", vocab_size, labels);

        // ── Step 6: Windows ───────────────────────────────────────────────────
        let train = windows(&tokenizer, &splits.train, cfg.input_shape, labels)?;
        let test  = windows(&tokenizer, &splits.test, cfg.input_shape, labels)?;
        let val   = windows(&tokenizer, &splits.val, cfg.input_shape, labels)?;
        tracing::info!(
            "Windows: {} train, {} test, {} validation",
            train.sample_count(),
            test.sample_count(),
            val.sample_count(),
        );
        if train.sample_count() == 0 || val.sample_count() == 0 {
            bail!("Not enough text to build training and validation windows");
        }

        let encoder    = LabelEncoder::from_classes(id_to_words(&tokenizer, labels));
        let parameters = class_parameters(&encoder);
        tracker.log_dataset_hash(&train.fingerprint())?;
        tracker.add_tags(&[
            "burn".to_string(),
            cfg.text_field.clone(),
            cfg.architecture.to_string(),
            cfg.lang.clone(),
            "words_prediction".to_string(),
        ])?;
        tracker.log_parameters(&parameters)?;

        // ── Step 7: Train and evaluate ────────────────────────────────────────
        let device    = default_device();
        let model_cfg = GeneratorConfig::new(cfg.architecture, vocab_size, cfg.input_shape, labels);
        let checkpoints = CheckpointManager::new(&paths.checkpoint)?;
        let logger      = MetricsLogger::new(&paths.logs)?;

        let mut trained = {
            let mut ctx = TrainingContext {
                checkpoints: &checkpoints,
                logger:      &logger,
                tracker:     tracker.as_mut(),
            };
            train_generator(&model_cfg, train, val, &cfg.fit, &mut ctx, &device)?
        };

        if test.sample_count() > 0 {
            let scores = evaluate_generator(&trained.model, &test, cfg.fit.batch_size, &device)?;
            tracing::info!(
                "Test: loss={:.4} macro_f1={:.4} accuracy={:.4}",
                scores.loss,
                scores.macro_f1,
                scores.accuracy,
            );
            tracker.log_metric("test_loss", scores.loss, None)?;
            tracker.log_metric("test_macro_f1", scores.macro_f1, None)?;
            tracker.log_metric("test_accuracy", scores.accuracy, None)?;
            trained.history.test = Some(scores);
        } else {
            tracing::warn!("Test split is empty, skipping evaluation");
        }

        // ── Step 8: Export ────────────────────────────────────────────────────
        let spec = ModelSpec::Generator(model_cfg);
        let info = ModelInfo {
            name:       paths.name.clone(),
            label_type: LABEL_TYPE,
            created_at: chrono::Local::now().to_rfc3339(),
            model:      spec.clone(),
            fit:        cfg.fit.clone(),
            parameters: [
                ("num_words".to_string(), cfg.num_words.to_string()),
                ("max_labels".to_string(), cfg.max_labels.to_string()),
                ("lang".to_string(), cfg.lang.clone()),
            ]
            .into_iter()
            .collect(),
        };

        export::export_weights(&paths, &trained.model)?;
        export::export_encoder(&paths, cfg.words_predict, LABEL_TYPE, &cfg.text_field, &encoder)?;
        export::export_summary(&paths, &spec)?;
        export::export_info(&paths, &info)?;
        export::export_metrics(&paths, &trained.history)?;
        let zip_path = export::archive(&paths)?;

        tracker.log_asset(&paths.summary)?;
        tracker.log_asset(&zip_path)?;
        tracker.end()?;

        tracing::info!("Run finished in {:.1?}", started.elapsed());
        Ok(zip_path)
    }
}

fn windows(
    tokenizer:     &Tokenizer,
    texts:         &[String],
    input_shape:   usize,
    number_labels: usize,
) -> Result<TextDataset<SequenceSample>> {
    let encoded = texts
        .iter()
        .map(|t| encode(tokenizer, t))
        .collect::<Result<Vec<_>>>()?;
    Ok(TextDataset::new(build_samples(&encoded, input_shape, number_labels)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::export::ModelBundle;
    use std::fs;

    #[test]
    fn test_validate_rejects_tiny_vocab() {
        let cfg = GenerateConfig { num_words: 2, ..GenerateConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_generation_run_exports_tokenizer_and_encoder() {
        let dir    = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        let lines: Vec<String> = (0..30)
            .map(|i| match i % 3 {
                0 => "the cat sat on the mat".to_string(),
                1 => "the dog ran in the park".to_string(),
                _ => "a bird sang in the tree".to_string(),
            })
            .collect();
        fs::write(&corpus, lines.join("\n")).unwrap();

        let cfg = GenerateConfig {
            data_path:   corpus.display().to_string(),
            model_root:  dir.path().join("models").display().to_string(),
            input_shape: 8,
            holdout_fraction: 0.2,
            fit: FitOptions { epochs: 1, batch_size: 16, ..FitOptions::default() },
            ..GenerateConfig::default()
        };

        let zip_path = GenerateUseCase::new(cfg).execute().unwrap();
        let run_dir  = zip_path.with_file_name(zip_path.file_stem().unwrap());
        assert!(run_dir.join("tokenizer.json").exists());
        assert!(run_dir.join("1_single-label_text_encoder.json").exists());

        let bundle = ModelBundle::open(&run_dir).unwrap();
        let words  = bundle.encoder().unwrap().classes();
        assert_eq!(&words[..2], ["[PAD]".to_string(), "[UNK]".to_string()]);
        assert!(words.contains(&"the".to_string()));
    }
}
