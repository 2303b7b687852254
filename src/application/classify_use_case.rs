// ============================================================
// Layer 2 — ClassifyUseCase
// ============================================================
// Orchestrates a text-classification run in order:
//
//   Step 1: Load labelled rows          (Layer 4 - data)
//   Step 2: Clean text, fit encoder     (Layer 4 / 3)
//   Step 3: Embed every text            (Layer 4 - data)
//   Step 4: Split train/test/val        (Layer 4 - data)
//   Step 5: Create run dir, tracker     (Layer 6 - infra)
//   Step 6: Train with validation       (Layer 5 - ml)
//   Step 7: Evaluate on the test split  (Layer 5 - ml)
//   Step 8: Export and zip the run      (Layer 6 - infra)
//
// Returns the path of the zip archive.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use crate::data::{
    dataset::{ClassificationSample, TextDataset},
    embedder::{HashingEmbedder, DEFAULT_EMBEDDING_DIM},
    loader::JsonlLoader,
    normalizer::TextNormalizer,
    splitter::{split_three_way, DEFAULT_SEED},
};
use crate::domain::{
    labels::{Architecture, LabelEncoder, LabelType},
    record::TextRecord,
    traits::{RecordSource, TextEmbedder},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    export::{self, ModelInfo, ModelSpec, RunPaths},
    metrics::MetricsLogger,
    tracking::{open_tracker, TrackingConfig},
};
use crate::ml::{
    default_device,
    model::ClassifierConfig,
    trainer::{evaluate_classifier, train_classifier, FitOptions, TrainingContext},
};

const ENCODER_ID: usize = 0;

// ─── Classification Configuration ────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    pub data_path:        String,
    pub text_field:       String,
    pub label_field:      String,
    pub label_type:       LabelType,
    pub architecture:     Architecture,
    pub model_root:       String,
    pub embedding_dim:    usize,
    /// Fraction held out, split evenly into test and validation
    pub holdout_fraction: f64,
    pub lang:             String,
    pub fit:              FitOptions,
    pub tracking:         TrackingConfig,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            data_path:        "data/dataset.jsonl".to_string(),
            text_field:       "text".to_string(),
            label_field:      "label".to_string(),
            label_type:       LabelType::MultiLabel,
            architecture:     Architecture::CnnGruNn,
            model_root:       "models".to_string(),
            embedding_dim:    DEFAULT_EMBEDDING_DIM,
            holdout_fraction: 0.1,
            lang:             "english".to_string(),
            fit:              FitOptions::default(),
            tracking:         TrackingConfig::default(),
        }
    }
}

impl ClassifyConfig {
    pub fn validate(&self) -> Result<()> {
        self.fit.validate()?;
        self.tracking.check()?;
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            bail!("holdout fraction must be in [0, 1), got {}", self.holdout_fraction);
        }
        if self.embedding_dim == 0 {
            bail!("embedding dimension must be at least 1");
        }
        Ok(())
    }
}

// ─── ClassifyUseCase ──────────────────────────────────────────────────────────
pub struct ClassifyUseCase {
    config: ClassifyConfig,
}

impl ClassifyUseCase {
    pub fn new(config: ClassifyConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PathBuf> {
        let cfg     = &self.config;
        let started = Instant::now();
        cfg.validate()?;

        // ── Step 1: Load labelled rows ────────────────────────────────────────
        tracing::info!("Loading rows from '{}'", cfg.data_path);
        let records = JsonlLoader::new(&cfg.data_path, &cfg.text_field)
            .with_labels(&cfg.label_field)
            .load_all()?;
        if records.is_empty() {
            bail!("No usable rows in '{}'", cfg.data_path);
        }

        // ── Step 2: Clean text and fit the label encoder ──────────────────────
        let normalizer = TextNormalizer::new();
        let encoder    = LabelEncoder::fit(records.iter().flat_map(|r| r.labels.iter().map(String::as_str)));
        cfg.label_type.validate(encoder.len())?;
        tracing::info!("{} rows, {} classes: {:?}", records.len(), encoder.len(), encoder.classes());

        // ── Step 3: Embed ─────────────────────────────────────────────────────
        let embedder = HashingEmbedder::new(cfg.embedding_dim);
        let samples  = build_samples(&records, &normalizer, &embedder, &encoder, cfg.label_type)?;

        // ── Step 4: Split ─────────────────────────────────────────────────────
        let splits = split_three_way(samples, cfg.holdout_fraction, DEFAULT_SEED);
        tracing::info!(
            "Split: {} train, {} test, {} validation",
            splits.train.len(),
            splits.test.len(),
            splits.val.len(),
        );
        if splits.train.is_empty() || splits.val.is_empty() {
            bail!("Not enough rows to hold out a validation split ({} rows)", records.len());
        }
        let train = TextDataset::new(splits.train);
        let test  = TextDataset::new(splits.test);
        let val   = TextDataset::new(splits.val);

        // ── Step 5: Run directory and tracker ─────────────────────────────────
        let paths = RunPaths::new(&cfg.model_root, cfg.label_type.as_str(), &cfg.label_field);
        paths.create()?;

        let mut tracker = open_tracker(&cfg.tracking, &paths.logs)?;
        tracker.log_dataset_hash(&train.fingerprint())?;
        tracker.add_tags(&[
            "burn".to_string(),
            cfg.label_field.clone(),
            cfg.architecture.to_string(),
            "hashing-embedding".to_string(),
            cfg.lang.clone(),
            cfg.label_type.to_string(),
        ])?;
        let parameters = class_parameters(&encoder);
        tracker.log_parameters(&parameters)?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let device     = default_device();
        let units      = cfg.label_type.output_units(encoder.len());
        let model_cfg  = ClassifierConfig::new(cfg.architecture, embedder.dim(), units);
        let checkpoints = CheckpointManager::new(&paths.checkpoint)?;
        let logger      = MetricsLogger::new(&paths.logs)?;

        let mut trained = {
            let mut ctx = TrainingContext {
                checkpoints: &checkpoints,
                logger:      &logger,
                tracker:     tracker.as_mut(),
            };
            train_classifier(
                &model_cfg,
                cfg.label_type,
                encoder.len(),
                train,
                val,
                &cfg.fit,
                &mut ctx,
                &device,
            )?
        };

        // ── Step 7: Test split ────────────────────────────────────────────────
        if test.sample_count() > 0 {
            let scores = evaluate_classifier(
                &trained.model,
                cfg.label_type,
                encoder.len(),
                &test,
                cfg.fit.batch_size,
                &device,
            )?;
            tracing::info!(
                "Test: loss={:.4} macro_f1={:.4} accuracy={:.4}{}",
                scores.loss,
                scores.macro_f1,
                scores.accuracy,
                scores.hamming.map(|h| format!(" hamming={h:.4}")).unwrap_or_default(),
            );
            tracker.log_metric("test_loss", scores.loss, None)?;
            tracker.log_metric("test_macro_f1", scores.macro_f1, None)?;
            tracker.log_metric("test_accuracy", scores.accuracy, None)?;
            if let Some(h) = scores.hamming {
                tracker.log_metric("test_hamming", h, None)?;
            }
            trained.history.test = Some(scores);
        } else {
            tracing::warn!("Test split is empty, skipping evaluation");
        }

        // ── Step 8: Export ────────────────────────────────────────────────────
        let spec = ModelSpec::Classifier(model_cfg);
        let info = ModelInfo {
            name:       paths.name.clone(),
            label_type: cfg.label_type,
            created_at: chrono::Local::now().to_rfc3339(),
            model:      spec.clone(),
            fit:        cfg.fit.clone(),
            parameters,
        };

        export::export_weights(&paths, &trained.model)?;
        export::export_encoder(&paths, ENCODER_ID, cfg.label_type, &cfg.label_field, &encoder)?;
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

/// Embed each record and map its labels to encoder indices.
fn build_samples(
    records:    &[TextRecord],
    normalizer: &TextNormalizer,
    embedder:   &dyn TextEmbedder,
    encoder:    &LabelEncoder,
    label_type: LabelType,
) -> Result<Vec<ClassificationSample>> {
    let texts: Vec<String> = records.iter().map(|r| normalizer.clean_basic(&r.text)).collect();
    let embeddings = embedder.embed_batch(&texts);

    let mut truncated = 0usize;
    let mut samples   = Vec::with_capacity(records.len());

    for (record, features) in records.iter().zip(embeddings) {
        let mut label_ids = encoder.transform_all(&record.labels)?;
        if label_type != LabelType::MultiLabel && label_ids.len() > 1 {
            label_ids.truncate(1);
            truncated += 1;
        }
        samples.push(ClassificationSample { features, label_ids });
    }

    if truncated > 0 {
        tracing::warn!("{} rows had several labels for a {} run; kept the first", truncated, label_type);
    }
    Ok(samples)
}

/// Class index → class name, the parameters logged for a run.
pub fn class_parameters(encoder: &LabelEncoder) -> BTreeMap<String, String> {
    encoder
        .classes()
        .iter()
        .enumerate()
        .map(|(i, c)| (i.to_string(), c.clone()))
        .collect()
}
