// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline talks to three things it does not own:
//
//   RecordSource       — where training rows come from
//   TextEmbedder       — the sentence embedding provider,
//                        an opaque text → vector function
//   ExperimentTracker  — the experiment-tracking service,
//                        an opaque telemetry sink
//
// Application code only sees these traits, so a local file
// loader, a hashing embedder and a JSON-lines tracker can be
// swapped for remote services without touching the use cases.

use std::{collections::BTreeMap, path::Path};

use anyhow::Result;

use crate::domain::record::TextRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
pub trait RecordSource {
    /// Load every usable record. Rows without text are skipped, not errors.
    fn load_all(&self) -> Result<Vec<TextRecord>>;
}

// ─── TextEmbedder ─────────────────────────────────────────────────────────────
/// Maps a text to a fixed-size dense vector.
///
/// Implementations must be deterministic: training and prediction
/// embed the same text independently and must agree.
pub trait TextEmbedder: Send + Sync {
    /// Length of every vector returned by `embed`
    fn dim(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Receives run telemetry. None of these calls influence training.
pub trait ExperimentTracker {
    fn log_dataset_hash(&mut self, hash: &str) -> Result<()>;

    fn add_tags(&mut self, tags: &[String]) -> Result<()>;

    fn log_parameters(&mut self, params: &BTreeMap<String, String>) -> Result<()>;

    /// `step` is the epoch for per-epoch metrics, `None` for final ones.
    fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) -> Result<()>;

    fn log_asset(&mut self, path: &Path) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}
