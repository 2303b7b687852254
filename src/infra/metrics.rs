// ============================================================
// Layer 6 — Metrics Logger and History
// ============================================================
// Two records of the same numbers:
//
//   metrics.csv   appended once per epoch while training runs,
//                 so a crashed run still leaves its curve
//
//   metrics.json  written at export time from History, one
//                 series per metric, rounded to 5 decimals:
//                 {"loss": [0.69315, 0.61234], "val_loss": [...], ...}
//
// Example CSV output:
//   epoch,loss,val_loss,macro_f1,val_macro_f1,accuracy,val_accuracy
//   1,0.693147,0.690001,0.412000,0.398000,0.501000,0.497000
//
// Reading the curves:
//   - loss should go down every epoch
//   - val_loss rising while loss falls means overfitting

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::metrics::Scores;

const CSV_HEADER: &str = "epoch,loss,val_loss,macro_f1,val_macro_f1,accuracy,val_accuracy";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:        usize,
    pub loss:         f64,
    pub val_loss:     f64,
    pub macro_f1:     f64,
    pub val_macro_f1: f64,
    pub accuracy:     f64,
    pub val_accuracy: f64,
}

impl EpochMetrics {
    pub fn from_scores(epoch: usize, train: &Scores, val: &Scores) -> Self {
        Self {
            epoch,
            loss:         train.loss,
            val_loss:     val.loss,
            macro_f1:     train.macro_f1,
            val_macro_f1: val.macro_f1,
            accuracy:     train.accuracy,
            val_accuracy: val.accuracy,
        }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }

    /// (name, value) pairs in CSV column order, epoch excluded.
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("loss",         self.loss),
            ("val_loss",     self.val_loss),
            ("macro_f1",     self.macro_f1),
            ("val_macro_f1", self.val_macro_f1),
            ("accuracy",     self.accuracy),
            ("val_accuracy", self.val_accuracy),
        ]
    }
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.loss, m.val_loss, m.macro_f1, m.val_macro_f1, m.accuracy, m.val_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Per-metric series over all epochs, plus final test scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
    pub test:   Option<Scores>,
}

impl History {
    pub fn push(&mut self, m: EpochMetrics) {
        self.epochs.push(m);
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Lowest validation loss seen so far.
    pub fn best_val_loss(&self) -> f64 {
        self.epochs.iter().map(|m| m.val_loss).fold(f64::INFINITY, f64::min)
    }

    /// Metric name → per-epoch values rounded to 5 decimals, plus test_* scalars.
    pub fn to_series(&self) -> BTreeMap<String, Vec<f64>> {
        let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for m in &self.epochs {
            for (name, value) in m.named() {
                series.entry(name.to_string()).or_default().push(round5(value));
            }
        }
        if let Some(test) = &self.test {
            series.insert("test_loss".into(),     vec![round5(test.loss)]);
            series.insert("test_macro_f1".into(), vec![round5(test.macro_f1)]);
            series.insert("test_accuracy".into(), vec![round5(test.accuracy)]);
            if let Some(h) = test.hamming {
                series.insert("test_hamming".into(), vec![round5(h)]);
            }
        }
        series
    }
}

pub fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}
