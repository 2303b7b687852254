// ============================================================
// Layer 6 — Experiment Tracking
// ============================================================
// Implementations of the ExperimentTracker trait.
//
//   enabled + credentials    JsonlTracker: one JSON event per
//                            line in logs/experiment.jsonl
//   enabled, no credentials  error before training starts
//   disabled                 NoopTracker
//
// Event lines look like:
//   {"time":"2024-01-02T03:04:05+01:00","event":"metric","name":"loss","value":0.69,"step":1}
//
// The api key is checked but never written out.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::ExperimentTracker;

pub const EVENTS_FILE: &str = "experiment.jsonl";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub enabled:      bool,
    #[serde(skip_serializing)]
    pub api_key:      Option<String>,
    pub project_name: Option<String>,
    pub workspace:    Option<String>,
}

impl TrackingConfig {
    fn credentials(&self) -> Option<(&str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        present(&self.api_key)?;
        Some((present(&self.project_name)?, present(&self.workspace)?))
    }

    /// Fails when tracking is enabled without full credentials.
    pub fn check(&self) -> Result<()> {
        if self.enabled && self.credentials().is_none() {
            bail!("Experiment tracking is enabled: please provide an api key, project name and workspace");
        }
        Ok(())
    }
}

/// Open the tracker for a run whose logs live in `log_dir`.
pub fn open_tracker(cfg: &TrackingConfig, log_dir: &Path) -> Result<Box<dyn ExperimentTracker>> {
    cfg.check()?;
    match cfg.credentials() {
        Some((project, workspace)) if cfg.enabled => {
            Ok(Box::new(JsonlTracker::create(log_dir, project, workspace)?))
        }
        _ => Ok(Box::new(NoopTracker)),
    }
}

// ─── JSON lines ───────────────────────────────────────────────────────────────
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Start { project: &'a str, workspace: &'a str },
    DatasetHash { hash: &'a str },
    Tags { tags: &'a [String] },
    Parameters { parameters: &'a BTreeMap<String, String> },
    Metric { name: &'a str, value: f64, step: Option<usize> },
    Asset { path: String, bytes: u64 },
    End,
}

#[derive(Serialize)]
struct Line<'a> {
    time: String,
    #[serde(flatten)]
    event: Event<'a>,
}

pub struct JsonlTracker {
    path:  PathBuf,
    ended: bool,
}

impl JsonlTracker {
    pub fn create(log_dir: &Path, project: &str, workspace: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Cannot create '{}'", log_dir.display()))?;
        let mut tracker = Self { path: log_dir.join(EVENTS_FILE), ended: false };
        tracker.write(Event::Start { project, workspace })?;
        tracing::info!("Tracking experiment '{}/{}' in '{}'", workspace, project, tracker.path.display());
        Ok(tracker)
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        if self.ended {
            bail!("Experiment already ended");
        }
        let line = Line { time: chrono::Local::now().to_rfc3339(), event };
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;
        writeln!(f, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}

impl ExperimentTracker for JsonlTracker {
    fn log_dataset_hash(&mut self, hash: &str) -> Result<()> {
        self.write(Event::DatasetHash { hash })
    }

    fn add_tags(&mut self, tags: &[String]) -> Result<()> {
        self.write(Event::Tags { tags })
    }

    fn log_parameters(&mut self, parameters: &BTreeMap<String, String>) -> Result<()> {
        self.write(Event::Parameters { parameters })
    }

    fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) -> Result<()> {
        self.write(Event::Metric { name, value, step })
    }

    fn log_asset(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::metadata(path)
            .with_context(|| format!("Cannot log asset '{}'", path.display()))?
            .len();
        self.write(Event::Asset { path: path.display().to_string(), bytes })
    }

    fn end(&mut self) -> Result<()> {
        self.write(Event::End)?;
        self.ended = true;
        Ok(())
    }
}

// ─── No-op ────────────────────────────────────────────────────────────────────
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_dataset_hash(&mut self, _hash: &str) -> Result<()> { Ok(()) }

    fn add_tags(&mut self, _tags: &[String]) -> Result<()> { Ok(()) }

    fn log_parameters(&mut self, _params: &BTreeMap<String, String>) -> Result<()> { Ok(()) }

    fn log_metric(&mut self, _name: &str, _value: f64, _step: Option<usize>) -> Result<()> { Ok(()) }

    fn log_asset(&mut self, _path: &Path) -> Result<()> { Ok(()) }

    fn end(&mut self) -> Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(api_key: Option<&str>) -> TrackingConfig {
        TrackingConfig {
            enabled:      true,
            api_key:      api_key.map(String::from),
            project_name: Some("lexitrain".into()),
            workspace:    Some("lab".into()),
        }
    }

    #[test]
    fn test_enabled_without_credentials_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_tracker(&enabled(None), dir.path()).is_err());
        assert!(open_tracker(&enabled(Some("  ")), dir.path()).is_err());
    }

    #[test]
    fn test_credentials_need_every_field() {
        assert_eq!(enabled(Some("key")).credentials(), Some(("lexitrain", "lab")));

        let mut cfg = enabled(Some("key"));
        cfg.workspace = Some(String::new());
        assert_eq!(cfg.credentials(), None);
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = open_tracker(&TrackingConfig::default(), dir.path()).unwrap();
        tracker.log_metric("loss", 0.5, Some(1)).unwrap();
        tracker.end().unwrap();
        assert!(!dir.path().join(EVENTS_FILE).exists());
    }

    #[test]
    fn test_jsonl_events() {
        let dir  = tempfile::tempdir().unwrap();
        let mut tracker = open_tracker(&enabled(Some("secret")), dir.path()).unwrap();
        tracker.add_tags(&["GRU".to_string()]).unwrap();
        tracker.log_metric("val_loss", 0.25, Some(3)).unwrap();
        tracker.end().unwrap();
        assert!(tracker.log_metric("late", 1.0, None).is_err());

        let content = fs::read_to_string(dir.path().join(EVENTS_FILE)).unwrap();
        let events: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["event"], "start");
        assert_eq!(events[2]["name"], "val_loss");
        assert_eq!(events[2]["step"], 3);
        assert_eq!(events[3]["event"], "end");
        assert!(!content.contains("secret"));
    }
}
