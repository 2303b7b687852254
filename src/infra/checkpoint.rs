// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per checkpoint:
//   1. Model weights (.mpk file, half precision)
//   2. latest_epoch.json, the epoch that was saved last
//
// File naming convention:
//   checkpoint/
//     epoch_5.mpk         ← weights after epoch 5
//     epoch_10.mpk        ← weights after epoch 10
//     latest_epoch.json   ← contains 10
//
// Training opens the directory with `new` (created on demand);
// prediction uses `open`, which never touches the filesystem.
//
// The manager is generic over the module type, so the classifier
// and the next-word generator share it. Weights saved from the
// autodiff model load fine into the plain inference backend.
//
// Model configs are plain JSON next to the weights; loading a
// checkpoint needs the config first to rebuild an empty model.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const LATEST_FILE: &str = "latest_epoch.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Read-only handle on an existing checkpoint directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            bail!("No checkpoint directory at '{}'", dir.display());
        }
        Ok(Self { dir })
    }

    /// Path of the checkpoint for `epoch`, without the recorder's extension.
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("epoch_{epoch}"))
    }

    /// Save weights for `epoch` and move the latest pointer to it.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        save_weights(model, self.checkpoint_path(epoch))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest checkpoint into `model`.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        tracing::info!("Loading checkpoint from epoch {}", epoch);
        load_weights(model, self.checkpoint_path(epoch), device)
    }

    /// Epoch of the last saved checkpoint. Errors if nothing was saved.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("No checkpoint found in '{}'", self.dir.display()))?;
        Ok(serde_json::from_str::<usize>(s.trim())?)
    }

    pub fn has_checkpoint(&self) -> bool {
        self.dir.join(LATEST_FILE).exists()
    }
}

/// Write `model`'s record to `path` (the recorder appends its extension).
pub fn save_weights<B: Backend, M: Module<B>>(model: &M, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    model
        .clone()
        .save_file(path.clone(), &CompactRecorder::new())
        .map_err(|e| anyhow::anyhow!("Failed to save weights to '{}': {e}", path.display()))
}

pub fn load_weights<B: Backend, M: Module<B>>(
    model:  M,
    path:   impl Into<PathBuf>,
    device: &B::Device,
) -> Result<M> {
    let path = path.into();
    model
        .load_file(path.clone(), &CompactRecorder::new(), device)
        .map_err(|e| anyhow::anyhow!("Cannot load weights '{}': {e}", path.display()))
}

/// Whether a weights file written by `save_weights(…, path)` exists.
pub fn weights_exist<B: Backend>(path: &Path) -> bool {
    path.with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
        .is_file()
}

pub fn save_config<T: Serialize>(path: &Path, cfg: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
    tracing::debug!("Saved config to '{}'", path.display());
    Ok(())
}

pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid config in '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::Architecture;
    use crate::ml::model::{ClassifierConfig, ClassifierModel};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn first_weight(model: ClassifierModel<TestBackend>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_save_and_load_latest() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("checkpoint")).unwrap();
        let device  = Default::default();
        let config  = ClassifierConfig::new(Architecture::Nn, 8, 3);

        assert!(!manager.has_checkpoint());
        let model = config.init::<TestBackend>(&device);
        manager.save_model(&model, 5).unwrap();
        manager.save_model(&model, 7).unwrap();
        assert_eq!(manager.latest_epoch().unwrap(), 7);
        assert!(manager.has_checkpoint());
        assert!(weights_exist::<TestBackend>(&manager.checkpoint_path(5)));
        assert!(dir.path().join("checkpoint").join("epoch_7.mpk").is_file());
        assert!(!weights_exist::<TestBackend>(&manager.checkpoint_path(6)));

        let fresh  = config.init::<TestBackend>(&device);
        let loaded = manager.load_model(fresh, &device).unwrap();
        let (a, b) = (first_weight(model), first_weight(loaded));
        // CompactRecorder stores half precision
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-2));
    }

    #[test]
    fn test_open_does_not_create_dir() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");
        assert!(CheckpointManager::open(&path).is_err());
        assert!(!path.exists());

        CheckpointManager::new(&path).unwrap();
        assert!(!CheckpointManager::open(&path).unwrap().has_checkpoint());
    }

    #[test]
    fn test_latest_epoch_missing() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.latest_epoch().is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("config.json");
        let config = ClassifierConfig::new(Architecture::CnnGruNn, 16, 4);
        save_config(&path, &config).unwrap();
        let back: ClassifierConfig = load_config(&path).unwrap();
        assert_eq!(back.architecture, Architecture::CnnGruNn);
        assert_eq!(back.output_units, 4);
    }
}
