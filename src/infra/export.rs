// ============================================================
// Layer 6 — Run Export
// ============================================================
// Every training run gets its own timestamped directory:
//
//   <root>/<prefix>_<label>_<YYYY_MM_DD_HH_MM_SS>/
//     model.mpk                           final weights
//     model.txt                           layer summary
//     model.json                          ModelInfo (rebuild recipe)
//     metrics.json                        per-epoch series, 5 decimals
//     {id}_{label_type}_{name}_encoder.json
//     tokenizer.json                      next-word runs only
//     logs/                               metrics.csv, experiment.jsonl
//     checkpoint/                         periodic weights
//
// and is finally zipped next to itself as <run>.zip, with every
// entry under the run directory name.
//
// ModelBundle reads a run directory back: info first, then the
// model is rebuilt from the stored config and the weights are
// loaded, from the exported file or else the latest checkpoint.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::domain::labels::{Architecture, LabelEncoder, LabelType, Task};
use crate::infra::{
    checkpoint::{load_config, load_weights, save_config, save_weights, weights_exist, CheckpointManager},
    metrics::History,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::{ClassifierConfig, ClassifierModel, GeneratorConfig, GeneratorModel},
    trainer::FitOptions,
    Device, InnerBackend,
};

pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";
const ENCODER_SUFFIX: &str = "_encoder.json";

// ─── Paths ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub name:       String,
    pub dir:        PathBuf,
    pub model:      PathBuf,
    pub summary:    PathBuf,
    pub info:       PathBuf,
    pub metrics:    PathBuf,
    pub logs:       PathBuf,
    pub checkpoint: PathBuf,
}

impl RunPaths {
    /// Paths for a run started now.
    pub fn new(root: impl AsRef<Path>, prefix: &str, label: &str) -> Self {
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::with_timestamp(root, prefix, label, &stamp)
    }

    pub fn with_timestamp(root: impl AsRef<Path>, prefix: &str, label: &str, stamp: &str) -> Self {
        let name = format!("{prefix}_{label}_{stamp}");
        let dir  = root.as_ref().join(&name);
        Self {
            model:      dir.join("model"),
            summary:    dir.join("model.txt"),
            info:       dir.join("model.json"),
            metrics:    dir.join("metrics.json"),
            logs:       dir.join("logs"),
            checkpoint: dir.join("checkpoint"),
            name,
            dir,
        }
    }

    /// Create the run directory. Fails if it already exists.
    pub fn create(&self) -> Result<()> {
        if self.dir.exists() {
            bail!("Run directory '{}' already exists", self.dir.display());
        }
        if let Some(parent) = self.dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        fs::create_dir(&self.dir)
            .with_context(|| format!("Cannot create run directory '{}'", self.dir.display()))?;
        fs::create_dir_all(&self.logs)?;
        fs::create_dir_all(&self.checkpoint)?;
        tracing::info!("Run directory: '{}'", self.dir.display());
        Ok(())
    }

    pub fn encoder(&self, id: usize, label_type: LabelType, name: &str) -> PathBuf {
        self.dir.join(format!("{id}_{}_{name}{ENCODER_SUFFIX}", label_type.as_str()))
    }

    /// `<run>.zip` next to the run directory. The run name may contain dots.
    pub fn archive(&self) -> PathBuf {
        self.dir.with_file_name(format!("{}.zip", self.name))
    }
}

// ─── Model info ───────────────────────────────────────────────────────────────
/// What inference needs to rebuild the exported model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "lowercase")]
pub enum ModelSpec {
    Classifier(ClassifierConfig),
    Generator(GeneratorConfig),
}

impl ModelSpec {
    pub fn task(&self) -> Task {
        match self {
            ModelSpec::Classifier(_) => Task::Classification,
            ModelSpec::Generator(_)  => Task::Generation,
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            ModelSpec::Classifier(c) => c.architecture,
            ModelSpec::Generator(c)  => c.architecture,
        }
    }

    pub fn summary(&self) -> Vec<String> {
        match self {
            ModelSpec::Classifier(c) => c.summary(),
            ModelSpec::Generator(c)  => c.summary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name:       String,
    pub label_type: LabelType,
    pub created_at: String,
    pub model:      ModelSpec,
    pub fit:        FitOptions,
    /// Free-form run parameters, also sent to the tracker
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

// ─── Export ───────────────────────────────────────────────────────────────────
pub fn export_weights<M: burn::module::Module<InnerBackend>>(paths: &RunPaths, model: &M) -> Result<()> {
    save_weights(model, paths.model.clone())?;
    tracing::info!("Model has been exported here => '{}'", paths.model.display());
    Ok(())
}

pub fn export_encoder(
    paths:      &RunPaths,
    id:         usize,
    label_type: LabelType,
    name:       &str,
    encoder:    &LabelEncoder,
) -> Result<PathBuf> {
    let path = paths.encoder(id, label_type, name);
    save_config(&path, encoder)?;
    tracing::info!("{} encoder has been exported here => '{}'", name, path.display());
    Ok(path)
}

pub fn export_info(paths: &RunPaths, info: &ModelInfo) -> Result<()> {
    save_config(&paths.info, info)?;
    tracing::info!("Model information has been exported here => '{}'", paths.info.display());
    Ok(())
}

pub fn export_metrics(paths: &RunPaths, history: &History) -> Result<()> {
    save_config(&paths.metrics, &history.to_series())?;
    tracing::info!("Model metrics have been exported here => '{}'", paths.metrics.display());
    Ok(())
}

pub fn export_summary(paths: &RunPaths, spec: &ModelSpec) -> Result<()> {
    let mut text = spec.summary().join("\n");
    text.push('\n');
    fs::write(&paths.summary, text)
        .with_context(|| format!("Cannot write '{}'", paths.summary.display()))
}

/// Zip the run directory into `<run>.zip`, entries rooted at the run name.
pub fn archive(paths: &RunPaths) -> Result<PathBuf> {
    let zip_path = paths.archive();
    let file = fs::File::create(&zip_path)
        .with_context(|| format!("Cannot create '{}'", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = Vec::new();
    collect_files(&paths.dir, &mut files)?;
    files.sort();

    for path in &files {
        let relative = path.strip_prefix(&paths.dir)?;
        let entry = Path::new(&paths.name)
            .join(relative)
            .to_string_lossy()
            .replace('\\', "/");
        zip.start_file(entry, options)?;
        let mut src = fs::File::open(path)?;
        io::copy(&mut src, &mut zip)?;
    }

    zip.finish()?.flush()?;
    tracing::info!("Archived {} files into '{}'", files.len(), zip_path.display());
    Ok(zip_path)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read '{}'", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

// ─── Bundle ───────────────────────────────────────────────────────────────────
/// An exported run opened for prediction.
#[derive(Debug)]
pub struct ModelBundle {
    pub dir:      PathBuf,
    pub info:     ModelInfo,
    /// Encoder file stem → encoder
    pub encoders: BTreeMap<String, LabelEncoder>,
}

impl ModelBundle {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            bail!("'{}' is not a run directory", dir.display());
        }

        let info: ModelInfo = load_config(&dir.join("model.json"))
            .context("Have you trained a model into this directory?")?;

        let mut encoders = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(file) = path.file_name().and_then(|f| f.to_str()) else { continue };
            if let Some(stem) = file.strip_suffix(".json").filter(|_| file.ends_with(ENCODER_SUFFIX)) {
                encoders.insert(stem.to_string(), load_config::<LabelEncoder>(&path)?);
            }
        }

        tracing::info!(
            "Opened {} {} run '{}' ({} encoders)",
            info.model.architecture(),
            info.model.task(),
            info.name,
            encoders.len(),
        );
        Ok(Self { dir, info, encoders })
    }

    /// The single encoder of a run (runs export exactly one).
    pub fn encoder(&self) -> Result<&LabelEncoder> {
        self.encoders
            .values()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No encoder found in '{}'", self.dir.display()))
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        TokenizerStore::new(&self.dir).load()
    }

    pub fn load_classifier(&self, device: &Device) -> Result<ClassifierModel<InnerBackend>> {
        let ModelSpec::Classifier(config) = &self.info.model else {
            bail!("'{}' holds a {} model, not a classifier", self.dir.display(), self.info.model.task());
        };
        self.load_weights(config.init::<InnerBackend>(device), device)
    }

    pub fn load_generator(&self, device: &Device) -> Result<GeneratorModel<InnerBackend>> {
        let ModelSpec::Generator(config) = &self.info.model else {
            bail!("'{}' holds a {} model, not a generator", self.dir.display(), self.info.model.task());
        };
        self.load_weights(config.init::<InnerBackend>(device), device)
    }

    fn load_weights<M: burn::module::Module<InnerBackend>>(&self, model: M, device: &Device) -> Result<M> {
        let exported = self.dir.join("model");
        if weights_exist::<InnerBackend>(&exported) {
            return load_weights(model, exported, device);
        }

        let checkpoints = CheckpointManager::open(self.dir.join("checkpoint"))
            .with_context(|| format!("No exported weights in '{}'", self.dir.display()))?;
        if !checkpoints.has_checkpoint() {
            bail!("'{}' holds neither exported weights nor a checkpoint", self.dir.display());
        }
        tracing::warn!("No exported weights in '{}', using latest checkpoint", self.dir.display());
        checkpoints.load_model(model, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::Scores;
    use crate::infra::metrics::EpochMetrics;
    use std::io::Read;

    fn info(spec: ModelSpec) -> ModelInfo {
        ModelInfo {
            name:       "classifier_topic".into(),
            label_type: LabelType::MultiLabel,
            created_at: "2024_01_02_03_04_05".into(),
            model:      spec,
            fit:        FitOptions::default(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_run_paths_layout() {
        let paths = RunPaths::with_timestamp("/models", "multi-label", "topic", "2024_01_02_03_04_05");
        assert_eq!(paths.name, "multi-label_topic_2024_01_02_03_04_05");
        assert_eq!(paths.info, PathBuf::from("/models/multi-label_topic_2024_01_02_03_04_05/model.json"));
        assert_eq!(
            paths.encoder(1, LabelType::MultiLabel, "topic").file_name().unwrap(),
            "1_multi-label_topic_encoder.json",
        );
        assert_eq!(paths.archive(), PathBuf::from("/models/multi-label_topic_2024_01_02_03_04_05.zip"));
    }

    #[test]
    fn test_create_refuses_existing_dir() {
        let root  = tempfile::tempdir().unwrap();
        let paths = RunPaths::with_timestamp(root.path(), "a", "b", "c");
        paths.create().unwrap();
        assert!(paths.checkpoint.is_dir());
        assert!(paths.create().is_err());
    }

    #[test]
    fn test_export_and_open_bundle() {
        let root   = tempfile::tempdir().unwrap();
        let paths  = RunPaths::with_timestamp(root.path(), "multi-label", "topic", "t");
        let device = crate::ml::default_device();
        paths.create().unwrap();

        let config  = ClassifierConfig::new(Architecture::Nn, 8, 2);
        let model   = config.init::<InnerBackend>(&device);
        let encoder = LabelEncoder::from_classes(vec!["sport".into(), "tech".into()]);
        let spec    = ModelSpec::Classifier(config);

        let mut history = History::default();
        history.push(EpochMetrics::from_scores(1, &Scores::default(), &Scores::default()));

        export_weights(&paths, &model).unwrap();
        export_encoder(&paths, 1, LabelType::MultiLabel, "topic", &encoder).unwrap();
        export_summary(&paths, &spec).unwrap();
        export_info(&paths, &info(spec)).unwrap();
        export_metrics(&paths, &history).unwrap();

        // the exported weights alone are enough, and opening stays read-only
        fs::remove_dir(&paths.checkpoint).unwrap();
        assert!(weights_exist::<InnerBackend>(&paths.model));

        let bundle = ModelBundle::open(&paths.dir).unwrap();
        assert_eq!(bundle.info.model.task(), Task::Classification);
        assert_eq!(bundle.info.model.architecture(), Architecture::Nn);
        assert_eq!(bundle.encoder().unwrap(), &encoder);
        assert!(bundle.encoders.contains_key("1_multi-label_topic_encoder"));

        let loaded = bundle.load_classifier(&device).unwrap();
        let before = model.head.weight.val().into_data().to_vec::<f32>().unwrap();
        let after  = loaded.head.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(before.iter().zip(&after).all(|(a, b)| (a - b).abs() < 1e-2));
        assert!(bundle.load_generator(&device).is_err());
        assert!(!paths.checkpoint.exists());
    }

    #[test]
    fn test_bundle_falls_back_to_latest_checkpoint() {
        let root   = tempfile::tempdir().unwrap();
        let paths  = RunPaths::with_timestamp(root.path(), "single-label", "topic", "t");
        let device = crate::ml::default_device();
        paths.create().unwrap();

        let config = ClassifierConfig::new(Architecture::Nn, 8, 3);
        let model  = config.init::<InnerBackend>(&device);
        CheckpointManager::new(&paths.checkpoint).unwrap().save_model(&model, 5).unwrap();
        export_info(&paths, &info(ModelSpec::Classifier(config))).unwrap();

        let bundle = ModelBundle::open(&paths.dir).unwrap();
        assert!(bundle.load_classifier(&device).is_ok());

        fs::remove_dir_all(&paths.checkpoint).unwrap();
        assert!(bundle.load_classifier(&device).is_err());
        assert!(!paths.checkpoint.exists());
    }

    #[test]
    fn test_dotted_label_keeps_timestamp_in_archive_name() {
        let first  = RunPaths::with_timestamp("/models", "multi-label", "meta.topic", "2024_01_02_10_00_00");
        let second = RunPaths::with_timestamp("/models", "multi-label", "meta.topic", "2024_01_02_11_30_00");
        assert_eq!(
            first.archive(),
            PathBuf::from("/models/multi-label_meta.topic_2024_01_02_10_00_00.zip"),
        );
        assert_ne!(first.archive(), second.archive());
    }

    #[test]
    fn test_archive_roots_entries_at_run_name() {
        let root  = tempfile::tempdir().unwrap();
        let paths = RunPaths::with_timestamp(root.path(), "single-label", "words", "t");
        paths.create().unwrap();
        fs::write(paths.logs.join("metrics.csv"), "epoch\n").unwrap();
        fs::write(&paths.summary, "Dense(3) output\n").unwrap();

        let zip_path = archive(&paths).unwrap();
        let mut zip  = zip::ZipArchive::new(fs::File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec![
            "single-label_words_t/logs/metrics.csv".to_string(),
            "single-label_words_t/model.txt".to_string(),
        ]);

        let mut content = String::new();
        zip.by_name("single-label_words_t/model.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "Dense(3) output\n");
    }
}
