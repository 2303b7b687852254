// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   train-classifier   embeddings → classifier → zipped run
//   train-generator    corpus → next-word model → zipped run
//   predict            labels for a text, or the next word of a generator run
//   complete           next words for a prefix from a generator run
//
// Loop hyperparameters and tracking credentials are shared
// argument groups flattened into both training commands.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    classify_use_case::ClassifyConfig,
    generate_use_case::GenerateConfig,
};
use crate::domain::labels::{Architecture, LabelType};
use crate::infra::tracking::TrackingConfig;
use crate::ml::trainer::FitOptions;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a text classifier on labelled JSON-lines rows
    TrainClassifier(ClassifyArgs),

    /// Train a next-word model on a text corpus
    TrainGenerator(GenerateArgs),

    /// Predict labels (or the next word) for a text with an exported run
    Predict(PredictArgs),

    /// Continue a text with an exported generator run
    Complete(CompleteArgs),
}

// ─── Shared groups ────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct FitArgs {
    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of samples processed together in one step
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Save a checkpoint every N epochs (and after the last one)
    #[arg(long, default_value_t = 5)]
    pub checkpoint_period: usize,

    /// Seed for the data loader shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<FitArgs> for FitOptions {
    fn from(a: FitArgs) -> Self {
        FitOptions {
            epochs:            a.epochs,
            batch_size:        a.batch_size,
            lr:                a.lr,
            checkpoint_period: a.checkpoint_period,
            seed:              a.seed,
            ..FitOptions::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrackingArgs {
    /// Log the run to the experiment tracker
    #[arg(long)]
    pub track: bool,

    #[arg(long, env = "LEXITRAIN_TRACKING_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "LEXITRAIN_TRACKING_PROJECT")]
    pub project_name: Option<String>,

    #[arg(long, env = "LEXITRAIN_TRACKING_WORKSPACE")]
    pub workspace: Option<String>,
}

impl From<TrackingArgs> for TrackingConfig {
    fn from(a: TrackingArgs) -> Self {
        TrackingConfig {
            enabled:      a.track,
            api_key:      a.api_key,
            project_name: a.project_name,
            workspace:    a.workspace,
        }
    }
}

// ─── train-classifier ─────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// JSON-lines file with one row per text
    #[arg(long)]
    pub data: String,

    #[arg(long, default_value = "text")]
    pub text_field: String,

    #[arg(long, default_value = "label")]
    pub label_field: String,

    /// binary-label, single-label or multi-label
    #[arg(long, default_value = "multi-label")]
    pub label_type: LabelType,

    /// NN, GRU, CNN_NN or CNN_GRU_NN
    #[arg(long, default_value = "CNN_GRU_NN")]
    pub architecture: Architecture,

    /// Directory receiving the run directory and its zip
    #[arg(long, env = "LEXITRAIN_MODEL_PATH", default_value = "models")]
    pub model_root: String,

    /// Size of the sentence embedding vectors
    #[arg(long, default_value_t = 512)]
    pub embedding_dim: usize,

    /// Fraction of rows held out, half for test and half for validation
    #[arg(long, default_value_t = 0.1)]
    pub holdout: f64,

    #[arg(long, default_value = "english")]
    pub lang: String,

    #[command(flatten)]
    pub fit: FitArgs,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

impl From<ClassifyArgs> for ClassifyConfig {
    fn from(a: ClassifyArgs) -> Self {
        ClassifyConfig {
            data_path:        a.data,
            text_field:       a.text_field,
            label_field:      a.label_field,
            label_type:       a.label_type,
            architecture:     a.architecture,
            model_root:       a.model_root,
            embedding_dim:    a.embedding_dim,
            holdout_fraction: a.holdout,
            lang:             a.lang,
            fit:              a.fit.into(),
            tracking:         a.tracking.into(),
        }
    }
}

// ─── train-generator ──────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text corpus: .txt (one text per line) or JSON-lines
    #[arg(long)]
    pub data: String,

    /// Text field for JSON-lines corpora
    #[arg(long, default_value = "text")]
    pub text_field: String,

    #[arg(long, default_value = "GRU")]
    pub architecture: Architecture,

    #[arg(long, env = "LEXITRAIN_MODEL_PATH", default_value = "models")]
    pub model_root: String,

    /// Tokenizer vocabulary size, padding and unknown included
    #[arg(long, default_value_t = 30_000)]
    pub num_words: usize,

    /// Maximum number of distinct predictable words
    #[arg(long, default_value_t = 5_000)]
    pub max_labels: usize,

    /// Number of context tokens fed to the model
    #[arg(long, default_value_t = 64)]
    pub input_shape: usize,

    #[arg(long, default_value_t = 0.1)]
    pub holdout: f64,

    #[arg(long, default_value = "english")]
    pub lang: String,

    #[command(flatten)]
    pub fit: FitArgs,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

impl From<GenerateArgs> for GenerateConfig {
    fn from(a: GenerateArgs) -> Self {
        GenerateConfig {
            data_path:        a.data,
            text_field:       a.text_field,
            architecture:     a.architecture,
            model_root:       a.model_root,
            num_words:        a.num_words,
            max_labels:       a.max_labels,
            input_shape:      a.input_shape,
            holdout_fraction: a.holdout,
            lang:             a.lang,
            fit:              a.fit.into(),
            tracking:         a.tracking.into(),
            ..GenerateConfig::default()
        }
    }
}

// ─── predict / complete ───────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Exported run directory (the unzipped archive)
    #[arg(long)]
    pub run: String,

    /// Text to classify (or to continue by one word for a generation run)
    #[arg(long)]
    pub text: String,

    /// Decision threshold for binary and multi-label runs
    #[arg(long)]
    pub threshold: Option<f32>,
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    #[arg(long)]
    pub run: String,

    /// Beginning of the sentence
    #[arg(long)]
    pub text: String,

    /// Maximum number of words to append
    #[arg(long, default_value_t = 5)]
    pub words: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_parse_train_classifier() {
        let cli = Cli::try_parse_from([
            "lexitrain", "train-classifier",
            "--data", "rows.jsonl",
            "--label-type", "single",
            "--architecture", "cnn-nn",
            "--epochs", "3",
        ])
        .unwrap();

        let Commands::TrainClassifier(args) = cli.command else { panic!("wrong command") };
        let cfg: ClassifyConfig = args.into();
        assert_eq!(cfg.label_type, LabelType::SingleLabel);
        assert_eq!(cfg.architecture, Architecture::CnnNn);
        assert_eq!(cfg.fit.epochs, 3);
        assert_eq!(cfg.fit.checkpoint_period, 5);
        assert!(!cfg.tracking.enabled);
    }

    #[test]
    fn test_parse_complete_defaults() {
        let cli = Cli::try_parse_from(["lexitrain", "complete", "--run", "models/x", "--text", "the cat"])
            .unwrap();
        let Commands::Complete(args) = cli.command else { panic!("wrong command") };
        assert_eq!(args.words, 5);
    }

    #[test]
    fn test_parse_predict_threshold() {
        let cli = Cli::try_parse_from([
            "lexitrain", "predict", "--run", "models/x", "--text", "hi", "--threshold", "0.3",
        ])
        .unwrap();
        let Commands::Predict(args) = cli.command else { panic!("wrong command") };
        assert_eq!(args.threshold, Some(0.3));
    }

    #[test]
    fn test_bad_label_type_is_rejected() {
        let parsed = Cli::try_parse_from(["lexitrain", "train-classifier", "--data", "x", "--label-type", "many"]);
        assert!(parsed.is_err());
    }
}
