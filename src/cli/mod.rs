// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All business logic is delegated to Layer 2 (application).
//
//   lexitrain train-classifier --data rows.jsonl --label-type multi-label
//   lexitrain train-generator  --data corpus.txt --architecture GRU
//   lexitrain predict  --run models/<run> --text "..." [--threshold 0.3]
//   lexitrain complete --run models/<run> --text "..." --words 5
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{ClassifyArgs, Commands, CompleteArgs, GenerateArgs, PredictArgs};

#[derive(Parser, Debug)]
#[command(
    name = "lexitrain",
    version,
    about = "Train text classifiers and next-word models, export runs, predict."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::TrainClassifier(args) => run_train_classifier(args),
            Commands::TrainGenerator(args)  => run_train_generator(args),
            Commands::Predict(args)         => run_predict(args),
            Commands::Complete(args)        => run_complete(args),
        }
    }
}

fn run_train_classifier(args: ClassifyArgs) -> Result<()> {
    use crate::application::classify_use_case::ClassifyUseCase;

    tracing::info!("Training {} classifier on '{}'", args.label_type, args.data);
    let zip_path = ClassifyUseCase::new(args.into()).execute()?;

    println!("Training complete. Run archived at {}", zip_path.display());
    Ok(())
}

fn run_train_generator(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    tracing::info!("Training {} next-word model on '{}'", args.architecture, args.data);
    let zip_path = GenerateUseCase::new(args.into()).execute()?;

    println!("Training complete. Run archived at {}", zip_path.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;
    use crate::domain::labels::Task;

    let mut use_case = PredictUseCase::open(&args.run)?;
    if let Some(threshold) = args.threshold {
        use_case = use_case.with_threshold(threshold)?;
    }

    let predictions = match use_case.task() {
        Task::Classification => use_case.classify(&args.text)?,
        Task::Generation     => use_case.next_word(&args.text)?.into_iter().collect(),
    };

    if predictions.is_empty() {
        println!("\nNo label above the threshold.");
    }
    for p in predictions {
        println!("{:<24} {:.4}", p.label, p.probability);
    }
    Ok(())
}

fn run_complete(args: CompleteArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case = PredictUseCase::open(&args.run)?;
    let words    = use_case.complete(&args.text, args.words)?;

    println!("\n{} {}", args.text.trim(), words.join(" "));
    Ok(())
}
