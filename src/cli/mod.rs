// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on clap.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains a model family on .jsonl samples
//   2. `predict` — loads a checkpoint and answers queries
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "attr-qa",
    version = "0.1.0",
    about = "Train extractive and generative Q&A models for attribute extraction, then predict."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use
    /// case. The CLI layer only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => Self::run_train(args),
            Commands::Predict(args) => Self::run_predict(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on samples in: {}", args.data_dir);

        // Convert CLI args → application config at the layer boundary
        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    fn run_predict(args: PredictArgs) -> Result<()> {
        use crate::application::predict_use_case::PredictUseCase;

        let use_case = PredictUseCase::new(args.checkpoint_dir.clone())?;

        match (args.input_file, args.feature, args.context) {
            (Some(file), _, _) => use_case.predict_file(&file),
            (None, Some(feature), Some(context)) => {
                let prediction = use_case.predict_one(&feature, &context)?;
                if prediction.answer.is_empty() {
                    println!("\nAnswer: (no answer)");
                } else {
                    match prediction.score {
                        Some(score) => {
                            println!("\nAnswer: {} (confidence {:.4})", prediction.answer, score)
                        }
                        None => println!("\nAnswer: {}", prediction.answer),
                    }
                }
                Ok(())
            }
            _ => anyhow::bail!(
                "Provide --input-file, or both --feature and --context"
            ),
        }
    }
}
