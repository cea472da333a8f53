// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`,
// and all their configurable flags.
//
// clap's derive macros generate help text, missing-argument
// errors and type conversion automatically.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::ml::Architecture;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train an attribute-extraction model on .jsonl samples
    Train(TrainArgs),

    /// Predict attribute values using a trained checkpoint
    Predict(PredictArgs),
}

/// CLI-facing model family selector. Converted to the domain
/// Architecture at the layer boundary so the application layer
/// never sees clap types.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ArchArg {
    /// Span-prediction model — answers are copied from the context
    Extractive,
    /// Sequence-to-sequence model — answers are generated text
    Generative,
}

impl From<ArchArg> for Architecture {
    fn from(a: ArchArg) -> Self {
        match a {
            ArchArg::Extractive => Architecture::Extractive,
            ArchArg::Generative => Architecture::Generative,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Which model family to train
    #[arg(long, value_enum, default_value = "extractive")]
    pub arch: ArchArg,

    /// Directory containing .jsonl sample files
    #[arg(long, default_value = "data/samples")]
    pub data_dir: String,

    /// Directory for checkpoints, tokenizer and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Maximum number of tokens per encoded sequence
    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    /// Number of samples processed together in one forward pass
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    /// Hidden dimension of the transformer (d_model)
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Number of attention heads — d_model must be divisible by this
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Number of stacked encoder layers
    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// Number of decoder layers (generative family only)
    #[arg(long, default_value_t = 6)]
    pub num_decoder_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    /// Dropout probability during training
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Maximum vocabulary size for the corpus tokenizer
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Drop samples whose target is not found in the context
    /// instead of training them as "no answer"
    #[arg(long)]
    pub remove_null: bool,

    /// Fraction of samples used for training (rest validates)
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Seed for the shuffle/split and batch order
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            arch:               a.arch.into(),
            data_dir:           a.data_dir,
            checkpoint_dir:     a.checkpoint_dir,
            max_seq_len:        a.max_seq_len,
            batch_size:         a.batch_size,
            epochs:             a.epochs,
            lr:                 a.lr,
            d_model:            a.d_model,
            num_heads:          a.num_heads,
            num_layers:         a.num_layers,
            num_decoder_layers: a.num_decoder_layers,
            d_ff:               a.d_ff,
            dropout:            a.dropout,
            vocab_size:         a.vocab_size,
            remove_null:        a.remove_null,
            train_fraction:     a.train_fraction,
            seed:               a.seed,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Predict every sample in this .jsonl file
    #[arg(long)]
    pub input_file: Option<String>,

    /// Attribute name for a single ad-hoc prediction
    #[arg(long)]
    pub feature: Option<String>,

    /// Context text for a single ad-hoc prediction
    #[arg(long)]
    pub context: Option<String>,
}
