// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load .jsonl samples        (Layer 4 - data)
//   Step 2: Build / load tokenizer     (Layer 6 - infra)
//   Step 3: Locate answers (prepare)   (Layer 4 - data)
//   Step 4: Split train/validation     (Layer 4 - data)
//   Step 5: Build datasets             (Layer 4 - data)
//   Step 6: Save config                (Layer 6 - infra)
//   Step 7: Run the family's loop      (Layer 5 - ml)
//
// The model family is chosen here, at construction time, from
// the configuration — the two training loops share no type.

use std::sync::Arc;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    align::prepare_samples,
    batcher::format_prompt,
    dataset::PreparedDataset,
    loader::JsonlLoader,
    splitter::split_train_val,
};
use crate::domain::traits::SampleSource;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::trainer::{run_seq2seq_training, run_span_training};
use crate::ml::Architecture;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Serialisable so it can
// be saved alongside the checkpoints and reloaded for inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub arch:               Architecture,
    pub data_dir:           String,
    pub checkpoint_dir:     String,
    pub max_seq_len:        usize,
    pub batch_size:         usize,
    pub epochs:             usize,
    pub lr:                 f64,
    pub d_model:            usize,
    pub num_heads:          usize,
    pub num_layers:         usize,
    pub num_decoder_layers: usize,
    pub d_ff:               usize,
    pub dropout:            f64,
    pub vocab_size:         usize,

    /// Drop samples whose target is empty or not contained in
    /// the context, instead of training them as "no answer"
    pub remove_null:        bool,

    pub train_fraction:     f64,
    pub seed:               u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            arch:               Architecture::Extractive,
            data_dir:           "data/samples".to_string(),
            checkpoint_dir:     "checkpoints".to_string(),
            max_seq_len:        512,
            batch_size:         8,
            epochs:             10,
            lr:                 2e-4,
            d_model:            256,
            num_heads:          8,
            num_layers:         6,
            num_decoder_layers: 6,
            d_ff:               1024,
            dropout:            0.1,
            vocab_size:         30522,
            remove_null:        false,
            train_fraction:     0.8,
            seed:               42,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load raw samples ──────────────────────────────────────────
        tracing::info!("Loading samples from '{}'", cfg.data_dir);
        let loader  = JsonlLoader::new(&cfg.data_dir);
        let samples = loader.load_all()?;
        ensure!(
            !samples.is_empty(),
            "No samples found in '{}' — nothing to train on",
            cfg.data_dir
        );

        // ── Step 2: Build / load tokenizer ────────────────────────────────────
        // The vocabulary must cover contexts, targets, feature
        // names AND the formatted prompts the generative family
        // feeds its encoder.
        let mut corpus: Vec<String> = Vec::with_capacity(samples.len() * 3);
        for sample in &samples {
            corpus.push(sample.input.clone());
            corpus.push(sample.target.clone());
            corpus.push(format_prompt(&sample.feature, &sample.input));
        }
        let tok_store = TokenizerStore::new(&cfg.checkpoint_dir);
        let tokenizer = tok_store.load_or_build(&corpus, cfg.vocab_size, cfg.max_seq_len)?;
        let tokenizer = Arc::new(tokenizer);

        // ── Step 3: Locate answers, build the aligned table ───────────────────
        let (aligned, report) = prepare_samples(samples, cfg.remove_null);
        if report.not_found > 0 && !cfg.remove_null {
            tracing::warn!(
                "Found {}/{} samples where the context does not contain the answer",
                report.not_found,
                report.total,
            );
        }
        if report.removed > 0 {
            tracing::info!("Null filtering removed {} samples", report.removed);
        }
        ensure!(!aligned.is_empty(), "Every sample was filtered out during preparation");

        // ── Step 4: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) =
            split_train_val(aligned, cfg.train_fraction, cfg.seed);

        // ── Step 5: Build datasets ────────────────────────────────────────────
        let train_dataset = PreparedDataset::new(train_samples);
        let val_dataset   = PreparedDataset::new(val_samples);
        tracing::info!(
            "Split: {} train, {} validation",
            train_dataset.sample_count(),
            val_dataset.sample_count(),
        );

        // ── Step 6: Save config for inference ─────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;

        // ── Step 7: Run the selected family's training loop ───────────────────
        match cfg.arch {
            Architecture::Extractive => {
                run_span_training(cfg, tokenizer, train_dataset, val_dataset, ckpt_manager)
            }
            Architecture::Generative => {
                run_seq2seq_training(cfg, tokenizer, train_dataset, val_dataset, ckpt_manager)
            }
        }
    }
}
