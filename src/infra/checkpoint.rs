// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per run:
//   1. Weights per epoch ({tag}_epoch_{n}.mpk.gz) — one file
//      family per architecture tag, so extractive and
//      generative runs can share a checkpoint directory
//   2. {tag}_latest.json — which epoch was last saved
//   3. train_config.json — full run configuration
//
// The config is saved separately because inference has to
// rebuild the exact model architecture (d_model, layer counts,
// ...) before the weights can be loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    module::Module,
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory
    /// if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Save model weights for a given epoch under the family tag.
    pub fn save_model<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        tag:   &str,
        epoch: usize,
    ) -> Result<()> {
        // Recorder adds its own file extension
        let path = self.dir.join(format!("{tag}_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| anyhow::anyhow!(
                "Failed to save checkpoint to '{}': {e}", path.display()
            ))?;

        // Update the latest epoch pointer for this family
        let latest_path = self.dir.join(format!("{tag}_latest.json"));
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved {} checkpoint: epoch {}", tag, epoch);
        Ok(())
    }

    /// Load model weights from the latest saved checkpoint of a
    /// family. The model passed in must have the architecture the
    /// checkpoint was saved with, or loading fails.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        tag:    &str,
        device: &B::Device,
    ) -> Result<M> {
        let epoch = self.latest_epoch(tag)?;
        let path  = self.dir.join(format!("{tag}_epoch_{epoch}"));

        tracing::info!("Loading {} checkpoint from epoch {}", tag, epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load checkpoint '{}'. Have you trained the model first? ({e})",
                path.display()
            ))?;

        Ok(model.load_record(record))
    }

    /// Save the run configuration so inference can rebuild the
    /// same model later.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }

    fn latest_epoch(&self, tag: &str) -> Result<usize> {
        let path = self.dir.join(format!("{tag}_latest.json"));

        let s = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot find '{}_latest.json'. Have you run 'train' first?",
                    tag
                )
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
