// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code plus the
// span decoding algorithm. No other layer imports burn directly.
//
// What's in this layer:
//
//   model.rs        — Extractive span-prediction model:
//                     token/position/segment embeddings, masked
//                     encoder blocks, start/end span head
//
//   seq2seq.rs      — Generative encoder-decoder model with
//                     causal masking, cross-attention, greedy
//                     generation
//
//   span_decoder.rs — Constrained greedy span decoding and
//                     span-to-text rendering
//
//   trainer.rs      — Per-family training loops (Adam, data
//                     loaders, validation, checkpoints, metrics)
//
//   inferencer.rs   — Per-family checkpoint-loading predictors
//
// The family in use is selected at construction time through
// the Architecture value carried in the configuration — no
// shared trainer hierarchy, just two implementations of the
// same train/predict contract.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use serde::{Deserialize, Serialize};

/// Extractive span-prediction model architecture
pub mod model;

/// Generative sequence-to-sequence model architecture
pub mod seq2seq;

/// Constrained span decoding and rendering
pub mod span_decoder;

/// Training loops for both families
pub mod trainer;

/// Inference engines for both families
pub mod inferencer;

/// Which model family a run trains or serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Span-prediction over the context (answer is copied text)
    Extractive,
    /// Encoder-decoder generation (answer is produced text)
    Generative,
}

impl Architecture {
    /// Tag used in checkpoint and metrics file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Architecture::Extractive => "extractive",
            Architecture::Generative => "generative",
        }
    }
}
