// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw sample files to GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   .jsonl files
//       │
//       ▼
//   JsonlLoader       → reads records, skips bad lines
//       │
//       ▼
//   Preprocessor      → normalises extracted text
//       │
//       ▼
//   align             → locates answers, caches char spans
//       │
//       ▼
//   PreparedDataset   → immutable aligned-sample table
//       │
//       ▼
//   SpanBatcher /     → encodes text, maps spans to tokens,
//   Seq2SeqBatcher      stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Preparation happens once and is immutable; the batchers are
// stateless projections over the prepared table.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads .jsonl sample files from a directory
pub mod loader;

/// Normalises raw extracted text
pub mod preprocessor;

/// Answer location and char→token span alignment
pub mod align;

/// Implements Burn's Dataset trait for aligned samples
pub mod dataset;

/// Implements Burn's Batcher trait for both model families
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
