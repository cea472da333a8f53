// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence concerns used by several layers:
//
//   checkpoint.rs      — Model weights and run-config storage,
//                        shared by both model families via a
//                        per-family file tag
//
//   tokenizer_store.rs — Corpus tokenizer build/save/load with
//                        the pair-encoding template and fixed
//                        sequence shape
//
//   metrics.rs         — Per-epoch CSV metrics log with
//                        per-family column sets
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
