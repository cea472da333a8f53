// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types we
// can swap implementations without touching the layers that
// use them. The application layer only ever sees a
// SampleSource; where the records physically come from is a
// Layer 4 concern.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::sample::Sample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce raw samples.
///
/// Implementations:
///   - JsonlLoader → reads a directory of .jsonl record files
pub trait SampleSource {
    /// Load all available samples from this source.
    fn load_all(&self) -> Result<Vec<Sample>>;
}
