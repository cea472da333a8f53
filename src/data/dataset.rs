// ============================================================
// Layer 4 — Prepared Dataset
// ============================================================
// The immutable output of the preparation phase: a table of
// aligned samples, exposed through Burn's Dataset trait so the
// DataLoader can index into it. All per-batch work (encoding,
// char→token mapping, tensor assembly) happens in the batchers;
// this type is a read-only store.

use burn::data::dataset::Dataset;

use crate::data::align::AlignedSample;

pub struct PreparedDataset {
    samples: Vec<AlignedSample>,
}

impl PreparedDataset {
    pub fn new(samples: Vec<AlignedSample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<AlignedSample> for PreparedDataset {
    fn get(&self, index: usize) -> Option<AlignedSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
