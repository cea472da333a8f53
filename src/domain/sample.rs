// ============================================================
// Layer 3 — Sample Domain Type
// ============================================================
// One training/inference unit for attribute extraction.
//
// A sample pairs a text fragment with the value of one named
// attribute. The target is the verbatim answer string; an empty
// target means the attribute is not present in this fragment.
//
// Example:
//   doc:     "product-0241"
//   input:   "The Falcon 12 weighs 240 grams and ships in grey."
//   target:  "240 grams"
//   feature: "weight"

use serde::{Deserialize, Serialize};

/// A raw (context, answer) record for one attribute of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Identifier of the source document — kept for traceability
    pub doc: String,

    /// The context text the answer should be found in
    pub input: String,

    /// The expected answer, verbatim. Empty means "not present".
    pub target: String,

    /// The attribute name used as a prompt qualifier (e.g. "weight")
    pub feature: String,
}

impl Sample {
    pub fn new(
        doc:     impl Into<String>,
        input:   impl Into<String>,
        target:  impl Into<String>,
        feature: impl Into<String>,
    ) -> Self {
        Self {
            doc:     doc.into(),
            input:   input.into(),
            target:  target.into(),
            feature: feature.into(),
        }
    }
}
