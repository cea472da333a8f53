// ============================================================
// Layer 3 — Answer Span Types
// ============================================================
// Two coordinate systems describe where an answer lives:
//
//   CharSpan  — inclusive byte offsets into the raw context
//               string, found once at preparation time.
//   TokenSpan — inclusive token indices into the encoded
//               sequence, derived per batch from the CharSpan
//               via the tokenizer's offset mapping.
//
// A missing answer (empty target, or target not contained in
// the context) is represented as Option::<CharSpan>::None and
// maps to the conventional (0, 0) token span: the first
// position of the encoded sequence doubles as the "no answer"
// marker, so a span that starts and ends there decodes to the
// empty string.
//
// Reference: Devlin et al. (2019) BERT paper — no-answer spans

use serde::{Deserialize, Serialize};

/// Inclusive byte offsets of the answer inside the context string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSpan {
    /// Byte offset of the first byte of the answer
    pub start: usize,

    /// Byte offset of the last byte of the answer (inclusive)
    pub end: usize,
}

/// Inclusive token indices of the answer inside the encoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: usize,
    pub end:   usize,
}

impl TokenSpan {
    /// The conventional first-position span marking "no answer".
    pub const NO_ANSWER: TokenSpan = TokenSpan { start: 0, end: 0 };

    pub fn is_no_answer(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// Number of tokens covered by the span (inclusive on both ends)
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_answer_span() {
        assert!(TokenSpan::NO_ANSWER.is_no_answer());
        assert!(!TokenSpan { start: 0, end: 3 }.is_no_answer());
        assert!(!TokenSpan { start: 2, end: 2 }.is_no_answer());
    }

    #[test]
    fn test_span_len_is_inclusive() {
        assert_eq!(TokenSpan { start: 4, end: 4 }.len(), 1);
        assert_eq!(TokenSpan { start: 4, end: 7 }.len(), 4);
    }
}
