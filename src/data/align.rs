// ============================================================
// Layer 4 — Span Alignment
// ============================================================
// Turns raw (context, target) pairs into token-level
// supervision for the span model, in two phases:
//
//   Phase 1 (preparation, once per dataset):
//     locate the target as a verbatim substring of the context
//     and cache its byte offsets. Produces an immutable table
//     of aligned samples plus a report of how many targets
//     could not be found.
//
//   Phase 2 (batching, per batch):
//     map the cached byte offsets to token indices through the
//     tokenizer's offset mapping for the context segment.
//
// The substring match is deliberately strict: no case folding,
// no whitespace normalisation, and always the first occurrence.
// Loosening it would silently change which token spans the
// model is trained on.

use tokenizers::Encoding;

use crate::domain::sample::Sample;
use crate::domain::span::{CharSpan, TokenSpan};

// ─── Phase 1: character-level location ────────────────────────────────────────

/// Find the first verbatim occurrence of `target` inside `input`.
///
/// Returns `None` for an empty target and for a target that does
/// not occur — neither case is an error. Offsets are byte offsets,
/// matching the offsets the tokenizer reports for its tokens.
pub fn locate_target(input: &str, target: &str) -> Option<CharSpan> {
    if target.is_empty() {
        return None;
    }
    let start = input.find(target)?;
    Some(CharSpan {
        start,
        end: start + target.len() - 1,
    })
}

/// A raw sample plus its cached answer location.
///
/// The char span is computed exactly once, at preparation time;
/// batching never goes back to the raw strings to re-locate it.
#[derive(Debug, Clone)]
pub struct AlignedSample {
    pub sample:    Sample,
    pub char_span: Option<CharSpan>,
}

/// Aggregate diagnostics from a preparation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Samples seen
    pub total: usize,

    /// Samples with a non-empty target that was not a substring
    /// of its context
    pub not_found: usize,

    /// Samples dropped by null-filtering
    pub removed: usize,
}

/// Locate every sample's target and build the aligned table.
///
/// With `remove_null` set, samples whose target is empty or was
/// not found are dropped entirely; otherwise they are kept with
/// `char_span: None` and only counted. The caller decides what
/// to do with the report — this function never prints or warns.
pub fn prepare_samples(samples: Vec<Sample>, remove_null: bool) -> (Vec<AlignedSample>, PrepareReport) {
    let total = samples.len();

    let mut not_found = 0usize;
    let mut aligned   = Vec::with_capacity(total);

    for sample in samples {
        let char_span = locate_target(&sample.input, &sample.target);
        if char_span.is_none() && !sample.target.is_empty() {
            not_found += 1;
        }
        aligned.push(AlignedSample { sample, char_span });
    }

    let mut removed = 0usize;
    if remove_null {
        let before = aligned.len();
        aligned.retain(|s| s.char_span.is_some());
        removed = before - aligned.len();
    }

    (aligned, PrepareReport { total, not_found, removed })
}

// ─── Phase 2: token-level mapping ─────────────────────────────────────────────

/// Map a char span to token indices within the context segment
/// of a (feature, context) pair encoding.
///
/// Sequence index 1 is the context: the encoding is built from
/// the pair (feature, input), so index 0 covers the feature
/// segment and index 1 the context segment.
///
/// Returns `None` when either boundary falls on no token — for
/// example because truncation cut the answer off.
pub fn map_char_span(encoding: &Encoding, span: CharSpan) -> Option<TokenSpan> {
    let start = encoding.char_to_token(span.start, 1)?;
    let end   = encoding.char_to_token(span.end, 1)?;
    Some(TokenSpan { start, end })
}

/// The supervision span for one encoded sample.
///
/// Missing answers map to the (0, 0) no-answer span. So do
/// answers whose offsets cannot be mapped to tokens (truncated
/// or landing on a special-token region): alignment is total,
/// an unmappable offset downgrades the sample to "no answer"
/// rather than failing the batch.
pub fn supervision_span(encoding: &Encoding, char_span: Option<CharSpan>) -> TokenSpan {
    match char_span {
        None => TokenSpan::NO_ANSWER,
        Some(span) => map_char_span(encoding, span).unwrap_or_else(|| {
            tracing::debug!(
                "answer bytes {}..={} fall outside the tokenized context; treating as no answer",
                span.start,
                span.end,
            );
            TokenSpan::NO_ANSWER
        }),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn sample(input: &str, target: &str) -> Sample {
        Sample::new("doc-1", input, target, "color")
    }

    #[test]
    fn test_locates_first_occurrence() {
        let span = locate_target("red or blue or blue", "blue").unwrap();
        assert_eq!(span.start, 7);
        assert_eq!(span.end, 10);
    }

    #[test]
    fn test_end_offset_is_inclusive() {
        // end == start + len(target) - 1
        let span = locate_target("The sky is blue", "blue").unwrap();
        assert_eq!((span.start, span.end), (11, 14));
    }

    #[test]
    fn test_empty_target_is_not_found() {
        assert_eq!(locate_target("some context", ""), None);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        // Strict verbatim containment: "Blue" != "blue"
        assert_eq!(locate_target("The sky is Blue", "blue"), None);
    }

    #[test]
    fn test_prepare_counts_missing_targets() {
        let samples = vec![
            sample("The sky is blue", "blue"),
            sample("No mention here", "green"),
            sample("No mention here", ""),
        ];
        let (aligned, report) = prepare_samples(samples, false);

        assert_eq!(aligned.len(), 3);
        assert_eq!(report.total, 3);
        // Only the non-empty miss counts as "not found"
        assert_eq!(report.not_found, 1);
        assert_eq!(report.removed, 0);
        assert!(aligned[0].char_span.is_some());
        assert!(aligned[1].char_span.is_none());
        assert!(aligned[2].char_span.is_none());
    }

    #[test]
    fn test_remove_null_drops_unmatched_samples() {
        let samples = vec![
            sample("The sky is blue", "blue"),
            sample("No mention here", "green"),
            sample("Grass is green", "green"),
        ];
        let (aligned, report) = prepare_samples(samples, true);

        assert_eq!(aligned.len(), 2);
        assert_eq!(report.removed, 1);
        assert!(aligned.iter().all(|s| s.char_span.is_some()));
    }

    #[test]
    fn test_maps_char_span_into_context_segment() {
        let corpus = vec!["The sky is blue today".to_string(), "color".to_string()];
        let tokenizer = TokenizerStore::build(&corpus, 1000).unwrap();

        let encoding = tokenizer
            .encode(("color", "The sky is blue"), true)
            .unwrap();

        let span = locate_target("The sky is blue", "blue").unwrap();
        let token_span = map_char_span(&encoding, span).unwrap();

        // [CLS] color [SEP] the sky is blue [SEP]
        assert_eq!(token_span, TokenSpan { start: 6, end: 6 });

        let ids = &encoding.get_ids()[token_span.start..=token_span.end];
        let text = tokenizer.decode(ids, true).unwrap();
        assert_eq!(text, "blue");
    }

    #[test]
    fn test_missing_answer_maps_to_no_answer_span() {
        let corpus = vec!["No mention here".to_string(), "color".to_string()];
        let tokenizer = TokenizerStore::build(&corpus, 1000).unwrap();

        let encoding = tokenizer
            .encode(("color", "No mention here"), true)
            .unwrap();

        let span = supervision_span(&encoding, None);
        assert_eq!(span, TokenSpan::NO_ANSWER);
    }

    #[test]
    fn test_unmappable_offset_coerces_to_no_answer() {
        let corpus = vec!["blue".to_string(), "color".to_string()];
        let tokenizer = TokenizerStore::build(&corpus, 1000).unwrap();

        // Byte 0 of sequence 1 maps; far-out offsets do not.
        let encoding = tokenizer.encode(("color", "blue"), true).unwrap();
        assert!(encoding.char_to_token(0, 1).is_some());
        assert_eq!(encoding.char_to_token(500, 1), None);

        let coerced = supervision_span(&encoding, Some(CharSpan { start: 500, end: 503 }));
        assert_eq!(coerced, TokenSpan::NO_ANSWER);
    }
}
