// ============================================================
// Layer 5 — Constrained Span Decoder
// ============================================================
// Picks the single best (start, end) token span from the span
// model's per-token start/end logits, subject to two hard
// constraints:
//
//   1. The span must lie inside the context segment. Positions
//      with segment id 0 — the leading special token aside —
//      are forced to -10000 before the softmax, which zeroes
//      them out of the probability mass.
//   2. The first position may only pair with itself. (0, 0) is
//      the legitimate "no answer" span; (0, j>0) and (i>0, 0)
//      are degenerate and their scores are erased.
//
// The remaining candidates form the upper triangle (start ≤
// end) of the start×end probability outer product; the argmax
// over the flattened matrix is the winner. Deterministic,
// O(seq²) per element, no sampling and no beam.
//
// The decoder works on plain f32 slices rather than tensors:
// the trainer pulls the logits off the device once and all the
// span search happens on the CPU.

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::domain::span::TokenSpan;

/// Additive mask applied to out-of-context logits before softmax.
const MASK_VALUE: f32 = -10000.0;

/// A decoded span with its joint start×end probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredSpan {
    pub span:  TokenSpan,
    pub score: f32,
}

/// Numerically stable softmax over one logit vector.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Decode the best span for one batch element.
///
/// `segment_ids` marks which positions belong to the context
/// (id 1) versus the prompt/special segment (id 0); all three
/// slices must have the same length.
pub fn decode_span(start_logits: &[f32], end_logits: &[f32], segment_ids: &[i64]) -> ScoredSpan {
    let len = start_logits.len();
    debug_assert_eq!(end_logits.len(), len);
    debug_assert_eq!(segment_ids.len(), len);

    if len == 0 {
        return ScoredSpan { span: TokenSpan::NO_ANSWER, score: 0.0 };
    }

    // Constraint 1: only the context segment and position 0 may
    // carry an answer boundary.
    let mut start = start_logits.to_vec();
    let mut end   = end_logits.to_vec();
    for i in 1..len {
        if segment_ids[i] == 0 {
            start[i] = MASK_VALUE;
            end[i]   = MASK_VALUE;
        }
    }

    let start_probs = softmax(&start);
    let end_probs   = softmax(&end);

    // Outer-product score matrix, upper triangle only (start ≤ end)
    let mut scores = vec![0.0f32; len * len];
    for i in 0..len {
        for j in i..len {
            scores[i * len + j] = start_probs[i] * end_probs[j];
        }
    }

    // Constraint 2: the first position never mixes with others
    for j in 1..len {
        scores[j] = 0.0; // (0, j>0)
    }
    for i in 1..len {
        scores[i * len] = 0.0; // (i>0, 0)
    }

    // Flat argmax; first maximum wins on ties
    let mut best_idx   = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (idx, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best_idx   = idx;
        }
    }

    ScoredSpan {
        span: TokenSpan {
            start: best_idx / len,
            end:   best_idx % len,
        },
        score: best_score,
    }
}

/// Decode one span per batch element.
pub fn decode_spans(
    start_logits: &[Vec<f32>],
    end_logits:   &[Vec<f32>],
    segment_ids:  &[Vec<i64>],
) -> Vec<ScoredSpan> {
    start_logits
        .iter()
        .zip(end_logits)
        .zip(segment_ids)
        .map(|((start, end), segments)| decode_span(start, end, segments))
        .collect()
}

/// Render a decoded span back to text.
///
/// The (0, 0) span is the "no answer" marker and always renders
/// as the empty string, whatever ids the sequence holds.
pub fn render_span(tokenizer: &Tokenizer, input_ids: &[u32], span: TokenSpan) -> Result<String> {
    if span.is_no_answer() {
        return Ok(String::new());
    }
    let answer_ids = &input_ids[span.start..=span.end];
    tokenizer
        .decode(answer_ids, true)
        .map_err(|e| anyhow::anyhow!("Decode: {e}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    // [CLS] feat [SEP] c c c c [SEP] — positions 3..=7 are context
    const SEGMENTS: [i64; 8] = [0, 0, 0, 1, 1, 1, 1, 1];

    fn uniform(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn test_picks_highest_scoring_context_span() {
        let mut start = uniform(8);
        let mut end   = uniform(8);
        start[4] = 6.0;
        end[5]   = 6.0;

        let result = decode_span(&start, &end, &SEGMENTS);
        assert_eq!(result.span, TokenSpan { start: 4, end: 5 });
        assert!(result.score > 0.0);
    }

    #[test]
    fn test_start_never_after_end() {
        // End peak strictly before start peak: the (6, 4) cell is
        // in the erased lower triangle, so some i ≤ j span wins.
        let mut start = uniform(8);
        let mut end   = uniform(8);
        start[6] = 8.0;
        end[4]   = 8.0;

        let result = decode_span(&start, &end, &SEGMENTS);
        assert!(result.span.start <= result.span.end);
    }

    #[test]
    fn test_first_position_only_pairs_with_itself() {
        // Strong start at 0, strong end in the context: (0, 5) is
        // forbidden, so either (0, 0) or a pure context span wins.
        let mut start = uniform(8);
        let mut end   = uniform(8);
        start[0] = 10.0;
        end[5]   = 10.0;

        let result = decode_span(&start, &end, &SEGMENTS);
        if result.span.start == 0 {
            assert_eq!(result.span.end, 0);
        } else {
            assert!(result.span.start >= 3);
        }
    }

    #[test]
    fn test_no_answer_wins_when_model_prefers_position_zero() {
        let mut start = uniform(8);
        let mut end   = uniform(8);
        start[0] = 10.0;
        end[0]   = 10.0;

        let result = decode_span(&start, &end, &SEGMENTS);
        assert_eq!(result.span, TokenSpan::NO_ANSWER);
    }

    #[test]
    fn test_prompt_positions_are_never_selected() {
        // The model loves position 1 (the feature token) — masked.
        let mut start = uniform(8);
        let mut end   = uniform(8);
        start[1] = 20.0;
        end[1]   = 20.0;
        start[4] = 1.0;
        end[4]   = 1.0;

        let result = decode_span(&start, &end, &SEGMENTS);
        assert!(result.span.start == 0 || result.span.start >= 3);
        assert!(result.span.end == 0 || result.span.end >= 3);
    }

    #[test]
    fn test_constraints_hold_for_many_logit_patterns() {
        // A sweep of deterministic patterns: the invariants must
        // hold for every one of them.
        for a in 0..8 {
            for b in 0..8 {
                let mut start = uniform(8);
                let mut end   = uniform(8);
                start[a] = 5.0;
                end[b]   = 5.0;

                let result = decode_span(&start, &end, &SEGMENTS);
                assert!(result.span.start <= result.span.end);
                if result.span.start == 0 {
                    assert_eq!(result.span.end, 0);
                }
                assert!(result.score >= 0.0);
            }
        }
    }

    #[test]
    fn test_softmax_shift_invariance() {
        let start: Vec<f32> = vec![0.1, 0.4, -0.3, 2.0, 1.5, -1.0, 0.7, 0.0];
        let end:   Vec<f32> = vec![-0.2, 0.9, 0.3, 0.5, 2.5, 0.1, -0.4, 0.8];

        let base = decode_span(&start, &end, &SEGMENTS);

        let shifted_start: Vec<f32> = start.iter().map(|x| x + 37.5).collect();
        let shifted_end:   Vec<f32> = end.iter().map(|x| x + 37.5).collect();
        let shifted = decode_span(&shifted_start, &shifted_end, &SEGMENTS);

        assert_eq!(base.span, shifted.span);
        assert!((base.score - shifted.score).abs() < 1e-5);
    }

    #[test]
    fn test_batch_decoding_is_per_element() {
        let mut hot_start = uniform(8);
        let mut hot_end   = uniform(8);
        hot_start[3] = 6.0;
        hot_end[6]   = 6.0;

        let results = decode_spans(
            &[hot_start, uniform(8)],
            &[hot_end, uniform(8)],
            &[SEGMENTS.to_vec(), SEGMENTS.to_vec()],
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].span, TokenSpan { start: 3, end: 6 });
        assert!(results[1].span.start <= results[1].span.end);
    }

    #[test]
    fn test_render_no_answer_is_empty() {
        let corpus = vec!["The sky is blue".to_string(), "color".to_string()];
        let tokenizer = TokenizerStore::build(&corpus, 1000).unwrap();
        let encoding = tokenizer.encode(("color", "The sky is blue"), true).unwrap();

        let text = render_span(&tokenizer, encoding.get_ids(), TokenSpan::NO_ANSWER).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_render_slices_inclusive_span() {
        let corpus = vec!["The sky is blue".to_string(), "color".to_string()];
        let tokenizer = TokenizerStore::build(&corpus, 1000).unwrap();
        let encoding = tokenizer.encode(("color", "The sky is blue"), true).unwrap();

        // [CLS] color [SEP] the sky is blue [SEP]
        let text = render_span(
            &tokenizer,
            encoding.get_ids(),
            TokenSpan { start: 4, end: 6 },
        )
        .unwrap();
        assert_eq!(text, "sky is blue");
    }
}
