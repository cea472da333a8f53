// ============================================================
// Layer 4 — Batch Assembly
// ============================================================
// Implements Burn's Batcher trait twice, once per model family.
//
//   SpanBatcher    — encodes (feature, context) pairs and
//                    derives start/end token supervision from
//                    the cached char spans.
//   Seq2SeqBatcher — formats "attribute: ... context: ..."
//                    prompts and derives shifted decoder
//                    inputs/labels from the encoded targets.
//
// Both batchers are stateless projections: they read the
// aligned samples, never write back, and every batch carries
// the raw strings alongside the tensors so downstream code can
// render predictions without re-touching the dataset.
//
// The tokenizer is shared via Arc and is configured for fixed
// length (padding + truncation), so every tensor in a batch has
// the same sequence dimension.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use tokenizers::Tokenizer;

use crate::data::align::{self, AlignedSample};

/// Prompt layout consumed by the generative model.
pub fn format_prompt(feature: &str, input: &str) -> String {
    format!("attribute: {feature} context: {input}")
}

// ─── Extractive batches ───────────────────────────────────────────────────────

/// A batch for the span-prediction model.
/// All 2-D tensors have shape [batch_size, seq_len].
#[derive(Debug, Clone)]
pub struct SpanBatch<B: Backend> {
    pub docs:     Vec<String>,
    pub inputs:   Vec<String>,
    pub targets:  Vec<String>,
    pub features: Vec<String>,

    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,

    /// Segment ids: 0 for the leading special token and the
    /// feature segment, 1 for the context segment
    pub token_type_ids: Tensor<B, 2, Int>,

    /// Supervision token indices — shape: [batch_size]
    pub start_positions: Tensor<B, 1, Int>,
    pub end_positions:   Tensor<B, 1, Int>,
}

#[derive(Clone)]
pub struct SpanBatcher<B: Backend> {
    tokenizer: Arc<Tokenizer>,
    device:    B::Device,
}

impl<B: Backend> SpanBatcher<B> {
    pub fn new(tokenizer: Arc<Tokenizer>, device: B::Device) -> Self {
        Self { tokenizer, device }
    }
}

impl<B: Backend> Batcher<AlignedSample, SpanBatch<B>> for SpanBatcher<B> {
    fn batch(&self, items: Vec<AlignedSample>) -> SpanBatch<B> {
        let batch_size = items.len();

        // Encode every sample as a (feature, context) pair so the
        // tokenizer emits segment ids and per-segment offsets.
        let pairs: Vec<(String, String)> = items
            .iter()
            .map(|s| (s.sample.feature.clone(), s.sample.input.clone()))
            .collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .expect("tokenizer should encode batch of (feature, context) pairs");

        // Fixed padding means every encoding has the same length
        let seq_len = encodings[0].get_ids().len();

        let mut ids_flat  = Vec::with_capacity(batch_size * seq_len);
        let mut mask_flat = Vec::with_capacity(batch_size * seq_len);
        let mut type_flat = Vec::with_capacity(batch_size * seq_len);
        let mut starts    = Vec::with_capacity(batch_size);
        let mut ends      = Vec::with_capacity(batch_size);

        for (item, encoding) in items.iter().zip(&encodings) {
            ids_flat.extend(encoding.get_ids().iter().map(|&x| x as i32));
            mask_flat.extend(encoding.get_attention_mask().iter().map(|&x| x as i32));
            type_flat.extend(encoding.get_type_ids().iter().map(|&x| x as i32));

            // Char offsets were cached at preparation time; here they
            // become token indices for this exact encoding.
            let span = align::supervision_span(encoding, item.char_span);
            starts.push(span.start as i32);
            ends.push(span.end as i32);
        }

        let input_ids = Tensor::<B, 1, Int>::from_ints(ids_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let token_type_ids = Tensor::<B, 1, Int>::from_ints(type_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let start_positions = Tensor::<B, 1, Int>::from_ints(starts.as_slice(), &self.device);
        let end_positions   = Tensor::<B, 1, Int>::from_ints(ends.as_slice(), &self.device);

        SpanBatch {
            docs:     items.iter().map(|s| s.sample.doc.clone()).collect(),
            inputs:   items.iter().map(|s| s.sample.input.clone()).collect(),
            targets:  items.iter().map(|s| s.sample.target.clone()).collect(),
            features: items.iter().map(|s| s.sample.feature.clone()).collect(),
            input_ids,
            attention_mask,
            token_type_ids,
            start_positions,
            end_positions,
        }
    }
}

// ─── Generative batches ───────────────────────────────────────────────────────

/// A batch for the sequence-to-sequence model.
///
/// Decoder tensors are one position shorter than the encoded
/// target: the decoder consumes all-but-last target tokens and
/// is supervised to predict all-but-first tokens at the same
/// positions (teacher forcing).
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    pub docs:     Vec<String>,
    pub inputs:   Vec<String>,
    pub targets:  Vec<String>,
    pub features: Vec<String>,

    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,

    pub decoder_input_ids:      Tensor<B, 2, Int>,
    pub decoder_attention_mask: Tensor<B, 2, Int>,
    pub target_labels:          Tensor<B, 2, Int>,
}

#[derive(Clone)]
pub struct Seq2SeqBatcher<B: Backend> {
    tokenizer: Arc<Tokenizer>,
    device:    B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(tokenizer: Arc<Tokenizer>, device: B::Device) -> Self {
        Self { tokenizer, device }
    }
}

impl<B: Backend> Batcher<AlignedSample, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<AlignedSample>) -> Seq2SeqBatch<B> {
        let batch_size = items.len();

        let prompts: Vec<String> = items
            .iter()
            .map(|s| format_prompt(&s.sample.feature, &s.sample.input))
            .collect();
        let targets: Vec<String> = items
            .iter()
            .map(|s| s.sample.target.clone())
            .collect();

        let prompt_encodings = self
            .tokenizer
            .encode_batch(prompts, true)
            .expect("tokenizer should encode batch of prompts");
        let target_encodings = self
            .tokenizer
            .encode_batch(targets.clone(), true)
            .expect("tokenizer should encode batch of targets");

        let src_len = prompt_encodings[0].get_ids().len();
        let tgt_len = target_encodings[0].get_ids().len();
        // Shift-by-one construction drops one position
        let dec_len = tgt_len - 1;

        let mut src_ids_flat  = Vec::with_capacity(batch_size * src_len);
        let mut src_mask_flat = Vec::with_capacity(batch_size * src_len);
        let mut dec_ids_flat  = Vec::with_capacity(batch_size * dec_len);
        let mut dec_mask_flat = Vec::with_capacity(batch_size * dec_len);
        let mut label_flat    = Vec::with_capacity(batch_size * dec_len);

        for encoding in &prompt_encodings {
            src_ids_flat.extend(encoding.get_ids().iter().map(|&x| x as i32));
            src_mask_flat.extend(encoding.get_attention_mask().iter().map(|&x| x as i32));
        }

        for encoding in &target_encodings {
            let ids  = encoding.get_ids();
            let mask = encoding.get_attention_mask();

            // decoder input = tokens [0..len-1], label = tokens [1..len]
            dec_ids_flat.extend(ids[..dec_len].iter().map(|&x| x as i32));
            label_flat.extend(ids[1..].iter().map(|&x| x as i32));
            dec_mask_flat.extend(mask[..dec_len].iter().map(|&x| x as i32));
        }

        let input_ids = Tensor::<B, 1, Int>::from_ints(src_ids_flat.as_slice(), &self.device)
            .reshape([batch_size, src_len]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(src_mask_flat.as_slice(), &self.device)
            .reshape([batch_size, src_len]);
        let decoder_input_ids = Tensor::<B, 1, Int>::from_ints(dec_ids_flat.as_slice(), &self.device)
            .reshape([batch_size, dec_len]);
        let decoder_attention_mask =
            Tensor::<B, 1, Int>::from_ints(dec_mask_flat.as_slice(), &self.device)
                .reshape([batch_size, dec_len]);
        let target_labels = Tensor::<B, 1, Int>::from_ints(label_flat.as_slice(), &self.device)
            .reshape([batch_size, dec_len]);

        Seq2SeqBatch {
            docs:     items.iter().map(|s| s.sample.doc.clone()).collect(),
            inputs:   items.iter().map(|s| s.sample.input.clone()).collect(),
            targets,
            features: items.iter().map(|s| s.sample.feature.clone()).collect(),
            input_ids,
            attention_mask,
            decoder_input_ids,
            decoder_attention_mask,
            target_labels,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::align::prepare_samples;
    use crate::domain::sample::Sample;
    use crate::infra::tokenizer_store::TokenizerStore;

    type TestBackend = burn::backend::NdArray;

    const MAX_LEN: usize = 32;

    fn test_tokenizer(corpus: &[&str]) -> Arc<Tokenizer> {
        let texts: Vec<String> = corpus.iter().map(|s| s.to_string()).collect();
        let tokenizer = TokenizerStore::build(&texts, 1000).unwrap();
        Arc::new(TokenizerStore::with_fixed_shape(tokenizer, MAX_LEN).unwrap())
    }

    fn device() -> burn::backend::ndarray::NdArrayDevice {
        burn::backend::ndarray::NdArrayDevice::default()
    }

    fn to_vec_i64(tensor: Tensor<TestBackend, 1, Int>) -> Vec<i64> {
        tensor.into_data().convert::<i64>().to_vec().unwrap()
    }

    #[test]
    fn test_span_batch_shapes_and_raw_fields() {
        let tokenizer = test_tokenizer(&[
            "attribute: color context: The sky is blue",
            "No mention here",
        ]);

        let samples = vec![
            Sample::new("d0", "The sky is blue", "blue", "color"),
            Sample::new("d1", "No mention here", "", "color"),
        ];
        let (aligned, _) = prepare_samples(samples, false);

        let batcher = SpanBatcher::<TestBackend>::new(tokenizer, device());
        let batch = batcher.batch(aligned);

        assert_eq!(batch.input_ids.dims(), [2, MAX_LEN]);
        assert_eq!(batch.attention_mask.dims(), [2, MAX_LEN]);
        assert_eq!(batch.token_type_ids.dims(), [2, MAX_LEN]);
        assert_eq!(batch.inputs[0], "The sky is blue");
        assert_eq!(batch.targets[1], "");
        assert_eq!(batch.features, vec!["color", "color"]);
    }

    #[test]
    fn test_span_batch_supervision_positions() {
        let tokenizer = test_tokenizer(&["The sky is blue", "color"]);

        let samples = vec![
            // [CLS] color [SEP] the sky is blue [SEP] → "blue" at token 6
            Sample::new("d0", "The sky is blue", "blue", "color"),
            // No answer → (0, 0)
            Sample::new("d1", "The sky is blue", "", "color"),
        ];
        let (aligned, _) = prepare_samples(samples, false);

        let batcher = SpanBatcher::<TestBackend>::new(tokenizer, device());
        let batch = batcher.batch(aligned);

        assert_eq!(to_vec_i64(batch.start_positions), vec![6, 0]);
        assert_eq!(to_vec_i64(batch.end_positions), vec![6, 0]);
    }

    #[test]
    fn test_seq2seq_decoder_tensors_are_one_shorter() {
        let tokenizer = test_tokenizer(&["attribute: color context: The sky is blue"]);

        let samples = vec![Sample::new("d0", "The sky is blue", "blue", "color")];
        let (aligned, _) = prepare_samples(samples, false);

        // The raw encoded target length is the fixed padded length
        let raw_target_len = tokenizer.encode("blue", true).unwrap().get_ids().len();
        assert_eq!(raw_target_len, MAX_LEN);

        let batcher = Seq2SeqBatcher::<TestBackend>::new(tokenizer, device());
        let batch = batcher.batch(aligned);

        assert_eq!(batch.decoder_input_ids.dims(), [1, raw_target_len - 1]);
        assert_eq!(batch.decoder_attention_mask.dims(), [1, raw_target_len - 1]);
        assert_eq!(batch.target_labels.dims(), [1, raw_target_len - 1]);
    }

    #[test]
    fn test_seq2seq_labels_are_shifted_inputs() {
        let tokenizer = test_tokenizer(&["attribute: color context: The sky is blue"]);

        let samples = vec![Sample::new("d0", "The sky is blue", "blue", "color")];
        let (aligned, _) = prepare_samples(samples, false);

        let raw_ids: Vec<i64> = tokenizer
            .encode("blue", true)
            .unwrap()
            .get_ids()
            .iter()
            .map(|&x| x as i64)
            .collect();

        let batcher = Seq2SeqBatcher::<TestBackend>::new(tokenizer, device());
        let batch = batcher.batch(aligned);

        let dec_len = raw_ids.len() - 1;
        let dec_in = to_vec_i64(batch.decoder_input_ids.reshape([dec_len]));
        let labels = to_vec_i64(batch.target_labels.reshape([dec_len]));

        assert_eq!(dec_in, raw_ids[..dec_len].to_vec());
        assert_eq!(labels, raw_ids[1..].to_vec());
    }

    #[test]
    fn test_prompt_format() {
        assert_eq!(
            format_prompt("weight", "Ships at 240 grams"),
            "attribute: weight context: Ships at 240 grams"
        );
    }
}
