// ============================================================
// Layer 5 — Inference
// ============================================================
// Checkpoint-loading predictors, one per model family.
//
//   SpanInferencer — encodes a (feature, context) pair, runs
//     the span model, decodes the best constrained span and
//     renders it back to text with a confidence score.
//   GenInferencer  — formats the prompt, generates greedily
//     with the seq2seq model and decodes the produced ids.
//
// Both run on the inner (non-autodiff) backend with dropout
// disabled.

use anyhow::Result;
use burn::prelude::*;
use tokenizers::Tokenizer;

use crate::data::batcher::format_prompt;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{SpanModel, SpanModelConfig};
use crate::ml::seq2seq::{Seq2SeqConfig, Seq2SeqModel};
use crate::ml::span_decoder;
use crate::ml::Architecture;

type InferBackend = burn::backend::Wgpu;

/// Generated answers are short attribute values; no need to run
/// the decoder out to the full sequence length.
const MAX_ANSWER_LEN: usize = 32;

// ─── Extractive inference ─────────────────────────────────────────────────────

pub struct SpanInferencer {
    model:  SpanModel<InferBackend>,
    device: burn::backend::wgpu::WgpuDevice,
}

impl SpanInferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let cfg    = ckpt_manager.load_config()?;
        let model_cfg = SpanModelConfig::new(
            cfg.vocab_size, cfg.max_seq_len, cfg.d_model,
            cfg.num_heads, cfg.num_layers, cfg.d_ff, 0.0,
        );
        let model: SpanModel<InferBackend> = model_cfg.init(&device);
        let model = ckpt_manager.load_model(model, Architecture::Extractive.tag(), &device)?;
        tracing::info!("Span model loaded from checkpoint");
        Ok(Self { model, device })
    }

    /// Predict the answer span for one (feature, context) pair.
    /// Returns the rendered answer (empty for "no answer") and
    /// its joint start×end probability.
    pub fn predict(
        &self,
        feature:   &str,
        input:     &str,
        tokenizer: &Tokenizer,
    ) -> Result<(String, f32)> {
        let encoding = tokenizer
            .encode((feature, input), true)
            .map_err(|e| anyhow::anyhow!("Tokenise: {e}"))?;
        let seq_len = encoding.get_ids().len();

        let ids:   Vec<i32> = encoding.get_ids().iter().map(|&x| x as i32).collect();
        let mask:  Vec<i32> = encoding.get_attention_mask().iter().map(|&x| x as i32).collect();
        let types: Vec<i32> = encoding.get_type_ids().iter().map(|&x| x as i32).collect();

        let input_ids = Tensor::<InferBackend, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([1, seq_len]);
        let attention_mask = Tensor::<InferBackend, 1, Int>::from_ints(mask.as_slice(), &self.device)
            .reshape([1, seq_len]);
        let token_type_ids = Tensor::<InferBackend, 1, Int>::from_ints(types.as_slice(), &self.device)
            .reshape([1, seq_len]);

        let output = self.model.forward(input_ids, attention_mask, token_type_ids);

        let start_logits: Vec<f32> = output.start_logits
            .into_data().to_vec::<f32>().unwrap_or_default();
        let end_logits: Vec<f32> = output.end_logits
            .into_data().to_vec::<f32>().unwrap_or_default();
        let segments: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let scored = span_decoder::decode_span(&start_logits, &end_logits, &segments);
        let answer = span_decoder::render_span(tokenizer, encoding.get_ids(), scored.span)?;

        tracing::debug!(
            "Span [{},{}] conf={:.4} answer='{}'",
            scored.span.start, scored.span.end, scored.score, answer,
        );

        Ok((answer, scored.score))
    }
}

// ─── Generative inference ─────────────────────────────────────────────────────

pub struct GenInferencer {
    model:  Seq2SeqModel<InferBackend>,
    device: burn::backend::wgpu::WgpuDevice,
}

impl GenInferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let cfg    = ckpt_manager.load_config()?;
        let model_cfg = Seq2SeqConfig::new(
            cfg.vocab_size, cfg.max_seq_len, cfg.d_model, cfg.num_heads,
            cfg.num_layers, cfg.num_decoder_layers, cfg.d_ff, 0.0,
        );
        let model: Seq2SeqModel<InferBackend> = model_cfg.init(&device);
        let model = ckpt_manager.load_model(model, Architecture::Generative.tag(), &device)?;
        tracing::info!("Seq2seq model loaded from checkpoint");
        Ok(Self { model, device })
    }

    /// Generate an answer string for one (feature, context) pair.
    pub fn predict(
        &self,
        feature:   &str,
        input:     &str,
        tokenizer: &Tokenizer,
    ) -> Result<String> {
        let prompt = format_prompt(feature, input);
        let encoding = tokenizer
            .encode(prompt.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Tokenise: {e}"))?;
        let seq_len = encoding.get_ids().len();

        let ids:  Vec<i32> = encoding.get_ids().iter().map(|&x| x as i32).collect();
        let mask: Vec<i32> = encoding.get_attention_mask().iter().map(|&x| x as i32).collect();

        let input_ids = Tensor::<InferBackend, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([1, seq_len]);
        let attention_mask = Tensor::<InferBackend, 1, Int>::from_ints(mask.as_slice(), &self.device)
            .reshape([1, seq_len]);

        let bos_id = tokenizer.token_to_id("[CLS]").unwrap_or(101);
        let eos_id = tokenizer.token_to_id("[SEP]").unwrap_or(102);

        let generated = self.model.generate(
            input_ids,
            attention_mask,
            bos_id,
            eos_id,
            MAX_ANSWER_LEN,
        );

        let answer = tokenizer
            .decode(&generated[0], true)
            .map_err(|e| anyhow::anyhow!("Decode: {e}"))?;

        tracing::debug!("Generated {} tokens: '{}'", generated[0].len(), answer);

        Ok(answer.trim().to_string())
    }
}
