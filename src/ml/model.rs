// ============================================================
// Layer 5 — Span Prediction Model
// ============================================================
// Transformer encoder with a start/end span head.
//
// Input is a (feature, context) pair encoding. Three embedding
// tables are summed: token, position and segment — the segment
// embedding tells the encoder which tokens are prompt (type 0)
// and which are context (type 1), mirroring the token_type_ids
// the batcher emits. Padding positions are masked out of
// attention via the attention mask.
//
// The head projects every token to 2 logits which are split
// into per-token start and end scores.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SpanModelConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl SpanModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpanModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        // Two segments: prompt/feature (0) and context (1)
        let segment_embedding  = EmbeddingConfig::new(2, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| EncoderBlock::new(self.d_model, self.num_heads, self.d_ff, self.dropout, device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let span_head  = LinearConfig::new(self.d_model, 2).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        SpanModel {
            token_embedding, position_embedding, segment_embedding,
            layers, final_norm, span_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn new(
        d_model:   usize,
        num_heads: usize,
        d_ff:      usize,
        dropout:   f64,
        device:    &B::Device,
    ) -> Self {
        let self_attn = MultiHeadAttentionConfig::new(d_model, num_heads)
            .with_dropout(dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(d_model, d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(d_ff, d_model).init(device);
        let norm1   = LayerNormConfig::new(d_model).init(device);
        let norm2   = LayerNormConfig::new(d_model).init(device);
        let dropout = DropoutConfig::new(dropout).init();
        Self { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }

    /// Self-attention block with padded positions masked out.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(pad_mask);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct SpanModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub span_head:          Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

pub struct SpanModelOutput<B: Backend> {
    pub start_logits: Tensor<B, 2>,
    pub end_logits:   Tensor<B, 2>,
}

impl<B: Backend> SpanModel<B> {
    /// input_ids, attention_mask, token_type_ids: [batch, seq_len]
    /// → start_logits, end_logits: [batch, seq_len]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
    ) -> SpanModelOutput<B> {
        let [batch_size, seq_len] = input_ids.dims();

        // True at padded positions — these drop out of attention
        let pad_mask = attention_mask.equal_elem(0);

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);
        let seg_emb = self.segment_embedding.forward(token_type_ids);

        let mut x = self.dropout.forward(tok_emb + pos_emb + seg_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        let x = self.final_norm.forward(x); // [batch, seq_len, d_model]

        // Project to 2 logits per token then split into start / end.
        let logits = self.span_head.forward(x); // [batch, seq_len, 2]
        let start_logits = logits.clone()
            .slice([0..batch_size, 0..seq_len, 0..1])
            .reshape([batch_size, seq_len]);
        let end_logits = logits
            .slice([0..batch_size, 0..seq_len, 1..2])
            .reshape([batch_size, seq_len]);

        SpanModelOutput { start_logits, end_logits }
    }

    pub fn forward_loss(
        &self,
        input_ids:       Tensor<B, 2, Int>,
        attention_mask:  Tensor<B, 2, Int>,
        token_type_ids:  Tensor<B, 2, Int>,
        start_positions: Tensor<B, 1, Int>,
        end_positions:   Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, SpanModelOutput<B>)
    where
        B: AutodiffBackend,
    {
        let output = self.forward(input_ids, attention_mask, token_type_ids);
        let ce = burn::nn::loss::CrossEntropyLossConfig::new()
            .init(&output.start_logits.device());
        // Loss = (CE_start + CE_end) / 2
        let loss = (ce.forward(output.start_logits.clone(), start_positions)
                  + ce.forward(output.end_logits.clone(),   end_positions)) / 2.0_f64;
        (loss, output)
    }
}
