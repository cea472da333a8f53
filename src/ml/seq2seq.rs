// ============================================================
// Layer 5 — Sequence-to-Sequence Model
// ============================================================
// Encoder-decoder transformer for generative answering.
//
// The encoder is the same masked self-attention block stack the
// span model uses. The decoder adds two things per block: a
// causal mask on self-attention (a position may only look left)
// and cross-attention into the encoder output. A final linear
// head projects decoder states to vocabulary logits.
//
// Training is teacher-forced: the batcher feeds the decoder the
// target shifted right by one and supervises the unshifted
// tokens; padding positions are excluded from the loss.
// Inference is greedy: argmax one token at a time until the end
// token appears.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Raffel et al. (2020) T5

use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention,
                    MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::EncoderBlock;

#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub vocab_size:         usize,
    pub max_seq_len:        usize,
    pub d_model:            usize,
    pub num_heads:          usize,
    pub num_encoder_layers: usize,
    pub num_decoder_layers: usize,
    pub d_ff:               usize,
    pub dropout:            f64,
}

impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let encoder_layers: Vec<EncoderBlock<B>> = (0..self.num_encoder_layers)
            .map(|_| EncoderBlock::new(self.d_model, self.num_heads, self.d_ff, self.dropout, device))
            .collect();
        let decoder_layers: Vec<DecoderBlock<B>> = (0..self.num_decoder_layers)
            .map(|_| DecoderBlock::new(self.d_model, self.num_heads, self.d_ff, self.dropout, device))
            .collect();
        let encoder_norm = LayerNormConfig::new(self.d_model).init(device);
        let decoder_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head      = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout      = DropoutConfig::new(self.dropout).init();
        Seq2SeqModel {
            token_embedding, position_embedding,
            encoder_layers, decoder_layers,
            encoder_norm, decoder_norm, lm_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
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
        let cross_attn = MultiHeadAttentionConfig::new(d_model, num_heads)
            .with_dropout(dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(d_model, d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(d_ff, d_model).init(device);
        let norm1   = LayerNormConfig::new(d_model).init(device);
        let norm2   = LayerNormConfig::new(d_model).init(device);
        let norm3   = LayerNormConfig::new(d_model).init(device);
        let dropout = DropoutConfig::new(dropout).init();
        Self {
            self_attn, cross_attn, ffn_linear1, ffn_linear2,
            norm1, norm2, norm3, dropout,
        }
    }

    /// Causally-masked self-attention, then cross-attention into
    /// the encoder output, then the feed-forward network.
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        causal_mask: Tensor<B, 3, Bool>,
        dec_pad:     Tensor<B, 2, Bool>,
        enc_pad:     Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let self_input = MhaInput::self_attn(x.clone())
            .mask_pad(dec_pad)
            .mask_attn(causal_mask);
        let self_out = self.self_attn.forward(self_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(self_out));

        let cross_input = MhaInput::new(x.clone(), memory.clone(), memory)
            .mask_pad(enc_pad);
        let cross_out = self.cross_attn.forward(cross_input).context;
        let x = self.norm2.forward(x + self.dropout.forward(cross_out));

        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub encoder_layers:     Vec<EncoderBlock<B>>,
    pub decoder_layers:     Vec<DecoderBlock<B>>,
    pub encoder_norm:       LayerNorm<B>,
    pub decoder_norm:       LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Sum token and position embeddings for a [batch, seq] id tensor.
    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let tok_emb = self.token_embedding.forward(ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);
        self.dropout.forward(tok_emb + pos_emb)
    }

    /// Encode the source sequence → memory states [batch, src, d_model]
    pub fn encode(
        &self,
        input_ids: Tensor<B, 2, Int>,
        enc_pad:   Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let mut x = self.embed(input_ids);
        for layer in &self.encoder_layers {
            x = layer.forward(x, enc_pad.clone());
        }
        self.encoder_norm.forward(x)
    }

    /// Decode against encoder memory → vocab logits [batch, tgt, vocab]
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        memory:            Tensor<B, 3>,
        enc_pad:           Tensor<B, 2, Bool>,
        dec_pad:           Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let device = decoder_input_ids.device();

        let causal_mask = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);

        let mut y = self.embed(decoder_input_ids);
        for layer in &self.decoder_layers {
            y = layer.forward(
                y,
                memory.clone(),
                causal_mask.clone(),
                dec_pad.clone(),
                enc_pad.clone(),
            );
        }
        let y = self.decoder_norm.forward(y);
        self.lm_head.forward(y)
    }

    /// Full teacher-forced pass → logits [batch, tgt, vocab]
    pub fn forward(
        &self,
        input_ids:              Tensor<B, 2, Int>,
        attention_mask:         Tensor<B, 2, Int>,
        decoder_input_ids:      Tensor<B, 2, Int>,
        decoder_attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let enc_pad = attention_mask.equal_elem(0);
        let dec_pad = decoder_attention_mask.equal_elem(0);
        let memory  = self.encode(input_ids, enc_pad.clone());
        self.decode(decoder_input_ids, memory, enc_pad, dec_pad)
    }

    /// Teacher-forced loss over non-pad label positions.
    pub fn forward_loss(
        &self,
        input_ids:              Tensor<B, 2, Int>,
        attention_mask:         Tensor<B, 2, Int>,
        decoder_input_ids:      Tensor<B, 2, Int>,
        decoder_attention_mask: Tensor<B, 2, Int>,
        target_labels:          Tensor<B, 2, Int>,
        pad_id:                 usize,
    ) -> (Tensor<B, 1>, Tensor<B, 3>)
    where
        B: AutodiffBackend,
    {
        let logits = self.forward(
            input_ids,
            attention_mask,
            decoder_input_ids,
            decoder_attention_mask,
        );
        let [batch_size, tgt_len, vocab] = logits.dims();

        let ce = burn::nn::loss::CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![pad_id]))
            .init(&logits.device());
        let loss = ce.forward(
            logits.clone().reshape([batch_size * tgt_len, vocab]),
            target_labels.reshape([batch_size * tgt_len]),
        );
        (loss, logits)
    }

    /// Greedy decoding: one argmax token per step, per element,
    /// until the end token or `max_len` positions.
    ///
    /// Returns the generated ids with the leading start token and
    /// everything from the end token onward stripped.
    pub fn generate(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        bos_id:         u32,
        eos_id:         u32,
        max_len:        usize,
    ) -> Vec<Vec<u32>> {
        let [batch_size, _src_len] = input_ids.dims();
        let device = input_ids.device();

        let enc_pad = attention_mask.equal_elem(0);
        let memory  = self.encode(input_ids, enc_pad.clone());

        let mut tokens: Vec<Vec<u32>> = vec![vec![bos_id]; batch_size];
        let mut finished = vec![false; batch_size];

        for _step in 1..max_len.min(self.max_seq_len) {
            let cur_len = tokens[0].len();
            let flat: Vec<i32> = tokens
                .iter()
                .flat_map(|seq| seq.iter().map(|&id| id as i32))
                .collect();
            let dec_ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &device)
                .reshape([batch_size, cur_len]);
            // Every prefix position is a real token during generation
            let dec_pad = Tensor::<B, 2, Int>::ones([batch_size, cur_len], &device)
                .equal_elem(0);

            let logits = self.decode(dec_ids, memory.clone(), enc_pad.clone(), dec_pad);
            let [b, t, v] = logits.dims();
            let next = logits
                .slice([0..b, t - 1..t, 0..v])
                .argmax(2)
                .reshape([b]);
            let next: Vec<i64> = next.into_data().convert::<i64>().to_vec().unwrap_or_default();

            let mut all_done = true;
            for (i, &id) in next.iter().enumerate() {
                if finished[i] {
                    // Keep row lengths equal; trimmed below
                    tokens[i].push(eos_id);
                    continue;
                }
                let id = id as u32;
                tokens[i].push(id);
                if id == eos_id {
                    finished[i] = true;
                } else {
                    all_done = false;
                }
            }
            if all_done {
                break;
            }
        }

        tokens
            .into_iter()
            .map(|seq| {
                seq[1..]
                    .iter()
                    .take_while(|&&id| id != eos_id)
                    .copied()
                    .collect()
            })
            .collect()
    }
}
