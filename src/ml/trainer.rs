// ============================================================
// Layer 5 — Training Loops
// ============================================================
// One epoch loop per model family, both with the same shape:
//
//   - Adam on the autodiff backend for the training phase
//   - model.valid() on the inner backend for validation
//     (no autodiff overhead, dropout disabled)
//   - per-epoch metrics row and checkpoint
//
// The extractive loop validates start/end position accuracy;
// the generative loop validates non-pad token accuracy under
// teacher forcing.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use tokenizers::Tokenizer;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{Seq2SeqBatcher, SpanBatcher},
    dataset::PreparedDataset,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::{SpanModel, SpanModelConfig};
use crate::ml::seq2seq::{Seq2SeqConfig, Seq2SeqModel};
use crate::ml::Architecture;

type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
type ValidBackend = burn::backend::Wgpu;

// ─── Extractive family ────────────────────────────────────────────────────────

pub fn run_span_training(
    cfg:           &TrainConfig,
    tokenizer:     Arc<Tokenizer>,
    train_dataset: PreparedDataset,
    val_dataset:   PreparedDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = SpanModelConfig::new(
        cfg.vocab_size, cfg.max_seq_len, cfg.d_model,
        cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
    );
    let mut model: SpanModel<TrainBackend> = model_cfg.init(&device);
    tracing::info!("Span model ready: {} layers, d_model={}", cfg.num_layers, cfg.d_model);

    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_batcher = SpanBatcher::<TrainBackend>::new(tokenizer.clone(), device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    let val_batcher = SpanBatcher::<ValidBackend>::new(tokenizer, device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let metrics = MetricsLogger::new(
        &cfg.checkpoint_dir,
        "extractive_metrics.csv",
        &["epoch", "train_loss", "val_loss", "start_acc", "end_acc"],
    )?;
    tracing::info!("Logging metrics to '{}'", metrics.csv_path().display());

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(
                batch.input_ids,
                batch.attention_mask,
                batch.token_type_ids,
                batch.start_positions,
                batch.end_positions,
            );

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase (inner backend, dropout off) ─────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct_start = 0usize;
        let mut correct_end   = 0usize;
        let mut total_samples = 0usize;

        for batch in val_loader.iter() {
            let output = model_valid.forward(
                batch.input_ids,
                batch.attention_mask,
                batch.token_type_ids,
            );

            let ce = burn::nn::loss::CrossEntropyLossConfig::new()
                .init(&output.start_logits.device());
            let s_loss = ce.forward(output.start_logits.clone(), batch.start_positions.clone());
            let e_loss = ce.forward(output.end_logits.clone(), batch.end_positions.clone());

            let batch_loss: f64 = ((s_loss + e_loss) / 2.0_f64)
                .into_scalar().elem::<f64>();
            val_loss_sum += batch_loss;
            val_batches  += 1;

            // argmax(1) returns shape [batch, 1] — flatten to [batch]
            // before comparing with the position tensors
            let pred_start = output.start_logits.argmax(1).flatten::<1>(0, 1);
            let pred_end   = output.end_logits.argmax(1).flatten::<1>(0, 1);

            total_samples += batch.start_positions.dims()[0];

            let s_correct: i64 = pred_start
                .equal(batch.start_positions)
                .int().sum().into_scalar().elem::<i64>();
            let e_correct: i64 = pred_end
                .equal(batch.end_positions)
                .int().sum().into_scalar().elem::<i64>();

            correct_start += s_correct as usize;
            correct_end   += e_correct as usize;
        }

        let avg_val_loss = if val_batches   > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let start_acc    = if total_samples > 0 { correct_start as f64 / total_samples as f64 } else { 0.0 };
        let end_acc      = if total_samples > 0 { correct_end   as f64 / total_samples as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | start_acc={:.1}% | end_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss,
            start_acc * 100.0, end_acc * 100.0,
        );

        metrics.log(epoch, &[avg_train_loss, avg_val_loss, start_acc, end_acc])?;
        ckpt_manager.save_model(&model, Architecture::Extractive.tag(), epoch)?;
        tracing::debug!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Span model training complete");
    Ok(())
}

// ─── Generative family ────────────────────────────────────────────────────────

pub fn run_seq2seq_training(
    cfg:           &TrainConfig,
    tokenizer:     Arc<Tokenizer>,
    train_dataset: PreparedDataset,
    val_dataset:   PreparedDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let model_cfg = Seq2SeqConfig::new(
        cfg.vocab_size, cfg.max_seq_len, cfg.d_model, cfg.num_heads,
        cfg.num_layers, cfg.num_decoder_layers, cfg.d_ff, cfg.dropout,
    );
    let mut model: Seq2SeqModel<TrainBackend> = model_cfg.init(&device);
    tracing::info!(
        "Seq2seq model ready: {}+{} layers, d_model={}",
        cfg.num_layers, cfg.num_decoder_layers, cfg.d_model,
    );

    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0) as usize;

    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    let train_batcher = Seq2SeqBatcher::<TrainBackend>::new(tokenizer.clone(), device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    let val_batcher = Seq2SeqBatcher::<ValidBackend>::new(tokenizer, device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let metrics = MetricsLogger::new(
        &cfg.checkpoint_dir,
        "generative_metrics.csv",
        &["epoch", "train_loss", "val_loss", "token_acc"],
    )?;
    tracing::info!("Logging metrics to '{}'", metrics.csv_path().display());

    for epoch in 1..=cfg.epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(
                batch.input_ids,
                batch.attention_mask,
                batch.decoder_input_ids,
                batch.decoder_attention_mask,
                batch.target_labels,
                pad_id,
            );

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum   = 0.0f64;
        let mut val_batches    = 0usize;
        let mut correct_tokens = 0i64;
        let mut total_tokens   = 0i64;

        for batch in val_loader.iter() {
            let logits = model_valid.forward(
                batch.input_ids,
                batch.attention_mask,
                batch.decoder_input_ids,
                batch.decoder_attention_mask,
            );
            let [b, t, v] = logits.dims();

            let labels = batch.target_labels.reshape([b * t]);

            let ce = burn::nn::loss::CrossEntropyLossConfig::new()
                .with_pad_tokens(Some(vec![pad_id]))
                .init(&logits.device());
            let batch_loss: f64 = ce
                .forward(logits.clone().reshape([b * t, v]), labels.clone())
                .into_scalar().elem::<f64>();
            val_loss_sum += batch_loss;
            val_batches  += 1;

            // Token accuracy over non-pad label positions only
            let pred    = logits.argmax(2).reshape([b * t]);
            let non_pad = labels.clone().not_equal_elem(pad_id as i32);

            let correct: i64 = (pred.equal(labels).int() * non_pad.clone().int())
                .sum().into_scalar().elem::<i64>();
            let total: i64 = non_pad.int().sum().into_scalar().elem::<i64>();

            correct_tokens += correct;
            total_tokens   += total;
        }

        let avg_val_loss = if val_batches  > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let token_acc    = if total_tokens > 0 {
            correct_tokens as f64 / total_tokens as f64
        } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | token_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, token_acc * 100.0,
        );

        metrics.log(epoch, &[avg_train_loss, avg_val_loss, token_acc])?;
        ckpt_manager.save_model(&model, Architecture::Generative.tag(), epoch)?;
        tracing::debug!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Seq2seq model training complete");
    Ok(())
}
