// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Loads a trained checkpoint and answers attribute queries,
// either for a single (feature, context) pair or for a whole
// .jsonl file of samples.
//
// Which model family is served is read from the saved run
// configuration — the caller never has to know how the
// checkpoint was trained.

use std::path::Path;

use anyhow::Result;

use crate::data::loader::load_sample_file;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::{GenInferencer, SpanInferencer};
use crate::ml::Architecture;

/// One predicted answer. The confidence score exists only for
/// the extractive family (joint start×end probability); the
/// generative family produces unscored text.
pub struct Prediction {
    pub answer: String,
    pub score:  Option<f32>,
}

enum Predictor {
    Span(SpanInferencer),
    Gen(GenInferencer),
}

pub struct PredictUseCase {
    tokenizer: tokenizers::Tokenizer,
    predictor: Predictor,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: String) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(&checkpoint_dir);
        let cfg = ckpt_manager.load_config()?;

        let tokenizer = TokenizerStore::new(&checkpoint_dir).load(cfg.max_seq_len)?;

        let predictor = match cfg.arch {
            Architecture::Extractive => {
                Predictor::Span(SpanInferencer::from_checkpoint(&ckpt_manager)?)
            }
            Architecture::Generative => {
                Predictor::Gen(GenInferencer::from_checkpoint(&ckpt_manager)?)
            }
        };

        Ok(Self { tokenizer, predictor })
    }

    /// Predict the value of one attribute in one context.
    pub fn predict_one(&self, feature: &str, input: &str) -> Result<Prediction> {
        match &self.predictor {
            Predictor::Span(inferencer) => {
                let (answer, score) = inferencer.predict(feature, input, &self.tokenizer)?;
                Ok(Prediction { answer, score: Some(score) })
            }
            Predictor::Gen(inferencer) => {
                let answer = inferencer.predict(feature, input, &self.tokenizer)?;
                Ok(Prediction { answer, score: None })
            }
        }
    }

    /// Predict every sample in a .jsonl file and print one
    /// tab-separated line per sample.
    pub fn predict_file(&self, path: &str) -> Result<()> {
        let samples = load_sample_file(Path::new(path))?;
        tracing::info!("Predicting {} samples from '{}'", samples.len(), path);

        for sample in &samples {
            let prediction = self.predict_one(&sample.feature, &sample.input)?;
            match prediction.score {
                Some(score) => println!(
                    "{}\t{}\t{}\t{:.4}",
                    sample.doc, sample.feature, prediction.answer, score,
                ),
                None => println!("{}\t{}\t{}", sample.doc, sample.feature, prediction.answer),
            }
        }

        Ok(())
    }
}
