// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the corpus tokenizer.
//
// The tokenizer JSON is written by hand in the HuggingFace
// format and loaded back through the tokenizers crate — this
// sidesteps the train_from_files Trainer/ModelWrapper type
// mismatch in tokenizers 0.15 entirely. The file carries:
//
//   - a word-level vocabulary built from corpus frequencies,
//     with BERT-convention special token ids
//   - a BertNormalizer + Whitespace pre-tokenizer
//   - a TemplateProcessing post-processor so pair encodings
//     come out as [CLS] A [SEP] B [SEP] with segment ids 0/0/0
//     for the first sequence and 1/1 for the second — the
//     char→token mapper and the span decoder both rely on
//     this segment layout
//
// Padding and truncation are applied after loading (they are
// runtime settings, not part of the saved file), fixing every
// encoding to the configured sequence length.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokenizers::{
    PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer,
    TruncationDirection, TruncationParams, TruncationStrategy,
};

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    /// Load the saved tokenizer, or build one from `texts` and
    /// save it. Either way the result is configured for fixed
    /// `max_seq_len` encodings.
    pub fn load_or_build(
        &self,
        texts:       &[String],
        vocab_size:  usize,
        max_seq_len: usize,
    ) -> Result<Tokenizer> {
        let tok_path = self.dir.join("tokenizer.json");
        let tokenizer = if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load_raw()?
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)?
        };
        Self::with_fixed_shape(tokenizer, max_seq_len)
    }

    /// Load a previously saved tokenizer for inference.
    pub fn load(&self, max_seq_len: usize) -> Result<Tokenizer> {
        Self::with_fixed_shape(self.load_raw()?, max_seq_len)
    }

    fn load_raw(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Build an in-memory tokenizer from corpus texts.
    pub fn build(texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        let json = Self::tokenizer_json(texts, vocab_size);
        let bytes = serde_json::to_vec(&json)?;
        Tokenizer::from_bytes(&bytes)
            .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))
    }

    /// Configure fixed-length truncation and padding so every
    /// encoding has exactly `max_seq_len` positions.
    pub fn with_fixed_shape(mut tokenizer: Tokenizer, max_seq_len: usize) -> Result<Tokenizer> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                strategy:   TruncationStrategy::LongestFirst,
                direction:  TruncationDirection::Right,
                stride:     0,
            }))
            .map_err(|e| anyhow::anyhow!("Cannot configure truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy:           PaddingStrategy::Fixed(max_seq_len),
            direction:          PaddingDirection::Right,
            pad_to_multiple_of: None,
            pad_id:             0,
            pad_type_id:        0,
            pad_token:          "[PAD]".to_string(),
        }));
        Ok(tokenizer)
    }

    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir).ok();

        let json = Self::tokenizer_json(texts, vocab_size);
        let tok_path = self.dir.join("tokenizer.json");
        std::fs::write(&tok_path, serde_json::to_string_pretty(&json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!("Tokenizer saved to '{}'", tok_path.display());

        Tokenizer::from_file(&tok_path)
            .map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }

    /// Assemble the full tokenizer JSON in HuggingFace format.
    fn tokenizer_json(texts: &[String], vocab_size: usize) -> serde_json::Value {
        // ── Step 1: Count corpus token frequencies ────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for token in corpus_tokens(text) {
                *freq.entry(token).or_insert(0) += 1;
            }
        }

        // Sort by frequency descending; ties break alphabetically
        // so the same corpus always yields the same vocabulary.
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        // Reserve 5 slots for the special tokens
        words.truncate(vocab_size.saturating_sub(5));

        // ── Step 2: Build the vocab map ───────────────────────────────────────
        // Special tokens get fixed IDs matching BERT convention
        let mut vocab = serde_json::json!({
            "[PAD]":  0,
            "[UNK]":  1,
            "[CLS]":  101,
            "[SEP]":  102,
            "[MASK]": 103,
        });

        let mut next_id = 104usize;
        for (word, _) in &words {
            if vocab.get(word).is_none() {
                vocab[word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        // ── Step 3: Full tokenizer JSON ───────────────────────────────────────
        serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0,   "content": "[PAD]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1,   "content": "[UNK]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 101, "content": "[CLS]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 102, "content": "[SEP]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 103, "content": "[MASK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [
                    {"SpecialToken": {"id": "[CLS]", "type_id": 0}},
                    {"Sequence":     {"id": "A",     "type_id": 0}},
                    {"SpecialToken": {"id": "[SEP]", "type_id": 0}}
                ],
                "pair": [
                    {"SpecialToken": {"id": "[CLS]", "type_id": 0}},
                    {"Sequence":     {"id": "A",     "type_id": 0}},
                    {"SpecialToken": {"id": "[SEP]", "type_id": 0}},
                    {"Sequence":     {"id": "B",     "type_id": 1}},
                    {"SpecialToken": {"id": "[SEP]", "type_id": 1}}
                ],
                "special_tokens": {
                    "[CLS]": {"id": "[CLS]", "ids": [101], "tokens": ["[CLS]"]},
                    "[SEP]": {"id": "[SEP]", "ids": [102], "tokens": ["[SEP]"]}
                }
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        })
    }
}

/// Split a text the way the Whitespace pre-tokenizer will:
/// lowercased runs of word characters, and runs of punctuation,
/// are separate tokens.
fn corpus_tokens(text: &str) -> Vec<String> {
    let mut tokens  = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for c in text.to_lowercase().chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_word = c.is_alphanumeric() || c == '_';
        if !current.is_empty() && is_word != current_is_word {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(c);
        current_is_word = is_word;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "The sky is blue".to_string(),
            "attribute: color context: words".to_string(),
        ]
    }

    #[test]
    fn test_corpus_tokens_split_words_and_punctuation() {
        assert_eq!(
            corpus_tokens("attribute: Color"),
            vec!["attribute", ":", "color"]
        );
    }

    #[test]
    fn test_pair_encoding_has_segment_ids() {
        let tokenizer = TokenizerStore::build(&corpus(), 1000).unwrap();
        let encoding = tokenizer.encode(("color", "The sky is blue"), true).unwrap();

        // [CLS] color [SEP] the sky is blue [SEP]
        assert_eq!(encoding.get_ids().len(), 8);
        assert_eq!(encoding.get_ids()[0], 101);
        assert_eq!(encoding.get_ids()[2], 102);
        assert_eq!(encoding.get_ids()[7], 102);
        assert_eq!(encoding.get_type_ids(), &[0, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let tokenizer = TokenizerStore::build(&corpus(), 1000).unwrap();
        let encoding = tokenizer.encode("zyzzyva", true).unwrap();
        // [CLS] [UNK] [SEP]
        assert_eq!(encoding.get_ids()[1], 1);
    }

    #[test]
    fn test_fixed_shape_pads_and_truncates() {
        let tokenizer = TokenizerStore::build(&corpus(), 1000).unwrap();
        let tokenizer = TokenizerStore::with_fixed_shape(tokenizer, 16).unwrap();

        let short = tokenizer.encode("blue", true).unwrap();
        assert_eq!(short.get_ids().len(), 16);
        // Padding carries attention mask 0 and segment id 0
        assert_eq!(short.get_attention_mask()[15], 0);
        assert_eq!(short.get_type_ids()[15], 0);

        let long_text = vec!["blue"; 40].join(" ");
        let long = tokenizer.encode(long_text.as_str(), true).unwrap();
        assert_eq!(long.get_ids().len(), 16);
    }

    #[test]
    fn test_vocabulary_build_is_deterministic() {
        let a = serde_json::to_string(&TokenizerStore::tokenizer_json(&corpus(), 1000)).unwrap();
        let b = serde_json::to_string(&TokenizerStore::tokenizer_json(&corpus(), 1000)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = std::env::temp_dir().join(format!("attr_qa_tok_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let store = TokenizerStore::new(dir.to_string_lossy().to_string());
        let built  = store.load_or_build(&corpus(), 1000, 16).unwrap();
        let loaded = store.load(16).unwrap();

        let a = built.encode(("color", "The sky is blue"), true).unwrap();
        let b = loaded.encode(("color", "The sky is blue"), true).unwrap();
        assert_eq!(a.get_ids(), b.get_ids());
        assert_eq!(a.get_type_ids(), b.get_type_ids());
    }
}
