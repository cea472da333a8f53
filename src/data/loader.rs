// ============================================================
// Layer 4 — Sample Loader
// ============================================================
// Loads raw samples from a directory of JSON-lines files.
//
// Each line of a .jsonl file is one record:
//   {"doc": "...", "input": "...", "target": "...", "feature": "..."}
//
// The loader is tolerant: a malformed line or unreadable file is
// logged and skipped, never fatal — one bad record must not take
// down a training run. A missing directory yields an empty
// corpus so the rest of the pipeline can report it cleanly.
//
// Input and target text is cleaned with the same normaliser so
// verbatim substring containment between them is preserved.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::data::preprocessor::Preprocessor;
use crate::domain::sample::Sample;
use crate::domain::traits::SampleSource;

/// Loads all .jsonl sample files from a directory.
pub struct JsonlLoader {
    dir: String,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SampleSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<Sample>> {
        let dir = Path::new(&self.dir);

        if !dir.exists() {
            tracing::warn!(
                "Sample directory '{}' does not exist — returning empty corpus",
                self.dir
            );
            return Ok(Vec::new());
        }

        let mut samples = Vec::new();

        for entry in fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir))?
        {
            let entry = entry?;
            let path  = entry.path();

            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                match load_sample_file(&path) {
                    Ok(mut file_samples) => {
                        tracing::debug!(
                            "Loaded: {} ({} samples)",
                            path.display(),
                            file_samples.len()
                        );
                        samples.append(&mut file_samples);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping '{}': {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("Loaded {} samples from '{}'", samples.len(), self.dir);
        Ok(samples)
    }
}

/// Parse a single .jsonl file into samples.
/// Bad lines are counted and skipped.
pub fn load_sample_file(path: &Path) -> Result<Vec<Sample>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let cleaner = Preprocessor::new();

    let mut samples   = Vec::new();
    let mut bad_lines = 0usize;

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Sample>(line) {
            Ok(mut sample) => {
                // Normalise both sides with the same rules so the
                // target still occurs verbatim in the input.
                sample.input  = cleaner.clean(&sample.input);
                sample.target = cleaner.clean(&sample.target);
                samples.push(sample);
            }
            Err(e) => {
                bad_lines += 1;
                tracing::debug!("Bad record in '{}': {}", path.display(), e);
            }
        }
    }

    if bad_lines > 0 {
        tracing::warn!(
            "Skipped {} malformed lines in '{}'",
            bad_lines,
            path.display()
        );
    }

    Ok(samples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_jsonl(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{}", contents).unwrap();
        path
    }

    #[test]
    fn test_loads_well_formed_records() {
        let path = write_temp_jsonl(
            "attr_qa_loader_ok.jsonl",
            concat!(
                r#"{"doc":"d0","input":"The sky is blue","target":"blue","feature":"color"}"#,
                "\n",
                r#"{"doc":"d1","input":"No mention here","target":"","feature":"color"}"#,
                "\n",
            ),
        );

        let samples = load_sample_file(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].target, "blue");
        assert_eq!(samples[1].target, "");
    }

    #[test]
    fn test_skips_malformed_lines() {
        let path = write_temp_jsonl(
            "attr_qa_loader_bad.jsonl",
            concat!(
                r#"{"doc":"d0","input":"ok","target":"ok","feature":"f"}"#,
                "\n",
                "not json at all\n",
                r#"{"missing": "fields"}"#,
                "\n",
            ),
        );

        let samples = load_sample_file(&path).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_cleaning_preserves_containment() {
        // Raw input and target both carry a non-breaking space;
        // after cleaning the target still occurs verbatim.
        let path = write_temp_jsonl(
            "attr_qa_loader_clean.jsonl",
            concat!(
                r#"{"doc":"d0","input":"weighs 240 grams total","target":"240 grams","feature":"weight"}"#,
                "\n",
            ),
        );

        let samples = load_sample_file(&path).unwrap();
        assert_eq!(samples[0].target, "240 grams");
        assert!(samples[0].input.contains(&samples[0].target));
    }

    #[test]
    fn test_missing_directory_is_empty_corpus() {
        let loader = JsonlLoader::new("definitely/not/a/real/dir");
        let samples = loader.load_all().unwrap();
        assert!(samples.is_empty());
    }
}
