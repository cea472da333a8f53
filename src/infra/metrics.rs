// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records per-epoch training metrics to a CSV file.
//
// The column set differs per model family (the extractive run
// tracks start/end accuracy, the generative run tracks token
// accuracy), so the header is supplied by the caller and each
// row is an epoch number plus one value per remaining column.
//
// The file is opened in append mode: re-running training in the
// same checkpoint directory extends the existing log.

use anyhow::{ensure, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

pub struct MetricsLogger {
    csv_path: PathBuf,

    /// Values expected per row (header columns minus the epoch)
    values_per_row: usize,
}

impl MetricsLogger {
    /// Create a logger writing to `{dir}/{file_name}`.
    /// The header row is written only if the file is new.
    pub fn new(dir: impl Into<String>, file_name: &str, header: &[&str]) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join(file_name);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{}", header.join(","))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self {
            csv_path,
            values_per_row: header.len().saturating_sub(1),
        })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, epoch: usize, values: &[f64]) -> Result<()> {
        ensure!(
            values.len() == self.values_per_row,
            "expected {} metric values, got {}",
            self.values_per_row,
            values.len(),
        );

        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        let row: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
        writeln!(f, "{},{}", epoch, row.join(","))?;

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = std::env::temp_dir().join(format!("attr_qa_metrics_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(
            dir.to_string_lossy().to_string(),
            "test_metrics.csv",
            &["epoch", "train_loss", "val_loss"],
        )
        .unwrap();

        logger.log(1, &[2.5, 2.25]).unwrap();
        logger.log(2, &[2.0, 1.75]).unwrap();

        let contents = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss");
        assert_eq!(lines[1], "1,2.500000,2.250000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_rejects_wrong_column_count() {
        let dir = std::env::temp_dir().join(format!("attr_qa_metrics_bad_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(
            dir.to_string_lossy().to_string(),
            "test_metrics.csv",
            &["epoch", "train_loss"],
        )
        .unwrap();

        assert!(logger.log(1, &[1.0, 2.0]).is_err());
    }
}
