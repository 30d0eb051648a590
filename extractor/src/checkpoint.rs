// src/checkpoint.rs

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::table::RowTable;

/// Outcome of one batch extraction run.
pub struct StageSummary {
    pub extracted: usize,
    pub skipped: usize,
}

/// Flushes the accumulated table to disk every `interval` processed
/// identifiers, so a multi-hour run killed between checkpoints only loses the
/// work since the last flush. The stages differ in how a flushed file is used
/// on restart (the constraint extractor merge-appends, the prioritizer
/// overwrites); the writer itself always serializes the full current table.
pub struct CheckpointWriter {
    path: PathBuf,
    interval: usize,
    processed: usize,
}

impl CheckpointWriter {
    pub fn new(path: &Path, interval: usize) -> Self {
        assert!(interval > 0, "checkpoint interval must be positive");
        Self {
            path: path.to_path_buf(),
            interval,
            processed: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Count one processed identifier, flushing the table when the counter
    /// reaches a checkpoint boundary. Returns whether a flush happened so the
    /// caller can throttle after it.
    pub fn record_processed(&mut self, table: &RowTable) -> Result<bool> {
        self.processed += 1;
        if self.processed % self.interval == 0 {
            table.write_csv(&self.path)?;
            info!(
                "{} processed, checkpoint written to {}",
                self.processed,
                self.path.display()
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Final flush after the identifier list is exhausted, regardless of
    /// whether the last boundary was reached.
    pub fn finish(&self, table: &RowTable) -> Result<()> {
        table.write_csv(&self.path)?;
        info!(
            "Run complete: {} processed, {} rows written to {}",
            self.processed,
            table.len(),
            self.path.display()
        );
        Ok(())
    }
}
