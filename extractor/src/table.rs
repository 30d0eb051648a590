// src/table.rs

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Sentinel written for any absent or null source field, so every row keeps
/// the full column width.
pub const PLACEHOLDER: &str = "-";

/// Ordered in-memory output table with a fixed column schema. Stages own one
/// of these and hand it to the checkpoint writer; rows are plain string
/// records so a table can also be re-seeded from a previously saved CSV.
pub struct RowTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RowTable {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Append one record. A record narrower or wider than the header would
    /// silently corrupt the CSV, so it is rejected outright.
    pub fn push(&mut self, record: Vec<String>) -> Result<()> {
        if record.len() != self.header.len() {
            bail!(
                "record has {} fields, expected {}",
                record.len(),
                self.header.len()
            );
        }
        self.rows.push(record);
        Ok(())
    }

    /// All values of one named column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.header.iter().position(|h| h == name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("failed to open {} for writing", path.display()))?;
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Load a previously saved table, verifying that it carries the expected
    /// schema before trusting its rows.
    pub fn load_csv(path: &Path, expected_header: &[&str]) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let header: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if header != expected_header {
            bail!(
                "{} has an unexpected column schema: {:?}",
                path.display(),
                header
            );
        }
        let mut table = Self::new(expected_header);
        for record in rdr.records() {
            let record = record?;
            table.push(record.iter().map(|f| f.to_string()).collect())?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_records() {
        let mut table = RowTable::new(&["a", "b"]);
        assert!(table.push(vec!["1".into()]).is_err());
        assert!(table.push(vec!["1".into(), "2".into()]).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn save_and_reload_preserves_rows_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = RowTable::new(&["Gene_Symbol", "pLI"]);
        table.push(vec!["BRCA1".into(), "0.999".into()]).unwrap();
        table.push(vec!["TP53".into(), "-".into()]).unwrap();
        table.write_csv(&path).unwrap();

        let reloaded = RowTable::load_csv(&path, &["Gene_Symbol", "pLI"]).unwrap();
        assert_eq!(reloaded.rows(), table.rows());
        assert_eq!(
            reloaded.column("Gene_Symbol").unwrap(),
            vec!["BRCA1", "TP53"]
        );
    }

    #[test]
    fn reload_rejects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = RowTable::new(&["a", "b"]);
        table.push(vec!["1".into(), "2".into()]).unwrap();
        table.write_csv(&path).unwrap();

        assert!(RowTable::load_csv(&path, &["a", "c"]).is_err());
    }
}
