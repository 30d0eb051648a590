// src/gene_list.rs

use anyhow::{anyhow, Result};
use calamine::{open_workbook_auto, Reader};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

fn cell_to_string(cell: &calamine::DataType) -> String {
    use calamine::DataType as Ct;
    match cell {
        Ct::String(s) => s.clone(),
        Ct::Empty => String::new(),
        Ct::Bool(b) => b.to_string(),
        Ct::Error(e) => format!("ERR({e:?})"),
        Ct::Float(n) | Ct::Duration(n) => n.to_string(),
        Ct::Int(i) => i.to_string(),
        Ct::DateTime(f) => f.to_string(),
        Ct::DateTimeIso(s) | Ct::DurationIso(s) => s.clone(),
    }
}

/// Read the ordered set of unique, non-empty gene symbols from `column` of
/// the workbook's first sheet. A missing column is fatal: without symbols
/// there is nothing to extract.
pub fn read_gene_symbols(path: &Path, column: &str) -> Result<Vec<String>> {
    info!("Reading gene list from {}", path.display());
    let mut wb = open_workbook_auto(path)
        .map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("worksheet missing"))?
        .map_err(|e| anyhow!("failed to read worksheet: {e}"))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("empty sheet"))?
        .iter()
        .map(cell_to_string)
        .collect();
    let records: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    let symbols = unique_symbols(&header, &records, column)?;
    info!("Found {} unique gene symbols", symbols.len());
    Ok(symbols)
}

/// Column extraction over already-stringified rows, kept separate from the
/// workbook I/O so it can be tested directly.
pub fn unique_symbols(
    header: &[String],
    rows: &[Vec<String>],
    column: &str,
) -> Result<Vec<String>> {
    let idx = header
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("input spreadsheet has no '{column}' column"))?;

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for row in rows {
        let Some(value) = row.get(idx) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.to_string()) {
            symbols.push(value.to_string());
        }
    }
    Ok(symbols)
}
