// src/constraint.rs

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointWriter, StageSummary};
use crate::gnomad::GnomadApi;
use crate::models::GnomadConstraint;
use crate::table::{RowTable, PLACEHOLDER};
use crate::throttle::Throttle;

pub const OUTPUT_COLUMNS: [&str; 14] = [
    "Gene_Symbol",
    "Expected_LoF_SNVs",
    "Observed_LoF_SNVs",
    "O/E_LoF",
    "pLI",
    "LoF_Z_Score",
    "Expected_Missense_SNVs",
    "Observed_Missense_SNVs",
    "O/E_Missense",
    "Missense_Z_Score",
    "Expected_Synonymous_SNVs",
    "Observed_Synonymous_SNVs",
    "O/E_Synonymous",
    "Synonymous_Z_Score",
];

fn cell(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// O/E is defined only when both counts are present and the expected count
/// is non-zero.
fn ratio_cell(observed: Option<f64>, expected: Option<f64>) -> String {
    match (observed, expected) {
        (Some(obs), Some(exp)) if exp != 0.0 => (obs / exp).to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Flatten one gene's constraint block into the 14-column schema. A gene
/// without constraint modelling still yields a full row of placeholders.
pub fn constraint_record(symbol: &str, constraint: Option<&GnomadConstraint>) -> Vec<String> {
    let c = constraint.cloned().unwrap_or_default();
    vec![
        symbol.to_string(),
        cell(c.exp_lof),
        cell(c.obs_lof),
        ratio_cell(c.obs_lof, c.exp_lof),
        cell(c.pli),
        cell(c.lof_z),
        cell(c.exp_mis),
        cell(c.obs_mis),
        ratio_cell(c.obs_mis, c.exp_mis),
        cell(c.mis_z),
        cell(c.exp_syn),
        cell(c.obs_syn),
        ratio_cell(c.obs_syn, c.exp_syn),
        cell(c.syn_z),
    ]
}

/// Query constraint statistics for every symbol, accumulating one row per
/// gene. Merge-append resume: rows saved by an earlier run are loaded at
/// startup and their symbols are not re-queried, so a restarted job picks up
/// where the last checkpoint left off.
pub fn run(
    api: &dyn GnomadApi,
    symbols: &[String],
    output_path: &Path,
    interval: usize,
    throttle: &dyn Throttle,
) -> Result<StageSummary> {
    let mut table = if output_path.exists() {
        let existing = RowTable::load_csv(output_path, &OUTPUT_COLUMNS)?;
        info!(
            "Resuming: {} previously saved genes loaded from {}",
            existing.len(),
            output_path.display()
        );
        existing
    } else {
        RowTable::new(&OUTPUT_COLUMNS)
    };
    let mut already_saved: HashSet<String> = table
        .column("Gene_Symbol")
        .map(|col| col.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();

    let mut writer = CheckpointWriter::new(output_path, interval);
    let mut skipped = 0;

    for symbol in symbols {
        if already_saved.contains(symbol) {
            debug!("'{}' already extracted, skipping", symbol);
            continue;
        }
        match api.fetch_constraint(symbol) {
            Ok(constraint) => {
                table.push(constraint_record(symbol, constraint.as_ref()))?;
                already_saved.insert(symbol.clone());
                if writer.record_processed(&table)? {
                    throttle.wait_before_next_batch();
                }
            }
            Err(e) => {
                warn!("FAILURE: {}", e);
                skipped += 1;
            }
        }
    }

    writer.finish(&table)?;
    Ok(StageSummary {
        extracted: writer.processed(),
        skipped,
    })
}
