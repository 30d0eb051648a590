// src/main.rs

mod checkpoint;
mod constraint;
mod gene_list;
mod gnomad;
mod models;
mod prioritization;
mod table;
mod throttle;
mod variants;

use anyhow::Result;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::gene_list::read_gene_symbols;
use crate::gnomad::{GnomadClient, GNOMAD_API_URL};
use crate::throttle::FixedDelay;

// Put the main Excel file containing gene symbols next to the binary.
const GENE_LIST_FILE: &str = "GENE-LIST-FILE.xlsx";
const GENE_SYMBOL_COLUMN: &str = "Gene_Symbol";

const CONSTRAINT_OUTPUT: &str = "Rare_diseases_prots_gnomAD_scores.csv";
const VARIANTS_OUTPUT_DIR: &str = "Rare_Diseases_Genes_Variants";
const PRIORITIZATION_OUTPUT: &str = "Protein_Prioritization_Values.csv";

const CONSTRAINT_CHECKPOINT_INTERVAL: usize = 20;
const PRIORITIZATION_CHECKPOINT_INTERVAL: usize = 500;
const BATCH_COOLDOWN_SECS: u64 = 60;

fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the gnomAD extraction pipeline");

    let symbols = read_gene_symbols(Path::new(GENE_LIST_FILE), GENE_SYMBOL_COLUMN)?;
    let client = GnomadClient::new(GNOMAD_API_URL)?;
    let cooldown = FixedDelay::from_secs(BATCH_COOLDOWN_SECS);

    // Stage 1: per-gene constraint statistics, merge-append resume.
    let summary = constraint::run(
        &client,
        &symbols,
        Path::new(CONSTRAINT_OUTPUT),
        CONSTRAINT_CHECKPOINT_INTERVAL,
        &cooldown,
    )?;
    info!(
        "Constraint extraction done: {} extracted, {} skipped",
        summary.extracted, summary.skipped
    );

    // Stage 2: one variant detail file per gene.
    let summary = variants::run(
        &client,
        &symbols,
        Path::new(VARIANTS_OUTPUT_DIR),
        &cooldown,
    )?;
    info!(
        "Variant extraction done: {} extracted, {} skipped",
        summary.extracted, summary.skipped
    );

    // Stage 3: prioritization ratios over the per-gene files.
    let summary = prioritization::run(
        Path::new(VARIANTS_OUTPUT_DIR),
        Path::new(PRIORITIZATION_OUTPUT),
        PRIORITIZATION_CHECKPOINT_INTERVAL,
    )?;
    info!(
        "Prioritization done: {} genes, {} skipped",
        summary.extracted, summary.skipped
    );

    Ok(())
}
