// src/prioritization.rs

use anyhow::Result;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointWriter, StageSummary};
use crate::table::{RowTable, PLACEHOLDER};
use crate::variants;

pub const OUTPUT_COLUMNS: [&str; 4] = [
    "Protein Name",
    "num_misse/prot_len",
    "num_patho/prot_len",
    "num_patho/num_misse",
];

/// ClinVar labels counted as pathogenic or likely pathogenic.
pub const PATHOGENICITY_GROUP: [&str; 24] = [
    "Pathogenic",
    "Pathogenic/Likely pathogenic",
    "Pathogenic; other",
    "Pathogenic; Affects",
    "Pathogenic; association",
    "Pathogenic; drug response",
    "Pathogenic; risk factor",
    "Pathogenic; confers sensitivity",
    "Pathogenic/Likely pathogenic; other",
    "Pathogenic/Likely pathogenic; association",
    "Pathogenic/Likely pathogenic; risk factor",
    "Pathogenic/Likely pathogenic/Pathogenic, low penetrance",
    "Pathogenic/Likely pathogenic/Pathogenic, low penetrance; other",
    "Pathogenic/Pathogenic, low penetrance; other; risk factor",
    "Pathogenic/Pathogenic, low penetrance; other",
    "Pathogenic/Likely pathogenic/Likely risk allele",
    "Pathogenic/Likely risk allele",
    "Likely pathogenic",
    "Likely pathogenic; other",
    "Likely pathogenic; Affects",
    "Likely pathogenic; risk factor",
    "Likely pathogenic; drug response",
    "Likely pathogenic/Likely risk allele",
    "Likely pathogenic, low penetrance",
];

pub struct GeneVariantStats {
    pub prot_len: f64,
    pub num_missense: usize,
    pub num_pathogenic: usize,
}

/// Read a per-gene variants CSV with every column as String, since numeric
/// columns carry the `-` placeholder for absent values.
fn read_variants_csv(path: &Path) -> PolarsResult<DataFrame> {
    let dtype_override: Arc<Vec<DataType>> =
        Arc::new(vec![DataType::String; variants::OUTPUT_COLUMNS.len()]);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_dtype_overwrite(Some(dtype_override))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Protein length is approximated from the genomic span of all variants
/// (max minus min position, over three). Missense and pathogenic counts are
/// taken over the missense subset only.
pub fn variant_stats(df: &DataFrame) -> Result<GeneVariantStats> {
    let positions = df.column("Position")?.str()?.clone();
    let mut min_pos: Option<i64> = None;
    let mut max_pos: Option<i64> = None;
    for i in 0..positions.len() {
        let Some(value) = positions.get(i) else {
            continue;
        };
        if let Ok(pos) = value.parse::<i64>() {
            min_pos = Some(min_pos.map_or(pos, |m| m.min(pos)));
            max_pos = Some(max_pos.map_or(pos, |m| m.max(pos)));
        }
    }
    let prot_len = match (min_pos, max_pos) {
        (Some(min), Some(max)) => (max - min) as f64 / 3.0,
        _ => 0.0,
    };

    let missense = df
        .clone()
        .lazy()
        .filter(col("VEP Consequence").eq(lit("missense_variant")))
        .collect()?;
    let num_missense = missense.height();

    let pathogenic_labels: HashSet<&str> = PATHOGENICITY_GROUP.iter().copied().collect();
    let significance = missense.column("Clinical Significance")?.str()?.clone();
    let mut num_pathogenic = 0;
    for i in 0..significance.len() {
        if let Some(label) = significance.get(i) {
            if pathogenic_labels.contains(label) {
                num_pathogenic += 1;
            }
        }
    }

    Ok(GeneVariantStats {
        prot_len,
        num_missense,
        num_pathogenic,
    })
}

/// A ratio with a zero denominator is undefined and written as the
/// placeholder, never as a division result.
pub fn prioritization_record(gene: &str, stats: &GeneVariantStats) -> Vec<String> {
    let ratio = |numerator: f64, denominator: f64| {
        if denominator != 0.0 {
            (numerator / denominator).to_string()
        } else {
            PLACEHOLDER.to_string()
        }
    };
    vec![
        gene.to_string(),
        ratio(stats.num_missense as f64, stats.prot_len),
        ratio(stats.num_pathogenic as f64, stats.prot_len),
        ratio(stats.num_pathogenic as f64, stats.num_missense as f64),
    ]
}

/// Scan the per-gene CSV directory and compute the three prioritization
/// ratios per gene. Files are visited in sorted name order so a rerun over
/// an unchanged directory reproduces the output byte for byte. The
/// checkpoint file is overwritten from scratch each flush; a restarted run
/// recomputes everything (the inputs are local, so this is cheap).
pub fn run(variants_dir: &Path, output_path: &Path, interval: usize) -> Result<StageSummary> {
    let mut paths: Vec<PathBuf> = fs::read_dir(variants_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_variants.csv"))
        })
        .collect();
    paths.sort();
    info!(
        "Computing prioritization ratios for {} genes in {}",
        paths.len(),
        variants_dir.display()
    );

    let mut table = RowTable::new(&OUTPUT_COLUMNS);
    let mut writer = CheckpointWriter::new(output_path, interval);
    let mut skipped = 0;

    for path in &paths {
        let Some(gene) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix("_variants.csv"))
        else {
            continue;
        };
        debug!("Computing ratios for {}", gene);

        let stats = read_variants_csv(path)
            .map_err(anyhow::Error::from)
            .and_then(|df| variant_stats(&df));
        match stats {
            Ok(stats) => {
                table.push(prioritization_record(gene, &stats))?;
                writer.record_processed(&table)?;
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn variant_row(pos: &str, consequence: &str, significance: &str) -> Vec<String> {
        let mut row = vec![PLACEHOLDER.to_string(); variants::OUTPUT_COLUMNS.len()];
        row[0] = format!("1-{pos}-A-T");
        row[2] = pos.to_string();
        row[7] = consequence.to_string();
        row[8] = significance.to_string();
        row
    }

    fn write_variants_file(dir: &Path, gene: &str, rows: Vec<Vec<String>>) {
        let mut table = RowTable::new(&variants::OUTPUT_COLUMNS);
        for row in rows {
            table.push(row).unwrap();
        }
        table
            .write_csv(&dir.join(format!("{gene}_variants.csv")))
            .unwrap();
    }

    #[test]
    fn ratios_computed_from_span_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_variants_file(
            dir.path(),
            "BRCA1",
            vec![
                variant_row("100", "missense_variant", "Pathogenic"),
                variant_row("400", "missense_variant", "Benign"),
                variant_row("250", "synonymous_variant", "-"),
            ],
        );
        let out = dir.path().join("priorities.csv");
        run(dir.path(), &out, 500).unwrap();

        let table = RowTable::load_csv(&out, &OUTPUT_COLUMNS).unwrap();
        // prot_len = (400 - 100) / 3 = 100; 2 missense, 1 pathogenic
        assert_eq!(table.rows()[0], vec!["BRCA1", "0.02", "0.01", "0.5"]);
    }

    #[test]
    fn single_position_span_yields_placeholders_not_division_by_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_variants_file(
            dir.path(),
            "OAT",
            vec![
                variant_row("100", "missense_variant", "Pathogenic"),
                variant_row("100", "missense_variant", "-"),
            ],
        );
        let out = dir.path().join("priorities.csv");
        run(dir.path(), &out, 500).unwrap();

        let table = RowTable::load_csv(&out, &OUTPUT_COLUMNS).unwrap();
        // min_pos == max_pos leaves prot_len 0, so both per-length ratios are undefined.
        assert_eq!(table.rows()[0], vec!["OAT", PLACEHOLDER, PLACEHOLDER, "0.5"]);
    }

    #[test]
    fn zero_missense_leaves_pathogenic_ratio_undefined() {
        let dir = tempfile::tempdir().unwrap();
        write_variants_file(
            dir.path(),
            "TP53",
            vec![
                variant_row("100", "synonymous_variant", "-"),
                variant_row("700", "intron_variant", "-"),
            ],
        );
        let out = dir.path().join("priorities.csv");
        run(dir.path(), &out, 500).unwrap();

        let table = RowTable::load_csv(&out, &OUTPUT_COLUMNS).unwrap();
        assert_eq!(table.rows()[0], vec!["TP53", "0", "0", PLACEHOLDER]);
    }

    #[test]
    fn rerun_over_unchanged_directory_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_variants_file(
            dir.path(),
            "ZNF1",
            vec![variant_row("10", "missense_variant", "Likely pathogenic")],
        );
        write_variants_file(
            dir.path(),
            "ABC1",
            vec![variant_row("40", "missense_variant", "-")],
        );

        let out = dir.path().join("priorities.csv");
        run(dir.path(), &out, 500).unwrap();
        let first = fs::read(&out).unwrap();
        run(dir.path(), &out, 500).unwrap();
        let second = fs::read(&out).unwrap();
        assert_eq!(first, second);

        // Sorted name order, not directory order.
        let table = RowTable::load_csv(&out, &OUTPUT_COLUMNS).unwrap();
        assert_eq!(table.column("Protein Name").unwrap(), vec!["ABC1", "ZNF1"]);
    }

    #[test]
    fn non_variant_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_variants_file(
            dir.path(),
            "BRCA1",
            vec![variant_row("100", "missense_variant", "-")],
        );
        fs::write(dir.path().join("notes.txt"), "not a csv").unwrap();

        let out = dir.path().join("priorities.csv");
        let summary = run(dir.path(), &out, 500).unwrap();
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.skipped, 0);
    }
}
