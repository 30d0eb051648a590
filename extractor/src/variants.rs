// src/variants.rs

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::checkpoint::StageSummary;
use crate::gnomad::GnomadApi;
use crate::models::{ClinvarVariant, GeneVariants, InSilicoPredictor, PopulationFrequencies};
use crate::table::{RowTable, PLACEHOLDER};
use crate::throttle::Throttle;

pub const OUTPUT_COLUMNS: [&str; 23] = [
    "Variant ID",
    "Chromosome",
    "Position",
    "RS IDs",
    "HGVS Consequence",
    "Coding Change",
    "Protein Change",
    "VEP Consequence",
    "Clinical Significance",
    "ClinVar Variation ID",
    "Allele Count (Genome)",
    "Allele Number (Genome)",
    "Allele Frequency (Genome)",
    "Homozygote Count (Genome)",
    "Hemizygote Count",
    "Allele Count (Exome)",
    "Allele Number (Exome)",
    "Allele Frequency (Exome)",
    "Homozygote Count (Exome)",
    "cadd",
    "spliceai_ds_max",
    "pangolin_largest_ds",
    "phylop",
];

/// The four predictors pulled out of the unordered in-silico list, in output
/// column order.
const PREDICTOR_IDS: [&str; 4] = ["cadd", "spliceai_ds_max", "pangolin_largest_ds", "phylop"];

fn text(value: &Option<String>) -> String {
    value
        .clone()
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn int(value: Option<i64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn float(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn rsids_cell(rsids: &Option<Vec<String>>) -> String {
    match rsids {
        Some(ids) if !ids.is_empty() => ids.join(","),
        _ => PLACEHOLDER.to_string(),
    }
}

/// ac / an / af / homozygote_count, plus hemizygote_count for the genome
/// block. A null population block expands to placeholders for every column.
fn population_cells(pop: &Option<PopulationFrequencies>, with_hemizygote: bool) -> Vec<String> {
    let width = if with_hemizygote { 5 } else { 4 };
    match pop {
        Some(p) => {
            let mut cells = vec![int(p.ac), int(p.an), float(p.af), int(p.homozygote_count)];
            if with_hemizygote {
                cells.push(int(p.hemizygote_count));
            }
            cells
        }
        None => vec![PLACEHOLDER.to_string(); width],
    }
}

/// Keyed lookup over the predictor list: for each known id the FIRST matching
/// entry wins and later duplicates are ignored; ids never seen stay
/// placeholders.
fn predictor_cells(predictors: &Option<Vec<InSilicoPredictor>>) -> Vec<String> {
    let mut cells = vec![PLACEHOLDER.to_string(); PREDICTOR_IDS.len()];
    for predictor in predictors.iter().flatten() {
        let (Some(id), Some(value)) = (&predictor.id, &predictor.value) else {
            continue;
        };
        if let Some(idx) = PREDICTOR_IDS.iter().position(|known| *known == id.as_str()) {
            if cells[idx] == PLACEHOLDER {
                cells[idx] = value.clone();
            }
        }
    }
    cells
}

/// Flatten one gene's response into the fixed 23-column schema, joining the
/// ClinVar annotation list onto the variant list by variant_id.
pub fn variant_records(gene: &GeneVariants) -> Vec<Vec<String>> {
    let clinvar_by_id: HashMap<&str, &ClinvarVariant> = gene
        .clinvar_variants
        .iter()
        .flatten()
        .filter_map(|cv| cv.variant_id.as_deref().map(|id| (id, cv)))
        .collect();

    let mut records = Vec::with_capacity(gene.variants.len());
    for variant in &gene.variants {
        let mut record = Vec::with_capacity(OUTPUT_COLUMNS.len());
        record.push(text(&variant.variant_id));
        record.push(text(&variant.chrom));
        record.push(int(variant.pos));
        record.push(rsids_cell(&variant.rsids));
        record.push(text(&variant.hgvs));
        record.push(text(&variant.hgvsc));
        record.push(text(&variant.hgvsp));
        record.push(text(&variant.consequence));

        match variant
            .variant_id
            .as_deref()
            .and_then(|id| clinvar_by_id.get(id))
        {
            Some(cv) => {
                record.push(text(&cv.clinical_significance));
                record.push(text(&cv.clinvar_variation_id));
            }
            None => {
                record.push(PLACEHOLDER.to_string());
                record.push(PLACEHOLDER.to_string());
            }
        }

        record.extend(population_cells(&variant.genome, true));
        record.extend(population_cells(&variant.exome, false));
        record.extend(predictor_cells(&variant.in_silico_predictors));
        records.push(record);
    }
    records
}

/// Query the full variant list for every symbol and write one
/// `<GENE>_variants.csv` per gene. Each gene's file is its own durable unit,
/// so the table is rebuilt from scratch per gene rather than accumulated.
pub fn run(
    api: &dyn GnomadApi,
    symbols: &[String],
    output_dir: &Path,
    throttle: &dyn Throttle,
) -> Result<StageSummary> {
    fs::create_dir_all(output_dir)?;
    let mut extracted = 0;
    let mut skipped = 0;

    for symbol in symbols {
        match api.fetch_variants(symbol) {
            Ok(gene) => {
                let mut table = RowTable::new(&OUTPUT_COLUMNS);
                for record in variant_records(&gene) {
                    table.push(record)?;
                }
                let path = output_dir.join(format!("{symbol}_variants.csv"));
                table.write_csv(&path)?;
                info!("{}: {} variants written to {}", symbol, table.len(), path.display());
                extracted += 1;
                throttle.wait_before_next_batch();
            }
            Err(e) => {
                warn!("FAILURE: {}", e);
                skipped += 1;
            }
        }
    }

    Ok(StageSummary { extracted, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnomad::QueryError;
    use crate::models::{GnomadConstraint, Variant};
    use crate::throttle::NoDelay;

    fn predictor(id: &str, value: &str) -> InSilicoPredictor {
        InSilicoPredictor {
            id: Some(id.to_string()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn first_predictor_entry_wins_over_later_duplicates() {
        let predictors = Some(vec![
            predictor("cadd", "23.1"),
            predictor("phylop", "7.9"),
            predictor("cadd", "99.9"),
        ]);
        let cells = predictor_cells(&predictors);
        assert_eq!(cells, vec!["23.1", PLACEHOLDER, PLACEHOLDER, "7.9"]);
    }

    #[test]
    fn rsids_are_comma_joined_in_source_order() {
        assert_eq!(
            rsids_cell(&Some(vec!["rs1".into(), "rs2".into()])),
            "rs1,rs2"
        );
        assert_eq!(rsids_cell(&Some(vec![])), PLACEHOLDER);
        assert_eq!(rsids_cell(&None), PLACEHOLDER);
    }

    #[test]
    fn every_record_has_the_full_column_width() {
        let gene = GeneVariants {
            clinvar_variants: Some(vec![ClinvarVariant {
                variant_id: Some("1-100-A-T".into()),
                clinical_significance: Some("Pathogenic".into()),
                clinvar_variation_id: Some("12345".into()),
            }]),
            variants: vec![
                Variant {
                    variant_id: Some("1-100-A-T".into()),
                    chrom: Some("1".into()),
                    pos: Some(100),
                    rsids: Some(vec!["rs1".into()]),
                    consequence: Some("missense_variant".into()),
                    genome: Some(PopulationFrequencies {
                        ac: Some(3),
                        an: Some(152000),
                        af: Some(0.0000197),
                        homozygote_count: Some(0),
                        hemizygote_count: None,
                    }),
                    in_silico_predictors: Some(vec![predictor("cadd", "23.1")]),
                    ..Default::default()
                },
                // Fully empty variant: every column must still be present.
                Variant::default(),
            ],
        };

        let records = variant_records(&gene);
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.len(), OUTPUT_COLUMNS.len());
            assert!(record.iter().all(|cell| !cell.is_empty()));
        }

        // Joined ClinVar columns for the matched variant.
        assert_eq!(records[0][8], "Pathogenic");
        assert_eq!(records[0][9], "12345");
        // Genome block present, hemizygote count null within it.
        assert_eq!(records[0][10], "3");
        assert_eq!(records[0][14], PLACEHOLDER);
        // Exome block entirely null.
        assert_eq!(records[0][15], PLACEHOLDER);

        // The empty variant is placeholders across the board.
        assert!(records[1].iter().all(|cell| cell == PLACEHOLDER));
    }

    #[test]
    fn unmatched_clinvar_key_leaves_placeholders() {
        let gene = GeneVariants {
            clinvar_variants: Some(vec![ClinvarVariant {
                variant_id: Some("other-id".into()),
                clinical_significance: Some("Benign".into()),
                clinvar_variation_id: Some("99".into()),
            }]),
            variants: vec![Variant {
                variant_id: Some("1-100-A-T".into()),
                ..Default::default()
            }],
        };
        let records = variant_records(&gene);
        assert_eq!(records[0][8], PLACEHOLDER);
        assert_eq!(records[0][9], PLACEHOLDER);
    }

    struct MockApi;

    impl GnomadApi for MockApi {
        fn fetch_constraint(&self, _symbol: &str) -> Result<Option<GnomadConstraint>, QueryError> {
            unimplemented!("not used by the variant stage")
        }

        fn fetch_variants(&self, symbol: &str) -> Result<GeneVariants, QueryError> {
            match symbol {
                "BRCA1" | "TP53" => Ok(GeneVariants {
                    clinvar_variants: None,
                    variants: vec![Variant {
                        variant_id: Some(format!("{symbol}-variant")),
                        ..Default::default()
                    }],
                }),
                other => Err(QueryError::NotFound(other.to_string())),
            }
        }
    }

    #[test]
    fn one_file_per_successful_gene_and_skips_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let symbols = vec![
            "BRCA1".to_string(),
            "FAKE123".to_string(),
            "TP53".to_string(),
        ];

        let summary = run(&MockApi, &symbols, dir.path(), &NoDelay).unwrap();
        assert_eq!(summary.extracted, 2);
        assert_eq!(summary.skipped, 1);

        assert!(dir.path().join("BRCA1_variants.csv").exists());
        assert!(dir.path().join("TP53_variants.csv").exists());
        assert!(!dir.path().join("FAKE123_variants.csv").exists());
    }
}
