// src/models.rs

use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Per-gene mutational constraint block returned by the `GeneConstraint`
/// query. Every leaf is optional; gnomAD omits or nulls fields for genes
/// without constraint modelling.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GnomadConstraint {
    pub exp_lof: Option<f64>,
    pub obs_lof: Option<f64>,
    pub pli: Option<f64>,
    pub lof_z: Option<f64>,
    pub exp_mis: Option<f64>,
    pub obs_mis: Option<f64>,
    pub mis_z: Option<f64>,
    pub exp_syn: Option<f64>,
    pub obs_syn: Option<f64>,
    pub syn_z: Option<f64>,
}

/// Gene payload of the constraint query.
#[derive(Deserialize, Debug, Clone)]
pub struct ConstraintGene {
    pub gnomad_constraint: Option<GnomadConstraint>,
}

/// Gene payload of the variants query: the gnomAD variant list plus the
/// independently keyed ClinVar annotation list.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GeneVariants {
    pub clinvar_variants: Option<Vec<ClinvarVariant>>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClinvarVariant {
    pub variant_id: Option<String>,
    pub clinical_significance: Option<String>,
    pub clinvar_variation_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Variant {
    pub variant_id: Option<String>,
    pub chrom: Option<String>,
    pub pos: Option<i64>,
    pub rsids: Option<Vec<String>>,
    pub hgvs: Option<String>,
    pub hgvsc: Option<String>,
    pub hgvsp: Option<String>,
    pub consequence: Option<String>,
    pub in_silico_predictors: Option<Vec<InSilicoPredictor>>,
    pub exome: Option<PopulationFrequencies>,
    pub genome: Option<PopulationFrequencies>,
}

/// One in-silico predictor entry. `value` arrives as a number or a string
/// depending on the predictor, so it is normalized to a string here.
#[derive(Deserialize, Debug, Clone)]
pub struct InSilicoPredictor {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_predictor_value")]
    pub value: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PopulationFrequencies {
    pub ac: Option<i64>,
    pub an: Option<i64>,
    pub af: Option<f64>,
    pub homozygote_count: Option<i64>,
    pub hemizygote_count: Option<i64>,
}

fn deserialize_predictor_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper: Option<Value> = Option::deserialize(deserializer)?;
    match helper {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "invalid type for predictor value: {other}"
        ))),
    }
}
