// src/gnomad.rs

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{ConstraintGene, GeneVariants, GnomadConstraint};

pub const GNOMAD_API_URL: &str = "https://gnomad.broadinstitute.org/api";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_SECS: u64 = 1;

/// Field set mirrors the gnomAD browser's per-gene constraint table.
const CONSTRAINT_QUERY: &str = r#"
query GeneConstraint($gene: String!) {
  gene(gene_symbol: $gene, reference_genome: GRCh38) {
    gnomad_constraint {
      lof_z
      mis_z
      syn_z
      pli
      exp_lof
      obs_lof
      exp_mis
      obs_mis
      exp_syn
      obs_syn
    }
  }
}
"#;

const VARIANTS_QUERY: &str = r#"
query GeneVariants($gene: String!) {
  gene(gene_symbol: $gene, reference_genome: GRCh38) {
    clinvar_variants {
      variant_id
      clinical_significance
      clinvar_variation_id
    }
    variants(dataset: gnomad_r4) {
      variant_id
      chrom
      pos
      rsids
      hgvs
      hgvsc
      hgvsp
      consequence
      in_silico_predictors {
        id
        value
      }
      exome {
        ac
        an
        af
        homozygote_count
      }
      genome {
        ac
        an
        af
        homozygote_count
        hemizygote_count
      }
    }
  }
}
"#;

#[derive(Debug)]
pub enum QueryError {
    /// The API has no gene for this symbol. Permanent, never retried.
    NotFound(String),
    /// The symbol cannot be used in a query (contains a hyphen).
    InvalidSymbol(String),
    /// Network, HTTP or decode failure that survived the retry budget.
    Transport(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::NotFound(symbol) => write!(f, "'{symbol}' does not exist"),
            QueryError::InvalidSymbol(symbol) => {
                write!(f, "'{symbol}' is not a queryable gene symbol")
            }
            QueryError::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// The seam between the extraction stages and the network. Production code
/// uses `GnomadClient`; tests substitute an in-memory implementation.
pub trait GnomadApi {
    /// Constraint block for one gene; `Ok(None)` when the gene exists but
    /// carries no constraint modelling.
    fn fetch_constraint(&self, symbol: &str) -> Result<Option<GnomadConstraint>, QueryError>;

    /// Full gnomAD r4 variant list plus ClinVar annotations for one gene.
    fn fetch_variants(&self, symbol: &str) -> Result<GeneVariants, QueryError>;
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<GeneData<T>>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GeneData<T> {
    gene: Option<T>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

/// Hyphenated symbols break gnomAD's symbol resolution; reject them before
/// spending a request.
pub fn validate_symbol(symbol: &str) -> Result<(), QueryError> {
    if symbol.contains('-') {
        return Err(QueryError::InvalidSymbol(symbol.to_string()));
    }
    Ok(())
}

pub struct GnomadClient {
    client: Client,
    endpoint: String,
}

impl GnomadClient {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("gnomad-extractor/1.0"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    fn execute<T: DeserializeOwned>(&self, query: &str, symbol: &str) -> Result<T, QueryError> {
        validate_symbol(symbol)?;
        let body = json!({
            "query": query,
            "variables": { "gene": symbol },
        });

        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = match self.client.post(self.endpoint.as_str()).json(&body).send() {
                Ok(response) => response,
                Err(e) => {
                    if attempts >= MAX_ATTEMPTS {
                        return Err(QueryError::Transport(format!(
                            "request for '{symbol}' failed after {attempts} attempts: {e}"
                        )));
                    }
                    warn!("Request for '{}' failed ({}), retrying...", symbol, e);
                    thread::sleep(Duration::from_secs(RETRY_DELAY_SECS));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let envelope: GraphqlResponse<T> = response.json().map_err(|e| {
                    QueryError::Transport(format!("failed to decode response for '{symbol}': {e}"))
                })?;
                for error in &envelope.errors {
                    debug!("GraphQL error for '{}': {}", symbol, error.message);
                }
                return match envelope.data.and_then(|d| d.gene) {
                    Some(gene) => Ok(gene),
                    None => Err(QueryError::NotFound(symbol.to_string())),
                };
            } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempts >= MAX_ATTEMPTS {
                    return Err(QueryError::Transport(format!(
                        "exceeded maximum retries for '{symbol}'"
                    )));
                }
                let wait_time = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(RETRY_DELAY_SECS);
                warn!("Rate limited. Waiting {} seconds before retrying...", wait_time);
                thread::sleep(Duration::from_secs(wait_time));
            } else if status.is_server_error() {
                if attempts >= MAX_ATTEMPTS {
                    return Err(QueryError::Transport(format!(
                        "server error for '{symbol}': HTTP {status}"
                    )));
                }
                warn!("HTTP {} for '{}', retrying...", status, symbol);
                thread::sleep(Duration::from_secs(RETRY_DELAY_SECS));
            } else {
                let error_text = response.text().unwrap_or_default();
                return Err(QueryError::Transport(format!(
                    "failed to query '{symbol}': HTTP {status}: {error_text}"
                )));
            }
        }
    }
}

impl GnomadApi for GnomadClient {
    fn fetch_constraint(&self, symbol: &str) -> Result<Option<GnomadConstraint>, QueryError> {
        let gene: ConstraintGene = self.execute(CONSTRAINT_QUERY, symbol)?;
        Ok(gene.gnomad_constraint)
    }

    fn fetch_variants(&self, symbol: &str) -> Result<GeneVariants, QueryError> {
        self.execute(VARIANTS_QUERY, symbol)
    }
}
