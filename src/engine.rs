//! Analysis engine boundary.
//!
//! The statistical engine is one shared, stateful, non-reentrant resource for
//! the whole process: it keeps engine-level definitions and a reference to the
//! last-loaded dataset, so no two engine calls may ever interleave. All access
//! is serialized through the [DatasetCache](crate::cache::DatasetCache); the
//! trait takes `&mut self` to make exclusive access part of the contract.

pub mod local;

use crate::models::{FeatureKind, Measure};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::dataset::Dataset;

/// Errors raised at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Dataset file missing or unreadable.
    #[error("failed to read dataset file {}", path.display())]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dataset file present but not parseable.
    #[error("failed to parse dataset file {}", path.display())]
    DatasetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Condition expression not in the engine's query language.
    #[error("malformed condition expression {expression:?}")]
    BadExpression { expression: String },

    /// Requested covariate not present in the dataset's phenotype columns.
    #[error("no covariate {name:?} in dataset")]
    UnknownCovariate { name: String },

    /// Plot output could not be written.
    #[error("failed to render plot for gene {gene}")]
    Plot {
        gene: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single table cell value.
///
/// `Na` is the engine's "not available" marker and serializes as `null`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Na,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Na | Scalar::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Na => write!(f, "NA"),
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(value) => write!(f, "{}", value),
        }
    }
}

/// One column of a result table.
///
/// Categorical columns use factor-style encoding: a 1-based code per row into
/// a shared level table. Code 0 and out-of-range codes mark missing values.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Scalar(Vec<Scalar>),
    Categorical { codes: Vec<u32>, levels: Vec<String> },
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Scalar(values) => values.len(),
            Column::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the display value of one cell.
    ///
    /// This is the single resolution point for the scalar/categorical
    /// variants. `None` marks a not-available cell.
    pub fn resolve(&self, row: usize) -> Option<String> {
        match self {
            Column::Scalar(values) => match values.get(row)? {
                Scalar::Na => None,
                value => Some(value.to_string()),
            },
            Column::Categorical { codes, levels } => {
                let code = *codes.get(row)?;
                let index = usize::try_from(code).ok()?.checked_sub(1)?;
                levels.get(index).cloned()
            }
        }
    }
}

/// A rectangular engine result: ordered column names and parallel columns.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ResultTable {
    pub names: Vec<String>,
    pub columns: Vec<Column>,
}

impl ResultTable {
    /// Return a table, asserting the columns are rectangular.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Self {
        debug_assert_eq!(names.len(), columns.len());
        debug_assert!(columns.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { names, columns }
    }

    /// Engine-reported row count.
    pub fn nrow(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Column count.
    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        let index = self.names.iter().position(|n| n == name)?;
        self.columns.get(index)
    }

    /// Return a copy retaining only the rows for which `keep` is true.
    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> ResultTable {
        let columns = self
            .columns
            .iter()
            .map(|column| match column {
                Column::Scalar(values) => Column::Scalar(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(row, _)| keep(*row))
                        .map(|(_, value)| value.clone())
                        .collect(),
                ),
                Column::Categorical { codes, levels } => Column::Categorical {
                    codes: codes
                        .iter()
                        .enumerate()
                        .filter(|(row, _)| keep(*row))
                        .map(|(_, code)| *code)
                        .collect(),
                    levels: levels.clone(),
                },
            })
            .collect();
        ResultTable {
            names: self.names.clone(),
            columns,
        }
    }
}

/// A named per-sample value vector, as returned by the gene search.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedValues {
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

/// Output of the grouped gene plot call.
#[derive(Clone, Debug)]
pub struct PlotOutput {
    /// Path of the rendered image in the engine's scratch space.
    pub file: PathBuf,
    /// Transcript symbols covered by the plot.
    pub transcripts: Vec<String>,
    /// Chromosome of the plotted gene.
    pub chromosome: String,
    /// Genomic span of the plotted gene.
    pub start: u64,
    pub end: u64,
}

/// The external statistical package, specified at its interface boundary.
///
/// Queries that can match nothing return `Option`; `None` is the engine's
/// explicit "no result" sentinel, distinct from an empty-but-present table.
pub trait AnalysisEngine: Send {
    /// Load shared engine-level definitions. Idempotent per process.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Load the dataset serialized at `path` and make it current.
    fn load_dataset(&mut self, path: &Path) -> Result<Arc<Dataset>, EngineError>;

    /// Per-sample expression of one gene.
    fn search_by_gene(&mut self, gene: &str, dataset: &Dataset) -> Option<NamedValues>;

    /// Structure rows for all isoforms of a gene.
    fn gene_isoforms(&mut self, gene: &str, dataset: &Dataset) -> Option<ResultTable>;

    /// Structure rows for one transcript symbol.
    fn search_by_transcript(&mut self, transcript: &str, dataset: &Dataset)
        -> Option<ResultTable>;

    /// Feature rows (exon/intron/trans) of a gene.
    fn search_by_feature(
        &mut self,
        gene: &str,
        feature: FeatureKind,
        dataset: &Dataset,
    ) -> Option<ResultTable>;

    /// Expression of a gene across the samples matching a condition
    /// expression.
    fn search_by_condition(
        &mut self,
        expression: &str,
        gene: &str,
        dataset: &Dataset,
    ) -> Result<Option<ResultTable>, EngineError>;

    /// Precomputed differential-expression table for a covariate and feature
    /// kind, restricted to samples matching the condition expression.
    fn search_by_diff_fold_expr(
        &mut self,
        expression: &str,
        covariate: &str,
        feature: FeatureKind,
        dataset: &Dataset,
    ) -> Result<Option<ResultTable>, EngineError>;

    /// Filter a differential table on q-value, p-value and minimum fold
    /// change.
    fn stats_filtering(
        &mut self,
        table: ResultTable,
        qvalue: f64,
        pvalue: f64,
        min_fold_change: f64,
    ) -> Option<ResultTable>;

    /// Render a grouped expression plot into scratch space.
    fn plot_gene_by_group(
        &mut self,
        gene: &str,
        measure: Measure,
        covariate: &str,
        dataset: &Dataset,
    ) -> Result<Option<PlotOutput>, EngineError>;

    /// All gene symbols in the dataset, duplicates included.
    fn genes(&mut self, dataset: &Dataset) -> Vec<String>;

    /// All transcript symbols in the dataset.
    fn transcripts(&mut self, dataset: &Dataset) -> Vec<String>;

    /// The phenotype table (sample ids plus covariate columns).
    fn covariates(&mut self, dataset: &Dataset) -> ResultTable;
}
