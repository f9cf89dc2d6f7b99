//! In-memory representation of one bioproject's precomputed dataset.
//!
//! Each bioproject directory under the data root holds one serialized
//! document, [DATASET_FILE], produced by the upstream assembly pipeline:
//! transcript annotation, feature coordinates, per-sample phenotype columns,
//! expression matrices and precomputed differential-expression tables. The
//! document is loaded once by the engine and is read-only afterwards.

use crate::engine::{Column, ResultTable};
use crate::models::{FeatureKind, Measure};

use serde::{Deserialize, Serialize};

/// File name of the serialized dataset within a bioproject directory.
pub const DATASET_FILE: &str = "dataset.json";

/// One assembled transcript.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Transcript {
    /// Transcript symbol.
    pub id: String,
    pub gene_id: String,
    pub gene_name: String,
    pub chr: String,
    pub strand: String,
    pub start: u64,
    pub end: u64,
    pub num_exons: u32,
}

/// One exon, intron or whole-transcript feature.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub transcript_id: String,
    pub gene_name: String,
    pub chr: String,
    pub strand: String,
    pub start: u64,
    pub end: u64,
}

/// One named phenotype column.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PhenoColumn {
    pub name: String,
    pub values: Column,
}

/// Per-sample phenotype attributes.
///
/// Rows are parallel to [ExpressionData::sample_ids]; the `ids` column
/// repeats the sample identifiers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PhenoData {
    pub columns: Vec<PhenoColumn>,
}

impl PhenoData {
    /// Look up a phenotype column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.values)
    }

    /// Number of samples.
    pub fn nrow(&self) -> usize {
        self.columns.first().map_or(0, |column| column.values.len())
    }

    /// The phenotype table as an engine result.
    pub fn as_table(&self) -> ResultTable {
        ResultTable::new(
            self.columns.iter().map(|c| c.name.clone()).collect(),
            self.columns.iter().map(|c| c.values.clone()).collect(),
        )
    }
}

/// Expression matrices, one row per transcript, one column per sample.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExpressionData {
    /// Sample identifiers, defining the column order of the matrices.
    pub sample_ids: Vec<String>,
    /// FPKM values, parallel to [Dataset::transcripts].
    pub fpkm: Vec<Vec<f64>>,
    /// Per-base coverage values, parallel to [Dataset::transcripts].
    pub cov: Vec<Vec<f64>>,
}

impl ExpressionData {
    /// The matrix for a measure. `ALL` falls back to FPKM.
    pub fn matrix(&self, measure: Measure) -> &Vec<Vec<f64>> {
        match measure {
            Measure::Cov => &self.cov,
            _ => &self.fpkm,
        }
    }
}

/// A precomputed differential-expression table for one covariate and feature
/// kind. Columns include `id`, `fc`, `pval` and `qval`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DiffExpressionTable {
    pub covariate: String,
    pub feature: FeatureKind,
    pub results: ResultTable,
}

/// The complete precomputed statistical object for one bioproject.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Dataset {
    pub transcripts: Vec<Transcript>,
    #[serde(default)]
    pub features: Vec<Feature>,
    pub phenotypes: PhenoData,
    pub expression: ExpressionData,
    #[serde(default)]
    pub diff_expression: Vec<DiffExpressionTable>,
}

impl Dataset {
    /// Indices of the transcripts belonging to a gene.
    pub fn transcripts_of_gene(&self, gene: &str) -> Vec<usize> {
        self.transcripts
            .iter()
            .enumerate()
            .filter(|(_, transcript)| transcript.gene_name == gene)
            .map(|(index, _)| index)
            .collect()
    }

    /// The precomputed differential table for a covariate and feature kind.
    pub fn diff_table(&self, covariate: &str, feature: FeatureKind) -> Option<&ResultTable> {
        self.diff_expression
            .iter()
            .find(|table| table.covariate == covariate && table.feature == feature)
            .map(|table| &table.results)
    }
}
