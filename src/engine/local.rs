//! In-process analysis engine.
//!
//! Serves every query from the precomputed dataset document, so no external
//! statistics runtime is needed at request time. The engine still follows the
//! shared-resource contract: `load_dataset` replaces the engine-global
//! current-object reference, which is why callers must hold the process-wide
//! critical section around every call.

use crate::dataset::Dataset;
use crate::engine::{
    AnalysisEngine, Column, EngineError, NamedValues, PlotOutput, ResultTable, Scalar,
};
use crate::models::{FeatureKind, Measure};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One parsed `field=='value'` clause.
#[derive(Clone, Debug, PartialEq)]
struct Clause {
    field: String,
    value: String,
}

/// Parse a conjunctive equality expression, e.g. `tissue=='liver' & time_h=='24'`.
///
/// The empty expression parses to no clauses (an unfiltered query).
fn parse_expression(expression: &str) -> Result<Vec<Clause>, EngineError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(Vec::new());
    }
    expression
        .split(" & ")
        .map(|clause| {
            let malformed = || EngineError::BadExpression {
                expression: expression.to_string(),
            };
            let (field, value) = clause.split_once("==").ok_or_else(malformed)?;
            let value = value
                .trim()
                .strip_prefix('\'')
                .and_then(|value| value.strip_suffix('\''))
                .ok_or_else(malformed)?;
            let field = field.trim();
            if field.is_empty() {
                return Err(malformed());
            }
            Ok(Clause {
                field: field.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Build a categorical column from display values, levels in first-seen order.
fn categorical(values: Vec<String>) -> Column {
    let mut levels: Vec<String> = Vec::new();
    let codes = values
        .into_iter()
        .map(|value| match levels.iter().position(|level| *level == value) {
            Some(index) => (index + 1) as u32,
            None => {
                levels.push(value);
                levels.len() as u32
            }
        })
        .collect();
    Column::Categorical { codes, levels }
}

/// The in-process implementation of [AnalysisEngine].
pub struct LocalEngine {
    /// Whether shared definitions have been loaded this process.
    initialized: bool,
    /// Engine-global reference to the last-loaded dataset.
    current: Option<Arc<Dataset>>,
    /// Directory plots are rendered into before the caller relocates them.
    scratch: PathBuf,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::with_scratch(std::env::temp_dir())
    }

    pub fn with_scratch(scratch: PathBuf) -> Self {
        Self {
            initialized: false,
            current: None,
            scratch,
        }
    }

    /// Sample indices matching every clause of a parsed expression.
    fn matching_samples(
        dataset: &Dataset,
        clauses: &[Clause],
    ) -> Result<Vec<usize>, EngineError> {
        let mut keep: Vec<usize> = (0..dataset.phenotypes.nrow()).collect();
        for clause in clauses {
            let column = dataset.phenotypes.column(&clause.field).ok_or_else(|| {
                EngineError::UnknownCovariate {
                    name: clause.field.clone(),
                }
            })?;
            keep.retain(|&row| column.resolve(row).as_deref() == Some(clause.value.as_str()));
        }
        Ok(keep)
    }

    /// Per-sample expression of a gene: the sum over its transcripts.
    fn gene_expression(dataset: &Dataset, gene: &str, measure: Measure) -> Option<Vec<f64>> {
        let transcripts = dataset.transcripts_of_gene(gene);
        if transcripts.is_empty() {
            return None;
        }
        let matrix = dataset.expression.matrix(measure);
        let values = (0..dataset.expression.sample_ids.len())
            .map(|sample| transcripts.iter().map(|&row| matrix[row][sample]).sum())
            .collect();
        Some(values)
    }

    /// Transcript-structure rows for a set of transcript indices.
    fn structure_table(dataset: &Dataset, rows: &[usize]) -> ResultTable {
        let pick = |f: fn(&crate::dataset::Transcript) -> Scalar| -> Vec<Scalar> {
            rows.iter().map(|&row| f(&dataset.transcripts[row])).collect()
        };
        let strings = |f: fn(&crate::dataset::Transcript) -> String| -> Vec<String> {
            rows.iter().map(|&row| f(&dataset.transcripts[row])).collect()
        };
        ResultTable::new(
            vec![
                "chr".to_string(),
                "start".to_string(),
                "end".to_string(),
                "strand".to_string(),
                "id".to_string(),
                "num_exons".to_string(),
                "gene_id".to_string(),
                "gene_name".to_string(),
            ],
            vec![
                categorical(strings(|t| t.chr.clone())),
                Column::Scalar(pick(|t| Scalar::Int(t.start as i64))),
                Column::Scalar(pick(|t| Scalar::Int(t.end as i64))),
                categorical(strings(|t| t.strand.clone())),
                Column::Scalar(pick(|t| Scalar::Text(t.id.clone()))),
                Column::Scalar(pick(|t| Scalar::Int(t.num_exons as i64))),
                Column::Scalar(pick(|t| Scalar::Text(t.gene_id.clone()))),
                Column::Scalar(pick(|t| Scalar::Text(t.gene_name.clone()))),
            ],
        )
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine for LocalEngine {
    fn initialize(&mut self) -> Result<(), EngineError> {
        // Re-running reloads the shared definitions; nothing to do beyond the
        // flag for the in-process engine.
        if !self.initialized {
            debug!("loading shared engine definitions");
        }
        self.initialized = true;
        Ok(())
    }

    fn load_dataset(&mut self, path: &Path) -> Result<Arc<Dataset>, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::DatasetRead {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset: Dataset =
            serde_json::from_str(&raw).map_err(|source| EngineError::DatasetParse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            transcripts = dataset.transcripts.len(),
            samples = dataset.expression.sample_ids.len(),
            "loaded dataset"
        );
        // Mirror the engine-global current-object slot, then hand out a
        // reference to it; a concurrent load would clobber this.
        self.current = Some(Arc::new(dataset));
        Ok(self.current.clone().expect("dataset just stored"))
    }

    fn search_by_gene(&mut self, gene: &str, dataset: &Dataset) -> Option<NamedValues> {
        let values = Self::gene_expression(dataset, gene, Measure::Fpkm)?;
        Some(NamedValues {
            names: dataset.expression.sample_ids.clone(),
            values,
        })
    }

    fn gene_isoforms(&mut self, gene: &str, dataset: &Dataset) -> Option<ResultTable> {
        let rows = dataset.transcripts_of_gene(gene);
        if rows.is_empty() {
            return None;
        }
        Some(Self::structure_table(dataset, &rows))
    }

    fn search_by_transcript(
        &mut self,
        transcript: &str,
        dataset: &Dataset,
    ) -> Option<ResultTable> {
        let rows: Vec<usize> = dataset
            .transcripts
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id == transcript)
            .map(|(index, _)| index)
            .collect();
        if rows.is_empty() {
            return None;
        }
        Some(Self::structure_table(dataset, &rows))
    }

    fn search_by_feature(
        &mut self,
        gene: &str,
        feature: FeatureKind,
        dataset: &Dataset,
    ) -> Option<ResultTable> {
        if feature == FeatureKind::Trans {
            return self.gene_isoforms(gene, dataset);
        }
        let features: Vec<&crate::dataset::Feature> = dataset
            .features
            .iter()
            .filter(|f| f.kind == feature && f.gene_name == gene)
            .collect();
        if features.is_empty() {
            return None;
        }
        Some(ResultTable::new(
            vec![
                "chr".to_string(),
                "start".to_string(),
                "end".to_string(),
                "strand".to_string(),
                "transcript".to_string(),
                "gene_name".to_string(),
            ],
            vec![
                categorical(features.iter().map(|f| f.chr.clone()).collect()),
                Column::Scalar(features.iter().map(|f| Scalar::Int(f.start as i64)).collect()),
                Column::Scalar(features.iter().map(|f| Scalar::Int(f.end as i64)).collect()),
                categorical(features.iter().map(|f| f.strand.clone()).collect()),
                Column::Scalar(
                    features
                        .iter()
                        .map(|f| Scalar::Text(f.transcript_id.clone()))
                        .collect(),
                ),
                Column::Scalar(
                    features
                        .iter()
                        .map(|f| Scalar::Text(f.gene_name.clone()))
                        .collect(),
                ),
            ],
        ))
    }

    fn search_by_condition(
        &mut self,
        expression: &str,
        gene: &str,
        dataset: &Dataset,
    ) -> Result<Option<ResultTable>, EngineError> {
        let clauses = parse_expression(expression)?;
        let samples = Self::matching_samples(dataset, &clauses)?;
        if samples.is_empty() {
            return Ok(None);
        }
        let Some(values) = Self::gene_expression(dataset, gene, Measure::Fpkm) else {
            return Ok(None);
        };

        let mut mask = vec![false; dataset.phenotypes.nrow()];
        for &sample in &samples {
            mask[sample] = true;
        }

        let mut names = vec!["sample".to_string()];
        let mut columns = vec![Column::Scalar(
            samples
                .iter()
                .map(|&s| Scalar::Text(dataset.expression.sample_ids[s].clone()))
                .collect(),
        )];
        for pheno in &dataset.phenotypes.columns {
            if pheno.name == "ids" {
                continue;
            }
            let table = ResultTable::new(vec![pheno.name.clone()], vec![pheno.values.clone()]);
            let filtered = table.filter_rows(|row| mask[row]);
            names.push(pheno.name.clone());
            columns.push(filtered.columns.into_iter().next().expect("one column"));
        }
        names.push("FPKM".to_string());
        columns.push(Column::Scalar(
            samples.iter().map(|&s| Scalar::Float(values[s])).collect(),
        ));

        Ok(Some(ResultTable::new(names, columns)))
    }

    fn search_by_diff_fold_expr(
        &mut self,
        expression: &str,
        covariate: &str,
        feature: FeatureKind,
        dataset: &Dataset,
    ) -> Result<Option<ResultTable>, EngineError> {
        if dataset.phenotypes.column(covariate).is_none() {
            return Err(EngineError::UnknownCovariate {
                name: covariate.to_string(),
            });
        }
        let clauses = parse_expression(expression)?;
        if Self::matching_samples(dataset, &clauses)?.is_empty() {
            return Ok(None);
        }
        Ok(dataset.diff_table(covariate, feature).cloned())
    }

    fn stats_filtering(
        &mut self,
        table: ResultTable,
        qvalue: f64,
        pvalue: f64,
        min_fold_change: f64,
    ) -> Option<ResultTable> {
        let numeric = |name: &str| -> Vec<Option<f64>> {
            match table.column(name) {
                Some(Column::Scalar(values)) => values.iter().map(Scalar::as_f64).collect(),
                _ => vec![None; table.nrow()],
            }
        };
        let qvals = numeric("qval");
        let pvals = numeric("pval");
        let folds = numeric("fc");

        let filtered = table.filter_rows(|row| {
            let (Some(q), Some(p), Some(fc)) = (qvals[row], pvals[row], folds[row]) else {
                return false;
            };
            // A fold change of 1/n is as extreme as a fold change of n.
            q <= qvalue && p <= pvalue && (fc >= min_fold_change || fc <= 1.0 / min_fold_change)
        });
        if filtered.nrow() == 0 {
            None
        } else {
            Some(filtered)
        }
    }

    fn plot_gene_by_group(
        &mut self,
        gene: &str,
        measure: Measure,
        covariate: &str,
        dataset: &Dataset,
    ) -> Result<Option<PlotOutput>, EngineError> {
        let transcripts = dataset.transcripts_of_gene(gene);
        if transcripts.is_empty() {
            return Ok(None);
        }
        let column = dataset.phenotypes.column(covariate).ok_or_else(|| {
            EngineError::UnknownCovariate {
                name: covariate.to_string(),
            }
        })?;
        let values = Self::gene_expression(dataset, gene, measure).expect("gene present");

        // Group means in first-seen covariate order; NA samples are skipped.
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for (sample, value) in values.iter().enumerate() {
            let Some(group) = column.resolve(sample) else {
                continue;
            };
            match groups.iter().position(|(name, _)| *name == group) {
                Some(index) => groups[index].1.push(*value),
                None => groups.push((group, vec![*value])),
            }
        }

        let file = self
            .scratch
            .join(format!("{}_{}.svg", gene, Uuid::new_v4()));
        let svg = render_group_plot(gene, measure, covariate, &groups);
        std::fs::write(&file, svg).map_err(|source| EngineError::Plot {
            gene: gene.to_string(),
            source,
        })?;

        let chromosome = dataset.transcripts[transcripts[0]].chr.clone();
        let start = transcripts
            .iter()
            .map(|&row| dataset.transcripts[row].start)
            .min()
            .expect("non-empty");
        let end = transcripts
            .iter()
            .map(|&row| dataset.transcripts[row].end)
            .max()
            .expect("non-empty");
        Ok(Some(PlotOutput {
            file,
            transcripts: transcripts
                .iter()
                .map(|&row| dataset.transcripts[row].id.clone())
                .collect(),
            chromosome,
            start,
            end,
        }))
    }

    fn genes(&mut self, dataset: &Dataset) -> Vec<String> {
        dataset
            .transcripts
            .iter()
            .map(|transcript| transcript.gene_name.clone())
            .collect()
    }

    fn transcripts(&mut self, dataset: &Dataset) -> Vec<String> {
        dataset
            .transcripts
            .iter()
            .map(|transcript| transcript.id.clone())
            .collect()
    }

    fn covariates(&mut self, dataset: &Dataset) -> ResultTable {
        dataset.phenotypes.as_table()
    }
}

/// Render a bar chart of per-group mean expression as a standalone SVG.
fn render_group_plot(
    gene: &str,
    measure: Measure,
    covariate: &str,
    groups: &[(String, Vec<f64>)],
) -> String {
    const WIDTH: f64 = 640.0;
    const HEIGHT: f64 = 360.0;
    const MARGIN: f64 = 48.0;

    let means: Vec<(String, f64)> = groups
        .iter()
        .map(|(name, members)| {
            let mean = members.iter().sum::<f64>() / members.len().max(1) as f64;
            (name.clone(), mean)
        })
        .collect();
    let max_mean = means.iter().map(|(_, m)| *m).fold(f64::MIN, f64::max).max(1e-9);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}">"#
    );
    svg.push_str(&format!(
        r#"<text x="{}" y="24" text-anchor="middle" font-size="16">{} {} by {}</text>"#,
        WIDTH / 2.0,
        gene,
        measure,
        covariate
    ));

    let plot_width = WIDTH - 2.0 * MARGIN;
    let plot_height = HEIGHT - 2.0 * MARGIN;
    let slot = plot_width / means.len().max(1) as f64;
    for (index, (name, mean)) in means.iter().enumerate() {
        let bar_height = plot_height * mean / max_mean;
        let x = MARGIN + index as f64 * slot + slot * 0.15;
        let y = HEIGHT - MARGIN - bar_height;
        svg.push_str(&format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="steelblue"/>"#,
            x,
            y,
            slot * 0.7,
            bar_height
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{:.2}</text>"#,
            x + slot * 0.35,
            y - 6.0,
            mean
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
            x + slot * 0.35,
            HEIGHT - MARGIN + 16.0,
            name
        ));
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn parse_empty_expression() {
        assert_eq!(parse_expression("").unwrap(), Vec::new());
        assert_eq!(parse_expression("  ").unwrap(), Vec::new());
    }

    #[test]
    fn parse_single_and_multiple_clauses() {
        let clauses = parse_expression("tissue=='liver'").unwrap();
        assert_eq!(
            clauses,
            vec![Clause {
                field: "tissue".to_string(),
                value: "liver".to_string()
            }]
        );
        let clauses = parse_expression("tissue=='liver' & time_h=='24'").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1].field, "time_h");
        assert_eq!(clauses[1].value, "24");
    }

    #[test]
    fn parse_rejects_malformed_clauses() {
        assert!(parse_expression("tissue='liver'").is_err());
        assert!(parse_expression("tissue==liver").is_err());
        assert!(parse_expression("=='liver'").is_err());
    }

    #[test]
    fn categorical_levels_in_first_seen_order() {
        let column = categorical(vec![
            "chr12".to_string(),
            "chr9".to_string(),
            "chr12".to_string(),
        ]);
        match &column {
            Column::Categorical { codes, levels } => {
                assert_eq!(codes, &vec![1, 2, 1]);
                assert_eq!(levels, &vec!["chr12".to_string(), "chr9".to_string()]);
            }
            _ => panic!("expected categorical column"),
        }
    }

    #[test]
    fn gene_search_sums_transcripts_per_sample() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let result = engine.search_by_gene("DUSP6", &dataset).unwrap();
        assert_eq!(result.names, dataset.expression.sample_ids);
        // TX1 + TX2 per sample.
        assert_eq!(result.values, vec![1.5, 2.5, 3.5, 4.5]);
        assert!(engine.search_by_gene("NOPE", &dataset).is_none());
    }

    #[test]
    fn isoforms_and_transcript_search() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let table = engine.gene_isoforms("DUSP6", &dataset).unwrap();
        assert_eq!(table.nrow(), 2);
        assert_eq!(table.column("id").unwrap().resolve(0), Some("TX1".to_string()));

        let table = engine.search_by_transcript("TX3", &dataset).unwrap();
        assert_eq!(table.nrow(), 1);
        assert_eq!(table.column("gene_name").unwrap().resolve(0), Some("ABCA1".to_string()));
        assert!(engine.search_by_transcript("TX9", &dataset).is_none());
    }

    #[test]
    fn feature_search_by_kind() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let exons = engine
            .search_by_feature("DUSP6", FeatureKind::Exon, &dataset)
            .unwrap();
        assert_eq!(exons.nrow(), 2);
        let introns = engine
            .search_by_feature("DUSP6", FeatureKind::Intron, &dataset)
            .unwrap();
        assert_eq!(introns.nrow(), 1);
        // Trans falls back to whole transcripts.
        let trans = engine
            .search_by_feature("DUSP6", FeatureKind::Trans, &dataset)
            .unwrap();
        assert_eq!(trans.nrow(), 2);
        assert!(engine
            .search_by_feature("ABCA1", FeatureKind::Intron, &dataset)
            .is_none());
    }

    #[test]
    fn condition_search_filters_samples() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let table = engine
            .search_by_condition("tissue=='liver'", "DUSP6", &dataset)
            .unwrap()
            .unwrap();
        assert_eq!(table.nrow(), 2);
        assert_eq!(
            table.column("sample").unwrap().resolve(0),
            Some("trimmed_s1".to_string())
        );
        assert_eq!(table.column("FPKM").unwrap().resolve(1), Some("2.5".to_string()));
        // Categorical phenotype columns keep their encoding.
        assert_eq!(table.column("tissue").unwrap().resolve(0), Some("liver".to_string()));

        // No matching samples is the engine's no-result sentinel.
        let none = engine
            .search_by_condition("tissue=='brain'", "DUSP6", &dataset)
            .unwrap();
        assert!(none.is_none());

        // Unknown fields are reported, malformed expressions too.
        assert!(engine
            .search_by_condition("nope=='x'", "DUSP6", &dataset)
            .is_err());
        assert!(engine
            .search_by_condition("tissue='liver'", "DUSP6", &dataset)
            .is_err());
    }

    #[test]
    fn diff_fold_expr_uses_precomputed_table() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let table = engine
            .search_by_diff_fold_expr("", "tissue", FeatureKind::Trans, &dataset)
            .unwrap()
            .unwrap();
        assert_eq!(table.nrow(), 3);

        // Unknown covariate (including the ALL sentinel) is an error.
        assert!(engine
            .search_by_diff_fold_expr("", "ALL", FeatureKind::Trans, &dataset)
            .is_err());
        // No precomputed table for this combination.
        assert!(engine
            .search_by_diff_fold_expr("", "time_h", FeatureKind::Exon, &dataset)
            .unwrap()
            .is_none());
    }

    #[test]
    fn stats_filtering_applies_all_thresholds() {
        let dataset = test_utils::sample_dataset();
        let mut engine = LocalEngine::new();
        let table = dataset
            .diff_table("tissue", FeatureKind::Trans)
            .unwrap()
            .clone();
        let filtered = engine.stats_filtering(table.clone(), 0.05, 0.05, 2.0).unwrap();
        // fc 3.0 passes upward, fc 0.25 passes downward, fc 1.2 fails.
        assert_eq!(filtered.nrow(), 2);
        assert_eq!(filtered.column("id").unwrap().resolve(0), Some("TX1".to_string()));
        assert_eq!(filtered.column("id").unwrap().resolve(1), Some("TX3".to_string()));

        // Nothing surviving is the no-result sentinel.
        assert!(engine.stats_filtering(table, 0.0001, 0.05, 2.0).is_none());
    }

    #[test]
    fn plot_renders_svg_and_reports_region() {
        let dataset = test_utils::sample_dataset();
        let scratch = test_utils::temp_dir("plot-scratch");
        let mut engine = LocalEngine::with_scratch(scratch.clone());
        let output = engine
            .plot_gene_by_group("DUSP6", Measure::Fpkm, "tissue", &dataset)
            .unwrap()
            .unwrap();
        assert!(output.file.exists());
        let svg = std::fs::read_to_string(&output.file).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(output.chromosome, "chr12");
        assert_eq!((output.start, output.end), (100, 950));
        assert_eq!(output.transcripts, vec!["TX1", "TX2"]);

        assert!(engine
            .plot_gene_by_group("NOPE", Measure::Fpkm, "tissue", &dataset)
            .unwrap()
            .is_none());
        assert!(engine
            .plot_gene_by_group("DUSP6", Measure::Fpkm, "ALL", &dataset)
            .is_err());
        std::fs::remove_dir_all(scratch).ok();
    }

    #[test]
    fn load_dataset_errors_are_typed() {
        let mut engine = LocalEngine::new();
        let missing = engine.load_dataset(Path::new("/nonexistent/dataset.json"));
        assert!(matches!(missing, Err(EngineError::DatasetRead { .. })));

        let dir = test_utils::temp_dir("bad-dataset");
        let path = dir.join("dataset.json");
        std::fs::write(&path, "{not json").unwrap();
        let corrupt = engine.load_dataset(&path);
        assert!(matches!(corrupt, Err(EngineError::DatasetParse { .. })));
        std::fs::remove_dir_all(dir).ok();
    }
}
