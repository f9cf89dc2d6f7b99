//! Filtered query executors.
//!
//! Each executor is a thin composition: resolve the bioproject's dataset
//! path, enter the engine critical section through the cache, run one named
//! engine query, and hand the raw result to the table assembler. Failures are
//! converted into JSON error payloads at the handler boundary; nothing here
//! retries, because engine calls share mutable engine state.

use crate::app_state::AppState;
use crate::condition::build_expression;
use crate::engine::{Column, ResultTable, Scalar};
use crate::error::ExpressionQueryError;
use crate::models::{
    ConditionSearchRequest, DiffFoldExprRequest, FeatureKind, FeatureSearchRequest,
    GenePlotRequest, GeneSearchRequest, TranscriptSearchRequest,
};
use crate::table::{self, RenderedTable};
use crate::widgets::{ImageWidget, ListEntry};

use tracing::debug;

/// Default thresholds substituted for the `ALL` sentinel.
const DEFAULT_COVARIANCE: f64 = 1.0;
const DEFAULT_PVALUE: f64 = 0.05;
const DEFAULT_QVALUE: f64 = 0.05;
const DEFAULT_MIN_FOLD_CHANGE: f64 = 2.0;

/// Header ordering applied to differential-expression results.
const DIFF_EXPR_COLUMN_ORDER: &[&str] = &["chr", "start", "end", "strand", "gene_id", "gene_name"];

/// Icon paths served statically by the UI.
const GENE_ICON: &str = "imgs/gene-icon.png";
const TRANSCRIPT_ICON: &str = "imgs/transcript-icon.png";
const COVARIATE_ICON: &str = "imgs/covariate.png";
const MEASURE_ICON: &str = "imgs/measure.png";

/// URL prefix under which published plot images are served.
const PLOT_URL_PREFIX: &str = "imgs/temp";

/// Typeahead lists are capped at this many entries.
const LIST_LIMIT: usize = 50;

/// Per-sample expression of one gene, rendered as a two-column table.
pub async fn search_by_gene(
    state: &AppState,
    request: GeneSearchRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("search_by_gene", &path, |engine, handle| {
            Ok(engine.search_by_gene(&request.gene, &handle.dataset))
        })
        .await?;

    let Some(named) = result else {
        return Ok(table::empty_table());
    };
    let result = ResultTable::new(
        vec!["Sample ID".to_string(), "FPKM value".to_string()],
        vec![
            Column::Scalar(
                named
                    .names
                    .iter()
                    .map(|name| Scalar::Text(table::normalize_name(name)))
                    .collect(),
            ),
            Column::Scalar(named.values.into_iter().map(Scalar::Float).collect()),
        ],
    );
    Ok(table::render(Some(&result), request.offset, request.limit))
}

/// Structure rows for all isoforms of a gene.
pub async fn gene_isoforms(
    state: &AppState,
    request: GeneSearchRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("gene_isoforms", &path, |engine, handle| {
            Ok(engine.gene_isoforms(&request.gene, &handle.dataset))
        })
        .await?;
    Ok(table::render(result.as_ref(), request.offset, request.limit))
}

/// Structure rows for one transcript symbol.
pub async fn search_by_transcript(
    state: &AppState,
    request: TranscriptSearchRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("search_by_transcript", &path, |engine, handle| {
            Ok(engine.search_by_transcript(&request.transcript, &handle.dataset))
        })
        .await?;
    Ok(table::render(result.as_ref(), request.offset, request.limit))
}

/// Feature rows of one kind for a gene.
pub async fn search_by_feature(
    state: &AppState,
    request: FeatureSearchRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("search_by_feature", &path, |engine, handle| {
            Ok(engine.search_by_feature(&request.gene, request.feature, &handle.dataset))
        })
        .await?;
    Ok(table::render(result.as_ref(), request.offset, request.limit))
}

/// Expression of a gene across the samples matching a condition expression.
pub async fn search_by_condition(
    state: &AppState,
    request: ConditionSearchRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let expression = build_expression(&request.conditions);
    debug!(%expression, gene = %request.gene, "condition query");

    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("search_by_condition", &path, |engine, handle| {
            engine.search_by_condition(&expression, &request.gene, &handle.dataset)
        })
        .await?;
    Ok(table::render(result.as_ref(), request.offset, request.limit))
}

/// Differential-fold-expression search with statistical filtering.
pub async fn search_by_diff_fold_expr(
    state: &AppState,
    request: DiffFoldExprRequest,
) -> Result<RenderedTable, ExpressionQueryError> {
    let expression = build_expression(&request.conditions);
    let covariance = request.covariance.resolve(DEFAULT_COVARIANCE);
    let pvalue = request.pvalue.resolve(DEFAULT_PVALUE);
    let qvalue = request.qvalue.resolve(DEFAULT_QVALUE);
    let min_fold_change = request.min_fold_change.resolve(DEFAULT_MIN_FOLD_CHANGE);
    debug!(
        %expression,
        covariate = %request.covariate,
        feature = %request.feature,
        covariance,
        pvalue,
        qvalue,
        min_fold_change,
        "differential expression query"
    );

    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("search_by_diff_fold_expr", &path, |engine, handle| {
            let Some(result) = engine.search_by_diff_fold_expr(
                &expression,
                &request.covariate,
                request.feature,
                &handle.dataset,
            )?
            else {
                return Ok(None);
            };
            Ok(engine.stats_filtering(result, qvalue, pvalue, min_fold_change))
        })
        .await?;
    Ok(table::render_ordered(
        result.as_ref(),
        request.offset,
        request.limit,
        DIFF_EXPR_COLUMN_ORDER,
    ))
}

/// Grouped expression plot for a gene.
///
/// The engine renders into its scratch space; the file is then relocated
/// into the published plot directory. This is the one executor with a
/// filesystem side effect beyond reads. `None` means the gene was not found.
pub async fn plot_gene(
    state: &AppState,
    request: GenePlotRequest,
) -> Result<Option<ImageWidget>, ExpressionQueryError> {
    let plot_dir = state.plot_dir();
    std::fs::create_dir_all(&plot_dir).map_err(|source| ExpressionQueryError::PlotRelocate {
        path: plot_dir.clone(),
        source,
    })?;

    let path = state.dataset_path(&request.bioproject);
    let result = state
        .cache
        .with_dataset("plot_gene_by_group", &path, |engine, handle| {
            engine.plot_gene_by_group(
                &request.gene,
                request.measure,
                &request.covariate,
                &handle.dataset,
            )
        })
        .await?;
    let Some(output) = result else {
        return Ok(None);
    };
    debug!(
        chromosome = %output.chromosome,
        start = output.start,
        end = output.end,
        transcripts = output.transcripts.len(),
        "plotted gene region"
    );

    if !output.file.exists() {
        return Err(ExpressionQueryError::PlotFileMissing { path: output.file });
    }
    let Some(file_name) = output.file.file_name().map(|name| name.to_owned()) else {
        return Err(ExpressionQueryError::PlotFileMissing { path: output.file });
    };
    let destination = plot_dir.join(&file_name);
    std::fs::rename(&output.file, &destination).map_err(|source| {
        ExpressionQueryError::PlotRelocate {
            path: destination.clone(),
            source,
        }
    })?;

    Ok(Some(ImageWidget::new(
        format!("{}/{}", PLOT_URL_PREFIX, file_name.to_string_lossy()),
        "100%",
    )))
}

/// Gene symbols for the typeahead: substring-filtered, capped, sorted, with
/// the `ALL` entry prepended when there is a real choice.
pub async fn list_genes(
    state: &AppState,
    bioproject: &str,
    prefix: &str,
) -> Result<Vec<ListEntry>, ExpressionQueryError> {
    let path = state.dataset_path(bioproject);
    let all = state
        .cache
        .with_dataset("genes", &path, |engine, handle| {
            Ok(engine.genes(&handle.dataset))
        })
        .await?;

    let mut genes: Vec<String> = Vec::new();
    for gene in all {
        if !gene.contains(prefix) {
            continue;
        }
        if genes.len() >= LIST_LIMIT {
            break;
        }
        if !genes.contains(&gene) {
            genes.push(gene);
        }
    }
    genes.sort();

    let mut entries: Vec<ListEntry> = genes
        .into_iter()
        .map(|gene| ListEntry::new(gene.clone(), gene, Some(GENE_ICON)))
        .collect();
    if entries.len() > 1 {
        entries.insert(0, ListEntry::new("ALL", "Include any gene", Some(GENE_ICON)));
    }
    Ok(entries)
}

/// Transcript symbols for the typeahead.
pub async fn list_transcripts(
    state: &AppState,
    bioproject: &str,
    prefix: &str,
) -> Result<Vec<ListEntry>, ExpressionQueryError> {
    let path = state.dataset_path(bioproject);
    let all = state
        .cache
        .with_dataset("transcripts", &path, |engine, handle| {
            Ok(engine.transcripts(&handle.dataset))
        })
        .await?;

    let mut transcripts: Vec<String> = Vec::new();
    for transcript in all {
        if !transcript.contains(prefix) {
            continue;
        }
        if transcripts.len() >= LIST_LIMIT {
            break;
        }
        if !transcripts.contains(&transcript) {
            transcripts.push(transcript);
        }
    }
    transcripts.sort();

    let mut entries = vec![ListEntry::new(
        "ALL",
        "Include any transcript",
        Some(GENE_ICON),
    )];
    entries.extend(
        transcripts
            .into_iter()
            .map(|transcript| ListEntry::new(transcript.clone(), transcript, Some(GENE_ICON))),
    );
    Ok(entries)
}

/// The static feature kind list.
pub fn list_features() -> Vec<ListEntry> {
    let mut entries = vec![ListEntry::new(
        "ALL",
        "Include any feature",
        Some(TRANSCRIPT_ICON),
    )];
    for (kind, label) in [
        (FeatureKind::Exon, "Exon"),
        (FeatureKind::Intron, "Intron"),
        (FeatureKind::Trans, "Trans"),
    ] {
        entries.push(ListEntry::new(kind.to_string(), label, Some(TRANSCRIPT_ICON)));
    }
    entries
}

/// The static measure list.
pub fn list_measures() -> Vec<ListEntry> {
    let mut entries = vec![ListEntry::new(
        "ALL",
        "Include any measure",
        Some(MEASURE_ICON),
    )];
    for measure in ["FPKM", "Cov"] {
        entries.push(ListEntry::new(measure, measure, Some(MEASURE_ICON)));
    }
    entries
}

/// Covariate names for one bioproject: the phenotype columns minus `ids`.
pub async fn list_covariates(
    state: &AppState,
    bioproject: &str,
) -> Result<Vec<ListEntry>, ExpressionQueryError> {
    let path = state.dataset_path(bioproject);
    let phenotypes = state
        .cache
        .with_dataset("covariates", &path, |engine, handle| {
            Ok(engine.covariates(&handle.dataset))
        })
        .await?;

    let mut entries = vec![ListEntry::new(
        "ALL",
        "Include any covariate",
        Some(COVARIATE_ICON),
    )];
    entries.extend(
        phenotypes
            .names
            .iter()
            .filter(|name| *name != "ids")
            .map(|name| ListEntry::new(name.clone(), name.clone(), Some(COVARIATE_ICON))),
    );
    Ok(entries)
}

/// Distinct values of one covariate, in row order.
pub async fn list_covariate_values(
    state: &AppState,
    bioproject: &str,
    covariate: &str,
) -> Result<Vec<ListEntry>, ExpressionQueryError> {
    let path = state.dataset_path(bioproject);
    let phenotypes = state
        .cache
        .with_dataset("covariate_values", &path, |engine, handle| {
            Ok(engine.covariates(&handle.dataset))
        })
        .await?;

    let Some(column) = phenotypes.column(covariate) else {
        return Err(ExpressionQueryError::Engine(
            crate::engine::EngineError::UnknownCovariate {
                name: covariate.to_string(),
            },
        ));
    };

    let mut values: Vec<String> = Vec::new();
    for row in 0..column.len() {
        let value = column
            .resolve(row)
            .unwrap_or_else(|| table::NOT_AVAILABLE.to_string());
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values
        .into_iter()
        .map(|value| ListEntry::new(value.clone(), value, Some(COVARIATE_ICON)))
        .collect())
}
