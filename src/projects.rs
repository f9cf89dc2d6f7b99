//! Project index aggregation.
//!
//! The data root carries a `project.json` document describing every sequencing
//! experiment; the overview endpoint aggregates it per bioproject for the
//! landing-page table, and the project list exposes the per-bioproject
//! directories for the selection widget.

use crate::error::ExpressionQueryError;
use crate::widgets::{ButtonWidget, LinkWidget, LinkableImage, ListEntry, MultiElement, TextCell, Widget};

use byte_unit::{Byte, UnitType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the experiment index under the data root.
pub const PROJECT_INDEX_FILE: &str = "project.json";

const PROJECT_ICON: &str = "imgs/project.png";
const PAPER_ICON: &str = "imgs/paper.png";

/// The experiment index document.
#[derive(Debug, Deserialize)]
pub struct ProjectIndex {
    pub projects: Vec<Experiment>,
}

/// One sequencing experiment in the index.
#[derive(Debug, Deserialize)]
pub struct Experiment {
    pub dataset: ExperimentDataset,
}

/// Metadata of one experiment's dataset.
#[derive(Debug, Deserialize)]
pub struct ExperimentDataset {
    pub bioproject_id: String,
    pub size: u64,
    pub genome: String,
    #[serde(default)]
    pub paper_id: Option<String>,
    pub platform: String,
    /// Newline-separated sample identifiers.
    pub sample_ids: String,
}

/// The aggregated overview table.
#[derive(Debug, Serialize)]
pub struct Overview {
    pub total: usize,
    pub header: Vec<String>,
    pub items: Vec<Vec<Widget>>,
}

/// Per-bioproject aggregate of the experiment index.
#[derive(Debug, Default)]
struct Summary {
    experiments: usize,
    size: u64,
    samples: usize,
    organism: String,
    /// Distinct paper ids, first-seen order. Only the first is displayed.
    papers: Vec<String>,
    /// Distinct platforms, first-seen order. Only the first is displayed.
    platforms: Vec<String>,
}

/// Format a byte count for display, e.g. `1.21 GiB`.
pub fn format_bytes(size: u64) -> String {
    format!("{:.2}", Byte::from_u64(size).get_appropriate_unit(UnitType::Binary))
}

/// Aggregate the experiment index into the overview table.
pub fn dataset_overview(data_dir: &Path) -> Result<Overview, ExpressionQueryError> {
    let path = data_dir.join(PROJECT_INDEX_FILE);
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        ExpressionQueryError::ProjectIndexRead {
            path: path.clone(),
            source,
        }
    })?;
    let index: ProjectIndex =
        serde_json::from_str(&raw).map_err(|source| ExpressionQueryError::ProjectIndexParse {
            path: path.clone(),
            source,
        })?;

    // Aggregate per bioproject, preserving first-seen order.
    let mut summaries: Vec<(String, Summary)> = Vec::new();
    for experiment in &index.projects {
        let dataset = &experiment.dataset;
        let index = match summaries
            .iter()
            .position(|(id, _)| *id == dataset.bioproject_id)
        {
            Some(index) => index,
            None => {
                summaries.push((dataset.bioproject_id.clone(), Summary::default()));
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[index].1;

        summary.experiments += 1;
        summary.size += dataset.size;
        summary.samples += dataset.sample_ids.lines().count();
        summary.organism = dataset.genome.clone();
        if let Some(paper) = &dataset.paper_id {
            if !summary.papers.contains(paper) {
                summary.papers.push(paper.clone());
            }
        }
        if !summary.platforms.contains(&dataset.platform) {
            summary.platforms.push(dataset.platform.clone());
        }
    }

    let items: Vec<Vec<Widget>> = summaries
        .iter()
        .map(|(bioproject, summary)| {
            let mut row: Vec<Widget> = Vec::new();
            row.push(
                LinkWidget::new(
                    format!("https://www.ncbi.nlm.nih.gov/bioproject/{bioproject}"),
                    bioproject,
                    format!("See this BioProject within NCBI ({bioproject})"),
                )
                .into(),
            );
            row.push(TextCell::new(summary.samples.to_string()).into());

            let mut experiments = MultiElement::new(Some("center center"));
            experiments.push(TextCell::new(summary.experiments.to_string()));
            experiments.push(ButtonWidget::new(
                "See detail",
                format!("bioproject/{bioproject}"),
            ));
            row.push(experiments.into());

            row.push(TextCell::new(format_bytes(summary.size)).into());
            row.push(TextCell::new(&summary.organism).into());

            // Only the first paper and platform survive aggregation.
            match summary.papers.first() {
                Some(paper) => row.push(
                    LinkableImage::new(
                        PAPER_ICON,
                        format!("https://www.ncbi.nlm.nih.gov/pubmed/{paper}"),
                        format!("See this paper within Pubmed ({paper})"),
                        "50px",
                    )
                    .into(),
                ),
                None => row.push(TextCell::new("No paper available").into()),
            }
            row.push(TextCell::new(summary.platforms.first().cloned().unwrap_or_default()).into());

            row
        })
        .collect();

    Ok(Overview {
        total: items.len(),
        header: vec![
            "BioProject ID".to_string(),
            "Number of samples".to_string(),
            "Experiments".to_string(),
            "Size".to_string(),
            "Organism".to_string(),
            "Paper ID".to_string(),
            "Platform".to_string(),
        ],
        items,
    })
}

/// List the bioproject directories under the data root.
pub fn list_projects(data_dir: &Path) -> Result<Vec<ListEntry>, ExpressionQueryError> {
    let entries = std::fs::read_dir(data_dir).map_err(|source| {
        ExpressionQueryError::ProjectList {
            path: data_dir.to_path_buf(),
            source,
        }
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| ListEntry::new(name.clone(), name, Some(PROJECT_ICON)))
        .collect())
}
