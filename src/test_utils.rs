use crate::dataset::{
    Dataset, DiffExpressionTable, ExpressionData, Feature, PhenoColumn, PhenoData, Transcript,
    DATASET_FILE,
};
use crate::engine::{Column, ResultTable, Scalar};
use crate::models::FeatureKind;

use std::path::PathBuf;
use uuid::Uuid;

/// Create a unique temporary directory for one test.
pub(crate) fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("expressionist-{}-{}", tag, Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn text_column(values: &[&str]) -> Column {
    Column::Scalar(values.iter().map(|v| Scalar::Text(v.to_string())).collect())
}

/// A small dataset: two genes, four samples, categorical phenotypes, one
/// precomputed differential table with an NA cell.
pub(crate) fn sample_dataset() -> Dataset {
    let transcript = |id: &str, gene_id: &str, gene: &str, chr: &str, strand: &str, start, end, num_exons| {
        Transcript {
            id: id.to_string(),
            gene_id: gene_id.to_string(),
            gene_name: gene.to_string(),
            chr: chr.to_string(),
            strand: strand.to_string(),
            start,
            end,
            num_exons,
        }
    };
    let feature = |kind, transcript_id: &str, gene: &str, chr: &str, strand: &str, start, end| {
        Feature {
            kind,
            transcript_id: transcript_id.to_string(),
            gene_name: gene.to_string(),
            chr: chr.to_string(),
            strand: strand.to_string(),
            start,
            end,
        }
    };

    let diff_results = ResultTable::new(
        vec![
            "id".to_string(),
            "fc".to_string(),
            "pval".to_string(),
            "qval".to_string(),
            "chr".to_string(),
            "start".to_string(),
            "end".to_string(),
            "strand".to_string(),
            "gene_id".to_string(),
            "gene_name".to_string(),
        ],
        vec![
            text_column(&["TX1", "TX2", "TX3"]),
            Column::Scalar(vec![
                Scalar::Float(3.0),
                Scalar::Float(1.2),
                Scalar::Float(0.25),
            ]),
            Column::Scalar(vec![
                Scalar::Float(0.01),
                Scalar::Float(0.2),
                Scalar::Float(0.03),
            ]),
            Column::Scalar(vec![
                Scalar::Float(0.02),
                Scalar::Float(0.3),
                Scalar::Float(0.04),
            ]),
            Column::Categorical {
                codes: vec![1, 1, 2],
                levels: vec!["chr12".to_string(), "chr9".to_string()],
            },
            Column::Scalar(vec![Scalar::Int(100), Scalar::Int(120), Scalar::Int(5000)]),
            Column::Scalar(vec![Scalar::Int(900), Scalar::Int(950), Scalar::Int(7000)]),
            Column::Categorical {
                codes: vec![1, 1, 2],
                levels: vec!["+".to_string(), "-".to_string()],
            },
            text_column(&["G1", "G1", "G2"]),
            Column::Scalar(vec![
                Scalar::Text("DUSP6".to_string()),
                Scalar::Text("DUSP6".to_string()),
                Scalar::Na,
            ]),
        ],
    );

    Dataset {
        transcripts: vec![
            transcript("TX1", "G1", "DUSP6", "chr12", "+", 100, 900, 3),
            transcript("TX2", "G1", "DUSP6", "chr12", "+", 120, 950, 4),
            transcript("TX3", "G2", "ABCA1", "chr9", "-", 5000, 7000, 2),
        ],
        features: vec![
            feature(FeatureKind::Exon, "TX1", "DUSP6", "chr12", "+", 100, 250),
            feature(FeatureKind::Exon, "TX1", "DUSP6", "chr12", "+", 400, 900),
            feature(FeatureKind::Intron, "TX1", "DUSP6", "chr12", "+", 251, 399),
            feature(FeatureKind::Exon, "TX3", "ABCA1", "chr9", "-", 5000, 7000),
        ],
        phenotypes: PhenoData {
            columns: vec![
                PhenoColumn {
                    name: "ids".to_string(),
                    values: text_column(&["trimmed_s1", "trimmed_s2", "trimmed_s3", "trimmed_s4"]),
                },
                PhenoColumn {
                    name: "tissue".to_string(),
                    values: Column::Categorical {
                        codes: vec![1, 1, 2, 2],
                        levels: vec!["liver".to_string(), "kidney".to_string()],
                    },
                },
                PhenoColumn {
                    name: "time_h".to_string(),
                    values: Column::Categorical {
                        codes: vec![1, 2, 1, 2],
                        levels: vec!["0".to_string(), "24".to_string()],
                    },
                },
                PhenoColumn {
                    name: "batch".to_string(),
                    values: Column::Scalar(vec![
                        Scalar::Int(1),
                        Scalar::Int(2),
                        Scalar::Na,
                        Scalar::Int(2),
                    ]),
                },
            ],
        },
        expression: ExpressionData {
            sample_ids: vec![
                "trimmed_s1".to_string(),
                "trimmed_s2".to_string(),
                "trimmed_s3".to_string(),
                "trimmed_s4".to_string(),
            ],
            fpkm: vec![
                vec![1.0, 2.0, 3.0, 4.0],
                vec![0.5, 0.5, 0.5, 0.5],
                vec![10.0, 10.0, 0.0, 0.0],
            ],
            cov: vec![
                vec![5.0, 6.0, 7.0, 8.0],
                vec![1.0, 1.0, 1.0, 1.0],
                vec![20.0, 20.0, 0.0, 0.0],
            ],
        },
        diff_expression: vec![DiffExpressionTable {
            covariate: "tissue".to_string(),
            feature: FeatureKind::Trans,
            results: diff_results,
        }],
    }
}

/// Write a data root with one bioproject directory and an experiment index.
pub(crate) fn write_project_tree(bioproject: &str) -> PathBuf {
    let root = temp_dir("data-root");
    let project_dir = root.join(bioproject);
    std::fs::create_dir_all(&project_dir).unwrap();
    let dataset = serde_json::to_string(&sample_dataset()).unwrap();
    std::fs::write(project_dir.join(DATASET_FILE), dataset).unwrap();

    let index = format!(
        r#"{{"projects": [{{"dataset": {{
            "bioproject_id": "{bioproject}", "size": 1048576, "genome": "GRCh38",
            "paper_id": "30000001", "platform": "Illumina HiSeq",
            "sample_ids": "s1\\ns2\\ns3\\ns4"
        }}}}]}}"#
    );
    std::fs::write(root.join(crate::projects::PROJECT_INDEX_FILE), index).unwrap();
    root
}
