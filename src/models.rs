//! Request data types and associated validation.

use crate::condition::{Condition, ALL_SENTINEL};

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::Display;
use validator::{Validate, ValidationError};

/// Default pagination window size.
fn default_limit() -> usize {
    10
}

/// Kinds of genomic feature that can be searched.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeatureKind {
    Exon,
    Intron,
    Trans,
}

/// Expression measures exposed by the engine.
///
/// `ALL` is the UI's "no preference" entry and resolves to FPKM.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq)]
pub enum Measure {
    #[serde(rename = "ALL")]
    #[strum(serialize = "ALL")]
    All,
    #[serde(rename = "FPKM")]
    #[strum(serialize = "FPKM")]
    Fpkm,
    #[serde(rename = "Cov")]
    #[strum(serialize = "Cov")]
    Cov,
}

/// A statistical threshold parameter.
///
/// The UI sends either a number (possibly stringified) or the `"ALL"`
/// sentinel; the sentinel resolves to the executor's default.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Threshold {
    #[default]
    All,
    Value(f64),
}

impl Threshold {
    /// The effective value, substituting `default` for the sentinel.
    pub fn resolve(self, default: f64) -> f64 {
        match self {
            Threshold::All => default,
            Threshold::Value(value) => value,
        }
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Threshold::Value(value)),
            Raw::Text(text) if text == ALL_SENTINEL => Ok(Threshold::All),
            Raw::Text(text) => text.parse().map(Threshold::Value).map_err(|_| {
                serde::de::Error::custom(format!(
                    "invalid threshold {text:?}, expected a number or \"ALL\""
                ))
            }),
        }
    }
}

/// Validate that a bioproject id is a plain directory name.
pub fn validate_bioproject(bioproject: &str) -> Result<(), ValidationError> {
    if bioproject.contains(['/', '\\']) || bioproject.contains("..") {
        return Err(ValidationError::new(
            "bioproject must be a plain directory name",
        ));
    }
    Ok(())
}

/// Request data for the gene expression search.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct GeneSearchRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    /// Gene symbol. The UI still posts this under its historical key.
    #[serde(alias = "gene_name_sy")]
    #[validate(length(min = 1, message = "gene must not be empty"))]
    pub gene: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Request data for the transcript structure search.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct TranscriptSearchRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    #[serde(alias = "transcript_name_sy")]
    #[validate(length(min = 1, message = "transcript must not be empty"))]
    pub transcript: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Request data for the per-feature search.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeatureSearchRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    #[serde(alias = "gene_name_sy")]
    #[validate(length(min = 1, message = "gene must not be empty"))]
    pub gene: String,
    pub feature: FeatureKind,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Request data for the condition-filtered expression search.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConditionSearchRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    #[serde(alias = "gene_name_sy")]
    #[validate(length(min = 1, message = "gene must not be empty"))]
    pub gene: String,
    /// Bounded ordered condition list; `ALL` slots are skipped.
    #[serde(default)]
    #[validate]
    #[validate(length(max = 5, message = "at most 5 conditions"))]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Request data for the differential-fold-expression search.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct DiffFoldExprRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    pub feature: FeatureKind,
    #[validate(length(min = 1, message = "covariate must not be empty"))]
    pub covariate: String,
    #[serde(default)]
    #[validate]
    #[validate(length(max = 5, message = "at most 5 conditions"))]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub covariance: Threshold,
    #[serde(default)]
    pub pvalue: Threshold,
    #[serde(default)]
    pub qvalue: Threshold,
    #[serde(default)]
    pub min_fold_change: Threshold,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Request data for the grouped gene expression plot.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct GenePlotRequest {
    #[validate(
        length(min = 1, message = "bioproject must not be empty"),
        custom = "validate_bioproject"
    )]
    pub bioproject: String,
    #[serde(alias = "gene_name_sy")]
    #[validate(length(min = 1, message = "gene must not be empty"))]
    pub gene: String,
    pub measure: Measure,
    #[validate(length(min = 1, message = "covariate must not be empty"))]
    pub covariate: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{assert_de_tokens, Token};

    #[test]
    fn test_gene_search_required_fields() {
        let json = r#"{"bioproject": "PRJNA100", "gene": "DUSP6"}"#;
        let request = serde_json::from_str::<GeneSearchRequest>(json).unwrap();
        assert_eq!(request.bioproject, "PRJNA100");
        assert_eq!(request.gene, "DUSP6");
        assert_eq!(request.offset, 0);
        assert_eq!(request.limit, 10);
        request.validate().unwrap();
    }

    #[test]
    fn test_gene_search_historical_alias() {
        let json =
            r#"{"bioproject": "PRJNA100", "gene_name_sy": "DUSP6", "offset": 5, "limit": 3}"#;
        let request = serde_json::from_str::<GeneSearchRequest>(json).unwrap();
        assert_eq!(request.gene, "DUSP6");
        assert_eq!(request.offset, 5);
        assert_eq!(request.limit, 3);
    }

    #[test]
    #[should_panic(expected = "bioproject must not be empty")]
    fn test_empty_bioproject() {
        let json = r#"{"bioproject": "", "gene": "DUSP6"}"#;
        let request = serde_json::from_str::<GeneSearchRequest>(json).unwrap();
        request.validate().unwrap();
    }

    #[test]
    #[should_panic(expected = "bioproject must be a plain directory name")]
    fn test_bioproject_path_traversal() {
        let json = r#"{"bioproject": "../etc", "gene": "DUSP6"}"#;
        let request = serde_json::from_str::<GeneSearchRequest>(json).unwrap();
        request.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"bioproject": "PRJNA100", "gene": "DUSP6", "frobnicate": 1}"#;
        let error = serde_json::from_str::<GeneSearchRequest>(json).unwrap_err();
        assert!(error.to_string().contains("unknown field `frobnicate`"));
    }

    #[test]
    fn test_feature_kind_values() {
        let json = r#"{"bioproject": "PRJNA100", "gene": "DUSP6", "feature": "exon"}"#;
        let request = serde_json::from_str::<FeatureSearchRequest>(json).unwrap();
        assert_eq!(request.feature, FeatureKind::Exon);
        assert_eq!(request.feature.to_string(), "exon");

        let json = r#"{"bioproject": "PRJNA100", "gene": "DUSP6", "feature": "genome"}"#;
        let error = serde_json::from_str::<FeatureSearchRequest>(json).unwrap_err();
        assert!(error
            .to_string()
            .contains("expected one of `exon`, `intron`, `trans`"));
    }

    #[test]
    fn test_condition_request_defaults() {
        let json = r#"{"bioproject": "PRJNA100", "gene": "DUSP6"}"#;
        let request = serde_json::from_str::<ConditionSearchRequest>(json).unwrap();
        assert!(request.conditions.is_empty());
        request.validate().unwrap();
    }

    #[test]
    fn test_condition_request_parses_slots() {
        let json = r#"{
            "bioproject": "PRJNA100",
            "gene": "DUSP6",
            "conditions": [
                {"field": "tissue", "value": "liver"},
                {"field": "ALL", "value": "x"}
            ]
        }"#;
        let request = serde_json::from_str::<ConditionSearchRequest>(json).unwrap();
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(request.conditions[0], Condition::new("tissue", "liver"));
        request.validate().unwrap();
    }

    #[test]
    #[should_panic(expected = "at most 5 conditions")]
    fn test_condition_slots_bounded() {
        let conditions: Vec<String> = (0..6)
            .map(|i| format!(r#"{{"field": "f{i}", "value": "v"}}"#))
            .collect();
        let json = format!(
            r#"{{"bioproject": "PRJNA100", "gene": "DUSP6", "conditions": [{}]}}"#,
            conditions.join(",")
        );
        let request = serde_json::from_str::<ConditionSearchRequest>(&json).unwrap();
        request.validate().unwrap();
    }

    #[test]
    fn test_threshold_accepts_number_and_sentinel() {
        assert_de_tokens(&Threshold::Value(0.05), &[Token::F64(0.05)]);
        assert_de_tokens(&Threshold::All, &[Token::Str("ALL")]);
        // The UI also sends stringified numbers.
        let threshold: Threshold = serde_json::from_str(r#""0.01""#).unwrap();
        assert_eq!(threshold, Threshold::Value(0.01));
        assert!(serde_json::from_str::<Threshold>(r#""high""#).is_err());
    }

    #[test]
    fn test_threshold_resolution() {
        assert_eq!(Threshold::All.resolve(0.05), 0.05);
        assert_eq!(Threshold::Value(0.2).resolve(0.05), 0.2);
    }

    #[test]
    fn test_diff_fold_expr_defaults() {
        let json = r#"{"bioproject": "PRJNA100", "feature": "trans", "covariate": "tissue"}"#;
        let request = serde_json::from_str::<DiffFoldExprRequest>(json).unwrap();
        assert_eq!(request.pvalue, Threshold::All);
        assert_eq!(request.qvalue, Threshold::All);
        assert_eq!(request.min_fold_change, Threshold::All);
        assert_eq!(request.covariance, Threshold::All);
        request.validate().unwrap();
    }

    #[test]
    fn test_diff_fold_expr_thresholds() {
        let json = r#"{
            "bioproject": "PRJNA100",
            "feature": "trans",
            "covariate": "tissue",
            "pvalue": 0.01,
            "qvalue": "ALL",
            "min_fold_change": "4"
        }"#;
        let request = serde_json::from_str::<DiffFoldExprRequest>(json).unwrap();
        assert_eq!(request.pvalue, Threshold::Value(0.01));
        assert_eq!(request.qvalue, Threshold::All);
        assert_eq!(request.min_fold_change, Threshold::Value(4.0));
    }

    #[test]
    fn test_measure_values() {
        let json = r#"{"bioproject": "P", "gene": "G", "measure": "FPKM", "covariate": "tissue"}"#;
        let request = serde_json::from_str::<GenePlotRequest>(json).unwrap();
        assert_eq!(request.measure, Measure::Fpkm);
        assert_eq!(request.measure.to_string(), "FPKM");

        let json = r#"{"bioproject": "P", "gene": "G", "measure": "ALL", "covariate": "tissue"}"#;
        let request = serde_json::from_str::<GenePlotRequest>(json).unwrap();
        assert_eq!(request.measure, Measure::All);
    }
}
