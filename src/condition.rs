//! Condition filter expressions.
//!
//! Search requests carry a bounded list of (field, value) pairs which are
//! compiled into the conjunctive equality expression understood by the
//! analysis engine, e.g. `tissue=='liver' & time_h=='24'`.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum number of condition slots accepted per request.
pub const MAX_CONDITION_SLOTS: usize = 5;

/// Sentinel field or value meaning "no restriction".
pub const ALL_SENTINEL: &str = "ALL";

/// One (field, value) equality restriction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Phenotype column to restrict.
    #[validate(length(min = 1, message = "condition field must not be empty"))]
    pub field: String,
    /// Required value for that column.
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Compile an ordered condition list into an engine filter expression.
///
/// Slots beyond [MAX_CONDITION_SLOTS] and slots whose field is the `ALL`
/// sentinel are skipped entirely. An empty result string means an
/// unfiltered query; no error is raised for malformed input.
pub fn build_expression(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .take(MAX_CONDITION_SLOTS)
        .filter(|condition| condition.field != ALL_SENTINEL)
        .map(|condition| format!("{}=='{}'", condition.field, condition.value))
        .collect::<Vec<_>>()
        .join(" & ")
}
