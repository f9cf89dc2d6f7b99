//! Rendering engine result tables for the UI.
//!
//! The assembler turns one [ResultTable] into the paginated row/column JSON
//! the front end consumes; the normalizer maps individual cells and column
//! names. Rows outside the requested window are never normalized, which
//! bounds the cost of deep offsets into large tables.

use crate::engine::{Column, ResultTable};
use crate::widgets::TextCell;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display text substituted for not-available cells.
pub const NOT_AVAILABLE: &str = "N/A";

/// Upstream file-naming artifact stripped from column and sample names.
const STRIPPED_PREFIX: &str = "trimmed_";

/// One rendered row: normalized column name to a one-element text-cell list.
pub type RowDict = BTreeMap<String, Vec<TextCell>>;

/// The filter widget attached to every column.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FilterWidget {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    pub title: String,
    pub placeholder: String,
    pub operators: String,
    pub chosen_value: String,
}

/// The filter block of a column descriptor.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FilterSet {
    pub title: String,
    pub list: Vec<FilterWidget>,
}

/// Header metadata for one rendered column.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub label: String,
    pub title: String,
    pub tooltip: String,
    pub filters: FilterSet,
}

impl ColumnDescriptor {
    /// The standard descriptor for a normalized column name: label, title and
    /// widget key all equal the name, with a fixed `LIKE` select filter.
    pub fn for_column(name: &str) -> Self {
        Self {
            label: name.to_string(),
            title: name.to_string(),
            tooltip: name.to_string(),
            filters: FilterSet {
                title: format!("{} filters:", name),
                list: vec![FilterWidget {
                    kind: "select".to_string(),
                    key: name.to_string(),
                    title: format!("Select a {}:", name),
                    placeholder: String::new(),
                    operators: "LIKE".to_string(),
                    chosen_value: String::new(),
                }],
            },
        }
    }
}

/// The column section of a rendered table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableStructure {
    pub field_list: Vec<ColumnDescriptor>,
}

/// The paginated table contract with the UI.
///
/// `total` is the engine-reported row count, not the number of rows actually
/// returned; `hits` holds only the requested window.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RenderedTable {
    pub structure: TableStructure,
    pub total: usize,
    pub hits: Vec<RowDict>,
}

/// The canonical empty table, returned for the engine's no-result sentinel.
pub fn empty_table() -> RenderedTable {
    RenderedTable {
        structure: TableStructure { field_list: vec![] },
        total: 0,
        hits: vec![],
    }
}

/// Strip every occurrence of the upstream prefix artifact from a name.
///
/// Removal can splice a new occurrence together, so repeat until none
/// remains; the result is a fixed point of this function.
pub fn normalize_name(name: &str) -> String {
    let mut name = name.to_string();
    while name.contains(STRIPPED_PREFIX) {
        name = name.replace(STRIPPED_PREFIX, "");
    }
    name
}

/// Normalize one engine row into its fixed widget shape.
///
/// Every cell, scalar or categorical, becomes exactly one black text widget
/// in a one-element list; not-available cells render as [NOT_AVAILABLE].
pub fn normalize_row(table: &ResultTable, row: usize) -> RowDict {
    table
        .names
        .iter()
        .zip(&table.columns)
        .map(|(name, column): (&String, &Column)| {
            let value = column
                .resolve(row)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            (normalize_name(name), vec![TextCell::new(value)])
        })
        .collect()
}

/// Render a window of an engine result.
///
/// `None` is the engine's explicit no-result sentinel and renders as the
/// canonical empty table. Rows before `offset` are skipped and iteration
/// stops as soon as `limit` rows have been collected.
pub fn render(table: Option<&ResultTable>, offset: usize, limit: usize) -> RenderedTable {
    let Some(table) = table else {
        return empty_table();
    };
    let total = table.nrow();

    let mut hits = Vec::new();
    for row in 0..total {
        if row < offset {
            continue;
        }
        if hits.len() >= limit {
            break;
        }
        hits.push(normalize_row(table, row));
    }

    let field_list = table
        .names
        .iter()
        .map(|name| ColumnDescriptor::for_column(&normalize_name(name)))
        .collect();

    RenderedTable {
        structure: TableStructure { field_list },
        total,
        hits,
    }
}

/// Render a window, then stably reorder the header by a preferential column
/// ordering: listed names first in list order, unlisted columns after in
/// their original relative order.
pub fn render_ordered(
    table: Option<&ResultTable>,
    offset: usize,
    limit: usize,
    preferred: &[&str],
) -> RenderedTable {
    let mut rendered = render(table, offset, limit);
    rendered.structure.field_list.sort_by_key(|descriptor| {
        preferred
            .iter()
            .position(|name| *name == descriptor.label)
            .unwrap_or(usize::MAX)
    });
    rendered
}
