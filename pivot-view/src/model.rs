//! FILENAME: pivot-view/src/model.rs
//! Pivot View Model - The parsed, formatted representation of one table.
//!
//! This module turns the raw row structure from the `markup` crate into
//! the logical model the engine computes over: formatted cells, resolved
//! column kinds, and row groups discovered from the label span
//! annotations. The model is built once per render and is immutable
//! afterwards; re-sorting never mutates it, it only produces new
//! orderings over it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use markup::{RawCellKind, RawRow, RawTable};

use crate::definition::{ColumnIndex, ViewConfig};
use crate::format::{parse_timestamp_marker, CellFormatter, SortKey};

// ============================================================================
// CELLS AND ROWS
// ============================================================================

/// A formatted value cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Original text as delivered by the query layer.
    pub raw: String,
    /// Display text after formatting.
    pub display: String,
    /// Ordering key, independent of the display text.
    pub sort_key: SortKey,
}

/// A row-leading label cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCell {
    pub raw: String,
    pub display: String,
    /// How many rows this label visually covers. Absent on continuation
    /// labels and on rows that do not lead a group.
    pub span: Option<u32>,
}

/// Label cells per row are almost always 1-2 entries.
pub type LabelList = SmallVec<[LabelCell; 2]>;

/// One logical body row: label cells (possibly empty on continuation
/// rows) followed by value cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub labels: LabelList,
    pub values: Vec<Cell>,
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Resolved content kind of a value column. Detected once during parse
/// from the first non-empty cell, instead of re-sniffing per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Plain,
    Numeric,
    Temporal,
}

/// A value column with its resolved kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

/// A header cell with its column resolution attached at construction,
/// so activating a header never re-matches display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCell {
    /// Original header text (pre-formatting).
    pub raw: String,
    /// Display text (verbose label or formatted date).
    pub display: String,
    /// The value column this header names, if any. `None` headers are
    /// inert: activating them is a no-op.
    pub column: Option<ColumnIndex>,
}

// ============================================================================
// GROUPS
// ============================================================================

/// A contiguous run of rows sharing one leading label.
///
/// The row set and internal order are fixed at parse time; only the
/// group's position among its siblings changes on re-sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowGroup {
    pub rows: Vec<Row>,
    /// Per-column numeric subtotals (column index -> sum). Populated by
    /// the engine's aggregation pass.
    pub subtotals: FxHashMap<ColumnIndex, i64>,
    /// The synthetic subtotal row appended after the member rows.
    pub subtotal_row: Row,
}

impl RowGroup {
    pub fn new(rows: Vec<Row>) -> Self {
        RowGroup {
            rows,
            subtotals: FxHashMap::default(),
            subtotal_row: Row {
                labels: LabelList::new(),
                values: Vec::new(),
            },
        }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }
}

// ============================================================================
// WARNINGS
// ============================================================================

/// Non-fatal structural problems found during parse. The model degrades
/// rather than failing; these make the degradation observable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseWarning {
    #[error("label span {span} declared at body row {row} overruns the row sequence")]
    SpanOverrun { row: usize, span: u32 },

    #[error("continuation row {row} found where a group leader was expected")]
    UnexpectedContinuation { row: usize },
}

// ============================================================================
// TABLE MODEL
// ============================================================================

/// The complete parsed table: header cells, value columns, and row
/// groups in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableModel {
    pub columns: Vec<ColumnInfo>,
    /// Header rows (usually one), each a sequence of resolved cells.
    pub header_rows: Vec<Vec<HeaderCell>>,
    /// Groups in original source order. This order is the tie-break
    /// baseline for every re-sort.
    pub groups: Vec<RowGroup>,
    pub warnings: Vec<ParseWarning>,
    /// Body row count before subtotal injection.
    pub source_row_count: usize,
}

impl TableModel {
    /// Number of label cells on a full (group-leading) row.
    pub fn full_label_count(&self) -> usize {
        self.groups
            .first()
            .and_then(|g| g.rows.first())
            .map(|r| r.labels.len())
            .unwrap_or(0)
    }

    /// Flat iterator over header cells in document order.
    pub fn header_cells(&self) -> impl Iterator<Item = &HeaderCell> {
        self.header_rows.iter().flatten()
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parses a raw table into the logical model: formats every cell,
/// resolves column kinds and header indices, and discovers row groups
/// from the label span annotations.
pub fn parse(raw: &RawTable, config: &ViewConfig) -> TableModel {
    let formatter = CellFormatter::new(config);

    let header_rows = raw
        .header_rows
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|cell| HeaderCell {
                    raw: cell.text.clone(),
                    display: formatter.format_label(&cell.text),
                    column: config.column_index(&cell.text),
                })
                .collect()
        })
        .collect();

    let rows: Vec<Row> = raw
        .body_rows
        .iter()
        .map(|row| build_row(row, &formatter))
        .collect();

    let columns = resolve_columns(&rows, config);

    let mut warnings = Vec::new();
    let groups = discover_groups(rows, &mut warnings);
    for warning in &warnings {
        log::warn!("table structure degraded: {}", warning);
    }

    TableModel {
        columns,
        header_rows,
        source_row_count: groups.iter().map(RowGroup::size).sum(),
        groups,
        warnings,
    }
}

fn build_row(raw: &RawRow, formatter: &CellFormatter) -> Row {
    let mut labels = LabelList::new();
    let mut values = Vec::new();
    for cell in &raw.cells {
        match cell.kind {
            RawCellKind::Label => labels.push(LabelCell {
                raw: cell.text.clone(),
                display: formatter.format_label(&cell.text),
                span: cell.row_span,
            }),
            RawCellKind::Value => {
                let formatted = formatter.format_value(values.len(), &cell.text);
                values.push(Cell {
                    raw: cell.text.clone(),
                    display: formatted.display,
                    sort_key: formatted.sort_key,
                });
            }
        }
    }
    Row { labels, values }
}

/// Resolves each value column's kind from the first non-empty cell.
fn resolve_columns(rows: &[Row], config: &ViewConfig) -> Vec<ColumnInfo> {
    let width = rows.iter().map(|r| r.values.len()).max().unwrap_or(0);
    let width = width.max(config.columns.len());

    (0..width)
        .map(|col| {
            let kind = rows
                .iter()
                .filter_map(|r| r.values.get(col))
                .find(|cell| !cell.raw.trim().is_empty())
                .map(|cell| {
                    let raw = cell.raw.trim();
                    if parse_timestamp_marker(raw).is_some() {
                        ColumnKind::Temporal
                    } else if raw.parse::<f64>().is_ok() {
                        ColumnKind::Numeric
                    } else {
                        ColumnKind::Plain
                    }
                })
                .unwrap_or(ColumnKind::Plain);

            ColumnInfo {
                name: config
                    .columns
                    .get(col)
                    .map(|c| c.name().to_string())
                    .unwrap_or_default(),
                kind,
            }
        })
        .collect()
}

/// Discovers row groups by scanning for group leader rows.
///
/// The first body row's label count is the "full" count. A full row
/// whose first label declares a span leads a group of that many rows; a
/// full row without a span is a singleton group. Rows with fewer labels
/// are continuation members and are consumed by their leader, never
/// scanned independently. Structural violations degrade to a single
/// trailing group.
fn discover_groups(rows: Vec<Row>, warnings: &mut Vec<ParseWarning>) -> Vec<RowGroup> {
    let full_count = match rows.first() {
        Some(row) => row.labels.len(),
        None => return Vec::new(),
    };

    let total = rows.len();
    let mut groups = Vec::new();
    let mut rows = rows.into_iter().enumerate().peekable();

    while let Some(&(index, ref row)) = rows.peek() {
        if row.labels.len() < full_count {
            // A continuation row with no open group: upstream contract
            // violation. Sweep everything left into one final group.
            warnings.push(ParseWarning::UnexpectedContinuation { row: index });
            groups.push(RowGroup::new(rows.map(|(_, r)| r).collect()));
            break;
        }

        let span = row.labels.first().and_then(|l| l.span).unwrap_or(1) as usize;
        if index + span > total {
            warnings.push(ParseWarning::SpanOverrun {
                row: index,
                span: span as u32,
            });
            groups.push(RowGroup::new(rows.map(|(_, r)| r).collect()));
            break;
        }

        let members: Vec<Row> = rows.by_ref().take(span).map(|(_, r)| r).collect();
        groups.push(RowGroup::new(members));
    }

    groups
}
