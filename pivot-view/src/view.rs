//! FILENAME: pivot-view/src/view.rs
//! Pivot View - Renderable output for the frontend.
//!
//! This module defines the structures the hosting layer renders: the
//! rebuilt body rows with corrected label spans and injected subtotal
//! rows, the header cells with their pre-resolved column indices, and
//! the scroll presentation handed to the external fixed-header plugin.
//! Cells are constructed directly as values; no markup strings are
//! built or re-parsed anywhere.

use serde::{Deserialize, Serialize};

use crate::format::SortKey;
use crate::model::{HeaderCell, ParseWarning};

// ============================================================================
// BODY ROWS
// ============================================================================

/// The role of a row in the rebuilt body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewRowKind {
    /// First row of a group, carrying the shared label cell.
    Leader,
    /// Continuation member of a group.
    Member,
    /// Synthetic per-group subtotal row.
    Subtotal,
}

/// A single cell in the rebuilt body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewCell {
    /// Display text.
    pub text: String,
    /// Ordering key carried alongside the display text (the `data-sort`
    /// analog). Present on value cells only.
    pub sort_key: Option<SortKey>,
    /// Whether this is a label cell (`th`) rather than a value cell.
    pub is_label: bool,
    /// How many body rows this cell visually covers.
    pub row_span: u32,
}

impl ViewCell {
    pub fn label(text: impl Into<String>, row_span: u32) -> Self {
        ViewCell {
            text: text.into(),
            sort_key: None,
            is_label: true,
            row_span,
        }
    }

    pub fn value(text: impl Into<String>, sort_key: SortKey) -> Self {
        ViewCell {
            text: text.into(),
            sort_key: Some(sort_key),
            is_label: false,
            row_span: 1,
        }
    }
}

/// A row of the rebuilt body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    pub kind: ViewRowKind,
    pub cells: Vec<ViewCell>,
}

// ============================================================================
// SCROLL PRESENTATION
// ============================================================================

/// Configuration handed to the external fixed-header/scroll plugin when
/// the table has exactly one grouping level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedHeaderOptions {
    pub paging: bool,
    pub searching: bool,
    pub info: bool,
    /// Vertical scroll region height in pixels.
    pub scroll_y: u32,
    pub scroll_collapse: bool,
    pub scroll_x: bool,
    /// Default ordering column, counted from the end (-1 = last column).
    pub order_column: i32,
    pub order_descending: bool,
}

impl FixedHeaderOptions {
    pub fn for_height(height: u32) -> Self {
        FixedHeaderOptions {
            paging: false,
            searching: false,
            info: false,
            scroll_y: height,
            scroll_collapse: true,
            scroll_x: true,
            order_column: -1,
            order_descending: true,
        }
    }
}

/// How the rendered table is presented by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollMode {
    /// One grouping level: the external plugin owns scrolling and keeps
    /// the header fixed.
    FixedHeader(FixedHeaderOptions),
    /// More than one grouping level: a plain scrollable container with
    /// an explicit pixel height; the header is not fixed.
    PlainScroll { height: u32 },
}

impl ScrollMode {
    pub fn for_config(num_groups: usize, height: u32) -> Self {
        if num_groups == 1 {
            ScrollMode::FixedHeader(FixedHeaderOptions::for_height(height))
        } else {
            ScrollMode::PlainScroll { height: height + 10 }
        }
    }
}

// ============================================================================
// MAIN VIEW STRUCT
// ============================================================================

/// One complete rendered presentation of the table. Replaces the
/// container content in full; rebuilt from the base model on every sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotView {
    /// Header rows with pre-resolved column indices.
    pub header_rows: Vec<Vec<HeaderCell>>,
    /// Body rows in presentation order.
    pub body: Vec<ViewRow>,
    /// Scroll/fixed-header presentation for the host.
    pub scroll: ScrollMode,
    /// The value column this view is ordered by.
    pub sorted_by: usize,
    /// Structural warnings surfaced from parse.
    pub warnings: Vec<ParseWarning>,
}

impl PivotView {
    /// Total number of body rows (members plus subtotals).
    pub fn body_row_count(&self) -> usize {
        self.body.len()
    }

    /// Sum of the leader label spans, covering members and subtotals.
    pub fn label_span_sum(&self) -> u32 {
        self.body
            .iter()
            .filter(|row| row.kind == ViewRowKind::Leader)
            .filter_map(|row| row.cells.iter().find(|c| c.is_label))
            .map(|cell| cell.row_span)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_mode_selection() {
        match ScrollMode::for_config(1, 400) {
            ScrollMode::FixedHeader(options) => {
                assert!(!options.paging);
                assert!(!options.searching);
                assert!(!options.info);
                assert_eq!(options.scroll_y, 400);
                assert!(options.scroll_x);
                assert_eq!(options.order_column, -1);
                assert!(options.order_descending);
            }
            other => panic!("expected fixed header, got {:?}", other),
        }

        assert_eq!(
            ScrollMode::for_config(2, 400),
            ScrollMode::PlainScroll { height: 410 }
        );
    }
}
