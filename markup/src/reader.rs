//! FILENAME: markup/src/reader.rs
//! PURPOSE: Streaming reader for raw pivot table markup.
//! CONTEXT: The upstream query layer delivers its result as a string of
//! markup containing a single table element (header section + body rows).
//! This module walks that markup with quick-xml and reconstructs the row
//! and cell structure, including the rowspan annotations that mark group
//! leader rows. No interpretation happens here: that is the engine's job.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MarkupError;

/// What kind of cell a raw cell is.
/// Label cells (`th`) carry group labels; value cells (`td`) carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCellKind {
    Label,
    Value,
}

/// A single cell as read from the markup.
#[derive(Debug, Clone)]
pub struct RawCell {
    pub kind: RawCellKind,
    /// Concatenated, entity-unescaped text content.
    pub text: String,
    /// Decoded `rowspan` attribute, if present and >= 1.
    pub row_span: Option<u32>,
}

impl RawCell {
    pub fn label(text: impl Into<String>) -> Self {
        RawCell {
            kind: RawCellKind::Label,
            text: text.into(),
            row_span: None,
        }
    }

    pub fn label_spanning(text: impl Into<String>, span: u32) -> Self {
        RawCell {
            kind: RawCellKind::Label,
            text: text.into(),
            row_span: Some(span),
        }
    }

    pub fn value(text: impl Into<String>) -> Self {
        RawCell {
            kind: RawCellKind::Value,
            text: text.into(),
            row_span: None,
        }
    }
}

/// A row of raw cells, in document order.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn new(cells: Vec<RawCell>) -> Self {
        RawRow { cells }
    }
}

/// The structured result of reading one table element.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Rows found inside the header section.
    pub header_rows: Vec<RawRow>,
    /// Rows found in the body (inside `tbody`, or directly under `table`).
    pub body_rows: Vec<RawRow>,
}

/// Reads the first table element out of a markup string.
///
/// Tolerances: unknown elements inside cells contribute their text to the
/// cell; a malformed or missing `rowspan` value is treated as absent;
/// content outside the table is skipped. A document without any table
/// element is an error.
pub fn read_table(input: &str) -> Result<RawTable, MarkupError> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);
    // Query layers emit HTML-flavored markup; do not insist on
    // strictly matched end tags.
    reader.check_end_names(false);

    let mut table = RawTable::default();
    let mut seen_table = false;
    let mut in_table = false;
    let mut in_header = false;
    let mut row: Option<RawRow> = None;
    let mut cell: Option<RawCell> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().into_inner() {
                b"table" if !seen_table => {
                    seen_table = true;
                    in_table = true;
                }
                b"thead" if in_table => in_header = true,
                b"tbody" if in_table => in_header = false,
                b"tr" if in_table => row = Some(RawRow::default()),
                b"th" if row.is_some() => {
                    cell = Some(open_cell(RawCellKind::Label, &e)?);
                }
                b"td" if row.is_some() => {
                    cell = Some(open_cell(RawCellKind::Value, &e)?);
                }
                _ => {}
            },
            Event::Empty(e) if row.is_some() => match e.local_name().into_inner() {
                // Self-closing cells are legal and empty.
                b"th" => push_cell(&mut row, open_cell(RawCellKind::Label, &e)?),
                b"td" => push_cell(&mut row, open_cell(RawCellKind::Value, &e)?),
                _ => {}
            },
            Event::End(e) => match e.local_name().into_inner() {
                b"table" if in_table => {
                    in_table = false;
                    break;
                }
                b"thead" => in_header = false,
                b"tr" if in_table => {
                    if let Some(r) = row.take() {
                        if in_header {
                            table.header_rows.push(r);
                        } else {
                            table.body_rows.push(r);
                        }
                    }
                }
                b"th" | b"td" => {
                    if let Some(c) = cell.take() {
                        push_cell(&mut row, c);
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(c) = cell.as_mut() {
                    c.text.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_table {
        return Err(MarkupError::NoTable);
    }
    Ok(table)
}

fn push_cell(row: &mut Option<RawRow>, mut cell: RawCell) {
    cell.text = cell.text.trim().to_string();
    if let Some(r) = row.as_mut() {
        r.cells.push(cell);
    }
}

fn open_cell(kind: RawCellKind, e: &BytesStart<'_>) -> Result<RawCell, MarkupError> {
    let mut span = None;
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref().eq_ignore_ascii_case(b"rowspan") {
            // A rowspan that does not decode to a count >= 1 is ignored.
            span = attr
                .unescape_value()?
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1);
        }
    }
    Ok(RawCell {
        kind,
        text: String::new(),
        row_span: span,
    })
}
