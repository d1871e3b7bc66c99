//! FILENAME: markup/src/lib.rs
//! PURPOSE: Main library entry point for the markup reading crate.
//! CONTEXT: The boundary between the raw table markup delivered by the
//! upstream query layer and the structured rows the pivot view engine
//! consumes. Re-exports the reader types and the error enum.

pub mod error;
pub mod reader;

pub use error::MarkupError;
pub use reader::{read_table, RawCell, RawCellKind, RawRow, RawTable};
