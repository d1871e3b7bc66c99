//! FILENAME: markup/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("no <table> element found in markup")]
    NoTable,
}
