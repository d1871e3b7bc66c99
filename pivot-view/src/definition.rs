//! FILENAME: pivot-view/src/definition.rs
//! Pivot View Definition - The serializable configuration.
//!
//! This module contains the types that DESCRIBE one render of the pivot
//! view: which value columns exist, how each is formatted, how dates are
//! rendered and how the table is presented. These structures are designed
//! to be:
//! - Serializable (they arrive from the hosting layer as JSON props)
//! - Immutable snapshots of one render pass
//!
//! There is no process-wide state anywhere in this crate: a `ViewConfig`
//! plus one markup string fully determines one `PivotTable`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Index into the leaf value-column sequence (0-based).
pub type ColumnIndex = usize;

/// The date format id that selects the granularity-keyed formatter.
pub const SMART_DATE_ID: &str = "smart_date";

// ============================================================================
// COLUMN IDENTIFIERS
// ============================================================================

/// A column identifier as delivered by the upstream layer.
///
/// Upstream sends either a flat name or a path (a list whose first element
/// is the canonical name); the engine always keys on the canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Name(String),
    Path(Vec<String>),
}

impl ColumnSpec {
    /// The canonical column name: the string itself, or the first path
    /// element. An empty path yields an empty name.
    pub fn name(&self) -> &str {
        match self {
            ColumnSpec::Name(s) => s,
            ColumnSpec::Path(p) => p.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(s: &str) -> Self {
        ColumnSpec::Name(s.to_string())
    }
}

// ============================================================================
// TIME GRANULARITY
// ============================================================================

/// Declared time grain of the temporal column, using the upstream
/// ISO-8601 duration codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeGranularity {
    #[serde(rename = "PT1S")]
    Second,
    #[serde(rename = "PT1M")]
    Minute,
    #[serde(rename = "PT1H")]
    Hour,
    #[serde(rename = "P1D")]
    Day,
    #[serde(rename = "P1W")]
    Week,
    #[serde(rename = "P1M")]
    Month,
    #[serde(rename = "P3M")]
    Quarter,
    #[serde(rename = "P1Y")]
    Year,
}

// ============================================================================
// MAIN CONFIG STRUCT
// ============================================================================

/// The complete configuration for one render of the pivot view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// The value-column identifier sequence, in leaf order.
    pub columns: Vec<ColumnSpec>,

    /// Per-column number format codes (column name -> format code).
    /// The camelCase aliases accept the upstream props verbatim.
    #[serde(default, alias = "columnFormats")]
    pub column_formats: HashMap<String, String>,

    /// Default number format code, used when a column has none.
    #[serde(default = "default_number_format", alias = "numberFormat")]
    pub number_format: String,

    /// Verbose labels for header cells (raw identifier -> human label).
    #[serde(default, alias = "verboseMap")]
    pub verbose_map: HashMap<String, String>,

    /// Explicit date format pattern, or [`SMART_DATE_ID`] to select the
    /// granularity-keyed formatter.
    #[serde(default, alias = "dateFormat")]
    pub date_format: Option<String>,

    /// Declared time grain for the granularity-keyed date formatter.
    #[serde(default)]
    pub granularity: Option<TimeGranularity>,

    /// Number of grouping levels. Exactly one selects the fixed-header
    /// presentation; anything else gets a plain scroll container.
    #[serde(alias = "numGroups")]
    pub num_groups: usize,

    /// Target pixel height of the scroll region.
    pub height: u32,
}

fn default_number_format() -> String {
    ".3s".to_string()
}

impl ViewConfig {
    /// Creates a configuration with the given value columns and default
    /// presentation settings.
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        ViewConfig {
            columns,
            column_formats: HashMap::new(),
            number_format: default_number_format(),
            verbose_map: HashMap::new(),
            date_format: None,
            granularity: None,
            num_groups: 1,
            height: 400,
        }
    }

    /// Resolves a raw header text to a value-column index, if the text
    /// names a known column.
    pub fn column_index(&self, raw_header: &str) -> Option<ColumnIndex> {
        self.columns.iter().position(|c| c.name() == raw_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_spec_name_extraction() {
        let flat = ColumnSpec::Name("sales".to_string());
        let nested = ColumnSpec::Path(vec!["sales".to_string(), "SUM".to_string()]);
        let empty = ColumnSpec::Path(vec![]);
        assert_eq!(flat.name(), "sales");
        assert_eq!(nested.name(), "sales");
        assert_eq!(empty.name(), "");
    }

    #[test]
    fn test_config_deserializes_from_props_json() {
        let json = r#"{
            "columns": ["count", ["sales", "SUM"]],
            "columnFormats": {"sales": ",.2f"},
            "numGroups": 1,
            "height": 400
        }"#;
        let config: ViewConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.columns.len(), 2);
        assert_eq!(config.columns[1].name(), "sales");
        assert_eq!(config.number_format, ".3s");
        assert_eq!(config.column_formats["sales"], ",.2f");
    }

    #[test]
    fn test_granularity_codes() {
        let g: TimeGranularity = serde_json::from_str("\"P1D\"").unwrap();
        assert_eq!(g, TimeGranularity::Day);
        assert_eq!(serde_json::to_string(&TimeGranularity::Quarter).unwrap(), "\"P3M\"");
    }

    #[test]
    fn test_column_index_lookup() {
        let config = ViewConfig::new(vec!["count".into(), "sales".into()]);
        assert_eq!(config.column_index("sales"), Some(1));
        assert_eq!(config.column_index("missing"), None);
    }
}
