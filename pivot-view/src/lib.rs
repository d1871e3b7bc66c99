//! FILENAME: pivot-view/src/lib.rs
//! Grouped-row pivot view engine.
//!
//! This crate turns a server-produced pivot table (raw markup plus
//! column metadata) into an interactive, re-sortable, subtotaled view.
//! It depends on `markup` only for the raw row structure.
//!
//! Layers:
//! - `definition`: Serializable configuration (what one render IS)
//! - `format`: Cell value formatting (display text + sort key)
//! - `model`: Parsed table, group discovery (WHAT we compute over)
//! - `engine`: Aggregation and the re-sort pass (HOW we calculate)
//! - `view`: Renderable output for the frontend (WHAT we display)

pub mod definition;
pub mod engine;
pub mod format;
pub mod model;
pub mod view;

pub use definition::{ColumnSpec, TimeGranularity, ViewConfig, SMART_DATE_ID};
pub use engine::{parse_int_prefix, SUBTOTAL_LABEL};
pub use format::{FormattedCell, SortKey, TIMESTAMP_MARKER};
pub use model::{ColumnKind, ParseWarning, TableModel};
pub use view::{FixedHeaderOptions, PivotView, ScrollMode, ViewRow, ViewRowKind};

use markup::{MarkupError, RawTable};

/// One render pass over one table snapshot.
///
/// Holds the parsed, aggregated model for the lifetime of the render;
/// every sort activation derives a fresh [`PivotView`] from this same
/// base aggregation. Nothing survives between renders: new data means a
/// new `PivotTable`.
#[derive(Debug, Clone)]
pub struct PivotTable {
    model: TableModel,
    scroll: ScrollMode,
}

impl PivotTable {
    /// Parses the raw markup and builds the aggregated model.
    ///
    /// Only unreadable markup is an error; structural problems inside a
    /// readable table degrade to warnings (see [`PivotTable::warnings`]).
    pub fn build(markup_text: &str, config: &ViewConfig) -> Result<PivotTable, MarkupError> {
        let raw = markup::read_table(markup_text)?;
        Ok(PivotTable::from_raw(&raw, config))
    }

    /// Builds from an already-read raw table.
    pub fn from_raw(raw: &RawTable, config: &ViewConfig) -> PivotTable {
        let mut model = model::parse(raw, config);
        engine::aggregate_model(&mut model);
        PivotTable {
            model,
            scroll: ScrollMode::for_config(config.num_groups, config.height),
        }
    }

    /// The default presentation: ordered by the first value column.
    pub fn view(&self) -> PivotView {
        self.sort_by(0)
    }

    /// A presentation ordered by the given value column. Pure: repeated
    /// calls with the same column yield the same view.
    pub fn sort_by(&self, column: usize) -> PivotView {
        engine::build_view(&self.model, column, self.scroll.clone())
    }

    /// Handles a header activation by flat header-cell index (document
    /// order across header rows). Headers that resolve to no value
    /// column are inert and return `None`.
    pub fn activate_header(&self, header_index: usize) -> Option<PivotView> {
        let column = self.model.header_cells().nth(header_index)?.column?;
        log::debug!("header {} activated, sorting by column {}", header_index, column);
        Some(self.sort_by(column))
    }

    /// Structural warnings collected during parse.
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.model.warnings
    }

    /// The underlying parsed model.
    pub fn model(&self) -> &TableModel {
        &self.model
    }
}
