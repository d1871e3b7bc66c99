//! FILENAME: pivot-view/src/engine.rs
//! Pivot View Engine - Aggregation and the re-sort pass.
//!
//! Algorithm:
//! 1. Aggregate: sum every value column within each group and derive the
//!    group's synthetic subtotal row (once per render, immutable after).
//! 2. Sort: order groups by their subtotal at the chosen column. The
//!    sort is stable and always starts from the source group order, so
//!    repeated activations are deterministic and idempotent.
//! 3. Rebuild: emit each group's rows unchanged, with the leader's label
//!    span widened by one to cover the appended subtotal row.

use std::cmp::Ordering;

use crate::definition::ColumnIndex;
use crate::format::SortKey;
use crate::model::{Cell, LabelCell, LabelList, Row, RowGroup, TableModel};
use crate::view::{PivotView, ScrollMode, ViewCell, ViewRow, ViewRowKind};

/// Label used on every synthetic subtotal row.
pub const SUBTOTAL_LABEL: &str = "subtotal";

// ============================================================================
// AGGREGATION
// ============================================================================

/// Integer prefix parse, base 10: optional sign, then leading digits.
/// "12.7" is 12, "3 apples" is 3, "n/a" and "" are nothing. Mirrors the
/// tolerant upstream summation; non-values contribute 0 to subtotals.
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let digits: &str = &rest[..rest.chars().take_while(|c| c.is_ascii_digit()).count()];
    if digits.is_empty() {
        return None;
    }
    // Saturate rather than overflow on absurdly long digit runs.
    let mut value: i64 = 0;
    for c in digits.chars() {
        value = value
            .saturating_mul(10)
            .saturating_add((c as u8 - b'0') as i64);
    }
    Some(if negative { -value } else { value })
}

/// Computes per-column subtotals and the synthetic subtotal row for
/// every group in the model. Runs once per render, right after parse.
pub fn aggregate_model(model: &mut TableModel) {
    for group in &mut model.groups {
        aggregate_group(group);
    }
}

fn aggregate_group(group: &mut RowGroup) {
    let width = group.rows.iter().map(|r| r.values.len()).max().unwrap_or(0);

    group.subtotals.clear();
    for col in 0..width {
        let sum: i64 = group
            .rows
            .iter()
            .filter_map(|row| row.values.get(col))
            .filter_map(|cell| parse_int_prefix(&cell.raw))
            .sum();
        group.subtotals.insert(col, sum);
    }

    let mut labels = LabelList::new();
    labels.push(LabelCell {
        raw: SUBTOTAL_LABEL.to_string(),
        display: SUBTOTAL_LABEL.to_string(),
        span: None,
    });
    let values = (0..width)
        .map(|col| {
            let sum = group.subtotals.get(&col).copied().unwrap_or(0);
            Cell {
                raw: sum.to_string(),
                display: sum.to_string(),
                sort_key: SortKey::Number(sum as f64),
            }
        })
        .collect();

    group.subtotal_row = Row { labels, values };
}

// ============================================================================
// RE-SORT
// ============================================================================

/// Produces the group presentation order for the chosen column: a stable
/// ascending sort over each group's subtotal at that column. Groups
/// missing a subtotal there (including any out-of-range column) compare
/// equal, so they keep their source-relative order. Pure: the model is
/// untouched.
pub fn sort_groups(model: &TableModel, column: ColumnIndex) -> Vec<usize> {
    let mut order: Vec<usize> = (0..model.groups.len()).collect();
    order.sort_by(|&a, &b| {
        let sa = model.groups[a].subtotals.get(&column);
        let sb = model.groups[b].subtotals.get(&column);
        match (sa, sb) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    });
    order
}

// ============================================================================
// REBUILD
// ============================================================================

/// Rebuilds the flat body row sequence for a group order: per group, the
/// leader with its label span corrected to cover the subtotal row, the
/// member rows in their fixed internal order, then the subtotal row.
pub fn rebuild(model: &TableModel, order: &[usize]) -> Vec<ViewRow> {
    let mut body = Vec::new();
    for &group_index in order {
        let group = &model.groups[group_index];
        for (i, row) in group.rows.iter().enumerate() {
            let kind = if i == 0 {
                ViewRowKind::Leader
            } else {
                ViewRowKind::Member
            };
            // +1 on the leader's span: the subtotal row joins the group.
            let leader_span = group.size() as u32 + 1;
            body.push(view_row(row, kind, (i == 0).then_some(leader_span)));
        }
        body.push(view_row(&group.subtotal_row, ViewRowKind::Subtotal, None));
    }
    body
}

fn view_row(row: &Row, kind: ViewRowKind, leader_span: Option<u32>) -> ViewRow {
    let mut cells = Vec::with_capacity(row.labels.len() + row.values.len());
    for (i, label) in row.labels.iter().enumerate() {
        let span = if i == 0 {
            leader_span.or(label.span).unwrap_or(1)
        } else {
            label.span.unwrap_or(1)
        };
        cells.push(ViewCell::label(label.display.clone(), span));
    }
    for value in &row.values {
        cells.push(ViewCell::value(value.display.clone(), value.sort_key.clone()));
    }
    ViewRow { kind, cells }
}

/// Assembles the full view for one sort column.
pub fn build_view(model: &TableModel, column: ColumnIndex, scroll: ScrollMode) -> PivotView {
    let order = sort_groups(model, column);
    PivotView {
        header_rows: model.header_rows.clone(),
        body: rebuild(model, &order),
        scroll,
        sorted_by: column,
        warnings: model.warnings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ColumnSpec, ViewConfig};
    use crate::model::parse;
    use markup::{RawCell, RawRow, RawTable};

    fn config() -> ViewConfig {
        ViewConfig::new(vec![ColumnSpec::from("count")])
    }

    fn model_from(body: Vec<RawRow>, config: &ViewConfig) -> TableModel {
        let raw = RawTable {
            header_rows: vec![],
            body_rows: body,
        };
        let mut model = parse(&raw, config);
        aggregate_model(&mut model);
        model
    }

    fn leader(label: &str, span: u32, values: &[&str]) -> RawRow {
        let mut cells = vec![RawCell::label_spanning(label, span)];
        cells.extend(values.iter().map(|v| RawCell::value(*v)));
        RawRow::new(cells)
    }

    fn singleton(label: &str, values: &[&str]) -> RawRow {
        let mut cells = vec![RawCell::label(label)];
        cells.extend(values.iter().map(|v| RawCell::value(*v)));
        RawRow::new(cells)
    }

    fn continuation(values: &[&str]) -> RawRow {
        RawRow::new(values.iter().map(|v| RawCell::value(*v)).collect())
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42"), Some(42));
        assert_eq!(parse_int_prefix("12.7"), Some(12));
        assert_eq!(parse_int_prefix("-8"), Some(-8));
        assert_eq!(parse_int_prefix("  3 apples"), Some(3));
        assert_eq!(parse_int_prefix("n/a"), None);
        assert_eq!(parse_int_prefix(""), None);
    }

    #[test]
    fn test_subtotals_sum_member_rows() {
        let model = model_from(
            vec![leader("A", 2, &["10"]), continuation(&["5"]), singleton("B", &["7"])],
            &config(),
        );

        assert_eq!(model.groups[0].subtotals[&0], 15);
        assert_eq!(model.groups[1].subtotals[&0], 7);

        let subtotal = &model.groups[0].subtotal_row;
        assert_eq!(subtotal.labels[0].display, "subtotal");
        assert_eq!(subtotal.values[0].display, "15");
        assert_eq!(subtotal.values[0].sort_key, SortKey::Number(15.0));
    }

    #[test]
    fn test_non_numeric_and_empty_cells_contribute_zero() {
        let model = model_from(
            vec![
                leader("A", 3, &["10"]),
                continuation(&["n/a"]),
                continuation(&[""]),
            ],
            &config(),
        );
        assert_eq!(model.groups[0].subtotals[&0], 10);
    }

    #[test]
    fn test_singleton_subtotal_duplicates_its_row() {
        let model = model_from(vec![singleton("B", &["7"])], &config());
        assert_eq!(model.groups[0].subtotals[&0], 7);
        assert_eq!(model.groups[0].subtotal_row.values[0].display, "7");
    }

    #[test]
    fn test_sort_scenario_ascending_by_value_column() {
        let model = model_from(
            vec![leader("A", 2, &["10"]), continuation(&["5"]), singleton("B", &["7"])],
            &config(),
        );

        // A sums to 15, B to 7: ascending order is [B, A].
        let order = sort_groups(&model, 0);
        assert_eq!(order, vec![1, 0]);

        let body = rebuild(&model, &order);
        assert_eq!(body.len(), 5);

        // B: single row (span 2 to cover its subtotal), then subtotal 7.
        assert_eq!(body[0].kind, ViewRowKind::Leader);
        assert_eq!(body[0].cells[0].text, "B");
        assert_eq!(body[0].cells[0].row_span, 2);
        assert_eq!(body[1].kind, ViewRowKind::Subtotal);
        assert_eq!(body[1].cells[1].text, "7");

        // A: leader (span 3), member, subtotal 15.
        assert_eq!(body[2].cells[0].text, "A");
        assert_eq!(body[2].cells[0].row_span, 3);
        assert_eq!(body[3].kind, ViewRowKind::Member);
        assert_eq!(body[4].kind, ViewRowKind::Subtotal);
        assert_eq!(body[4].cells[1].text, "15");
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let model = model_from(
            vec![
                singleton("A", &["5", "1"]),
                singleton("B", &["5", "2"]),
                singleton("C", &["5", "3"]),
            ],
            &ViewConfig::new(vec!["x".into(), "y".into()]),
        );
        // All tie on column 0: source order is preserved.
        assert_eq!(sort_groups(&model, 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let model = model_from(
            vec![
                singleton("A", &["9"]),
                singleton("B", &["3"]),
                singleton("C", &["6"]),
            ],
            &config(),
        );
        let once = sort_groups(&model, 0);
        // The model is untouched; sorting again from the same base
        // aggregation gives the same ordering.
        let twice = sort_groups(&model, 0);
        assert_eq!(once, vec![1, 2, 0]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_out_of_range_column_preserves_order() {
        let model = model_from(
            vec![singleton("B", &["9"]), singleton("A", &["3"])],
            &config(),
        );
        assert_eq!(sort_groups(&model, 7), vec![0, 1]);
    }

    #[test]
    fn test_rebuilt_counts_and_span_invariant() {
        let model = model_from(
            vec![
                leader("A", 2, &["10"]),
                continuation(&["5"]),
                singleton("B", &["7"]),
                leader("C", 3, &["1"]),
                continuation(&["2"]),
                continuation(&["3"]),
            ],
            &config(),
        );
        let view = build_view(&model, 0, ScrollMode::PlainScroll { height: 400 });

        let group_count = model.groups.len();
        assert_eq!(group_count, 3);
        // Every group gains exactly one subtotal row.
        assert_eq!(view.body_row_count(), model.source_row_count + group_count);
        assert_eq!(
            view.label_span_sum() as usize,
            model.source_row_count + group_count
        );
    }
}
