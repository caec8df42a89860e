//! Select-list and GROUP BY planning.
//!
//! Grouped reports render group columns bare and wrap everything else in
//! the report aggregator. Columns referenced by another column's link
//! template ride along in the select list so the templating layer can
//! substitute their values; under grouping they are MAX-wrapped to stay
//! legal without joining the GROUP BY.

use crate::dialect::Dialect;
use crate::error::{ReportflowError, Result};
use crate::query::columns::{build_column_expr, select_column};
use crate::schema::{Aggregator, Dataset, Report};
use crate::sql_ast::SelectColumn;

/// The select list and GROUP BY a report's columns produce.
#[derive(Debug, Default)]
pub(crate) struct ColumnPlan {
    pub select: Vec<SelectColumn>,
    pub group_by: Vec<String>,
    /// Every dataset column the list touches, for join resolution.
    pub column_ids: Vec<i64>,
}

pub(crate) fn build_column_plan(
    dataset: &Dataset,
    report: &Report,
    dialect: &dyn Dialect,
) -> Result<ColumnPlan> {
    let group_ids = report.group_column_ids();
    let grouped = !group_ids.is_empty();
    let aggregator = report.aggregator_or_default();

    let mut plan = ColumnPlan::default();
    let mut selected_ids: Vec<i64> = Vec::new();
    let mut ride_along: Vec<i64> = Vec::new();

    for rc in report.display_columns() {
        let Some(column) = dataset.column(rc.column_id) else {
            continue;
        };
        let agg = if grouped && !group_ids.contains(&column.id) {
            Some(aggregator)
        } else {
            None
        };
        if let Some(sel) = select_column(column, agg, dialect) {
            plan.select.push(sel);
            selected_ids.push(column.id);
            plan.column_ids.push(column.id);
        }
        for id in column.link_column_ids() {
            if !ride_along.contains(&id) {
                ride_along.push(id);
            }
        }
    }

    for id in ride_along {
        if selected_ids.contains(&id) {
            continue;
        }
        let Some(column) = dataset.column(id) else {
            continue;
        };
        let agg = if grouped { Some(Aggregator::Max) } else { None };
        if let Some(sel) = select_column(column, agg, dialect) {
            plan.select.push(sel);
            selected_ids.push(column.id);
            plan.column_ids.push(column.id);
        }
    }

    if plan.select.is_empty() {
        return Err(ReportflowError::Validation(format!(
            "report {} selects no columns",
            report.id
        )));
    }

    for id in group_ids {
        let Some(column) = dataset.column(id) else {
            continue;
        };
        if let Some(expr) = build_column_expr(column, None, dialect) {
            plan.group_by.push(expr);
            if !plan.column_ids.contains(&column.id) {
                plan.column_ids.push(column.id);
            }
        }
    }

    Ok(plan)
}
