//! Report planning.
//!
//! Resolves a report against its dataset into either the statement
//! model (regular datasets) or a procedure call (proc datasets). The
//! dialect only gets involved again at render time.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::query::columns::build_column_expr;
use crate::query::filters::build_filters;
use crate::query::groups::build_column_plan;
use crate::query::joins::join_clauses;
use crate::query::{CompileContext, Plan};
use crate::schema::{Dataset, DatasetColumn, Report, SortDirection};
use crate::sql_ast::{OrderClause, Page, SelectStatement};

pub(crate) fn plan_report(
    dataset: &Dataset,
    report: &Report,
    page: Page,
    ctx: &CompileContext,
    dialect: &dyn Dialect,
) -> Result<Plan> {
    let filters = build_filters(dataset, &report.filters, ctx)?;

    if dataset.is_proc {
        return Ok(Plan::Exec {
            proc: dataset.primary_source.clone(),
            params: filters.params,
        });
    }

    let columns = build_column_plan(dataset, report, dialect)?;

    // Joins must reach every selected, grouped and filtered column.
    let mut involved: Vec<&DatasetColumn> = columns
        .column_ids
        .iter()
        .filter_map(|id| dataset.column(*id))
        .collect();
    for filter in &report.filters {
        if columns.column_ids.contains(&filter.column_id) {
            continue;
        }
        if let Some(column) = dataset.column(filter.column_id) {
            if !column.is_param {
                involved.push(column);
            }
        }
    }

    let stmt = SelectStatement {
        columns: columns.select,
        from: dataset.primary_source.clone(),
        joins: join_clauses(dataset, &involved),
        predicates: filters.groups,
        conditions: dataset.static_conditions().map(str::to_string),
        group_by: columns.group_by,
        order_by: build_order(dataset, report, dialect),
        page,
    };
    Ok(Plan::Select {
        stmt,
        params: filters.params,
    })
}

/// ORDER BY entries from the report's sort columns, in sort order.
/// Columns the dataset no longer carries are skipped.
fn build_order(dataset: &Dataset, report: &Report, dialect: &dyn Dialect) -> Vec<OrderClause> {
    let mut order = Vec::new();
    for rc in report.sort_columns() {
        let Some(column) = dataset.column(rc.column_id) else {
            continue;
        };
        let Some(expr) = build_column_expr(column, None, dialect) else {
            continue;
        };
        order.push(OrderClause {
            expr,
            output: column.alias(),
            direction: rc.sort_direction.unwrap_or(SortDirection::Asc),
        });
    }
    order
}
