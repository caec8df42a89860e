//! Column expression rendering.

use crate::dialect::Dialect;
use crate::schema::{Aggregator, DatasetColumn};
use crate::sql_ast::SelectColumn;

/// Render the SQL expression for a column, optionally wrapped in an
/// aggregator.
///
/// The base is `derived` when non-empty, else `column_name`, always
/// parenthesized. Columns with neither produce no output. When an
/// aggregator is applied, Guid columns are first cast to the dialect's
/// large text type, and Text/DateTime columns force the aggregator to
/// MAX.
pub(crate) fn build_column_expr(
    column: &DatasetColumn,
    aggregator: Option<Aggregator>,
    dialect: &dyn Dialect,
) -> Option<String> {
    let base = column.base_expr()?;
    let mut expr = format!("({base})");
    if let Some(requested) = aggregator {
        if column.data_type.needs_text_cast() {
            expr = dialect.text_cast(&expr);
        }
        let applied = if column.data_type.aggregates_as_max() {
            Aggregator::Max
        } else {
            requested
        };
        expr = format!("{}({expr})", applied.sql_name());
    }
    Some(expr)
}

/// Select-list entry for a column, carrying its `column{id}` alias.
pub(crate) fn select_column(
    column: &DatasetColumn,
    aggregator: Option<Aggregator>,
    dialect: &dyn Dialect,
) -> Option<SelectColumn> {
    Some(SelectColumn {
        expr: build_column_expr(column, aggregator, dialect)?,
        alias: Some(column.alias()),
    })
}
