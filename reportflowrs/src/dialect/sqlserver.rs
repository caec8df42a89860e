//! SQL Server (T-SQL) dialect implementation.

use crate::sql_ast::{
    render_core, render_from, render_group_by, render_order_by, render_order_exprs,
    render_select_list, render_where, QueryParam, SelectStatement,
};

use super::Dialect;

#[derive(Debug, Clone, Copy)]
pub struct SqlServerDialect {
    /// OFFSET/FETCH available (SQL Server 2012+). When false, paged
    /// statements fall back to the ROW_NUMBER wrapping.
    pub allow_paging: bool,
}

impl Default for SqlServerDialect {
    fn default() -> Self {
        Self { allow_paging: true }
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn text_cast(&self, expr: &str) -> String {
        format!("CAST({expr} AS VARCHAR(MAX))")
    }

    fn render_select(&self, stmt: &SelectStatement) -> String {
        if stmt.page.is_active() && !self.allow_paging {
            return render_row_number_paged(stmt);
        }
        let mut sql = render_core(stmt);
        sql.push_str(&format!(" ORDER BY {}", render_order_by(stmt)));
        if stmt.page.is_active() {
            sql.push_str(&format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                stmt.page.start, stmt.page.rows
            ));
        }
        sql
    }

    fn render_exec(&self, proc: &str, params: &[QueryParam]) -> String {
        if params.is_empty() {
            return format!("EXEC {proc}");
        }
        let args: Vec<String> = params
            .iter()
            .map(|p| format!("@{} = {}", p.name, p.placeholder()))
            .collect();
        format!("EXEC {proc} {}", args.join(", "))
    }
}

/// Legacy paging: number the filtered rows inside a derived table, then
/// select the window by alias. Select aliases are not visible inside
/// OVER, so the raw sort expressions go there; an unsorted statement
/// numbers over `(SELECT NULL)`.
fn render_row_number_paged(stmt: &SelectStatement) -> String {
    let over = render_order_exprs(stmt).unwrap_or_else(|| "(SELECT NULL)".to_string());
    let mut inner = format!(
        "SELECT {}, ROW_NUMBER() OVER (ORDER BY {over}) AS RowNum {}",
        render_select_list(stmt),
        render_from(stmt)
    );
    if let Some(filter) = render_where(stmt) {
        inner.push_str(&format!(" WHERE {filter}"));
    }
    if let Some(groups) = render_group_by(stmt) {
        inner.push_str(&format!(" GROUP BY {groups}"));
    }

    let outer: Vec<String> = stmt
        .columns
        .iter()
        .map(|c| c.alias.clone().unwrap_or_else(|| c.expr.clone()))
        .collect();
    format!(
        "SELECT {} FROM ({inner}) AS paged WHERE paged.RowNum > {} AND paged.RowNum <= {}",
        outer.join(", "),
        stmt.page.start,
        stmt.page.start + stmt.page.rows
    )
}
