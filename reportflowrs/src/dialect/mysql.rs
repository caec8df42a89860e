//! MySQL dialect implementation.

use crate::sql_ast::{render_core, render_order_by, QueryParam, SelectStatement};

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn text_cast(&self, expr: &str) -> String {
        format!("CAST({expr} AS CHAR(36))")
    }

    fn render_select(&self, stmt: &SelectStatement) -> String {
        let mut sql = render_core(stmt);
        sql.push_str(&format!(" ORDER BY {}", render_order_by(stmt)));
        if stmt.page.is_active() {
            sql.push_str(&format!(" LIMIT {}", stmt.page.rows));
            if stmt.page.start > 0 {
                sql.push_str(&format!(" OFFSET {}", stmt.page.start));
            }
        }
        sql
    }

    fn render_exec(&self, proc: &str, params: &[QueryParam]) -> String {
        let args: Vec<String> = params.iter().map(|p| p.placeholder()).collect();
        format!("CALL {proc}({})", args.join(", "))
    }
}
