//! SQL dialect strategies for the two target engines.
//!
//! The planner produces one [`SelectStatement`]; each dialect assembles
//! it into engine-specific text. Paging is the main divergence: MySQL
//! LIMIT/OFFSET, SQL Server OFFSET/FETCH, and a legacy ROW_NUMBER
//! wrapping for servers where OFFSET/FETCH is disallowed.

use std::fmt;

use crate::schema::Database;
use crate::sql_ast::{render_core, render_from, render_where, QueryParam, SelectStatement};

/// Dialects assemble clause fragments; they never inspect the user's SQL
/// text inside them.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Cast applied to binary-class values that must surface as text
    /// under aggregation.
    fn text_cast(&self, expr: &str) -> String;

    fn render_select(&self, stmt: &SelectStatement) -> String;

    /// Matching COUNT statement: plain `COUNT(1)` over the filtered rows,
    /// or a wrapped derived table when grouping collapses them.
    fn render_count(&self, stmt: &SelectStatement) -> String {
        if stmt.group_by.is_empty() {
            let mut sql = format!("SELECT COUNT(1) {}", render_from(stmt));
            if let Some(filter) = render_where(stmt) {
                sql.push_str(&format!(" WHERE {filter}"));
            }
            sql
        } else {
            format!("SELECT COUNT(1) FROM ({}) AS counted", render_core(stmt))
        }
    }

    /// Stored procedure invocation with named parameter placeholders.
    fn render_exec(&self, proc: &str, params: &[QueryParam]) -> String;
}

/// Pick the dialect a registered database speaks.
pub fn dialect_for(database: &Database) -> Box<dyn Dialect> {
    if database.is_sql_server {
        Box::new(SqlServerDialect {
            allow_paging: database.allow_paging,
        })
    } else {
        Box::new(MySqlDialect)
    }
}

mod mysql;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use sqlserver::SqlServerDialect;
