use serde::{Deserialize, Serialize};

use crate::schema::{JoinType, SortDirection};

/// One select-list entry, already rendered to SQL text.
#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub expr: String,
    pub alias: Option<String>,
}

/// A resolved join clause. `on` is the dataset author's raw keys text.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub on: String,
    pub join_order: i64,
}

/// Predicates targeting one filter column. Members OR together; distinct
/// groups AND together.
#[derive(Debug, Clone)]
pub struct PredicateGroup {
    pub column_id: i64,
    pub predicates: Vec<String>,
}

/// ORDER BY entry. `output` is the select alias, used by the plain ORDER
/// BY clause; `expr` is the underlying expression, used inside
/// `OVER (ORDER BY ...)` where select aliases are not visible.
#[derive(Debug, Clone)]
pub struct OrderClause {
    pub expr: String,
    pub output: String,
    pub direction: SortDirection,
}

/// Requested page window. `rows == 0` disables paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub start: u64,
    pub rows: u64,
}

impl Page {
    pub fn new(start: u64, rows: u64) -> Self {
        Self { start, rows }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.rows > 0
    }
}

/// The single statement model every query compiles into: typed clause
/// fragments collected by the planner and assembled once per dialect.
#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub columns: Vec<SelectColumn>,
    pub from: String,
    pub joins: Vec<JoinClause>,
    pub predicates: Vec<PredicateGroup>,
    /// Dataset-level raw WHERE text, ANDed after the filter groups.
    pub conditions: Option<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderClause>,
    pub page: Page,
}

pub fn render_select_list(stmt: &SelectStatement) -> String {
    let items: Vec<String> = stmt
        .columns
        .iter()
        .map(|c| match &c.alias {
            Some(alias) => format!("{} AS {alias}", c.expr),
            None => c.expr.clone(),
        })
        .collect();
    items.join(", ")
}

/// FROM clause plus join clauses, in the order the planner resolved them.
pub fn render_from(stmt: &SelectStatement) -> String {
    let mut sql = format!("FROM {}", stmt.from);
    for join in &stmt.joins {
        sql.push_str(&format!(
            " {} {} ON {}",
            join.join_type.sql_keyword(),
            join.table,
            join.on
        ));
    }
    sql
}

/// WHERE body: OR within a predicate group, AND across groups, static
/// conditions last. None when there is nothing to filter on.
pub fn render_where(stmt: &SelectStatement) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for group in &stmt.predicates {
        match group.predicates.len() {
            0 => {}
            1 => terms.push(group.predicates[0].clone()),
            _ => terms.push(format!("({})", group.predicates.join(" OR "))),
        }
    }
    if let Some(conditions) = &stmt.conditions {
        terms.push(format!("({conditions})"));
    }
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

pub fn render_group_by(stmt: &SelectStatement) -> Option<String> {
    if stmt.group_by.is_empty() {
        None
    } else {
        Some(stmt.group_by.join(", "))
    }
}

/// ORDER BY list over output aliases; `1` when the statement has no
/// explicit sort.
pub fn render_order_by(stmt: &SelectStatement) -> String {
    if stmt.order_by.is_empty() {
        return "1".to_string();
    }
    let items: Vec<String> = stmt
        .order_by
        .iter()
        .map(|o| format!("{} {}", o.output, o.direction.sql_keyword()))
        .collect();
    items.join(", ")
}

/// ORDER BY list over raw expressions, for `OVER (ORDER BY ...)`. None
/// when the statement has no explicit sort.
pub fn render_order_exprs(stmt: &SelectStatement) -> Option<String> {
    if stmt.order_by.is_empty() {
        return None;
    }
    let items: Vec<String> = stmt
        .order_by
        .iter()
        .map(|o| format!("{} {}", o.expr, o.direction.sql_keyword()))
        .collect();
    Some(items.join(", "))
}

/// SELECT through GROUP BY, no ORDER BY and no paging. Shared by the
/// plain select path, the grouped COUNT wrapper and the ROW_NUMBER inner
/// query.
pub fn render_core(stmt: &SelectStatement) -> String {
    let mut sql = format!("SELECT {} {}", render_select_list(stmt), render_from(stmt));
    if let Some(filter) = render_where(stmt) {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    if let Some(groups) = render_group_by(stmt) {
        sql.push_str(&format!(" GROUP BY {groups}"));
    }
    sql
}

/// A named value bound into a compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: ParamValue,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn placeholder(&self) -> String {
        format!("@{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    /// Literal form for inline embedding. Bools render as 1/0, which both
    /// target engines accept.
    pub fn to_literal(&self) -> String {
        match self {
            ParamValue::Text(s) => quote_str(s),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

/// The only seam where a user-supplied string becomes an embedded SQL
/// literal. IN lists and prepared-statement inlining both route through
/// here.
pub fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
