//! Join resolution.
//!
//! Walks the tables referenced by every column taking part in a query
//! and selects the dataset joins needed to reach them. Join ON keys can
//! reference further tables, so resolution runs as a worklist until it
//! settles. A referenced table with no matching join entry is dropped
//! with a warning rather than failing the whole query.

use std::collections::HashSet;

use tracing::warn;

use crate::schema::{Dataset, DatasetColumn, DatasetJoin};
use crate::sql_ast::JoinClause;

/// Resolve the joins needed by `columns`, ordered by ascending
/// `join_order`. Each join appears at most once; the primary source
/// never needs one.
pub(crate) fn resolve_joins<'a>(
    dataset: &'a Dataset,
    columns: &[&DatasetColumn],
) -> Vec<&'a DatasetJoin> {
    let mut pending: Vec<String> = Vec::new();
    for column in columns {
        collect_tables(dataset, column, &mut pending);
    }

    let primary = dataset.primary_source.to_ascii_lowercase();
    let mut seen: HashSet<String> = HashSet::new();
    let mut selected: Vec<&DatasetJoin> = Vec::new();
    let mut selected_ids: HashSet<i64> = HashSet::new();

    while let Some(table) = pending.pop() {
        let key = table.to_ascii_lowercase();
        if key == primary || !seen.insert(key) {
            continue;
        }
        let Some(join) = dataset.join_for_table(&table) else {
            warn!(table = %table, dataset = dataset.id, "no join defined for referenced table, dropping");
            continue;
        };
        if !selected_ids.insert(join.id) {
            continue;
        }
        selected.push(join);
        let keys = join.keys.to_ascii_lowercase();
        for candidate in &dataset.joins {
            if candidate.id != join.id && keys.contains(&candidate.table_name.to_ascii_lowercase())
            {
                pending.push(candidate.table_name.clone());
            }
        }
    }

    selected.sort_by_key(|join| join.join_order);
    selected
}

/// Resolved joins as renderable clauses.
pub(crate) fn join_clauses(dataset: &Dataset, columns: &[&DatasetColumn]) -> Vec<JoinClause> {
    resolve_joins(dataset, columns)
        .into_iter()
        .map(|join| JoinClause {
            join_type: join.join_type,
            table: join.table_name.clone(),
            on: join.keys.clone(),
            join_order: join.join_order,
        })
        .collect()
}

/// Push the table names a column references. Plain columns name their
/// table through the qualifier; derived SQL is searched for join table
/// names as case-insensitive substrings.
fn collect_tables(dataset: &Dataset, column: &DatasetColumn, pending: &mut Vec<String>) {
    if column.is_derived() {
        if let Some(sql) = column.base_expr() {
            let lowered = sql.to_ascii_lowercase();
            for join in &dataset.joins {
                if lowered.contains(&join.table_name.to_ascii_lowercase()) {
                    pending.push(join.table_name.clone());
                }
            }
        }
    } else if let Some(table) = column.source_table() {
        pending.push(table.to_string());
    }
}
