//! Connection seam and database registry.
//!
//! The engine compiles SQL; executing it happens behind [`Connection`],
//! one implementation per driver. The crate ships [`StaticConnection`]
//! for tests and offline demos; real drivers live with their callers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::schema::Database;
use crate::sql_ast::QueryParam;

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

/// Unified interface to whatever executes the generated statements.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<QueryResult>;
}

/// A database entity paired with something that can reach it.
#[derive(Clone)]
pub struct DatabaseHandle {
    pub database: Database,
    pub connection: Arc<dyn Connection>,
}

/// Minimal connection registry keyed by the database name datasets
/// reference.
#[derive(Clone, Default)]
pub struct DatabaseRegistry {
    handles: HashMap<String, DatabaseHandle>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, database: Database, connection: Arc<dyn Connection>) {
        self.handles.insert(
            database.name.clone(),
            DatabaseHandle {
                database,
                connection,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseHandle> {
        self.handles.get(name)
    }

    pub fn get_database(&self, name: &str) -> Option<&Database> {
        self.handles.get(name).map(|h| &h.database)
    }

    pub fn get_connection(&self, name: &str) -> Option<&Arc<dyn Connection>> {
        self.handles.get(name).map(|h| &h.connection)
    }
}

/// Connection serving canned rows. COUNT statements report the canned
/// row count so paging demos read sensibly; everything else returns the
/// rows as-is and ignores parameters.
#[derive(Debug, Clone, Default)]
pub struct StaticConnection {
    columns: Vec<ColumnMeta>,
    rows: Vec<Map<String, Value>>,
}

impl StaticConnection {
    pub fn new(column_names: &[&str], rows: Vec<Map<String, Value>>) -> Self {
        Self {
            columns: column_names
                .iter()
                .map(|name| ColumnMeta {
                    name: (*name).to_string(),
                })
                .collect(),
            rows,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connection for StaticConnection {
    async fn execute(&self, sql: &str, _params: &[QueryParam]) -> Result<QueryResult> {
        debug!(sql = %sql, "static connection serving canned rows");
        if sql.trim_start().to_ascii_uppercase().starts_with("SELECT COUNT(1)") {
            let mut row = Map::new();
            row.insert("count".to_string(), Value::from(self.rows.len() as u64));
            return Ok(QueryResult {
                columns: vec![ColumnMeta {
                    name: "count".to_string(),
                }],
                rows: vec![row],
            });
        }
        Ok(QueryResult {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        })
    }
}
