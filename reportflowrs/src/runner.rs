//! One-call execution helpers tying compilation to a connection.
//!
//! Failures stay close to where they happen: a failed COUNT leaves the
//! data fetch alone and a failed chart range leaves the other ranges
//! alone. Only a failed data fetch itself is the caller's error.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::debug;

use crate::database::{ColumnMeta, DatabaseRegistry, QueryResult};
use crate::dialect::dialect_for;
use crate::error::{ReportflowError, Result};
use crate::query::{bucket_points, ChartPoint, CompileContext, SqlBuilder};
use crate::registry::ReportRegistry;
use crate::schema::ChartRange;
use crate::sql_ast::Page;

/// Executed report page plus the independently fetched total.
#[derive(Debug, Clone)]
pub struct ReportRun {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
    /// Row count across all pages; None when no count ran or it failed.
    pub total: Option<u64>,
    pub count_error: Option<String>,
}

/// Outcome of one chart range.
#[derive(Debug, Clone)]
pub struct RangeRun {
    pub range_id: i64,
    pub points: Vec<ChartPoint>,
    pub error: Option<String>,
}

/// Compile and execute a report page. The COUNT statement runs first;
/// its failure is captured on the result rather than aborting the fetch.
pub async fn run_report(
    registry: &ReportRegistry,
    databases: &DatabaseRegistry,
    report_id: i64,
    page: &Page,
    ctx: &CompileContext,
) -> Result<ReportRun> {
    let compiled = SqlBuilder::build_for_database(registry, databases, report_id, page, ctx)?;

    let report = registry
        .get_report(report_id)
        .ok_or_else(|| ReportflowError::Schema(format!("unknown report {report_id}")))?;
    let dataset = registry.get_dataset(report.dataset_id).ok_or_else(|| {
        ReportflowError::Schema(format!(
            "report {} references unknown dataset {}",
            report_id, report.dataset_id
        ))
    })?;
    let connection = databases.get_connection(&dataset.database).ok_or_else(|| {
        ReportflowError::Execution(format!("database '{}' not registered", dataset.database))
    })?;

    let mut total = None;
    let mut count_error = None;
    if let Some(count_sql) = &compiled.count_sql {
        let started = Instant::now();
        match connection.execute(count_sql, &compiled.params).await {
            Ok(result) => {
                total = first_scalar(&result);
                debug!(
                    report = report_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    total,
                    "count query finished"
                );
            }
            Err(err) => count_error = Some(err.to_string()),
        }
    }

    let started = Instant::now();
    let result = connection.execute(&compiled.sql, &compiled.params).await?;
    debug!(
        report = report_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        rows = result.rows.len(),
        "report query finished"
    );

    Ok(ReportRun {
        columns: result.columns,
        rows: result.rows,
        total,
        count_error,
    })
}

/// Compile and execute every range of a chart, sequentially in
/// definition order. Each range failure is captured on its own run.
pub async fn run_chart(
    registry: &ReportRegistry,
    databases: &DatabaseRegistry,
    chart_id: i64,
    ctx: &CompileContext,
) -> Result<Vec<RangeRun>> {
    let chart = registry
        .get_chart(chart_id)
        .ok_or_else(|| ReportflowError::Schema(format!("unknown chart {chart_id}")))?;

    let mut runs = Vec::with_capacity(chart.ranges.len());
    for range in &chart.ranges {
        let run = match execute_range(registry, databases, range, ctx).await {
            Ok(points) => RangeRun {
                range_id: range.id,
                points,
                error: None,
            },
            Err(err) => RangeRun {
                range_id: range.id,
                points: Vec::new(),
                error: Some(err.to_string()),
            },
        };
        runs.push(run);
    }
    Ok(runs)
}

async fn execute_range(
    registry: &ReportRegistry,
    databases: &DatabaseRegistry,
    range: &ChartRange,
    ctx: &CompileContext,
) -> Result<Vec<ChartPoint>> {
    let report = registry.get_report(range.report_id).ok_or_else(|| {
        ReportflowError::Schema(format!(
            "chart range {} references unknown report {}",
            range.id, range.report_id
        ))
    })?;
    let dataset = registry.get_dataset(report.dataset_id).ok_or_else(|| {
        ReportflowError::Schema(format!(
            "report {} references unknown dataset {}",
            report.id, report.dataset_id
        ))
    })?;
    let handle = databases.get(&dataset.database).ok_or_else(|| {
        ReportflowError::Execution(format!("database '{}' not registered", dataset.database))
    })?;

    let dialect = dialect_for(&handle.database);
    let compiled = SqlBuilder::build_chart_range(registry, range, ctx, dialect.as_ref())?;

    let started = Instant::now();
    let result = handle.connection.execute(&compiled.sql, &compiled.params).await?;
    debug!(
        range = range.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        rows = result.rows.len(),
        "chart range query finished"
    );
    Ok(bucket_points(&result.rows, range, ctx.week_start))
}

/// First value of the first row, as the COUNT statements produce.
fn first_scalar(result: &QueryResult) -> Option<u64> {
    let value = result.rows.first()?.values().next()?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
