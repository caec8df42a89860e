//! Chart-range compilation and point post-processing.
//!
//! A chart range compiles to a two-column grouped select: the X column
//! bare and the Y column aggregated (COUNT over a literal 1 when no Y
//! column is chosen). Date bucketing happens after execution, in
//! [`bucket_points`], not in SQL.

use std::collections::BTreeMap;

use chrono::Weekday;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::{ReportflowError, Result};
use crate::query::columns::build_column_expr;
use crate::query::dates;
use crate::query::filters::build_filters;
use crate::query::joins::join_clauses;
use crate::query::{CompileContext, Plan};
use crate::schema::{ChartRange, Dataset, DatasetColumn, Report};
use crate::sql_ast::{Page, SelectColumn, SelectStatement};

pub(crate) fn plan_chart_range(
    dataset: &Dataset,
    report: &Report,
    range: &ChartRange,
    ctx: &CompileContext,
    dialect: &dyn Dialect,
) -> Result<Plan> {
    if dataset.is_proc {
        return Err(ReportflowError::Validation(format!(
            "chart range {} targets stored procedure dataset {}",
            range.id, dataset.id
        )));
    }

    let x = dataset.column(range.x_column_id).ok_or_else(|| {
        ReportflowError::Validation(format!(
            "chart range {} references unknown x column {}",
            range.id, range.x_column_id
        ))
    })?;
    let x_expr = build_column_expr(x, None, dialect).ok_or_else(|| {
        ReportflowError::Validation(format!(
            "chart range {} x column '{}' produces no SQL",
            range.id, x.title
        ))
    })?;

    let mut involved: Vec<&DatasetColumn> = vec![x];
    let y_column = match range.y_column_id {
        Some(id) => {
            let y = dataset.column(id).ok_or_else(|| {
                ReportflowError::Validation(format!(
                    "chart range {} references unknown y column {id}",
                    range.id
                ))
            })?;
            involved.push(y);
            let expr = build_column_expr(y, Some(range.aggregator_or_default()), dialect)
                .ok_or_else(|| {
                    ReportflowError::Validation(format!(
                        "chart range {} y column '{}' produces no SQL",
                        range.id, y.title
                    ))
                })?;
            SelectColumn {
                expr,
                alias: Some(y.alias()),
            }
        }
        None => SelectColumn {
            expr: "COUNT((1))".to_string(),
            alias: Some("column0".to_string()),
        },
    };

    let filters = build_filters(dataset, &report.filters, ctx)?;
    for filter in &report.filters {
        if involved.iter().any(|c| c.id == filter.column_id) {
            continue;
        }
        if let Some(column) = dataset.column(filter.column_id) {
            if !column.is_param {
                involved.push(column);
            }
        }
    }

    let stmt = SelectStatement {
        columns: vec![
            SelectColumn {
                expr: x_expr.clone(),
                alias: Some(x.alias()),
            },
            y_column,
        ],
        from: dataset.primary_source.clone(),
        joins: join_clauses(dataset, &involved),
        predicates: filters.groups,
        conditions: dataset.static_conditions().map(str::to_string),
        group_by: vec![x_expr],
        order_by: Vec::new(),
        page: Page::all(),
    };
    Ok(Plan::Select {
        stmt,
        params: filters.params,
    })
}

/// One chart point after post-processing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
}

/// Fold executed rows into chart points.
///
/// Without a date interval the rows pass through in query order. With
/// one, X values parse as datetimes and truncate to their bucket start,
/// Y values sum per bucket, and `fill_date_gaps` emits zero buckets for
/// every step between the observed minimum and maximum. Rows whose X
/// value does not parse are skipped.
pub fn bucket_points(
    rows: &[Map<String, Value>],
    range: &ChartRange,
    week_start: Weekday,
) -> Vec<ChartPoint> {
    let x_key = format!("column{}", range.x_column_id);
    let y_key = range
        .y_column_id
        .map(|id| format!("column{id}"))
        .unwrap_or_else(|| "column0".to_string());

    let Some(interval) = range.date_interval else {
        return rows
            .iter()
            .map(|row| ChartPoint {
                x: value_to_string(row.get(&x_key)),
                y: value_to_f64(row.get(&y_key)),
            })
            .collect();
    };

    let mut buckets: BTreeMap<chrono::NaiveDateTime, f64> = BTreeMap::new();
    for row in rows {
        let raw = value_to_string(row.get(&x_key));
        let parsed = match dates::parse_datetime(&raw) {
            Ok(dt) => dt,
            Err(_) => {
                warn!(value = %raw, range = range.id, "skipping chart row with unparseable x value");
                continue;
            }
        };
        let bucket = dates::bucket_start(parsed, interval, week_start);
        *buckets.entry(bucket).or_insert(0.0) += value_to_f64(row.get(&y_key));
    }

    if range.fill_date_gaps {
        if let (Some(&first), Some(&last)) =
            (buckets.keys().next(), buckets.keys().next_back())
        {
            let mut cursor = first;
            while cursor < last {
                cursor = dates::next_bucket(cursor, interval);
                buckets.entry(cursor).or_insert(0.0);
            }
        }
    }

    buckets
        .into_iter()
        .map(|(bucket, y)| ChartPoint {
            x: dates::format_datetime(bucket),
            y,
        })
        .collect()
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn value_to_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(x: &str, y: f64) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("column5".to_string(), json!(x));
        row.insert("column0".to_string(), json!(y));
        row
    }

    fn range(interval: Option<crate::schema::DateInterval>, fill: bool) -> ChartRange {
        ChartRange {
            id: 1,
            report_id: 1,
            x_column_id: 5,
            y_column_id: None,
            aggregator: None,
            date_interval: interval,
            fill_date_gaps: fill,
        }
    }

    #[test]
    fn passthrough_without_interval() {
        let rows = vec![row("east", 3.0), row("west", 5.0)];
        let points = bucket_points(&rows, &range(None, false), Weekday::Mon);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, "east");
        assert_eq!(points[0].y, 3.0);
    }

    #[test]
    fn sums_per_bucket_and_sorts() {
        use crate::schema::DateInterval;
        let rows = vec![
            row("2024-03-10 09:00:00", 2.0),
            row("2024-01-05 12:00:00", 1.0),
            row("2024-03-22 18:30:00", 4.0),
        ];
        let points = bucket_points(&rows, &range(Some(DateInterval::Month), false), Weekday::Mon);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, "2024-01-01 00:00:00");
        assert_eq!(points[0].y, 1.0);
        assert_eq!(points[1].x, "2024-03-01 00:00:00");
        assert_eq!(points[1].y, 6.0);
    }

    #[test]
    fn fills_gaps_with_zero_buckets() {
        use crate::schema::DateInterval;
        let rows = vec![
            row("2024-01-05 12:00:00", 1.0),
            row("2024-03-22 18:30:00", 4.0),
        ];
        let points = bucket_points(&rows, &range(Some(DateInterval::Month), true), Weekday::Mon);
        let xs: Vec<&str> = points.iter().map(|p| p.x.as_str()).collect();
        assert_eq!(
            xs,
            vec![
                "2024-01-01 00:00:00",
                "2024-02-01 00:00:00",
                "2024-03-01 00:00:00"
            ]
        );
        assert_eq!(points[1].y, 0.0);
    }

    #[test]
    fn unparseable_x_rows_are_skipped() {
        use crate::schema::DateInterval;
        let rows = vec![row("not a date", 9.0), row("2024-01-05", 1.0)];
        let points = bucket_points(&rows, &range(Some(DateInterval::Day), false), Weekday::Mon);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].y, 1.0);
    }
}
