//! Integration tests for the execution helpers, using the canned
//! connection in place of a real driver.

use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use reportflow::registry::ReportRegistry;
use reportflow::schema::{
    Chart, ChartRange, DataType, Database, Dataset, DatasetColumn, DateInterval, FilterType,
    Report, ReportColumn,
};
use reportflow::{
    run_chart, run_report, CompileContext, DatabaseRegistry, Page, ReportflowError,
    StaticConnection,
};
use serde_json::{json, Map, Value};

// ============================================================================
// Test fixtures
// ============================================================================

mod fixtures {
    use super::*;

    pub fn ctx() -> CompileContext {
        let now = NaiveDate::from_ymd_opt(2024, 5, 15)
            .unwrap()
            .and_hms_opt(10, 30, 45)
            .unwrap();
        CompileContext::new(now, Weekday::Mon)
    }

    fn column(id: i64, title: &str, column_name: &str, data_type: DataType) -> DatasetColumn {
        DatasetColumn {
            id,
            title: title.to_string(),
            column_name: column_name.to_string(),
            derived: None,
            data_type,
            filter_type: FilterType::None,
            is_param: false,
            link: None,
        }
    }

    pub fn orders_dataset() -> Dataset {
        Dataset {
            id: 1,
            name: "Orders".to_string(),
            database: "warehouse".to_string(),
            primary_source: "orders".to_string(),
            is_proc: false,
            conditions: None,
            columns: vec![
                column(1, "Order Id", "orders.id", DataType::Int),
                column(2, "Placed At", "orders.placed_at", DataType::DateTime),
            ],
            joins: vec![],
        }
    }

    pub fn orders_report() -> Report {
        Report {
            id: 100,
            name: "Orders".to_string(),
            dataset_id: 1,
            aggregator: None,
            columns: vec![
                ReportColumn {
                    column_id: 1,
                    display_order: 1,
                    sort_direction: None,
                    sort_order: None,
                },
                ReportColumn {
                    column_id: 2,
                    display_order: 2,
                    sort_direction: None,
                    sort_order: None,
                },
            ],
            filters: vec![],
            groups: vec![],
        }
    }

    pub fn chart_range(id: i64, report_id: i64) -> ChartRange {
        ChartRange {
            id,
            report_id,
            x_column_id: 2,
            y_column_id: None,
            aggregator: None,
            date_interval: Some(DateInterval::Month),
            fill_date_gaps: true,
        }
    }

    pub fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    pub fn warehouse(connection: StaticConnection) -> DatabaseRegistry {
        let mut databases = DatabaseRegistry::new();
        databases.insert(
            Database {
                name: "warehouse".to_string(),
                is_sql_server: true,
                allow_paging: true,
                connection_string: None,
            },
            Arc::new(connection),
        );
        databases
    }
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn run_report_returns_rows_and_total() {
    let registry = ReportRegistry::from_parts(
        vec![fixtures::orders_dataset()],
        vec![fixtures::orders_report()],
        vec![],
    );
    let rows = vec![
        fixtures::row(&[("column1", json!(1)), ("column2", json!("2024-01-05 12:00:00"))]),
        fixtures::row(&[("column1", json!(2)), ("column2", json!("2024-03-22 18:30:00"))]),
        fixtures::row(&[("column1", json!(3)), ("column2", json!("2024-03-23 08:00:00"))]),
    ];
    let databases = fixtures::warehouse(StaticConnection::new(&["column1", "column2"], rows));

    let run = run_report(&registry, &databases, 100, &Page::new(0, 2), &fixtures::ctx())
        .await
        .unwrap();
    assert_eq!(run.rows.len(), 3);
    assert_eq!(run.total, Some(3), "total comes from the COUNT statement");
    assert!(run.count_error.is_none());
    assert_eq!(run.columns[0].name, "column1");
}

#[tokio::test]
async fn run_report_without_registered_database_fails() {
    let registry = ReportRegistry::from_parts(
        vec![fixtures::orders_dataset()],
        vec![fixtures::orders_report()],
        vec![],
    );
    let databases = DatabaseRegistry::new();

    let err = run_report(&registry, &databases, 100, &Page::all(), &fixtures::ctx())
        .await
        .unwrap_err();
    match err {
        ReportflowError::Schema(msg) => assert!(
            msg.contains("references unknown database 'warehouse'"),
            "msg={msg}"
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn run_report_with_unknown_id_fails() {
    let registry = ReportRegistry::from_parts(vec![fixtures::orders_dataset()], vec![], vec![]);
    let databases = fixtures::warehouse(StaticConnection::empty());

    let err = run_report(&registry, &databases, 999, &Page::all(), &fixtures::ctx())
        .await
        .unwrap_err();
    match err {
        ReportflowError::Schema(msg) => assert!(msg.contains("unknown report 999"), "msg={msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Charts
// ============================================================================

#[tokio::test]
async fn run_chart_buckets_rows_and_fills_gaps() {
    let registry = ReportRegistry::from_parts(
        vec![fixtures::orders_dataset()],
        vec![fixtures::orders_report()],
        vec![Chart {
            id: 300,
            name: "Orders Over Time".to_string(),
            ranges: vec![fixtures::chart_range(1, 100)],
        }],
    );
    let rows = vec![
        fixtures::row(&[("column2", json!("2024-01-05 12:00:00")), ("column0", json!(1))]),
        fixtures::row(&[("column2", json!("2024-03-22 18:30:00")), ("column0", json!(4))]),
    ];
    let databases = fixtures::warehouse(StaticConnection::new(&["column2", "column0"], rows));

    let runs = run_chart(&registry, &databases, 300, &fixtures::ctx())
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.range_id, 1);
    assert!(run.error.is_none());

    let xs: Vec<&str> = run.points.iter().map(|p| p.x.as_str()).collect();
    assert_eq!(
        xs,
        vec![
            "2024-01-01 00:00:00",
            "2024-02-01 00:00:00",
            "2024-03-01 00:00:00"
        ]
    );
    assert_eq!(run.points[1].y, 0.0, "gap months fill with zero");
    assert_eq!(run.points[2].y, 4.0);
}

#[tokio::test]
async fn run_chart_captures_per_range_errors() {
    let registry = ReportRegistry::from_parts(
        vec![fixtures::orders_dataset()],
        vec![fixtures::orders_report()],
        vec![Chart {
            id: 300,
            name: "Mixed".to_string(),
            ranges: vec![fixtures::chart_range(1, 100), fixtures::chart_range(2, 999)],
        }],
    );
    let rows = vec![fixtures::row(&[
        ("column2", json!("2024-01-05 12:00:00")),
        ("column0", json!(2)),
    ])];
    let databases = fixtures::warehouse(StaticConnection::new(&["column2", "column0"], rows));

    let runs = run_chart(&registry, &databases, 300, &fixtures::ctx())
        .await
        .unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[0].error.is_none());
    assert_eq!(runs[0].points.len(), 1);

    assert!(runs[1].points.is_empty());
    let error = runs[1].error.as_deref().unwrap();
    assert!(
        error.contains("references unknown report 999"),
        "one bad range must not poison the rest; error={error}"
    );
}

#[tokio::test]
async fn run_chart_with_unknown_id_fails() {
    let registry = ReportRegistry::from_parts(vec![], vec![], vec![]);
    let databases = fixtures::warehouse(StaticConnection::empty());

    let err = run_chart(&registry, &databases, 42, &fixtures::ctx())
        .await
        .unwrap_err();
    match err {
        ReportflowError::Schema(msg) => assert!(msg.contains("unknown chart 42"), "msg={msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
