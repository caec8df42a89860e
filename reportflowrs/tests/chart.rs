//! Integration tests for chart-range compilation.
//!
//! Chart ranges compile through the same planner as reports but always
//! produce a two-column grouped select, unpaged and countless; the date
//! bucketing itself happens after execution.

use chrono::{NaiveDate, Weekday};
use reportflow::dialect::SqlServerDialect;
use reportflow::registry::ReportRegistry;
use reportflow::schema::{
    Aggregator, ChartRange, DataType, Dataset, DatasetColumn, DatasetJoin, DateInterval, FilterOp,
    FilterType, JoinType, Report, ReportColumn, ReportFilter,
};
use reportflow::{CompileContext, ReportflowError, SqlBuilder};

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

    fn column(
        id: i64,
        title: &str,
        column_name: &str,
        data_type: DataType,
        filter_type: FilterType,
    ) -> DatasetColumn {
        DatasetColumn {
            id,
            title: title.to_string(),
            column_name: column_name.to_string(),
            derived: None,
            data_type,
            filter_type,
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
            conditions: Some("orders.deleted = 0".to_string()),
            columns: vec![
                column(
                    2,
                    "Placed At",
                    "orders.placed_at",
                    DataType::DateTime,
                    FilterType::Date,
                ),
                column(3, "Customer", "customers.name", DataType::Text, FilterType::Text),
                column(4, "Total", "orders.total", DataType::Decimal, FilterType::Numeric),
                column(5, "Status", "orders.status", DataType::Text, FilterType::Select),
            ],
            joins: vec![DatasetJoin {
                id: 20,
                table_name: "customers".to_string(),
                join_type: JoinType::Left,
                keys: "orders.customer_id = customers.id".to_string(),
                join_order: 1,
            }],
        }
    }

    pub fn orders_report(filters: Vec<ReportFilter>) -> Report {
        Report {
            id: 100,
            name: "Recent Orders".to_string(),
            dataset_id: 1,
            aggregator: None,
            columns: vec![ReportColumn {
                column_id: 2,
                display_order: 1,
                sort_direction: None,
                sort_order: None,
            }],
            filters,
            groups: vec![],
        }
    }

    pub fn range(x_column_id: i64, y_column_id: Option<i64>) -> ChartRange {
        ChartRange {
            id: 1,
            report_id: 100,
            x_column_id,
            y_column_id,
            aggregator: None,
            date_interval: Some(DateInterval::Month),
            fill_date_gaps: false,
        }
    }

    pub fn registry(dataset: Dataset, report: Report) -> ReportRegistry {
        ReportRegistry::from_parts(vec![dataset], vec![report], vec![])
    }

    pub fn compile(registry: &ReportRegistry, range: &ChartRange) -> reportflow::CompiledQuery {
        SqlBuilder::build_chart_range(registry, range, &ctx(), &SqlServerDialect::default())
            .unwrap()
    }
}

// ============================================================================
// Statement shape
// ============================================================================

#[test]
fn chart_range_compiles_to_grouped_two_column_select() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));
    let mut range = fixtures::range(2, Some(4));
    range.aggregator = Some(Aggregator::Sum);

    let compiled = fixtures::compile(&registry, &range);
    assert_eq!(
        compiled.sql,
        "SELECT (orders.placed_at) AS column2, SUM((orders.total)) AS column4 \
         FROM orders WHERE (orders.deleted = 0) \
         GROUP BY (orders.placed_at) ORDER BY 1"
    );
    assert!(compiled.count_sql.is_none(), "chart statements carry no count");
    assert!(!compiled.is_proc);
}

#[test]
fn chart_range_without_y_counts_rows() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));
    let compiled = fixtures::compile(&registry, &fixtures::range(2, None));

    assert!(
        compiled.sql.contains("COUNT((1)) AS column0"),
        "sql={}",
        compiled.sql
    );
}

#[test]
fn chart_y_text_column_still_forces_max() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));
    let mut range = fixtures::range(2, Some(5));
    range.aggregator = Some(Aggregator::Sum);

    let compiled = fixtures::compile(&registry, &range);
    assert!(
        compiled.sql.contains("MAX((orders.status)) AS column5"),
        "sql={}",
        compiled.sql
    );
}

#[test]
fn chart_range_inherits_report_filters() {
    let report = fixtures::orders_report(vec![ReportFilter {
        column_id: 5,
        operator: FilterOp::Equal,
        criteria: "shipped".to_string(),
        criteria2: String::new(),
        display_order: 1,
    }]);
    let registry = fixtures::registry(fixtures::orders_dataset(), report);

    let compiled = fixtures::compile(&registry, &fixtures::range(2, None));
    assert!(
        compiled
            .sql
            .contains("WHERE (orders.status) = @p0 AND (orders.deleted = 0)"),
        "sql={}",
        compiled.sql
    );
    assert_eq!(compiled.params.len(), 1);
}

#[test]
fn chart_x_column_pulls_its_join() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));
    let compiled = fixtures::compile(&registry, &fixtures::range(3, None));

    assert!(
        compiled
            .sql
            .contains("LEFT JOIN customers ON orders.customer_id = customers.id"),
        "sql={}",
        compiled.sql
    );
    assert!(
        compiled.sql.contains(" GROUP BY (customers.name)"),
        "sql={}",
        compiled.sql
    );
}

#[test]
fn chart_range_is_never_paged() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));
    let compiled = fixtures::compile(&registry, &fixtures::range(2, None));

    assert!(!compiled.sql.contains("OFFSET"), "sql={}", compiled.sql);
    assert!(!compiled.sql.contains("FETCH"), "sql={}", compiled.sql);
    assert!(compiled.sql.ends_with("ORDER BY 1"), "sql={}", compiled.sql);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn chart_over_procedure_dataset_is_a_validation_error() {
    let mut dataset = fixtures::orders_dataset();
    dataset.is_proc = true;
    dataset.joins.clear();
    let registry = fixtures::registry(dataset, fixtures::orders_report(vec![]));

    let err = SqlBuilder::build_chart_range(
        &registry,
        &fixtures::range(2, None),
        &fixtures::ctx(),
        &SqlServerDialect::default(),
    )
    .unwrap_err();
    match err {
        ReportflowError::Validation(msg) => assert!(
            msg.contains("targets stored procedure dataset 1"),
            "msg={msg}"
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn chart_with_unknown_x_column_is_a_validation_error() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));

    let err = SqlBuilder::build_chart_range(
        &registry,
        &fixtures::range(99, None),
        &fixtures::ctx(),
        &SqlServerDialect::default(),
    )
    .unwrap_err();
    match err {
        ReportflowError::Validation(msg) => {
            assert!(msg.contains("unknown x column 99"), "msg={msg}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn chart_with_unknown_y_column_is_a_validation_error() {
    let registry = fixtures::registry(fixtures::orders_dataset(), fixtures::orders_report(vec![]));

    let err = SqlBuilder::build_chart_range(
        &registry,
        &fixtures::range(2, Some(98)),
        &fixtures::ctx(),
        &SqlServerDialect::default(),
    )
    .unwrap_err();
    match err {
        ReportflowError::Validation(msg) => {
            assert!(msg.contains("unknown y column 98"), "msg={msg}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
