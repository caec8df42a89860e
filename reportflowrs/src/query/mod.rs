//! Query compilation.
//!
//! [`SqlBuilder`] turns a report or chart range plus a dialect into
//! final SQL strings and a parameter map. Compilation is pure: the
//! clock and week start come in through [`CompileContext`], so
//! identical inputs produce byte-identical SQL.

mod chart;
mod columns;
mod dates;
mod filters;
mod groups;
mod joins;
mod planner;

pub use chart::{bucket_points, ChartPoint};
pub use dates::{keyword_range, normalize_datetime, DateKeyword, SQL_DATETIME_FORMAT};

use chrono::{Local, NaiveDateTime, Weekday};

use crate::database::DatabaseRegistry;
use crate::dialect::{dialect_for, Dialect};
use crate::error::{ReportflowError, Result};
use crate::registry::ReportRegistry;
use crate::schema::{ChartRange, Dataset, Report};
use crate::sql_ast::{Page, QueryParam, SelectStatement};

/// Clock and calendar inputs compilation depends on.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext {
    pub now: NaiveDateTime,
    pub week_start: Weekday,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self {
            now: Local::now().naive_local(),
            week_start: Weekday::Mon,
        }
    }
}

impl CompileContext {
    pub fn new(now: NaiveDateTime, week_start: Weekday) -> Self {
        Self { now, week_start }
    }

    pub fn with_week_start(week_start: Weekday) -> Self {
        Self {
            week_start,
            ..Self::default()
        }
    }
}

/// What a report compiles into before rendering.
pub(crate) enum Plan {
    Select {
        stmt: SelectStatement,
        params: Vec<QueryParam>,
    },
    Exec {
        proc: String,
        params: Vec<QueryParam>,
    },
}

/// A fully rendered statement plus its parameter map.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    /// Matching total-count statement; procedures have none.
    pub count_sql: Option<String>,
    pub params: Vec<QueryParam>,
    pub is_proc: bool,
}

impl CompiledQuery {
    /// Statement with every parameter inlined as an escaped literal.
    /// Longer names substitute first so `@p1` never clobbers `@p10`.
    pub fn prepared_sql(&self) -> String {
        inline_params(&self.sql, &self.params)
    }

    pub fn prepared_count_sql(&self) -> Option<String> {
        self.count_sql
            .as_ref()
            .map(|sql| inline_params(sql, &self.params))
    }
}

fn inline_params(sql: &str, params: &[QueryParam]) -> String {
    let mut ordered: Vec<&QueryParam> = params.iter().collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(p.name.len()));
    let mut out = sql.to_string();
    for param in ordered {
        out = out.replace(&param.placeholder(), &param.value.to_literal());
    }
    out
}

/// Stateless facade compiling reports and chart ranges to SQL.
pub struct SqlBuilder;

impl SqlBuilder {
    /// Compile a report against an explicit dialect.
    pub fn build_with_dialect(
        registry: &ReportRegistry,
        report_id: i64,
        page: &Page,
        ctx: &CompileContext,
        dialect: &dyn Dialect,
    ) -> Result<CompiledQuery> {
        let (dataset, report) = resolve_report(registry, report_id)?;
        let plan = planner::plan_report(dataset, report, *page, ctx, dialect)?;
        Ok(render_plan(plan, dialect))
    }

    /// Compile a report, picking the dialect from the dataset's database.
    pub fn build_for_database(
        registry: &ReportRegistry,
        databases: &DatabaseRegistry,
        report_id: i64,
        page: &Page,
        ctx: &CompileContext,
    ) -> Result<CompiledQuery> {
        let (dataset, report) = resolve_report(registry, report_id)?;
        let database = databases.get_database(&dataset.database).ok_or_else(|| {
            ReportflowError::Schema(format!(
                "dataset {} references unknown database '{}'",
                dataset.id, dataset.database
            ))
        })?;
        let dialect = dialect_for(database);
        let plan = planner::plan_report(dataset, report, *page, ctx, dialect.as_ref())?;
        Ok(render_plan(plan, dialect.as_ref()))
    }

    /// Compile one chart range. Chart statements are never paged and
    /// carry no count statement.
    pub fn build_chart_range(
        registry: &ReportRegistry,
        range: &ChartRange,
        ctx: &CompileContext,
        dialect: &dyn Dialect,
    ) -> Result<CompiledQuery> {
        let (dataset, report) = resolve_report(registry, range.report_id)?;
        let plan = chart::plan_chart_range(dataset, report, range, ctx, dialect)?;
        let mut compiled = render_plan(plan, dialect);
        compiled.count_sql = None;
        Ok(compiled)
    }
}

fn resolve_report(registry: &ReportRegistry, report_id: i64) -> Result<(&Dataset, &Report)> {
    let report = registry
        .get_report(report_id)
        .ok_or_else(|| ReportflowError::Schema(format!("unknown report {report_id}")))?;
    let dataset = registry.get_dataset(report.dataset_id).ok_or_else(|| {
        ReportflowError::Schema(format!(
            "report {} references unknown dataset {}",
            report_id, report.dataset_id
        ))
    })?;
    Ok((dataset, report))
}

fn render_plan(plan: Plan, dialect: &dyn Dialect) -> CompiledQuery {
    match plan {
        Plan::Select { stmt, params } => CompiledQuery {
            sql: dialect.render_select(&stmt),
            count_sql: Some(dialect.render_count(&stmt)),
            params,
            is_proc: false,
        },
        Plan::Exec { proc, params } => CompiledQuery {
            sql: dialect.render_exec(&proc, &params),
            count_sql: None,
            params,
            is_proc: true,
        },
    }
}
