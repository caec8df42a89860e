use std::collections::HashSet;

use tracing::warn;

use crate::error::{ReportflowError, Result};
use crate::registry::ReportRegistry;
use crate::schema::{Chart, Dataset, FilterOp, Report};

/// Structural checks over loaded metadata. With `warn_only` set every
/// failed check logs instead of failing, which keeps half-migrated
/// metadata usable.
pub struct Validator {
    warn_only: bool,
}

impl Validator {
    pub fn new(warn_only: bool) -> Self {
        Self { warn_only }
    }

    pub fn validate_registry(&self, registry: &ReportRegistry) -> Result<()> {
        for dataset in registry.datasets.values() {
            self.validate_dataset(dataset)?;
        }
        for report in registry.reports.values() {
            self.validate_report(report, registry)?;
        }
        for chart in registry.charts.values() {
            self.validate_chart(chart, registry)?;
        }
        Ok(())
    }

    fn validate_dataset(&self, dataset: &Dataset) -> Result<()> {
        self.check(
            !dataset.primary_source.trim().is_empty(),
            format!("dataset {} has no primary source", dataset.id),
        )?;
        self.check(
            !dataset.columns.is_empty(),
            format!("dataset {} has no columns", dataset.id),
        )?;

        let mut column_ids = HashSet::new();
        for column in &dataset.columns {
            self.check(
                column_ids.insert(column.id),
                format!("dataset {} repeats column id {}", dataset.id, column.id),
            )?;
        }

        if !dataset.is_proc {
            let mut tables = HashSet::new();
            for join in &dataset.joins {
                self.check(
                    tables.insert(join.table_name.to_ascii_lowercase()),
                    format!(
                        "dataset {} joins table '{}' more than once",
                        dataset.id, join.table_name
                    ),
                )?;
                self.check(
                    !join.keys.trim().is_empty(),
                    format!(
                        "dataset {} join '{}' has no keys",
                        dataset.id, join.table_name
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn validate_report(&self, report: &Report, registry: &ReportRegistry) -> Result<()> {
        let Some(dataset) = registry.get_dataset(report.dataset_id) else {
            return self.check(
                false,
                format!(
                    "report {} references missing dataset {}",
                    report.id, report.dataset_id
                ),
            );
        };

        for rc in &report.columns {
            self.check(
                dataset.column(rc.column_id).is_some(),
                format!(
                    "report {} selects unknown column {} on dataset {}",
                    report.id, rc.column_id, dataset.id
                ),
            )?;
        }
        for group in &report.groups {
            self.check(
                dataset.column(group.column_id).is_some(),
                format!(
                    "report {} groups by unknown column {} on dataset {}",
                    report.id, group.column_id, dataset.id
                ),
            )?;
        }

        for filter in &report.filters {
            let Some(column) = dataset.column(filter.column_id) else {
                self.check(
                    false,
                    format!(
                        "report {} filters unknown column {} on dataset {}",
                        report.id, filter.column_id, dataset.id
                    ),
                )?;
                continue;
            };
            if column.is_param {
                continue;
            }
            self.check(
                !dataset.is_proc,
                format!(
                    "report {} filters non-parameter column '{}' on procedure dataset {}",
                    report.id, column.title, dataset.id
                ),
            )?;
            self.check(
                column.filter_type.allows(filter.operator),
                format!(
                    "report {} applies {:?} to column '{}' which does not allow it",
                    report.id, filter.operator, column.title
                ),
            )?;
            if filter.operator == FilterOp::Range {
                self.check(
                    !filter.criteria.trim().is_empty() && !filter.criteria2.trim().is_empty(),
                    format!(
                        "report {} range filter on '{}' needs both bounds",
                        report.id, column.title
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn validate_chart(&self, chart: &Chart, registry: &ReportRegistry) -> Result<()> {
        for range in &chart.ranges {
            let Some(report) = registry.get_report(range.report_id) else {
                self.check(
                    false,
                    format!(
                        "chart {} range {} references missing report {}",
                        chart.id, range.id, range.report_id
                    ),
                )?;
                continue;
            };
            let Some(dataset) = registry.get_dataset(report.dataset_id) else {
                continue;
            };
            self.check(
                !dataset.is_proc,
                format!(
                    "chart {} range {} targets procedure dataset {}",
                    chart.id, range.id, dataset.id
                ),
            )?;
            self.check(
                dataset.column(range.x_column_id).is_some(),
                format!(
                    "chart {} range {} uses unknown x column {}",
                    chart.id, range.id, range.x_column_id
                ),
            )?;
            if let Some(y) = range.y_column_id {
                self.check(
                    dataset.column(y).is_some(),
                    format!(
                        "chart {} range {} uses unknown y column {y}",
                        chart.id, range.id
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn check(&self, condition: bool, message: String) -> Result<()> {
        if condition {
            return Ok(());
        }
        if self.warn_only {
            warn!("{message}");
            Ok(())
        } else {
            Err(ReportflowError::Validation(message))
        }
    }
}
