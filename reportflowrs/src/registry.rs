use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use serde::Serialize;

use crate::error::{ReportflowError, Result};
use crate::schema::{Chart, DataType, Dataset, FilterType, Report};

/// In-memory metadata store: every dataset, report and chart the engine
/// can compile, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct ReportRegistry {
    pub datasets: HashMap<i64, Dataset>,
    pub reports: HashMap<i64, Report>,
    pub charts: HashMap<i64, Chart>,
}

/// One line of the report picker.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: i64,
    pub name: String,
    pub dataset_id: i64,
    pub column_count: usize,
}

/// One line of the dataset column picker.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub id: i64,
    pub title: String,
    pub data_type: DataType,
    pub filter_type: FilterType,
    pub is_param: bool,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(datasets: Vec<Dataset>, reports: Vec<Report>, charts: Vec<Chart>) -> Self {
        let mut registry = ReportRegistry::new();
        for dataset in datasets {
            registry.datasets.insert(dataset.id, dataset);
        }
        for report in reports {
            registry.reports.insert(report.id, report);
        }
        for chart in charts {
            registry.charts.insert(chart.id, chart);
        }
        registry
    }

    /// Load metadata from `datasets/`, `reports/` and `charts/`
    /// subdirectories of `root`. Charts are optional; the other two
    /// directories must exist.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut registry = ReportRegistry::new();
        registry.load_datasets(root.as_ref().join("datasets"))?;
        registry.load_reports(root.as_ref().join("reports"))?;
        let charts = root.as_ref().join("charts");
        if charts.exists() {
            registry.load_charts(charts)?;
        }
        Ok(registry)
    }

    fn load_datasets(&mut self, dir: PathBuf) -> Result<()> {
        if !dir.exists() {
            return Err(ReportflowError::Config(format!(
                "datasets directory not found: {}",
                dir.display()
            )));
        }
        for entry in yaml_files(&dir)? {
            let contents = fs::read_to_string(&entry)?;
            let dataset: Dataset = serde_yaml::from_str(&contents)?;
            self.datasets.insert(dataset.id, dataset);
        }
        Ok(())
    }

    fn load_reports(&mut self, dir: PathBuf) -> Result<()> {
        if !dir.exists() {
            return Err(ReportflowError::Config(format!(
                "reports directory not found: {}",
                dir.display()
            )));
        }
        for entry in yaml_files(&dir)? {
            let contents = fs::read_to_string(&entry)?;
            let report: Report = serde_yaml::from_str(&contents)?;
            self.reports.insert(report.id, report);
        }
        Ok(())
    }

    fn load_charts(&mut self, dir: PathBuf) -> Result<()> {
        for entry in yaml_files(&dir)? {
            let contents = fs::read_to_string(&entry)?;
            let chart: Chart = serde_yaml::from_str(&contents)?;
            self.charts.insert(chart.id, chart);
        }
        Ok(())
    }

    pub fn get_dataset(&self, id: i64) -> Option<&Dataset> {
        self.datasets.get(&id)
    }

    pub fn get_report(&self, id: i64) -> Option<&Report> {
        self.reports.get(&id)
    }

    pub fn get_chart(&self, id: i64) -> Option<&Chart> {
        self.charts.get(&id)
    }

    /// Report overviews for UI pickers, ordered by id.
    pub fn list_report_summaries(&self) -> Vec<ReportSummary> {
        let mut summaries: Vec<ReportSummary> = self
            .reports
            .values()
            .map(|report| ReportSummary {
                id: report.id,
                name: report.name.clone(),
                dataset_id: report.dataset_id,
                column_count: report.columns.len(),
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Column overview of one dataset, ordered by column id.
    pub fn dataset_schema(&self, id: i64) -> Option<Vec<ColumnSchema>> {
        let dataset = self.get_dataset(id)?;
        let mut columns: Vec<ColumnSchema> = dataset
            .columns
            .iter()
            .map(|column| ColumnSchema {
                id: column.id,
                title: column.title.clone(),
                data_type: column.data_type,
                filter_type: column.filter_type,
                is_param: column.is_param,
            })
            .collect();
        columns.sort_by_key(|c| c.id);
        Some(columns)
    }
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in ["yml", "yaml"] {
        for entry in glob(&format!("{}/*.{pattern}", dir.display()))
            .map_err(|e| ReportflowError::Other(e.into()))?
            .flatten()
        {
            files.push(entry);
        }
    }
    Ok(files)
}
