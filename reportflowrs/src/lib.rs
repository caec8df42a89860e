pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod query;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod sql_ast;
pub mod validation;

use std::path::Path;

use crate::error::Result;
use crate::registry::ReportRegistry;

/// Load report metadata from disk and validate it with the provided
/// validator.
pub fn load_and_validate<P: AsRef<Path>>(
    metadata_dir: P,
    validator: &crate::validation::Validator,
) -> Result<ReportRegistry> {
    let registry = ReportRegistry::load_from_dir(metadata_dir)?;
    validator.validate_registry(&registry)?;
    Ok(registry)
}

pub use crate::validation::Validator;
pub use config::ReportflowConfig;
pub use database::{Connection, DatabaseRegistry, QueryResult, StaticConnection};
pub use error::ReportflowError;
pub use query::{bucket_points, ChartPoint, CompileContext, CompiledQuery, SqlBuilder};
pub use registry::{ColumnSchema, ReportSummary};
pub use runner::{run_chart, run_report, RangeRun, ReportRun};
pub use schema::{Chart, ChartRange, Database, Dataset, Report};
pub use sql_ast::{Page, ParamValue, QueryParam};
