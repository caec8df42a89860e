use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A registered target database. Chooses the SQL dialect and its
/// paging capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub is_sql_server: bool,
    /// SQL Server 2012+ OFFSET/FETCH. When false the legacy ROW_NUMBER
    /// wrapping is emitted instead. Ignored by MySQL.
    #[serde(default = "default_true")]
    pub allow_paging: bool,
    #[serde(default)]
    pub connection_string: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A user-authored schema over one primary table, view, subquery or
/// stored procedure, plus the columns and joins reachable from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    /// Name of the registered [`Database`] this dataset queries.
    pub database: String,
    /// Table name, view name, `(subquery) alias` text, or procedure name.
    pub primary_source: String,
    #[serde(default)]
    pub is_proc: bool,
    /// Raw WHERE text ANDed into every statement built from this dataset.
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub columns: Vec<DatasetColumn>,
    #[serde(default)]
    pub joins: Vec<DatasetJoin>,
}

impl Dataset {
    pub fn column(&self, id: i64) -> Option<&DatasetColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Case-insensitive lookup of the join that brings in `table`.
    pub fn join_for_table(&self, table: &str) -> Option<&DatasetJoin> {
        self.joins
            .iter()
            .find(|j| j.table_name.eq_ignore_ascii_case(table))
    }

    pub fn joins_in_order(&self) -> Vec<&DatasetJoin> {
        let mut joins: Vec<&DatasetJoin> = self.joins.iter().collect();
        joins.sort_by_key(|j| j.join_order);
        joins
    }

    pub fn static_conditions(&self) -> Option<&str> {
        self.conditions
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Swap a join's position with its neighbor in the explicit join
    /// ordering. Returns false when the join is already first/last or
    /// the id is unknown.
    pub fn shift_join(&mut self, join_id: i64, up: bool) -> bool {
        let mut order: Vec<usize> = (0..self.joins.len()).collect();
        order.sort_by_key(|&i| self.joins[i].join_order);

        let Some(pos) = order.iter().position(|&i| self.joins[i].id == join_id) else {
            return false;
        };
        let neighbor = if up {
            if pos == 0 {
                return false;
            }
            order[pos - 1]
        } else {
            if pos + 1 >= order.len() {
                return false;
            }
            order[pos + 1]
        };
        let current = order[pos];

        let tmp = self.joins[current].join_order;
        self.joins[current].join_order = self.joins[neighbor].join_order;
        self.joins[neighbor].join_order = tmp;
        true
    }
}

/// One selectable/filterable column of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetColumn {
    pub id: i64,
    pub title: String,
    /// Plain column reference, possibly table-qualified
    /// (`customers.country`). For `is_param` columns this is the
    /// parameter name.
    #[serde(default)]
    pub column_name: String,
    /// Raw SQL expression. Takes precedence over `column_name` when
    /// non-empty.
    #[serde(default)]
    pub derived: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub filter_type: FilterType,
    /// Parameter columns contribute bound values instead of WHERE
    /// predicates.
    #[serde(default)]
    pub is_param: bool,
    /// URL template with `{columnN}` placeholders; referenced columns are
    /// pulled into the select list.
    #[serde(default)]
    pub link: Option<String>,
}

impl DatasetColumn {
    /// Output alias every statement uses for this column.
    pub fn alias(&self) -> String {
        format!("column{}", self.id)
    }

    /// The SQL text this column selects: `derived` wins over
    /// `column_name`; both empty means the column produces nothing.
    pub fn base_expr(&self) -> Option<&str> {
        if let Some(derived) = self.derived.as_deref() {
            let derived = derived.trim();
            if !derived.is_empty() {
                return Some(derived);
            }
        }
        let name = self.column_name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Table qualifier of a plain column reference (`customers` out of
    /// `customers.country`). Derived columns have no single source table.
    pub fn source_table(&self) -> Option<&str> {
        if self.is_derived() {
            return None;
        }
        let name = self.column_name.trim();
        name.split_once('.').map(|(table, _)| table)
    }

    pub fn is_derived(&self) -> bool {
        self.derived
            .as_deref()
            .map(str::trim)
            .is_some_and(|d| !d.is_empty())
    }

    /// Parameter name for `is_param` columns (`@startDate` and
    /// `startDate` both yield `startDate`).
    pub fn param_name(&self) -> Option<&str> {
        let name = self.column_name.trim().trim_start_matches('@');
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Column ids referenced by `{columnN}` placeholders in the link
    /// template.
    pub fn link_column_ids(&self) -> Vec<i64> {
        let Some(link) = self.link.as_deref() else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        let mut rest = link;
        while let Some(start) = rest.find("{column") {
            rest = &rest[start + "{column".len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() && rest[digits.len()..].starts_with('}') {
                if let Ok(id) = digits.parse::<i64>() {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }
}

/// A join the dataset author declared available. `keys` is raw ON-clause
/// text; other join tables mentioned inside it become transitive
/// dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetJoin {
    pub id: i64,
    pub table_name: String,
    pub join_type: JoinType,
    pub keys: String,
    pub join_order: i64,
}

/// A saved report over one dataset: selected columns, filters and
/// grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub dataset_id: i64,
    /// Applied to non-grouped columns when grouping is active. None means
    /// COUNT.
    #[serde(default)]
    pub aggregator: Option<Aggregator>,
    #[serde(default)]
    pub columns: Vec<ReportColumn>,
    #[serde(default)]
    pub filters: Vec<ReportFilter>,
    #[serde(default)]
    pub groups: Vec<ReportGroup>,
}

impl Report {
    pub fn aggregator_or_default(&self) -> Aggregator {
        self.aggregator.unwrap_or(Aggregator::Count)
    }

    /// Selected columns in display order.
    pub fn display_columns(&self) -> Vec<&ReportColumn> {
        let mut columns: Vec<&ReportColumn> = self.columns.iter().collect();
        columns.sort_by_key(|c| c.display_order);
        columns
    }

    /// Sort-participating columns in sort order.
    pub fn sort_columns(&self) -> Vec<&ReportColumn> {
        let mut columns: Vec<&ReportColumn> = self
            .columns
            .iter()
            .filter(|c| c.sort_order.is_some())
            .collect();
        columns.sort_by_key(|c| c.sort_order);
        columns
    }

    pub fn is_grouped(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Grouping column ids in display order.
    pub fn group_column_ids(&self) -> Vec<i64> {
        let mut groups: Vec<&ReportGroup> = self.groups.iter().collect();
        groups.sort_by_key(|g| g.display_order);
        groups.iter().map(|g| g.column_id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportColumn {
    pub column_id: i64,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub sort_direction: Option<SortDirection>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportFilter {
    pub column_id: i64,
    pub operator: FilterOp,
    #[serde(default, deserialize_with = "lenient_string")]
    pub criteria: String,
    /// Second bound for Range filters.
    #[serde(default, deserialize_with = "lenient_string")]
    pub criteria2: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportGroup {
    pub column_id: i64,
    #[serde(default)]
    pub display_order: i64,
}

/// A chart: one or more series definitions drawn from saved reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chart {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub ranges: Vec<ChartRange>,
}

/// One chart series: X/Y columns, aggregator, optional date bucketing.
/// The backing report supplies the dataset and the filter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartRange {
    pub id: i64,
    pub report_id: i64,
    pub x_column_id: i64,
    #[serde(default)]
    pub y_column_id: Option<i64>,
    /// None means COUNT.
    #[serde(default)]
    pub aggregator: Option<Aggregator>,
    #[serde(default)]
    pub date_interval: Option<DateInterval>,
    /// Emit zero-valued buckets for missing interval steps.
    #[serde(default)]
    pub fill_date_gaps: bool,
}

impl ChartRange {
    pub fn aggregator_or_default(&self) -> Aggregator {
        self.aggregator.unwrap_or(Aggregator::Count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int,
    Decimal,
    DateTime,
    Text,
    Binary,
    Guid,
}

impl DataType {
    /// Text and date values only aggregate meaningfully with MAX; any
    /// requested aggregator collapses to it.
    pub fn aggregates_as_max(&self) -> bool {
        matches!(self, DataType::Text | DataType::DateTime)
    }

    /// GUIDs surface as raw binary under aggregation unless cast to text
    /// first.
    pub fn needs_text_cast(&self) -> bool {
        matches!(self, DataType::Guid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[default]
    None,
    Boolean,
    Date,
    Numeric,
    Select,
    Text,
}

impl FilterType {
    /// Operators a filter of this type may use.
    pub fn allows(&self, op: FilterOp) -> bool {
        use FilterOp::*;
        match self {
            FilterType::None => false,
            FilterType::Boolean => matches!(op, Equal | NotEqual),
            FilterType::Date => matches!(
                op,
                Equal
                    | NotEqual
                    | GreaterThan
                    | LessThan
                    | GreaterOrEqual
                    | LessOrEqual
                    | Range
                    | DateInterval
            ),
            FilterType::Numeric => matches!(
                op,
                Equal
                    | NotEqual
                    | GreaterThan
                    | LessThan
                    | GreaterOrEqual
                    | LessOrEqual
                    | Range
                    | In
                    | NotIn
            ),
            FilterType::Select => matches!(op, Equal | NotEqual | In | NotIn),
            FilterType::Text => matches!(op, Equal | NotEqual | Like | NotLike | In | NotIn),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Range,
    In,
    NotIn,
    Like,
    NotLike,
    DateInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregator {
    pub fn sql_name(&self) -> &'static str {
        match self {
            Aggregator::Count => "COUNT",
            Aggregator::Sum => "SUM",
            Aggregator::Avg => "AVG",
            Aggregator::Min => "MIN",
            Aggregator::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateInterval {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// Criteria values arrive from YAML/JSON as strings, numbers or bools;
/// normalize them all to strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "criteria must be a scalar, got {other}"
        ))),
    }
}
