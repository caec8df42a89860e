//! Filter translation.
//!
//! Turns report filters into predicate groups and bound parameters.
//! Predicates against the same column OR together, distinct columns AND
//! together; binding order follows filter display order. Filters on
//! `is_param` columns never produce predicates, only named parameters.

use std::cmp::Ordering;

use crate::error::{ReportflowError, Result};
use crate::query::dates::{self, DateKeyword};
use crate::query::CompileContext;
use crate::schema::{DataType, Dataset, DatasetColumn, FilterOp, ReportFilter};
use crate::sql_ast::{quote_str, ParamValue, PredicateGroup, QueryParam};

/// Predicates plus every parameter the filters bind, ordinal and named.
#[derive(Debug, Default)]
pub(crate) struct FilterPlan {
    pub groups: Vec<PredicateGroup>,
    pub params: Vec<QueryParam>,
}

/// Translate the report's filters against `dataset`.
pub(crate) fn build_filters(
    dataset: &Dataset,
    filters: &[ReportFilter],
    ctx: &CompileContext,
) -> Result<FilterPlan> {
    let mut ordered: Vec<&ReportFilter> = filters.iter().collect();
    ordered.sort_by_key(|f| f.display_order);

    let mut plan = FilterPlan::default();
    let mut ordinal = 0usize;
    for filter in ordered {
        let column = dataset.column(filter.column_id).ok_or_else(|| {
            ReportflowError::Validation(format!(
                "filter references unknown column {} on dataset {}",
                filter.column_id, dataset.id
            ))
        })?;

        if column.is_param {
            if let Some(param) = named_param(column, filter)? {
                plan.params.push(param);
            }
            continue;
        }

        // Stored procedures take parameters only; anything else on a proc
        // dataset is a validator concern, not a predicate.
        if dataset.is_proc {
            continue;
        }

        if !column.filter_type.allows(filter.operator) {
            return Err(ReportflowError::Validation(format!(
                "column '{}' does not allow the {:?} operator",
                column.title, filter.operator
            )));
        }

        let Some(base) = column.base_expr() else {
            continue;
        };
        let expr = format!("({base})");
        let Some(predicate) = build_predicate(column, filter, &expr, &mut ordinal, &mut plan.params, ctx)?
        else {
            continue;
        };

        match plan
            .groups
            .iter_mut()
            .find(|group| group.column_id == column.id)
        {
            Some(group) => group.predicates.push(predicate),
            None => plan.groups.push(PredicateGroup {
                column_id: column.id,
                predicates: vec![predicate],
            }),
        }
    }
    Ok(plan)
}

/// Render one predicate, binding parameters as needed. Returns None when
/// the criteria is empty.
fn build_predicate(
    column: &DatasetColumn,
    filter: &ReportFilter,
    expr: &str,
    ordinal: &mut usize,
    params: &mut Vec<QueryParam>,
    ctx: &CompileContext,
) -> Result<Option<String>> {
    let criteria = filter.criteria.trim();
    if criteria.is_empty() {
        return Ok(None);
    }

    let predicate = match filter.operator {
        FilterOp::Equal
        | FilterOp::NotEqual
        | FilterOp::GreaterThan
        | FilterOp::LessThan
        | FilterOp::GreaterOrEqual
        | FilterOp::LessOrEqual => {
            let value = typed_value(column, criteria)?;
            let param = bind(ordinal, params, value);
            format!("{expr} {} {param}", comparison_sql(filter.operator))
        }
        FilterOp::Range => {
            let second = filter.criteria2.trim();
            if second.is_empty() {
                return Ok(None);
            }
            let mut low = typed_value(column, criteria)?;
            let mut high = typed_value(column, second)?;
            if value_order(&low, &high) == Some(Ordering::Greater) {
                std::mem::swap(&mut low, &mut high);
            }
            let low = bind(ordinal, params, low);
            let high = bind(ordinal, params, high);
            format!("{expr} BETWEEN {low} AND {high}")
        }
        FilterOp::In | FilterOp::NotIn => {
            let items: Vec<String> = criteria
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(quote_str)
                .collect();
            if items.is_empty() {
                return Ok(None);
            }
            let keyword = if filter.operator == FilterOp::In {
                "IN"
            } else {
                "NOT IN"
            };
            format!("{expr} {keyword} ({})", items.join(", "))
        }
        FilterOp::Like | FilterOp::NotLike => {
            let value = ParamValue::Text(format!("%{criteria}%"));
            let param = bind(ordinal, params, value);
            let keyword = if filter.operator == FilterOp::Like {
                "LIKE"
            } else {
                "NOT LIKE"
            };
            format!("{expr} {keyword} {param}")
        }
        FilterOp::DateInterval => {
            let keyword = DateKeyword::parse(criteria).ok_or_else(|| {
                ReportflowError::Sql(format!("unknown date keyword: {criteria}"))
            })?;
            let (start, end) = dates::keyword_range(keyword, ctx.now, ctx.week_start);
            let low = bind(ordinal, params, ParamValue::Text(dates::format_datetime(start)));
            let high = bind(ordinal, params, ParamValue::Text(dates::format_datetime(end)));
            format!("{expr} BETWEEN {low} AND {high}")
        }
    };
    Ok(Some(predicate))
}

/// Named parameter for an `is_param` column; the value is still
/// normalized by the column's type.
fn named_param(column: &DatasetColumn, filter: &ReportFilter) -> Result<Option<QueryParam>> {
    let criteria = filter.criteria.trim();
    if criteria.is_empty() {
        return Ok(None);
    }
    let Some(name) = column.param_name() else {
        return Ok(None);
    };
    Ok(Some(QueryParam::new(name, typed_value(column, criteria)?)))
}

fn bind(ordinal: &mut usize, params: &mut Vec<QueryParam>, value: ParamValue) -> String {
    let param = QueryParam::new(format!("p{ordinal}"), value);
    *ordinal += 1;
    let placeholder = param.placeholder();
    params.push(param);
    placeholder
}

fn comparison_sql(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "=",
        FilterOp::NotEqual => "<>",
        FilterOp::GreaterThan => ">",
        FilterOp::LessThan => "<",
        FilterOp::GreaterOrEqual => ">=",
        FilterOp::LessOrEqual => "<=",
        _ => "=",
    }
}

/// Parse a criteria string into the parameter type the column calls for.
fn typed_value(column: &DatasetColumn, raw: &str) -> Result<ParamValue> {
    match column.data_type {
        DataType::Int => raw.trim().parse::<i64>().map(ParamValue::Int).map_err(|_| {
            ReportflowError::Sql(format!(
                "invalid integer criteria '{raw}' for column '{}'",
                column.title
            ))
        }),
        DataType::Decimal => raw
            .trim()
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| {
                ReportflowError::Sql(format!(
                    "invalid numeric criteria '{raw}' for column '{}'",
                    column.title
                ))
            }),
        DataType::Bool => parse_bool(raw).map(ParamValue::Bool).ok_or_else(|| {
            ReportflowError::Sql(format!(
                "invalid boolean criteria '{raw}' for column '{}'",
                column.title
            ))
        }),
        DataType::DateTime => Ok(ParamValue::Text(dates::normalize_datetime(raw)?)),
        _ => Ok(ParamValue::Text(raw.to_string())),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Ordering between two bound values of the same shape. Normalized
/// datetime text sorts chronologically, so text comparison covers it.
fn value_order(a: &ParamValue, b: &ParamValue) -> Option<Ordering> {
    match (a, b) {
        (ParamValue::Int(a), ParamValue::Int(b)) => Some(a.cmp(b)),
        (ParamValue::Float(a), ParamValue::Float(b)) => a.partial_cmp(b),
        (ParamValue::Text(a), ParamValue::Text(b)) => Some(a.cmp(b)),
        (ParamValue::Bool(a), ParamValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
