use bson::Bson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Bounds, Filter, FilterValue, Op};
use crate::errors::DbError;

// Serde-facing tree for filters written as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FilterSerde {
    And { items: Vec<FilterSerde> },
    Or { items: Vec<FilterSerde> },
    Not { item: Box<FilterSerde> },
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    Gt { field: String, value: Value },
    Gte { field: String, value: Value },
    Lt { field: String, value: Value },
    Lte { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Nin { field: String, values: Vec<Value> },
    Between { field: String, from: Value, to: Value },
    BetweenEq { field: String, from: Value, to: Value },
    Range { field: String, from: Value, to: Value },
    RangeEq { field: String, from: Value, to: Value },
    StartsWith { field: String, value: String },
    EndsWith { field: String, value: String },
    Contains { field: String, values: Vec<String> },
    Exists { field: String, #[serde(default = "default_true")] value: bool },
    ElemMatch { field: String, filter: Box<FilterSerde> },
    Sort { field: String, #[serde(default)] direction: String },
}

const fn default_true() -> bool {
    true
}

impl TryFrom<FilterSerde> for Filter {
    type Error = DbError;
    fn try_from(fs: FilterSerde) -> Result<Self, Self::Error> {
        use FilterSerde as FS;
        Ok(match fs {
            FS::And { items } => {
                Self::and(items.into_iter().map(Self::try_from).collect::<Result<Vec<_>, _>>()?)
            }
            FS::Or { items } => {
                Self::or(items.into_iter().map(Self::try_from).collect::<Result<Vec<_>, _>>()?)
            }
            FS::Not { item } => Self::not(Self::try_from(*item)?),
            FS::Eq { field, value } => scalar(field, Op::Eq, value)?,
            FS::Ne { field, value } => scalar(field, Op::Ne, value)?,
            FS::Gt { field, value } => scalar(field, Op::Gt, value)?,
            FS::Gte { field, value } => scalar(field, Op::Gte, value)?,
            FS::Lt { field, value } => scalar(field, Op::Lt, value)?,
            FS::Lte { field, value } => scalar(field, Op::Lte, value)?,
            FS::In { field, values } => Self::is_in(field, to_bson_list(values)?),
            FS::Nin { field, values } => Self::not_in(field, to_bson_list(values)?),
            FS::Between { field, from, to } => ranged(field, Op::Between, &from, &to)?,
            FS::BetweenEq { field, from, to } => ranged(field, Op::BetweenEq, &from, &to)?,
            FS::Range { field, from, to } => ranged(field, Op::Range, &from, &to)?,
            FS::RangeEq { field, from, to } => ranged(field, Op::RangeEq, &from, &to)?,
            FS::StartsWith { field, value } => Self::starts_with(field, value),
            FS::EndsWith { field, value } => Self::ends_with(field, value),
            FS::Contains { field, values } => Self::contains(field, values),
            FS::Exists { field, value } => Self::exists(field, value),
            FS::ElemMatch { field, filter } => Self::elem_match(field, Self::try_from(*filter)?),
            FS::Sort { field, direction } => Self::sort(field, &direction),
        })
    }
}

fn to_bson(value: Value) -> Result<Bson, DbError> {
    Bson::try_from(value).map_err(|e| DbError::config(format!("unsupported filter value: {e}")))
}

fn to_bson_list(values: Vec<Value>) -> Result<Vec<Bson>, DbError> {
    values.into_iter().map(to_bson).collect()
}

fn scalar(field: String, op: Op, value: Value) -> Result<Filter, DbError> {
    Ok(Filter { items: Vec::new(), field, op, value: FilterValue::Scalar(to_bson(value)?) })
}

fn ranged(field: String, op: Op, from: &Value, to: &Value) -> Result<Filter, DbError> {
    let bounds = match (from, to) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => match (i32::try_from(a), i32::try_from(b)) {
                (Ok(a), Ok(b)) => Bounds::Int32(a, b),
                _ => Bounds::Int64(a, b),
            },
            _ => return Err(unsupported_pair(&field)),
        },
        (Value::String(a), Value::String(b)) => match (timestamp(a), timestamp(b)) {
            (Some(a), Some(b)) => Bounds::DateTime(a, b),
            _ => return Err(unsupported_pair(&field)),
        },
        _ => return Err(unsupported_pair(&field)),
    };
    Ok(Filter { items: Vec::new(), field, op, value: FilterValue::Pair(bounds) })
}

fn timestamp(s: &str) -> Option<bson::DateTime> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| bson::DateTime::from_millis(dt.with_timezone(&Utc).timestamp_millis()))
}

fn unsupported_pair(field: &str) -> DbError {
    DbError::config(format!(
        "range on '{field}' needs two integers or two RFC 3339 timestamps"
    ))
}

/// # Errors
/// Returns an error if the JSON cannot be parsed into a filter tree, or a range pair has an
/// unsupported type.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let fs: FilterSerde = serde_json::from_str(json)?;
    Filter::try_from(fs)
}
