use bson::{Bson, Document, doc};

use crate::errors::DbError;
use crate::filter::{Filter, compile_expr, compile_match};

/// One key of a multi-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParams {
    pub field: String,
    pub ascending: bool,
}

/// A `$switch` branch: when `case` holds, the expression yields `then`.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub case: Filter,
    pub then: Bson,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchParams {
    pub cases: Vec<Case>,
    pub default: Option<Bson>,
}

const fn direction(ascending: bool) -> i32 {
    if ascending { 1 } else { -1 }
}

/// `{"$match": <compiled filter>}`
///
/// # Errors
/// Propagates compile errors from the filter tree.
pub fn match_stage(filter: &Filter) -> Result<Document, DbError> {
    Ok(doc! { "$match": compile_match(filter)? })
}

/// Unwind an array field. Prefix the path with `$`.
#[must_use]
pub fn unwind(path: &str, preserve_empty: bool) -> Document {
    doc! {
        "$unwind": {
            "path": path,
            "preserveNullAndEmptyArrays": preserve_empty,
        }
    }
}

#[must_use]
pub fn lookup(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Document {
    doc! {
        "$lookup": {
            "from": from,
            "localField": local_field,
            "foreignField": foreign_field,
            "as": as_field,
        }
    }
}

#[must_use]
pub fn limit(n: u64) -> Document {
    doc! { "$limit": count_bson(n) }
}

#[must_use]
pub fn skip(n: u64) -> Document {
    doc! { "$skip": count_bson(n) }
}

#[must_use]
pub fn sort(field: &str, ascending: bool) -> Document {
    doc! { "$sort": { field: direction(ascending) } }
}

/// Keys keep argument order, which is the sort priority.
#[must_use]
pub fn sort_multiple(params: &[SortParams]) -> Document {
    let mut keys = Document::new();
    for p in params {
        keys.insert(p.field.clone(), direction(p.ascending));
    }
    doc! { "$sort": keys }
}

#[must_use]
pub fn project(projection: Document) -> Document {
    doc! { "$project": projection }
}

/// Build a `$switch` expression; each case is compiled in aggregation-expression form.
///
/// # Errors
/// Propagates compile errors from any case filter.
pub fn switch(params: &SwitchParams) -> Result<Document, DbError> {
    let branches = params
        .cases
        .iter()
        .map(|c| Ok(Bson::Document(doc! { "case": compile_expr(&c.case)?, "then": c.then.clone() })))
        .collect::<Result<Vec<_>, DbError>>()?;
    let mut body = doc! { "branches": branches };
    if let Some(default) = &params.default {
        body.insert("default", default.clone());
    }
    Ok(doc! { "$switch": body })
}

pub(crate) fn count_bson(n: u64) -> Bson {
    i64::try_from(n).map_or(Bson::Int64(i64::MAX), Bson::Int64)
}
