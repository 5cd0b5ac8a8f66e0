use bson::{Bson, Document, doc};

use super::stages::count_bson;
use crate::errors::DbError;
use crate::set::QueryContext;
use crate::store::CountOptions;

/// Filter and options for the filtered count that accompanies a retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct CountPlan {
    pub filter: Document,
    pub options: CountOptions,
}

/// Ordered stage list for retrieval: the override pipeline or `$match`, then `$sort`, `$skip`,
/// `$limit` for whichever of those are set. An empty override counts as no override.
///
/// # Errors
/// Propagates compile errors from the stored filter when no override pipeline is set.
pub fn build_pipeline(ctx: &QueryContext) -> Result<Vec<Document>, DbError> {
    let mut pipe = match &ctx.pipe {
        Some(raw) if !raw.is_empty() => raw.clone(),
        _ => vec![doc! { "$match": ctx.match_document()? }],
    };
    if let Some(sort) = &ctx.sort {
        pipe.push(doc! { "$sort": { sort.field.clone(): sort.direction.as_i32() } });
    }
    if let Some(skip) = ctx.skip {
        pipe.push(doc! { "$skip": count_bson(skip) });
    }
    if let Some(limit) = ctx.limit {
        pipe.push(doc! { "$limit": count_bson(limit) });
    }
    Ok(pipe)
}

/// Without an override pipeline the compiled filter is counted with skip/limit applied. With one,
/// only the first `$match` stage of the assembled pipeline is counted; later `$match` stages (for
/// example after a `$lookup`) are not reflected.
///
/// # Errors
/// Propagates compile errors from the stored filter.
pub fn count_plan(ctx: &QueryContext) -> Result<CountPlan, DbError> {
    if ctx.pipe.as_ref().is_none_or(Vec::is_empty) {
        return Ok(CountPlan {
            filter: ctx.match_document()?,
            options: CountOptions { skip: ctx.skip, limit: ctx.limit },
        });
    }
    let pipeline = build_pipeline(ctx)?;
    Ok(CountPlan { filter: first_match(&pipeline), options: CountOptions::default() })
}

/// Body of the first `$match` stage, or the empty document when there is none.
#[must_use]
pub fn first_match(pipeline: &[Document]) -> Document {
    pipeline
        .iter()
        .find_map(|stage| match stage.get("$match") {
            Some(Bson::Document(d)) => Some(d.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
