use bson::{Bson, Document, doc};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::QueryContext;
use crate::errors::DbError;
use crate::filter::Filter;
use crate::marshal::{Marshaled, Payload, marshal};
use crate::pipeline::{build_pipeline, count_plan};
use crate::store::Store;

/// Logger target for executor diagnostics.
pub const LOG_TARGET: &str = "docset::command";

/// Result of [`Command::get`]: decoded items, the filtered count and the store's estimated total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub filtered: u64,
    pub total: u64,
}

/// A configured query bound to its store. Every method consumes it.
#[derive(Debug)]
pub struct Command<S> {
    store: Arc<S>,
    ctx: QueryContext,
}

impl<S: Store> Command<S> {
    pub(crate) const fn new(store: Arc<S>, ctx: QueryContext) -> Self {
        Self { store, ctx }
    }

    /// Runs the assembled pipeline and both counts under one deadline.
    ///
    /// # Errors
    /// Configuration or compile errors before any store call; `Execution`, `Timeout` or `Decode`
    /// afterwards.
    pub async fn get<T: DeserializeOwned>(self) -> Result<Page<T>, DbError> {
        let table = self.ctx.require_table()?;
        let pipeline = build_pipeline(&self.ctx)?;
        let plan = count_plan(&self.ctx)?;
        log::debug!(target: LOG_TARGET, "get on {table}: {} stage(s)", pipeline.len());
        let store = &self.store;
        deadline(self.ctx.timeout, async {
            let docs = store.aggregate(table, &pipeline).await?;
            let filtered = store.count(table, &plan.filter, plan.options).await?;
            let total = store.estimated_count(table).await?;
            let items = docs.into_iter().map(decode).collect::<Result<Vec<T>, _>>()?;
            Ok(Page { items, filtered, total })
        })
        .await
    }

    /// First document matching the compiled filter; a raw pipeline is not consulted.
    ///
    /// # Errors
    /// As for [`Command::get`].
    pub async fn get_one<T: DeserializeOwned>(self) -> Result<Option<T>, DbError> {
        let table = self.ctx.require_table()?;
        let filter = self.ctx.match_document()?;
        log::debug!(target: LOG_TARGET, "get_one on {table}");
        let store = &self.store;
        deadline(self.ctx.timeout, async {
            store.find_one(table, &filter).await?.map(decode).transpose()
        })
        .await
    }

    /// Inserts one record or mapping and returns its `_id`.
    ///
    /// # Errors
    /// Configuration errors for an empty table, a sequence payload or an empty document.
    pub async fn insert(self, payload: Payload) -> Result<Bson, DbError> {
        let table = self.ctx.require_table()?;
        let Marshaled::One(doc) = marshal(&payload, true)? else {
            return Err(DbError::config("insert takes a single record or mapping; use insert_all"));
        };
        log::debug!(target: LOG_TARGET, "insert into {table}");
        let store = &self.store;
        deadline(self.ctx.timeout, store.insert_one(table, doc)).await
    }

    /// Inserts a sequence of documents, returning their ids in order.
    ///
    /// # Errors
    /// Configuration errors for an empty table or a non-sequence payload.
    pub async fn insert_all(self, payload: Payload) -> Result<Vec<Bson>, DbError> {
        let table = self.ctx.require_table()?;
        let Marshaled::Many(docs) = marshal(&payload, true)? else {
            return Err(DbError::config("insert_all takes a sequence of records"));
        };
        log::debug!(target: LOG_TARGET, "insert_all into {table}: {} document(s)", docs.len());
        let store = &self.store;
        deadline(self.ctx.timeout, store.insert_many(table, docs)).await
    }

    /// `$set`s the marshaled fields (identifier excluded) on the first matching document.
    /// Returns the matched count.
    ///
    /// # Errors
    /// Refuses an empty filter before touching the store.
    pub async fn update(self, payload: Payload) -> Result<u64, DbError> {
        let table = self.ctx.require_table()?;
        let filter = guarded_filter(&self.ctx, "update")?;
        let Marshaled::One(fields) = marshal(&payload, false)? else {
            return Err(DbError::config("update takes a single record or mapping"));
        };
        log::debug!(target: LOG_TARGET, "update on {table}: {} field(s)", fields.len());
        let update = doc! { "$set": fields };
        let store = &self.store;
        deadline(self.ctx.timeout, store.update_one(table, &filter, &update)).await
    }

    /// # Errors
    /// Refuses an empty filter before touching the store.
    pub async fn delete_one(self) -> Result<u64, DbError> {
        let table = self.ctx.require_table()?;
        let filter = guarded_filter(&self.ctx, "delete_one")?;
        log::debug!(target: LOG_TARGET, "delete_one on {table}");
        let store = &self.store;
        deadline(self.ctx.timeout, store.delete_one(table, &filter)).await
    }

    /// # Errors
    /// Refuses an empty filter before touching the store; use [`Command::drop_table`] to clear
    /// a whole table.
    pub async fn delete_all(self) -> Result<u64, DbError> {
        let table = self.ctx.require_table()?;
        let filter = guarded_filter(&self.ctx, "delete_all")?;
        log::debug!(target: LOG_TARGET, "delete_all on {table}");
        let store = &self.store;
        deadline(self.ctx.timeout, store.delete_many(table, &filter)).await
    }

    /// # Errors
    /// Configuration error for an empty table name.
    pub async fn drop_table(self) -> Result<(), DbError> {
        let table = self.ctx.require_table()?;
        log::info!(target: LOG_TARGET, "drop {table}");
        let store = &self.store;
        deadline(self.ctx.timeout, store.drop_collection(table)).await
    }
}

/// Negation renders as a match-all document, so a tree containing one could reach every record
/// even when the compiled filter is not itself empty.
fn guarded_filter(ctx: &QueryContext, op: &str) -> Result<Document, DbError> {
    if ctx.filter.as_ref().is_some_and(Filter::has_negation) {
        log::warn!(target: LOG_TARGET, "{op} on {} refused: filter contains a negation", ctx.table);
        return Err(DbError::config(format!("{op} cannot use a filter containing not")));
    }
    let filter = ctx.match_document()?;
    if filter.is_empty() {
        log::warn!(target: LOG_TARGET, "{op} on {} refused: empty filter", ctx.table);
        return Err(DbError::config(format!("{op} requires a non-empty filter")));
    }
    Ok(filter)
}

async fn deadline<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, DbError>>,
) -> Result<T, DbError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| DbError::Timeout(limit))?
}

fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, DbError> {
    bson::deserialize_from_document(doc).map_err(|e| DbError::Decode(e.to_string()))
}
