//! The boundary between the query layer and a document store.
//!
//! The command executor only speaks to [`Store`]; it hands over compiled filters, assembled
//! pipelines and marshaled documents and gets documents and counts back.

mod eval;
mod memory;

use bson::{Bson, Document};
use std::future::Future;

use crate::errors::DbError;

pub use eval::{Matcher, compare_bson, matches};
pub use memory::MemoryStore;

/// Skip/limit applied to a filtered count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Store operations used by the command executor. Failures are `DbError::Execution`.
pub trait Store: Send + Sync {
    fn aggregate(
        &self,
        table: &str,
        pipeline: &[Document],
    ) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send;

    fn find_one(
        &self,
        table: &str,
        filter: &Document,
    ) -> impl Future<Output = Result<Option<Document>, DbError>> + Send;

    fn count(
        &self,
        table: &str,
        filter: &Document,
        options: CountOptions,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Cheap, unfiltered document count.
    fn estimated_count(&self, table: &str) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Returns the inserted `_id`.
    fn insert_one(
        &self,
        table: &str,
        doc: Document,
    ) -> impl Future<Output = Result<Bson, DbError>> + Send;

    fn insert_many(
        &self,
        table: &str,
        docs: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Bson>, DbError>> + Send;

    /// Returns the matched count.
    fn update_one(
        &self,
        table: &str,
        filter: &Document,
        update: &Document,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    fn delete_one(
        &self,
        table: &str,
        filter: &Document,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    fn delete_many(
        &self,
        table: &str,
        filter: &Document,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    fn drop_collection(&self, table: &str) -> impl Future<Output = Result<(), DbError>> + Send;
}
