//! Per-query builder.
//!
//! A [`Database`] hands out a fresh [`Set`] per query. Setters may be called in any order and any
//! number of times; the last call wins. [`Set::cmd`] moves the builder into a [`Command`], whose
//! methods consume it, so a builder cannot be reused after execution.

mod command;
mod context;
mod params;

use bson::Document;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::errors::DbError;
use crate::filter::Filter;
use crate::pipeline::{CountPlan, build_pipeline, count_plan};
use crate::store::Store;

pub use command::{Command, LOG_TARGET, Page};
pub use context::{DEFAULT_TIMEOUT_SECS, QueryContext, SortDirection, SortSpec};
pub use params::{SetParams, SetParamsSerde};

/// Entry point holding the store and the defaults applied to each new query.
#[derive(Debug)]
pub struct Database<S> {
    store: Arc<S>,
    config: Config,
}

impl<S> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), config: self.config.clone() }
    }
}

impl<S: Store> Database<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: S, config: Config) -> Self {
        Self { store: Arc::new(store), config }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh builder carrying the configured default timeout.
    #[must_use]
    pub fn data(&self) -> Set<S> {
        Set::new(Arc::clone(&self.store)).timeout(self.config.timeout())
    }

    /// A fresh builder configured from a value object, through the same setters as chained calls.
    #[must_use]
    pub fn data_with(&self, params: SetParams) -> Set<S> {
        params.apply(self.data())
    }
}

/// Query state plus the store it will run against.
#[derive(Debug)]
pub struct Set<S> {
    store: Arc<S>,
    ctx: QueryContext,
}

impl<S> Set<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store, ctx: QueryContext::default() }
    }

    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.ctx.table = name.into();
        self
    }

    /// Stores the tree; it is compiled when the query is assembled.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.ctx.filter = Some(filter);
        self
    }

    /// Raw stages that replace the filter-derived `$match` for retrieval.
    #[must_use]
    pub fn pipe(mut self, stages: Vec<Document>) -> Self {
        self.ctx.pipe = Some(stages);
        self
    }

    /// `"asc"` (any case) sorts ascending; anything else sorts descending.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: &str) -> Self {
        self.ctx.sort = Some(SortSpec { field: field.into(), direction: SortDirection::parse(direction) });
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.ctx.skip = Some(n);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.ctx.limit = Some(n);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.ctx.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn context(&self) -> &QueryContext {
        &self.ctx
    }

    /// # Errors
    /// Compile errors from the stored filter.
    pub fn match_document(&self) -> Result<Document, DbError> {
        self.ctx.match_document()
    }

    /// # Errors
    /// Compile errors from the stored filter.
    pub fn pipeline(&self) -> Result<Vec<Document>, DbError> {
        build_pipeline(&self.ctx)
    }

    /// # Errors
    /// Compile errors from the stored filter.
    pub fn count_plan(&self) -> Result<CountPlan, DbError> {
        count_plan(&self.ctx)
    }
}

impl<S: Store> Set<S> {
    /// Hands the configured query to the executor.
    #[must_use]
    pub fn cmd(self) -> Command<S> {
        Command::new(self.store, self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bson::doc;

    #[test]
    fn setters_overwrite() {
        let db = Database::new(MemoryStore::new());
        let set = db.data().table("a").table("b").limit(1).limit(2).sort("x", "ASC").sort("y", "up");
        let ctx = set.context();
        assert_eq!(ctx.table, "b");
        assert_eq!(ctx.limit, Some(2));
        assert_eq!(ctx.sort, Some(SortSpec { field: "y".into(), direction: SortDirection::Descending }));
    }

    #[test]
    fn config_timeout_is_the_default() {
        let cfg = Config { timeout_secs: 5, ..Config::default() };
        let db = Database::with_config(MemoryStore::new(), cfg);
        assert_eq!(db.data().context().timeout, Duration::from_secs(5));
        assert_eq!(
            db.data().timeout(Duration::from_millis(10)).context().timeout,
            Duration::from_millis(10)
        );
    }

    #[test]
    fn setters_never_fail_on_bad_filters() {
        let db = Database::new(MemoryStore::new());
        let set = db.data().filter(Filter::and([]));
        assert!(matches!(set.pipeline(), Err(DbError::Compile(_))));
    }

    #[test]
    fn pipeline_reflects_builder_state() {
        let db = Database::new(MemoryStore::new());
        let set = db.data().table("t").filter(Filter::eq("k", 1)).skip(3);
        assert_eq!(
            set.pipeline().unwrap(),
            vec![doc! { "$match": { "k": { "$eq": 1 } } }, doc! { "$skip": 3i64 }]
        );
    }
}
