//! Fluent query building over a document store.
//!
//! A typed [`Filter`] tree is compiled into a `$match` document or an aggregation expression,
//! assembled with sort/skip/limit into an ordered pipeline, and executed through a [`Store`].
//!
//! ```no_run
//! use docset::{Database, Filter, MemoryStore, Page};
//!
//! # async fn demo() -> Result<(), docset::DbError> {
//! let db = Database::new(MemoryStore::new());
//! let page: Page<bson::Document> = db
//!     .data()
//!     .table("people")
//!     .filter(Filter::and([Filter::eq("age", 45), Filter::starts_with("name", "A")]))
//!     .sort("name", "asc")
//!     .limit(10)
//!     .cmd()
//!     .get()
//!     .await?;
//! # let _ = page;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod filter;
pub mod logger;
pub mod marshal;
pub mod pipeline;
pub mod set;
pub mod store;
pub mod utils;

pub use config::Config;
pub use errors::DbError;
pub use filter::{Filter, Form, Op, compile, compile_expr, compile_match};
pub use marshal::Payload;
pub use set::{Command, Database, Page, Set, SetParams};
pub use store::{MemoryStore, Store};
