//! Aggregation stage factories and the assembler that orders them for a query.

mod assemble;
pub mod stages;

pub use assemble::{CountPlan, build_pipeline, count_plan, first_match};
pub use stages::{Case, SortParams, SwitchParams};
