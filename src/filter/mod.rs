//! Filter expression trees and their compilation into store-native documents.

mod compile;
mod parse;
mod types;

pub use compile::{Form, compile, compile_expr, compile_match};
pub use parse::{FilterSerde, parse_filter_json};
pub use types::{Bounds, Filter, FilterValue, Op, RangeBound};
