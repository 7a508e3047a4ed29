pub mod executor;
pub mod parser;
pub mod planner;

pub use executor::{EvalContext, SortField, SortKey, compile_sort, evaluate, sort_ids};
pub use parser::{Ast, FieldRef, MatchMode, Occur, parse_query};
pub use planner::{PathPattern, Predicate, compile};
