//! The plan derivation pipeline.
//!
//! Clauses are translated one at a time ([`clause`]), folded into a
//! per-invocation criteria state ([`criteria`]), and resolved into one
//! access path ([`select`]). The filter riding on the chosen path has a
//! structural half ([`filter`]) and a textual half assembled from
//! placeholder tokens ([`expression`]); [`text`] evaluates the textual half
//! against documents.

pub mod clause;
pub mod criteria;
pub mod expression;
pub mod filter;
pub mod select;
pub mod text;

pub use clause::{translate, Term, TermKind};
pub use criteria::{CriteriaState, KeyRole};
pub use expression::{ExpressionAssembler, ExpressionPlaceholders};
pub use filter::{eval_all, ConditionOp, FilterCondition};
pub use select::{AccessPlan, FilterPlan, KeyCondition, Planner, RangeCondition};
pub use text::eval_expression;
