//! # Dynaplan
//!
//! A query derivation engine for hash/range-key stores.
//!
//! Dynaplan translates a parsed finder predicate (OR-groups of
//! AND-connected property conditions) into the cheapest correct access
//! plan against a DynamoDB-shaped table: a point lookup by full primary
//! key, a key-bounded query against the primary table or a secondary
//! index, or a filtered scan. Plans carry both a structural filter and a
//! textual filter expression with `#key<N>` / `:value<N>` placeholders.
//!
//! ## Quick Start
//!
//! ```
//! use dynaplan_core::plan::{AccessPlan, Planner};
//! use dynaplan_core::schema::TableKeySchema;
//! use dynaplan_core::types::{Arguments, CompareOp, PredicateClause, PredicateTree};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), dynaplan_core::Error> {
//! // Describe the table's key layout
//! let schema = TableKeySchema::builder("userName")
//!     .range_key("playlistName")
//!     .build();
//!
//! // "find by userName and playlistName"
//! let tree = PredicateTree::single(vec![
//!     PredicateClause::new("userName", CompareOp::Equals),
//!     PredicateClause::new("playlistName", CompareOp::Equals),
//! ]);
//! let args = Arguments::positional(vec![json!("alice"), json!("road trip")]);
//!
//! // The full primary key is equality-bound: a point lookup
//! let plan = Planner::new(&schema).derive(&tree, args)?;
//! assert_eq!(
//!     plan,
//!     AccessPlan::PointLookup {
//!         hash_value: json!("alice"),
//!         range_value: Some(json!("road trip")),
//!     }
//! );
//! # Ok(()) }
//! ```

pub mod error;
pub mod plan;
pub mod schema;
pub mod types;

pub use error::{ArgumentError, Error, ExpressionError, Result, UnsupportedError};
pub use plan::{AccessPlan, FilterPlan, Planner};
pub use schema::{EntitySchema, IndexSchema, TableKeySchema};
pub use types::{
    Arguments, Binding, CompareOp, OrGroup, PredicateClause, PredicateTree, ResultShape, Sort,
    SortDirection,
};
