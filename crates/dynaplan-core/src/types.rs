//! Predicate model: comparison operators, parsed clauses, OR-groups of
//! AND-clauses, sort requests, and the bound-argument cursor consumed during
//! clause translation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArgumentError, Error};

/// The comparison kind of one parsed predicate clause.
///
/// Carries the full parsed-operator surface, including kinds the target
/// store cannot express (`IsEmpty` through `EndingWith`); the clause
/// translator rejects those with an unsupported-operation error instead of
/// the parser silently dropping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Between,
    StartsWith,
    Contains,
    NotContains,
    In,
    NotIn,
    Exists,
    NotExists,
    IsTrue,
    IsFalse,

    // Parsed but not representable in the store's comparison model.
    IsEmpty,
    IsNotEmpty,
    Near,
    Regex,
    Like,
    NotLike,
    EndingWith,
}

impl CompareOp {
    /// Default number of positional arguments the operator consumes.
    ///
    /// Membership operators (`In`, `NotIn`, `Contains`, `NotContains`)
    /// default to one argument (a collection); a finder may declare a larger
    /// arity to bind elements positionally instead.
    pub fn default_argument_count(self) -> usize {
        match self {
            CompareOp::Between => 2,
            CompareOp::Exists
            | CompareOp::NotExists
            | CompareOp::IsTrue
            | CompareOp::IsFalse
            | CompareOp::IsEmpty
            | CompareOp::IsNotEmpty => 0,
            _ => 1,
        }
    }
}

/// One parsed condition from a finder specification. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateClause {
    /// Dot-separated property path; may traverse into a composite-key
    /// sub-object (e.g. `playlistId.playlistName`).
    pub property: String,
    pub op: CompareOp,
    /// Declared argument arity of the clause.
    pub argument_count: usize,
    /// Case-insensitive matching request; always rejected by the translator.
    pub ignore_case: bool,
}

impl PredicateClause {
    /// Create a clause with the operator's default argument arity.
    pub fn new(property: impl Into<String>, op: CompareOp) -> Self {
        Self {
            property: property.into(),
            op,
            argument_count: op.default_argument_count(),
            ignore_case: false,
        }
    }

    /// Override the declared argument arity (positional membership elements).
    pub fn argument_count(mut self, n: usize) -> Self {
        self.argument_count = n;
        self
    }

    /// Mark the clause as requesting case-insensitive matching.
    pub fn ignore_case(mut self, ignore: bool) -> Self {
        self.ignore_case = ignore;
        self
    }
}

/// An ordered sequence of AND-connected clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrGroup {
    pub clauses: Vec<PredicateClause>,
}

impl OrGroup {
    pub fn new(clauses: Vec<PredicateClause>) -> Self {
        Self { clauses }
    }
}

/// A full predicate: OR-connected groups of AND-connected clauses.
///
/// OR is supported only at this top level, and only a single-group tree may
/// derive a key-based access path; multi-group trees always plan as a
/// filtered scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateTree {
    pub groups: Vec<OrGroup>,
}

impl PredicateTree {
    pub fn new(groups: Vec<OrGroup>) -> Self {
        Self { groups }
    }

    /// Convenience constructor for the common single-AND-group tree.
    pub fn single(clauses: Vec<PredicateClause>) -> Self {
        Self {
            groups: vec![OrGroup::new(clauses)],
        }
    }
}

/// Requested sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A caller-requested sort order, recorded unvalidated; legality depends on
/// the access path finally chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(property: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// The declared result arity of the finder method being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultShape {
    /// At most one entity.
    Single,
    /// All matching entities.
    Collection,
    /// A count of matching entities.
    Count,
    /// A boolean existence check; plans with a limit of one.
    Exists,
    /// The first N matching entities.
    TopN(usize),
}

/// One bound value feeding the argument cursor.
///
/// `Param` defers resolution to call time by declared parameter name; a
/// clause consuming a deferred binding can only reach the textual filter
/// path, never a key condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    Value(Value),
    Param(String),
}

impl Binding {
    /// The concrete value, if positionally bound.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Binding::Value(v) => Some(v),
            Binding::Param(_) => None,
        }
    }
}

/// Left-to-right cursor over the bound arguments of one finder invocation.
///
/// Private to a single planning pass; each derivation consumes a fresh
/// cursor.
#[derive(Debug, Clone)]
pub struct Arguments {
    bindings: Vec<Binding>,
    cursor: usize,
}

impl Arguments {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            cursor: 0,
        }
    }

    /// Cursor over positionally bound values only.
    pub fn positional(values: Vec<Value>) -> Self {
        Self::new(values.into_iter().map(Binding::Value).collect())
    }

    /// Consume the next binding for a condition on `property`.
    pub(crate) fn next(&mut self, property: &str) -> Result<Binding, Error> {
        let binding = self
            .bindings
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| ArgumentError::MissingArgument(property.to_string()))?;
        self.cursor += 1;
        Ok(binding)
    }

    /// Number of bindings not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bindings.len() - self.cursor
    }
}
