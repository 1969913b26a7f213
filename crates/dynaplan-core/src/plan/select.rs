//! Access path selection: the planner entry point.
//!
//! Given a predicate tree, bound arguments, and the entity's key schema,
//! `Planner::derive` picks exactly one access path: a point lookup by full
//! primary key, a key-bounded query against the primary table or a
//! secondary index, or a filtered scan. Selection precedence: point lookup,
//! exact-match index query, primary-table query, partial-candidate index
//! query, scan. Ties among candidate indexes break on locality with the
//! base table, then on bound key roles, then on schema declaration order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use tracing::debug;

use super::clause::{self, Term, TermKind};
use super::criteria::CriteriaState;
use super::expression::{ExpressionAssembler, ExpressionPlaceholders};
use super::filter::{self, FilterCondition};
use crate::error::{ArgumentError, Error, UnsupportedError};
use crate::schema::{EntitySchema, IndexSchema};
use crate::types::{Arguments, Binding, PredicateTree, ResultShape, Sort, SortDirection};

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// A key condition on a query's sort-key attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyCondition {
    Eq(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    Between(Value, Value),
}

impl KeyCondition {
    /// The key condition a term expresses, if its bindings are concrete.
    pub(crate) fn from_term(term: &Term) -> Option<Self> {
        let value = |b: &Binding| b.as_value().cloned();
        match &term.kind {
            TermKind::Eq(b) => value(b).map(Self::Eq),
            TermKind::Lt(b) => value(b).map(Self::Lt),
            TermKind::Le(b) => value(b).map(Self::Le),
            TermKind::Gt(b) => value(b).map(Self::Gt),
            TermKind::Ge(b) => value(b).map(Self::Ge),
            TermKind::Between(low, high) => Some(Self::Between(value(low)?, value(high)?)),
            TermKind::IsTrue => Some(Self::Eq(Value::Bool(true))),
            TermKind::IsFalse => Some(Self::Eq(Value::Bool(false))),
            _ => None,
        }
    }
}

/// A sort-key condition bound to its stored attribute name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeCondition {
    pub attribute: String,
    pub condition: KeyCondition,
}

/// The non-key filter applied on top of an access path.
///
/// The textual expression and its placeholder maps are always produced.
/// The structural condition list exists only when every consumed binding
/// was positional; a deferred (by-name) binding anywhere in the filter
/// leaves `conditions` as `None` and the textual path as the sole carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterPlan {
    pub conditions: Option<Vec<FilterCondition>>,
    pub expression: String,
    pub placeholders: ExpressionPlaceholders,
}

impl FilterPlan {
    pub fn is_empty(&self) -> bool {
        self.expression.is_empty()
    }
}

/// The derived access plan, consumed by the storage client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessPlan {
    /// Direct fetch by full primary key. Returns at most one item.
    ///
    /// Filter-only predicates present alongside a full-key equality match
    /// are dropped from the plan: a point lookup returns zero or one item
    /// and carries no filter.
    PointLookup {
        hash_value: Value,
        range_value: Option<Value>,
    },
    /// Key-bounded query against the primary table.
    PrimaryQuery {
        hash_attribute: String,
        hash_value: Value,
        range_condition: Option<RangeCondition>,
        filter: FilterPlan,
        descending: bool,
        limit: Option<usize>,
    },
    /// Key-bounded query against a secondary index.
    IndexQuery {
        index: String,
        hash_attribute: String,
        hash_value: Value,
        range_condition: Option<RangeCondition>,
        filter: FilterPlan,
        descending: bool,
        limit: Option<usize>,
    },
    /// Full traversal with a post-retrieval filter.
    Scan {
        filter: FilterPlan,
        limit: Option<usize>,
    },
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// One candidate secondary index for the current criteria.
struct Candidate<'a> {
    position: usize,
    index: &'a IndexSchema,
    hash_value: Value,
    /// Hash bound and the sort key either bound or serving the requested
    /// sort order.
    exact: bool,
    bound_roles: usize,
    /// Hash key is the primary table's own hash or range key.
    primary_local: bool,
}

/// Derives an [`AccessPlan`] for one finder invocation.
///
/// Configuration is chainable; `derive` consumes the predicate tree and
/// argument cursor and yields exactly one plan or fails fast.
pub struct Planner<'a, S: EntitySchema> {
    schema: &'a S,
    sort: Option<Sort>,
    shape: ResultShape,
    limit: Option<usize>,
    scan_count_enabled: bool,
}

impl<'a, S: EntitySchema> Planner<'a, S> {
    pub fn new(schema: &'a S) -> Self {
        Self {
            schema,
            sort: None,
            shape: ResultShape::Collection,
            limit: None,
            scan_count_enabled: false,
        }
    }

    /// Request a result order. Legality depends on the chosen access path.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Declare the finder's result arity.
    pub fn shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    /// Cap the number of items the plan may return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Allow count requests to plan as a filtered scan. Off by default;
    /// counting via a key-bounded query is always permitted.
    pub fn scan_count_enabled(mut self, enabled: bool) -> Self {
        self.scan_count_enabled = enabled;
        self
    }

    /// Derive the access plan for `tree` with the given bound arguments.
    pub fn derive(&self, tree: &PredicateTree, mut args: Arguments) -> Result<AccessPlan, Error> {
        let mut groups = Vec::with_capacity(tree.groups.len());
        for group in &tree.groups {
            let mut terms = Vec::with_capacity(group.clauses.len());
            for predicate in &group.clauses {
                terms.push(clause::translate(predicate, &mut args, self.schema)?);
            }
            groups.push(terms);
        }

        // OR cannot span a key condition: only a lone AND-group may derive
        // a key-bounded path.
        if groups.len() != 1 {
            debug!(groups = groups.len(), "predicate is not a single AND-group, scanning");
            return self.scan(&groups);
        }
        let terms = groups.swap_remove(0);

        let mut criteria = CriteriaState::new(self.sort.clone());
        for term in terms {
            criteria.add_term(term);
        }

        let hash = self.schema.hash_key();
        let range = self.schema.range_key();
        let hash_bound = criteria.is_equality_bound(hash);

        // Point lookup: full primary key equality-bound and no other
        // property claiming a key role.
        let range_satisfied = match range {
            None => true,
            Some(rk) => criteria.is_equality_bound(rk),
        };
        let only_primary_roles = criteria
            .key_bound_properties()
            .all(|(p, _)| p == hash || Some(p) == range);
        if hash_bound && range_satisfied && only_primary_roles {
            if let Some(hash_value) = criteria.equality_value(hash) {
                self.check_sort(None, "point lookup")?;
                let range_value = range.and_then(|rk| criteria.equality_value(rk));
                debug!("derived point lookup");
                return Ok(AccessPlan::PointLookup {
                    hash_value,
                    range_value,
                });
            }
        }

        let candidates = self.index_candidates(&criteria);
        if let Some(best) = Self::best(candidates.iter().filter(|c| c.exact)) {
            debug!(index = %best.index.name, "derived exact-match index query");
            return self.index_query(best, &criteria);
        }

        if hash_bound {
            if let Some(hash_value) = criteria.equality_value(hash) {
                debug!("derived primary-table query");
                return self.primary_query(hash_value, &criteria);
            }
        }

        if let Some(best) = Self::best(candidates.iter().filter(|c| !c.exact)) {
            debug!(index = %best.index.name, "derived partial-match index query");
            return self.index_query(best, &criteria);
        }

        debug!("no key-bounded path, scanning");
        self.scan(&[criteria.terms().to_vec()])
    }

    // -- selection internals ------------------------------------------------

    fn index_candidates(&self, criteria: &CriteriaState) -> Vec<Candidate<'a>> {
        let hash = self.schema.hash_key();
        let range = self.schema.range_key();
        let mut candidates = Vec::new();
        for (position, index) in self.schema.indexes().iter().enumerate() {
            let Some(hash_value) = criteria.equality_value(&index.hash_key) else {
                continue;
            };
            let range_bound = index
                .range_key
                .as_deref()
                .map(|rk| criteria.role(rk).is_some())
                .unwrap_or(false);
            let exact = match (&self.sort, index.range_key.as_deref()) {
                // A requested sort is servable only by an index whose sort
                // key is the sort property.
                (Some(sort), rk) => rk == Some(sort.property.as_str()),
                (None, Some(rk)) => criteria.role(rk).is_some(),
                (None, None) => true,
            };
            candidates.push(Candidate {
                position,
                index,
                hash_value,
                exact,
                bound_roles: 1 + usize::from(range_bound),
                primary_local: index.hash_key == hash
                    || Some(index.hash_key.as_str()) == range,
            });
        }
        candidates
    }

    fn best<'c>(candidates: impl Iterator<Item = &'c Candidate<'a>>) -> Option<&'c Candidate<'a>>
    where
        'a: 'c,
    {
        candidates.min_by_key(|c| (!c.primary_local, Reverse(c.bound_roles), c.position))
    }

    fn index_query(&self, candidate: &Candidate<'a>, criteria: &CriteriaState) -> Result<AccessPlan, Error> {
        let index = candidate.index;
        let descending = self.check_sort(index.range_key.as_deref(), "hash-only query")?;

        let mut consumed = Vec::with_capacity(2);
        if let Some((idx, _)) = criteria.key_term(&index.hash_key) {
            consumed.push(idx);
        }
        let range_condition = index.range_key.as_deref().and_then(|rk| {
            let (idx, term) = criteria.key_term(rk)?;
            let condition = KeyCondition::from_term(term)?;
            consumed.push(idx);
            Some(RangeCondition {
                attribute: self.schema.attribute_name(rk).to_string(),
                condition,
            })
        });

        Ok(AccessPlan::IndexQuery {
            index: index.name.clone(),
            hash_attribute: self.schema.attribute_name(&index.hash_key).to_string(),
            hash_value: candidate.hash_value.clone(),
            range_condition,
            filter: self.assemble_filter(criteria.terms(), &consumed),
            descending,
            limit: self.effective_limit(),
        })
    }

    fn primary_query(&self, hash_value: Value, criteria: &CriteriaState) -> Result<AccessPlan, Error> {
        let hash = self.schema.hash_key();
        let range = self.schema.range_key();
        let descending = self.check_sort(range, "hash-only query")?;

        let mut consumed = Vec::with_capacity(2);
        if let Some((idx, _)) = criteria.key_term(hash) {
            consumed.push(idx);
        }
        let range_condition = range.and_then(|rk| {
            let (idx, term) = criteria.key_term(rk)?;
            let condition = KeyCondition::from_term(term)?;
            consumed.push(idx);
            Some(RangeCondition {
                attribute: self.schema.attribute_name(rk).to_string(),
                condition,
            })
        });

        Ok(AccessPlan::PrimaryQuery {
            hash_attribute: self.schema.attribute_name(hash).to_string(),
            hash_value,
            range_condition,
            filter: self.assemble_filter(criteria.terms(), &consumed),
            descending,
            limit: self.effective_limit(),
        })
    }

    fn scan(&self, groups: &[Vec<Term>]) -> Result<AccessPlan, Error> {
        self.check_sort(None, "scan")?;
        if matches!(self.shape, ResultShape::Count) && !self.scan_count_enabled {
            return Err(ArgumentError::ScanCountDisabled.into());
        }

        let filter = match groups {
            [terms] => self.assemble_filter(terms, &[]),
            _ => {
                // OR-connected groups are expressible only textually.
                let mut assembler = ExpressionAssembler::new(self.schema);
                let expression = assembler.render_groups(groups);
                FilterPlan {
                    conditions: None,
                    expression,
                    placeholders: assembler.finish(),
                }
            }
        };
        Ok(AccessPlan::Scan {
            filter,
            limit: self.effective_limit(),
        })
    }

    /// Assemble the filter over `terms`, excluding the key terms already
    /// consumed by the chosen path.
    fn assemble_filter(&self, terms: &[Term], consumed: &[usize]) -> FilterPlan {
        let remaining: Vec<&Term> = terms
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, t)| t)
            .collect();

        let mut assembler = ExpressionAssembler::new(self.schema);
        let expression = remaining
            .iter()
            .map(|term| assembler.render_term(term))
            .collect::<Vec<_>>()
            .join(" AND ");

        let conditions = remaining
            .iter()
            .map(|term| filter::conditions_for_term(term, self.schema))
            .collect::<Option<Vec<_>>>()
            .map(|nested| nested.into_iter().flatten().collect());

        FilterPlan {
            conditions,
            expression,
            placeholders: assembler.finish(),
        }
    }

    /// Validate the requested sort against the chosen path's sort-key
    /// attribute; the returned flag is the reverse-order bit.
    fn check_sort(&self, path_range_key: Option<&str>, plan: &'static str) -> Result<bool, Error> {
        let Some(sort) = &self.sort else {
            return Ok(false);
        };
        match path_range_key {
            Some(rk) if rk == sort.property => {
                Ok(matches!(sort.direction, SortDirection::Descending))
            }
            Some(rk) => Err(UnsupportedError::SortMismatch {
                property: sort.property.clone(),
                ordered_by: rk.to_string(),
            }
            .into()),
            None => Err(UnsupportedError::SortWithoutQuery {
                property: sort.property.clone(),
                plan,
            }
            .into()),
        }
    }

    fn effective_limit(&self) -> Option<usize> {
        let shape_limit = match self.shape {
            ResultShape::Exists => Some(1),
            ResultShape::TopN(n) => Some(n),
            _ => None,
        };
        match (self.limit, shape_limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
