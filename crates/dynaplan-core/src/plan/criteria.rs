//! Planning context for one AND-group: collects translated terms and tracks
//! which properties are equality-bound or range-bound for key purposes.
//!
//! The state lives for exactly one planning invocation. Only the first
//! equality/range marking per property counts toward access-path
//! eligibility; later terms on the same property are kept but demoted to
//! filter-only, so one attribute is never claimed for two key roles.

use serde_json::Value;

use super::clause::{Term, TermKind};
use crate::types::Sort;

/// Key-eligibility role a term can claim for its property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Usable as a hash-key or index-hash-key condition.
    Equality,
    /// Usable as a sort-key condition, never a hash-key condition.
    Range,
}

/// Accumulated criteria for one AND-group.
#[derive(Debug, Default)]
pub struct CriteriaState {
    terms: Vec<Term>,
    /// First key-capable marking per property: (property, role, term index).
    roles: Vec<(String, KeyRole, usize)>,
    sort: Option<Sort>,
}

impl CriteriaState {
    pub fn new(sort: Option<Sort>) -> Self {
        Self {
            terms: Vec::new(),
            roles: Vec::new(),
            sort,
        }
    }

    /// Fold one translated term into the state.
    pub fn add_term(&mut self, term: Term) {
        let index = self.terms.len();
        if let Some(role) = key_role(&term) {
            if !self.roles.iter().any(|(p, _, _)| *p == term.attribute) {
                self.roles.push((term.attribute.clone(), role, index));
            }
        }
        self.terms.push(term);
    }

    /// All terms, in visit order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// The requested sort order, recorded unvalidated.
    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// The key role claimed by `property`, if any.
    pub fn role(&self, property: &str) -> Option<KeyRole> {
        self.roles
            .iter()
            .find(|(p, _, _)| p == property)
            .map(|(_, role, _)| *role)
    }

    pub fn is_equality_bound(&self, property: &str) -> bool {
        self.role(property) == Some(KeyRole::Equality)
    }

    pub fn is_range_bound(&self, property: &str) -> bool {
        self.role(property) == Some(KeyRole::Range)
    }

    /// The concrete equality value bound for `property`, if equality-bound.
    pub fn equality_value(&self, property: &str) -> Option<Value> {
        self.key_term(property)
            .and_then(|(_, term)| term.equality_value())
    }

    /// The key-claiming term for `property` along with its index.
    pub fn key_term(&self, property: &str) -> Option<(usize, &Term)> {
        self.roles
            .iter()
            .find(|(p, _, _)| p == property)
            .map(|(_, _, idx)| (*idx, &self.terms[*idx]))
    }

    /// Properties with a claimed key role, in visit order.
    pub fn key_bound_properties(&self) -> impl Iterator<Item = (&str, KeyRole)> {
        self.roles
            .iter()
            .map(|(p, role, _)| (p.as_str(), *role))
    }
}

/// Classify the key role a term can claim.
///
/// Deferred (by-name) bindings never claim a key role: they are only
/// resolvable on the textual filter path.
fn key_role(term: &Term) -> Option<KeyRole> {
    if !term.is_fully_bound() {
        return None;
    }
    match &term.kind {
        TermKind::Eq(_) | TermKind::IsTrue | TermKind::IsFalse => Some(KeyRole::Equality),
        TermKind::Lt(_)
        | TermKind::Le(_)
        | TermKind::Gt(_)
        | TermKind::Ge(_)
        | TermKind::Between(_, _) => Some(KeyRole::Range),
        _ => None,
    }
}
