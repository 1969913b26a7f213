//! Structural filter conditions and their evaluation against documents.
//!
//! `FilterCondition` is the keyed-map half of a plan's filter: one stored
//! attribute, one comparison operator, and the operand values. Evaluation
//! semantics (dot-path resolution, cross-type comparison) match the store's
//! filter model so the structural and textual plan halves agree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::clause::{Term, TermKind};
use crate::schema::EntitySchema;
use crate::types::Binding;

/// Comparison operator of one structural filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    BeginsWith,
    Contains,
    NotContains,
    In,
    NotIn,
    Exists,
    NotExists,
}

/// One non-key filter condition: attribute, operator, operand values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub attribute: String,
    pub op: ConditionOp,
    pub values: Vec<Value>,
}

impl FilterCondition {
    pub fn new(attribute: impl Into<String>, op: ConditionOp, values: Vec<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            values,
        }
    }

    /// Evaluate this condition against a document.
    ///
    /// A condition missing its operand values matches nothing.
    pub fn eval(&self, doc: &Value) -> bool {
        let actual = resolve_attr(doc, &self.attribute);
        let first = self.values.first();
        match self.op {
            ConditionOp::Eq => {
                first.is_some_and(|v| compare_values(actual, v) == Some(Ordering::Equal))
            }
            ConditionOp::Ne => {
                first.is_some_and(|v| compare_values(actual, v) != Some(Ordering::Equal))
            }
            ConditionOp::Lt => {
                first.is_some_and(|v| compare_values(actual, v) == Some(Ordering::Less))
            }
            ConditionOp::Le => first.is_some_and(|v| {
                matches!(
                    compare_values(actual, v),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }),
            ConditionOp::Gt => {
                first.is_some_and(|v| compare_values(actual, v) == Some(Ordering::Greater))
            }
            ConditionOp::Ge => first.is_some_and(|v| {
                matches!(
                    compare_values(actual, v),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }),
            ConditionOp::Between => match (first, self.values.get(1)) {
                (Some(low), Some(high)) => {
                    matches!(
                        compare_values(actual, low),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(
                        compare_values(actual, high),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                }
                _ => false,
            },
            ConditionOp::BeginsWith => first.is_some_and(|v| match (actual, v) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            }),
            ConditionOp::Contains => first.is_some_and(|v| contains(actual, v)),
            ConditionOp::NotContains => first.is_some_and(|v| !contains(actual, v)),
            ConditionOp::In => self
                .values
                .iter()
                .any(|v| compare_values(actual, v) == Some(Ordering::Equal)),
            ConditionOp::NotIn => !self
                .values
                .iter()
                .any(|v| compare_values(actual, v) == Some(Ordering::Equal)),
            ConditionOp::Exists => !actual.is_null(),
            ConditionOp::NotExists => actual.is_null(),
        }
    }
}

/// Evaluate an AND-connected condition list against a document.
pub fn eval_all(conditions: &[FilterCondition], doc: &Value) -> bool {
    conditions.iter().all(|c| c.eval(doc))
}

/// The structural conditions for one term, with the stored attribute name
/// resolved. `None` when any binding is deferred by parameter name; those
/// terms exist only on the textual path.
pub(crate) fn conditions_for_term(
    term: &Term,
    schema: &impl EntitySchema,
) -> Option<Vec<FilterCondition>> {
    let attribute = schema.attribute_name(&term.attribute).to_string();
    let value = |b: &Binding| b.as_value().cloned();

    let conditions = match &term.kind {
        TermKind::Eq(b) => vec![FilterCondition::new(attribute, ConditionOp::Eq, vec![value(b)?])],
        TermKind::Ne(b) => vec![FilterCondition::new(attribute, ConditionOp::Ne, vec![value(b)?])],
        TermKind::Lt(b) => vec![FilterCondition::new(attribute, ConditionOp::Lt, vec![value(b)?])],
        TermKind::Le(b) => vec![FilterCondition::new(attribute, ConditionOp::Le, vec![value(b)?])],
        TermKind::Gt(b) => vec![FilterCondition::new(attribute, ConditionOp::Gt, vec![value(b)?])],
        TermKind::Ge(b) => vec![FilterCondition::new(attribute, ConditionOp::Ge, vec![value(b)?])],
        TermKind::BeginsWith(b) => vec![FilterCondition::new(
            attribute,
            ConditionOp::BeginsWith,
            vec![value(b)?],
        )],
        TermKind::Between(low, high) => vec![FilterCondition::new(
            attribute,
            ConditionOp::Between,
            vec![value(low)?, value(high)?],
        )],
        TermKind::In { members, negated } => {
            let values = members.iter().map(value).collect::<Option<Vec<_>>>()?;
            let op = if *negated {
                ConditionOp::NotIn
            } else {
                ConditionOp::In
            };
            vec![FilterCondition::new(attribute, op, values)]
        }
        TermKind::Contains { members, negated } => {
            let op = if *negated {
                ConditionOp::NotContains
            } else {
                ConditionOp::Contains
            };
            members
                .iter()
                .map(|m| value(m).map(|v| FilterCondition::new(attribute.clone(), op, vec![v])))
                .collect::<Option<Vec<_>>>()?
        }
        TermKind::Exists => vec![FilterCondition::new(attribute, ConditionOp::Exists, vec![])],
        TermKind::NotExists => vec![FilterCondition::new(
            attribute,
            ConditionOp::NotExists,
            vec![],
        )],
        TermKind::IsTrue => vec![FilterCondition::new(
            attribute,
            ConditionOp::Eq,
            vec![Value::Bool(true)],
        )],
        TermKind::IsFalse => vec![FilterCondition::new(
            attribute,
            ConditionOp::Eq,
            vec![Value::Bool(false)],
        )],
    };
    Some(conditions)
}

/// `contains` semantics: substring for strings, membership for arrays.
pub(crate) fn contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
        (Value::Array(arr), item) => arr.contains(item),
        _ => false,
    }
}

/// Resolve a dot-separated attribute path on a document.
///
/// Returns `Value::Null` if any segment is missing.
pub fn resolve_attr<'a>(doc: &'a Value, path: &str) -> &'a Value {
    let mut current = doc;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return &Value::Null,
        }
    }
    current
}

/// Compare two JSON values, returning an ordering if the types are
/// comparable.
///
/// - Numbers: compared as f64
/// - Strings: compared lexicographically
/// - Booleans: false < true
/// - Null == Null
/// - Mismatched types: returns `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => {
            let fa = a.as_f64()?;
            let fb = b.as_f64()?;
            fa.partial_cmp(&fb)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> Value {
        json!({
            "userName": "alice",
            "playlistName": "road trip",
            "rating": 4,
            "active": true,
            "tags": ["rock", "indie"],
            "owner": { "displayName": "Alice" }
        })
    }

    #[test]
    fn test_eval_comparisons() {
        let doc = sample_doc();
        assert!(FilterCondition::new("rating", ConditionOp::Eq, vec![json!(4)]).eval(&doc));
        assert!(FilterCondition::new("rating", ConditionOp::Ne, vec![json!(5)]).eval(&doc));
        assert!(FilterCondition::new("rating", ConditionOp::Lt, vec![json!(5)]).eval(&doc));
        assert!(FilterCondition::new("rating", ConditionOp::Ge, vec![json!(4)]).eval(&doc));
        assert!(
            FilterCondition::new("rating", ConditionOp::Between, vec![json!(3), json!(5)])
                .eval(&doc)
        );
        assert!(
            !FilterCondition::new("rating", ConditionOp::Between, vec![json!(5), json!(9)])
                .eval(&doc)
        );
    }

    #[test]
    fn test_eval_membership_and_contains() {
        let doc = sample_doc();
        assert!(
            FilterCondition::new("userName", ConditionOp::In, vec![json!("alice"), json!("bob")])
                .eval(&doc)
        );
        assert!(
            FilterCondition::new("userName", ConditionOp::NotIn, vec![json!("bob")]).eval(&doc)
        );
        assert!(
            FilterCondition::new("tags", ConditionOp::Contains, vec![json!("rock")]).eval(&doc)
        );
        assert!(
            FilterCondition::new("playlistName", ConditionOp::Contains, vec![json!("road")])
                .eval(&doc)
        );
        assert!(
            FilterCondition::new("tags", ConditionOp::NotContains, vec![json!("jazz")]).eval(&doc)
        );
    }

    #[test]
    fn test_eval_existence_and_paths() {
        let doc = sample_doc();
        assert!(FilterCondition::new("owner.displayName", ConditionOp::Exists, vec![]).eval(&doc));
        assert!(FilterCondition::new("missing", ConditionOp::NotExists, vec![]).eval(&doc));
        assert!(
            FilterCondition::new("owner.displayName", ConditionOp::Eq, vec![json!("Alice")])
                .eval(&doc)
        );
    }

    #[test]
    fn test_eval_type_mismatch_orders_as_incomparable() {
        let doc = sample_doc();
        // A string attribute never satisfies a numeric range condition.
        assert!(!FilterCondition::new("userName", ConditionOp::Lt, vec![json!(10)]).eval(&doc));
        // But it does satisfy "not equal".
        assert!(FilterCondition::new("userName", ConditionOp::Ne, vec![json!(10)]).eval(&doc));
    }

    #[test]
    fn test_eval_missing_operands_match_nothing() {
        let doc = sample_doc();
        for op in [
            ConditionOp::Eq,
            ConditionOp::Ne,
            ConditionOp::Lt,
            ConditionOp::Between,
            ConditionOp::BeginsWith,
            ConditionOp::Contains,
            ConditionOp::NotContains,
            ConditionOp::In,
        ] {
            assert!(!FilterCondition::new("userName", op, vec![]).eval(&doc));
        }
        // Between with only a lower bound is equally underspecified.
        assert!(!FilterCondition::new("rating", ConditionOp::Between, vec![json!(1)]).eval(&doc));
    }

    #[test]
    fn test_eval_all_is_conjunctive() {
        let doc = sample_doc();
        let conditions = vec![
            FilterCondition::new("userName", ConditionOp::Eq, vec![json!("alice")]),
            FilterCondition::new("rating", ConditionOp::Gt, vec![json!(3)]),
        ];
        assert!(eval_all(&conditions, &doc));

        let conditions = vec![
            FilterCondition::new("userName", ConditionOp::Eq, vec![json!("alice")]),
            FilterCondition::new("rating", ConditionOp::Gt, vec![json!(4)]),
        ];
        assert!(!eval_all(&conditions, &doc));
    }
}
