//! Expression assembly: placeholder tokens and the textual filter
//! expression.
//!
//! Placeholder indices (`#key1`, `:value1`, ...) are monotonically
//! increasing within one planning pass and never reused, even across
//! OR-groups, so every textual reference in the composed expression is
//! unambiguous. The counters live on a short-lived assembler owned by one
//! derivation; they are never shared.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::clause::{Term, TermKind};
use crate::schema::EntitySchema;
use crate::types::Binding;

/// Placeholder tables backing a textual filter expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionPlaceholders {
    /// `#key<N>` token to real (possibly overridden) attribute name.
    pub names: BTreeMap<String, String>,
    /// `:value<N>` token to concrete bound value.
    pub values: BTreeMap<String, Value>,
    /// `:value<N>` token to declared parameter name, for bindings resolved
    /// by name against call-time arguments. Kept separate from `values` so
    /// the structural and textual plan halves stay independently testable.
    pub deferred: BTreeMap<String, String>,
}

impl ExpressionPlaceholders {
    /// Whether any value placeholder awaits call-time resolution.
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

/// Renders translated terms into the store's textual expression dialect.
pub struct ExpressionAssembler<'a, S: EntitySchema> {
    schema: &'a S,
    key_idx: usize,
    value_idx: usize,
    placeholders: ExpressionPlaceholders,
}

impl<'a, S: EntitySchema> ExpressionAssembler<'a, S> {
    pub fn new(schema: &'a S) -> Self {
        Self {
            schema,
            key_idx: 1,
            value_idx: 1,
            placeholders: ExpressionPlaceholders::default(),
        }
    }

    /// Render OR-connected groups of AND-connected terms, in visit order.
    pub fn render_groups(&mut self, groups: &[Vec<Term>]) -> String {
        groups
            .iter()
            .map(|terms| self.render_group(terms))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Render one AND-connected group of terms.
    pub fn render_group(&mut self, terms: &[Term]) -> String {
        terms
            .iter()
            .map(|term| self.render_term(term))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Render one term, allocating its placeholders.
    ///
    /// Multi-value terms (BETWEEN, IN, contains chains) emit one name
    /// placeholder and one value placeholder per element.
    pub fn render_term(&mut self, term: &Term) -> String {
        let key = self.next_key(&term.attribute);
        match &term.kind {
            TermKind::Eq(b) => format!("{key} = {}", self.next_value(b)),
            TermKind::Ne(b) => format!("{key} <> {}", self.next_value(b)),
            TermKind::Lt(b) => format!("{key} < {}", self.next_value(b)),
            TermKind::Le(b) => format!("{key} <= {}", self.next_value(b)),
            TermKind::Gt(b) => format!("{key} > {}", self.next_value(b)),
            TermKind::Ge(b) => format!("{key} >= {}", self.next_value(b)),
            TermKind::BeginsWith(b) => format!("begins_with({key}, {})", self.next_value(b)),
            TermKind::Between(low, high) => {
                let low = self.next_value(low);
                let high = self.next_value(high);
                format!("{key} BETWEEN {low} AND {high}")
            }
            TermKind::In { members, negated } => {
                let list = members
                    .iter()
                    .map(|m| self.next_value(m))
                    .collect::<Vec<_>>()
                    .join(",");
                if *negated {
                    format!("{key} NOT IN ({list})")
                } else {
                    format!("{key} IN ({list})")
                }
            }
            TermKind::Contains { members, negated } => members
                .iter()
                .map(|m| {
                    let value = self.next_value(m);
                    if *negated {
                        format!("NOT contains({key},{value})")
                    } else {
                        format!("contains({key},{value})")
                    }
                })
                .collect::<Vec<_>>()
                .join(" AND "),
            TermKind::Exists => format!("attribute_exists({key})"),
            TermKind::NotExists => format!("attribute_not_exists({key})"),
            TermKind::IsTrue => key,
            TermKind::IsFalse => format!("NOT {key}"),
        }
    }

    /// Take the accumulated placeholder tables.
    pub fn finish(self) -> ExpressionPlaceholders {
        self.placeholders
    }

    fn next_key(&mut self, attribute: &str) -> String {
        let token = format!("#key{}", self.key_idx);
        self.key_idx += 1;
        self.placeholders
            .names
            .insert(token.clone(), self.schema.attribute_name(attribute).to_string());
        token
    }

    fn next_value(&mut self, binding: &Binding) -> String {
        let token = format!(":value{}", self.value_idx);
        self.value_idx += 1;
        match binding {
            Binding::Value(v) => {
                self.placeholders.values.insert(token.clone(), v.clone());
            }
            Binding::Param(p) => {
                self.placeholders.deferred.insert(token.clone(), p.clone());
            }
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableKeySchema;
    use crate::types::{Arguments, CompareOp, PredicateClause};
    use serde_json::json;

    fn term(property: &str, op: CompareOp, values: Vec<Value>) -> Term {
        let schema = TableKeySchema::builder("id").build();
        let clause = PredicateClause::new(property, op);
        let mut args = Arguments::positional(values);
        super::super::clause::translate(&clause, &mut args, &schema).unwrap()
    }

    #[test]
    fn test_render_simple_equality() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_group(&[term("name", CompareOp::Equals, vec![json!("someName")])]);
        assert_eq!(expr, "#key1 = :value1");

        let placeholders = asm.finish();
        assert_eq!(placeholders.names["#key1"], "name");
        assert_eq!(placeholders.values[":value1"], json!("someName"));
        assert!(!placeholders.has_deferred());
    }

    #[test]
    fn test_render_and_group_increments_indices() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_group(&[
            term("userName", CompareOp::NotEquals, vec![json!("u")]),
            term("playlistName", CompareOp::NotEquals, vec![json!("p")]),
        ]);
        assert_eq!(expr, "#key1 <> :value1 AND #key2 <> :value2");
    }

    #[test]
    fn test_render_between_and_in() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_group(&[
            term("rating", CompareOp::Between, vec![json!(1), json!(5)]),
            term("name", CompareOp::In, vec![json!(["a", "b"])]),
        ]);
        assert_eq!(
            expr,
            "#key1 BETWEEN :value1 AND :value2 AND #key2 IN (:value3,:value4)"
        );

        let placeholders = asm.finish();
        assert_eq!(placeholders.names.len(), 2);
        assert_eq!(placeholders.values.len(), 4);
    }

    #[test]
    fn test_render_contains_chain_reuses_name_placeholder() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_group(&[term("tags", CompareOp::Contains, vec![json!(["a", "b"])])]);
        assert_eq!(expr, "contains(#key1,:value1) AND contains(#key1,:value2)");

        let mut asm = ExpressionAssembler::new(&schema);
        let expr =
            asm.render_group(&[term("tags", CompareOp::NotContains, vec![json!(["a", "b"])])]);
        assert_eq!(expr, "NOT contains(#key1,:value1) AND NOT contains(#key1,:value2)");
    }

    #[test]
    fn test_render_zero_argument_terms() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_group(&[
            term("active", CompareOp::IsTrue, vec![]),
            term("deleted", CompareOp::IsFalse, vec![]),
            term("bio", CompareOp::Exists, vec![]),
            term("avatar", CompareOp::NotExists, vec![]),
        ]);
        assert_eq!(
            expr,
            "#key1 AND NOT #key2 AND attribute_exists(#key3) AND attribute_not_exists(#key4)"
        );
        let placeholders = asm.finish();
        assert!(placeholders.values.is_empty());
    }

    #[test]
    fn test_render_or_groups_keep_counters_monotonic() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let expr = asm.render_groups(&[
            vec![term("name", CompareOp::Equals, vec![json!("a")])],
            vec![term("name", CompareOp::Equals, vec![json!("b")])],
        ]);
        assert_eq!(expr, "#key1 = :value1 OR #key2 = :value2");
    }

    #[test]
    fn test_render_applies_attribute_override() {
        let schema = TableKeySchema::builder("id")
            .attribute_name("displayName", "display_name")
            .build();
        let mut asm = ExpressionAssembler::new(&schema);
        asm.render_group(&[term("displayName", CompareOp::Equals, vec![json!("x")])]);
        assert_eq!(asm.finish().names["#key1"], "display_name");
    }

    #[test]
    fn test_render_deferred_binding_lands_in_side_table() {
        let schema = TableKeySchema::builder("id").build();
        let mut asm = ExpressionAssembler::new(&schema);
        let term = Term {
            attribute: "name".to_string(),
            kind: TermKind::Eq(Binding::Param("userName".to_string())),
        };
        let expr = asm.render_group(&[term]);
        assert_eq!(expr, "#key1 = :value1");

        let placeholders = asm.finish();
        assert!(placeholders.values.is_empty());
        assert_eq!(placeholders.deferred[":value1"], "userName");
    }
}
