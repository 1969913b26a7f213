//! Clause translation: one parsed predicate clause plus the argument cursor
//! becomes one translated term.
//!
//! Terms carry the leaf attribute (property paths that traverse a
//! composite-key wrapper are rewritten to their trailing segment) and the
//! consumed bindings, marshalled to their stored representation. Operators
//! outside the store's comparison model are rejected here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArgumentError, Error, UnsupportedError};
use crate::schema::EntitySchema;
use crate::types::{Arguments, Binding, CompareOp, PredicateClause};

/// The shape of one translated term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TermKind {
    Eq(Binding),
    Ne(Binding),
    Lt(Binding),
    Le(Binding),
    Gt(Binding),
    Ge(Binding),
    BeginsWith(Binding),
    Between(Binding, Binding),
    /// Membership over an element list; `negated` for NOT IN.
    In { members: Vec<Binding>, negated: bool },
    /// One `contains(...)` per element, AND-connected; `negated` for
    /// NOT contains.
    Contains { members: Vec<Binding>, negated: bool },
    Exists,
    NotExists,
    IsTrue,
    IsFalse,
}

/// One translated predicate term: leaf attribute plus term shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    /// Leaf property name (trailing path segment).
    pub attribute: String,
    pub kind: TermKind,
}

impl Term {
    /// The concrete equality value, when this term binds one positionally.
    ///
    /// `IsTrue`/`IsFalse` are zero-argument equality terms on a literal
    /// boolean.
    pub fn equality_value(&self) -> Option<Value> {
        match &self.kind {
            TermKind::Eq(Binding::Value(v)) => Some(v.clone()),
            TermKind::IsTrue => Some(Value::Bool(true)),
            TermKind::IsFalse => Some(Value::Bool(false)),
            _ => None,
        }
    }

    /// Whether every binding in this term is a concrete value.
    pub fn is_fully_bound(&self) -> bool {
        let positional = |b: &Binding| matches!(b, Binding::Value(_));
        match &self.kind {
            TermKind::Eq(b)
            | TermKind::Ne(b)
            | TermKind::Lt(b)
            | TermKind::Le(b)
            | TermKind::Gt(b)
            | TermKind::Ge(b)
            | TermKind::BeginsWith(b) => positional(b),
            TermKind::Between(low, high) => positional(low) && positional(high),
            TermKind::In { members, .. } | TermKind::Contains { members, .. } => {
                members.iter().all(positional)
            }
            TermKind::Exists | TermKind::NotExists | TermKind::IsTrue | TermKind::IsFalse => true,
        }
    }
}

/// Translate one clause, consuming its arguments from the cursor.
pub fn translate(
    clause: &PredicateClause,
    args: &mut Arguments,
    schema: &impl EntitySchema,
) -> Result<Term, Error> {
    if clause.ignore_case {
        return Err(UnsupportedError::IgnoreCase.into());
    }

    let attribute = leaf_property(&clause.property).to_string();

    let kind = match clause.op {
        CompareOp::Equals => TermKind::Eq(single_value(args, schema, &attribute)?),
        CompareOp::NotEquals => TermKind::Ne(single_value(args, schema, &attribute)?),
        CompareOp::LessThan => TermKind::Lt(single_value(args, schema, &attribute)?),
        CompareOp::LessOrEqual => TermKind::Le(single_value(args, schema, &attribute)?),
        CompareOp::GreaterThan => TermKind::Gt(single_value(args, schema, &attribute)?),
        CompareOp::GreaterOrEqual => TermKind::Ge(single_value(args, schema, &attribute)?),
        CompareOp::StartsWith => TermKind::BeginsWith(single_value(args, schema, &attribute)?),
        CompareOp::Between => {
            let low = single_value(args, schema, &attribute)?;
            let high = single_value(args, schema, &attribute)?;
            TermKind::Between(low, high)
        }
        CompareOp::Exists => TermKind::Exists,
        CompareOp::NotExists => TermKind::NotExists,
        CompareOp::IsTrue => TermKind::IsTrue,
        CompareOp::IsFalse => TermKind::IsFalse,
        CompareOp::In => TermKind::In {
            members: gather_elements(clause, args, schema, &attribute, true)?,
            negated: false,
        },
        CompareOp::NotIn => TermKind::In {
            members: gather_elements(clause, args, schema, &attribute, true)?,
            negated: true,
        },
        CompareOp::Contains => TermKind::Contains {
            members: gather_elements(clause, args, schema, &attribute, false)?,
            negated: false,
        },
        CompareOp::NotContains => TermKind::Contains {
            members: gather_elements(clause, args, schema, &attribute, false)?,
            negated: true,
        },
        op @ (CompareOp::IsEmpty
        | CompareOp::IsNotEmpty
        | CompareOp::Near
        | CompareOp::Regex
        | CompareOp::Like
        | CompareOp::NotLike
        | CompareOp::EndingWith) => return Err(UnsupportedError::Operator(op).into()),
    };

    Ok(Term { attribute, kind })
}

/// The trailing segment of a dot-separated property path.
///
/// Predicates expressed against a composite identifier's members
/// (`playlistId.playlistName`) resolve to the same attribute as direct
/// property predicates (`playlistName`).
pub fn leaf_property(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Consume one binding, rejecting nulls and marshalling concrete values.
fn single_value(
    args: &mut Arguments,
    schema: &impl EntitySchema,
    attribute: &str,
) -> Result<Binding, Error> {
    match args.next(attribute)? {
        Binding::Value(Value::Null) => Err(ArgumentError::NullValue(attribute.to_string()).into()),
        Binding::Value(v) => Ok(Binding::Value(schema.marshal(attribute, v))),
        deferred @ Binding::Param(_) => Ok(deferred),
    }
}

/// Gather the element list for a membership or contains clause.
///
/// A single bound collection/array argument is exploded into elements;
/// otherwise the clause's declared arity consumes that many positional
/// arguments individually. `require_collection` enforces the membership
/// rule that a single scalar argument is not a valid element source.
fn gather_elements(
    clause: &PredicateClause,
    args: &mut Arguments,
    schema: &impl EntitySchema,
    attribute: &str,
    require_collection: bool,
) -> Result<Vec<Binding>, Error> {
    if clause.argument_count <= 1 {
        return match args.next(attribute)? {
            Binding::Value(Value::Null) => {
                Err(ArgumentError::NullValue(attribute.to_string()).into())
            }
            Binding::Value(Value::Array(items)) => {
                if items.is_empty() {
                    return Err(ArgumentError::EmptyCollection(attribute.to_string()).into());
                }
                Ok(items
                    .into_iter()
                    .map(|v| Binding::Value(schema.marshal(attribute, v)))
                    .collect())
            }
            Binding::Value(_) if require_collection => {
                Err(ArgumentError::NotACollection(attribute.to_string()).into())
            }
            Binding::Value(v) => Ok(vec![Binding::Value(schema.marshal(attribute, v))]),
            deferred @ Binding::Param(_) => Ok(vec![deferred]),
        };
    }

    let mut members = Vec::with_capacity(clause.argument_count);
    for _ in 0..clause.argument_count {
        match args.next(attribute)? {
            Binding::Value(Value::Null) => {
                return Err(ArgumentError::NullValue(attribute.to_string()).into());
            }
            Binding::Value(v) => members.push(Binding::Value(schema.marshal(attribute, v))),
            deferred @ Binding::Param(_) => members.push(deferred),
        }
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::TableKeySchema;
    use serde_json::json;

    fn schema() -> TableKeySchema {
        TableKeySchema::builder("id").build()
    }

    #[test]
    fn test_translate_equals() {
        let clause = PredicateClause::new("name", CompareOp::Equals);
        let mut args = Arguments::positional(vec![json!("someName")]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(term.attribute, "name");
        assert_eq!(term.kind, TermKind::Eq(Binding::Value(json!("someName"))));
    }

    #[test]
    fn test_translate_between_consumes_two() {
        let clause = PredicateClause::new("rating", CompareOp::Between);
        let mut args = Arguments::positional(vec![json!(1), json!(5)]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(
            term.kind,
            TermKind::Between(Binding::Value(json!(1)), Binding::Value(json!(5)))
        );
        assert_eq!(args.remaining(), 0);
    }

    #[test]
    fn test_translate_leaf_path_rewrite() {
        let clause = PredicateClause::new("playlistId.playlistName", CompareOp::Equals);
        let mut args = Arguments::positional(vec![json!("p")]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(term.attribute, "playlistName");
    }

    #[test]
    fn test_translate_in_explodes_collection() {
        let clause = PredicateClause::new("name", CompareOp::In);
        let mut args = Arguments::positional(vec![json!(["a", "b"])]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(
            term.kind,
            TermKind::In {
                members: vec![Binding::Value(json!("a")), Binding::Value(json!("b"))],
                negated: false,
            }
        );
    }

    #[test]
    fn test_translate_in_positional_arity() {
        let clause = PredicateClause::new("name", CompareOp::In).argument_count(3);
        let mut args = Arguments::positional(vec![json!("a"), json!("b"), json!("c")]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        match term.kind {
            TermKind::In { members, .. } => assert_eq!(members.len(), 3),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_translate_in_rejects_scalar_and_empty() {
        let clause = PredicateClause::new("name", CompareOp::In);
        let mut args = Arguments::positional(vec![json!("scalar")]);
        assert!(matches!(
            translate(&clause, &mut args, &schema()),
            Err(Error::Argument(ArgumentError::NotACollection(_)))
        ));

        let mut args = Arguments::positional(vec![json!([])]);
        assert!(matches!(
            translate(&clause, &mut args, &schema()),
            Err(Error::Argument(ArgumentError::EmptyCollection(_)))
        ));
    }

    #[test]
    fn test_translate_contains_accepts_scalar() {
        let clause = PredicateClause::new("tags", CompareOp::Contains);
        let mut args = Arguments::positional(vec![json!("admin")]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(
            term.kind,
            TermKind::Contains {
                members: vec![Binding::Value(json!("admin"))],
                negated: false,
            }
        );
    }

    #[test]
    fn test_translate_rejects_null() {
        let clause = PredicateClause::new("name", CompareOp::Equals);
        let mut args = Arguments::positional(vec![Value::Null]);
        assert!(matches!(
            translate(&clause, &mut args, &schema()),
            Err(Error::Argument(ArgumentError::NullValue(_)))
        ));
    }

    #[test]
    fn test_translate_rejects_ignore_case() {
        let clause = PredicateClause::new("name", CompareOp::Equals).ignore_case(true);
        let mut args = Arguments::positional(vec![json!("x")]);
        assert!(matches!(
            translate(&clause, &mut args, &schema()),
            Err(Error::Unsupported(UnsupportedError::IgnoreCase))
        ));
    }

    #[test]
    fn test_translate_rejects_unsupported_operators() {
        for op in [
            CompareOp::IsEmpty,
            CompareOp::IsNotEmpty,
            CompareOp::Near,
            CompareOp::Regex,
            CompareOp::Like,
            CompareOp::NotLike,
            CompareOp::EndingWith,
        ] {
            let clause = PredicateClause::new("name", op).argument_count(0);
            let mut args = Arguments::positional(vec![]);
            assert!(matches!(
                translate(&clause, &mut args, &schema()),
                Err(Error::Unsupported(UnsupportedError::Operator(_)))
            ));
        }
    }

    #[test]
    fn test_translate_marshals_values() {
        let schema = TableKeySchema::builder("id")
            .marshal_with("joined", |v| match v {
                Value::String(s) => json!(format!("DATE#{s}")),
                other => other,
            })
            .build();
        let clause = PredicateClause::new("joined", CompareOp::Equals);
        let mut args = Arguments::positional(vec![json!("2020")]);
        let term = translate(&clause, &mut args, &schema).unwrap();
        assert_eq!(term.kind, TermKind::Eq(Binding::Value(json!("DATE#2020"))));
    }

    #[test]
    fn test_translate_deferred_binding_passes_through() {
        let clause = PredicateClause::new("name", CompareOp::Equals);
        let mut args = Arguments::new(vec![Binding::Param("userName".to_string())]);
        let term = translate(&clause, &mut args, &schema()).unwrap();
        assert_eq!(term.kind, TermKind::Eq(Binding::Param("userName".to_string())));
        assert!(!term.is_fully_bound());
    }
}
