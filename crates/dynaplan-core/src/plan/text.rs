//! Evaluation of generated textual filter expressions against documents.
//!
//! A small tokenizer and recursive-descent evaluator for the expression
//! dialect the assembler emits: `#key<N>` / `:value<N>` placeholder
//! references, the six comparison operators, `BETWEEN`, `IN`,
//! `begins_with`, `contains`, `attribute_exists`, `attribute_not_exists`,
//! and the `NOT` / `AND` / `OR` connectives. Comparison semantics match the
//! structural filter path, so both halves of a plan agree on any document.

use serde_json::Value;
use std::cmp::Ordering;

use super::expression::ExpressionPlaceholders;
use super::filter::{compare_values, contains, resolve_attr};
use crate::error::{Error, ExpressionError};

/// Evaluate a filter expression against a document, resolving placeholder
/// references through the given tables. An empty expression matches
/// everything.
///
/// Fails on malformed input, on a placeholder missing from the tables, and
/// on a deferred value placeholder (those have no value until call time).
pub fn eval_expression(
    expression: &str,
    doc: &Value,
    placeholders: &ExpressionPlaceholders,
) -> Result<bool, Error> {
    if expression.trim().is_empty() {
        return Ok(true);
    }
    let tokens = tokenize(expression)?;
    let mut parser = Evaluator {
        tokens,
        pos: 0,
        doc,
        placeholders,
    };
    let result = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExpressionError::Parse(format!(
            "trailing input at token {}",
            parser.pos
        ))
        .into());
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word: connectives and function names.
    Word(String),
    /// `#key<N>` attribute-name reference.
    KeyRef(String),
    /// `:value<N>` attribute-value reference.
    ValRef(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Le);
                    }
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Ne);
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '#' | ':' => {
                chars.next();
                let mut name = String::from(c);
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.len() == 1 {
                    return Err(ExpressionError::Parse(format!("dangling '{c}'")).into());
                }
                if c == '#' {
                    tokens.push(Token::KeyRef(name));
                } else {
                    tokens.push(Token::ValRef(name));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(ExpressionError::Parse(format!("unexpected character '{other}'")).into())
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Recursive-descent evaluator
// ---------------------------------------------------------------------------

struct Evaluator<'a> {
    tokens: Vec<Token>,
    pos: usize,
    doc: &'a Value,
    placeholders: &'a ExpressionPlaceholders,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, Error> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ExpressionError::Parse("unexpected end of expression".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), Error> {
        let token = self.next()?;
        if token != *expected {
            return Err(
                ExpressionError::Parse(format!("expected {expected:?}, found {token:?}")).into(),
            );
        }
        Ok(())
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn or_expr(&mut self) -> Result<bool, Error> {
        let mut result = self.and_expr()?;
        while self.at_word("OR") {
            self.pos += 1;
            // No short-circuit: the right side must still parse cleanly.
            let rhs = self.and_expr()?;
            result = result || rhs;
        }
        Ok(result)
    }

    fn and_expr(&mut self) -> Result<bool, Error> {
        let mut result = self.unary()?;
        while self.at_word("AND") {
            self.pos += 1;
            let rhs = self.unary()?;
            result = result && rhs;
        }
        Ok(result)
    }

    fn unary(&mut self) -> Result<bool, Error> {
        if self.at_word("NOT") {
            self.pos += 1;
            return Ok(!self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool, Error> {
        match self.next()? {
            Token::LParen => {
                let result = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(result)
            }
            Token::Word(word) => self.function(&word),
            Token::KeyRef(token) => self.key_condition(&token),
            other => Err(ExpressionError::Parse(format!("unexpected token {other:?}")).into()),
        }
    }

    fn function(&mut self, name: &str) -> Result<bool, Error> {
        self.expect(&Token::LParen)?;
        let key = match self.next()? {
            Token::KeyRef(token) => token,
            other => {
                return Err(ExpressionError::Parse(format!(
                    "{name} expects an attribute reference, found {other:?}"
                ))
                .into())
            }
        };
        let result = match name {
            "attribute_exists" => !self.attr(&key)?.is_null(),
            "attribute_not_exists" => self.attr(&key)?.is_null(),
            "begins_with" | "contains" => {
                self.expect(&Token::Comma)?;
                let needle = match self.next()? {
                    Token::ValRef(token) => self.value(&token)?,
                    other => {
                        return Err(ExpressionError::Parse(format!(
                            "{name} expects a value reference, found {other:?}"
                        ))
                        .into())
                    }
                };
                let actual = self.attr(&key)?;
                if name == "begins_with" {
                    match (actual, &needle) {
                        (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                        _ => false,
                    }
                } else {
                    contains(actual, &needle)
                }
            }
            other => {
                return Err(ExpressionError::Parse(format!("unknown function '{other}'")).into())
            }
        };
        self.expect(&Token::RParen)?;
        Ok(result)
    }

    fn key_condition(&mut self, key: &str) -> Result<bool, Error> {
        let compare = |ord: Option<Ordering>, accept: &[Ordering]| {
            ord.map(|o| accept.contains(&o)).unwrap_or(false)
        };
        match self.peek().cloned() {
            Some(Token::Eq) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare(
                    compare_values(self.attr(key)?, &rhs),
                    &[Ordering::Equal],
                ))
            }
            Some(Token::Ne) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare_values(self.attr(key)?, &rhs) != Some(Ordering::Equal))
            }
            Some(Token::Lt) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare(
                    compare_values(self.attr(key)?, &rhs),
                    &[Ordering::Less],
                ))
            }
            Some(Token::Le) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare(
                    compare_values(self.attr(key)?, &rhs),
                    &[Ordering::Less, Ordering::Equal],
                ))
            }
            Some(Token::Gt) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare(
                    compare_values(self.attr(key)?, &rhs),
                    &[Ordering::Greater],
                ))
            }
            Some(Token::Ge) => {
                self.pos += 1;
                let rhs = self.val_ref()?;
                Ok(compare(
                    compare_values(self.attr(key)?, &rhs),
                    &[Ordering::Greater, Ordering::Equal],
                ))
            }
            Some(Token::Word(w)) if w == "BETWEEN" => {
                self.pos += 1;
                let low = self.val_ref()?;
                self.expect(&Token::Word("AND".to_string()))?;
                let high = self.val_ref()?;
                let actual = self.attr(key)?;
                Ok(compare(compare_values(actual, &low), &[Ordering::Greater, Ordering::Equal])
                    && compare(compare_values(actual, &high), &[Ordering::Less, Ordering::Equal]))
            }
            Some(Token::Word(w)) if w == "IN" => {
                self.pos += 1;
                self.membership(key)
            }
            Some(Token::Word(w)) if w == "NOT" => {
                self.pos += 1;
                self.expect(&Token::Word("IN".to_string()))?;
                Ok(!self.membership(key)?)
            }
            // Bare attribute reference: truthy iff literally `true`.
            _ => Ok(self.attr(key)? == &Value::Bool(true)),
        }
    }

    fn membership(&mut self, key: &str) -> Result<bool, Error> {
        self.expect(&Token::LParen)?;
        let mut members = vec![self.val_ref()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            members.push(self.val_ref()?);
        }
        self.expect(&Token::RParen)?;
        let actual = self.attr(key)?;
        Ok(members
            .iter()
            .any(|m| compare_values(actual, m) == Some(Ordering::Equal)))
    }

    fn val_ref(&mut self) -> Result<Value, Error> {
        match self.next()? {
            Token::ValRef(token) => self.value(&token),
            other => {
                Err(ExpressionError::Parse(format!("expected a value reference, found {other:?}"))
                    .into())
            }
        }
    }

    fn attr_name(&self, token: &str) -> Result<&str, Error> {
        self.placeholders
            .names
            .get(token)
            .map(String::as_str)
            .ok_or_else(|| ExpressionError::UnknownPlaceholder(token.to_string()).into())
    }

    fn attr(&self, token: &str) -> Result<&Value, Error> {
        Ok(resolve_attr(self.doc, self.attr_name(token)?))
    }

    fn value(&self, token: &str) -> Result<Value, Error> {
        if let Some(v) = self.placeholders.values.get(token) {
            return Ok(v.clone());
        }
        if self.placeholders.deferred.contains_key(token) {
            return Err(ExpressionError::DeferredValue(token.to_string()).into());
        }
        Err(ExpressionError::UnknownPlaceholder(token.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn placeholders(names: &[(&str, &str)], values: &[(&str, Value)]) -> ExpressionPlaceholders {
        let mut p = ExpressionPlaceholders::default();
        for (token, attr) in names {
            p.names.insert(token.to_string(), attr.to_string());
        }
        for (token, value) in values {
            p.values.insert(token.to_string(), value.clone());
        }
        p
    }

    fn doc() -> Value {
        json!({
            "userName": "alice",
            "rating": 4,
            "active": true,
            "tags": ["rock", "indie"]
        })
    }

    #[test]
    fn test_eval_comparison_operators() {
        let p = placeholders(&[("#key1", "rating")], &[(":value1", json!(4))]);
        assert!(eval_expression("#key1 = :value1", &doc(), &p).unwrap());
        assert!(!eval_expression("#key1 <> :value1", &doc(), &p).unwrap());
        assert!(eval_expression("#key1 <= :value1", &doc(), &p).unwrap());
        assert!(eval_expression("#key1 >= :value1", &doc(), &p).unwrap());
        assert!(!eval_expression("#key1 < :value1", &doc(), &p).unwrap());
        assert!(!eval_expression("#key1 > :value1", &doc(), &p).unwrap());
    }

    #[test]
    fn test_eval_connective_precedence() {
        // AND binds tighter than OR.
        let p = placeholders(
            &[("#key1", "userName"), ("#key2", "rating"), ("#key3", "rating")],
            &[
                (":value1", json!("bob")),
                (":value2", json!(4)),
                (":value3", json!(99)),
            ],
        );
        assert!(!eval_expression(
            "#key1 = :value1 AND #key2 = :value2 OR #key3 > :value3",
            &doc(),
            &p,
        )
        .unwrap());
        assert!(eval_expression(
            "#key1 = :value1 OR #key2 = :value2 AND #key3 < :value3",
            &doc(),
            &p,
        )
        .unwrap());
    }

    #[test]
    fn test_eval_between_and_in() {
        let p = placeholders(
            &[("#key1", "rating"), ("#key2", "userName")],
            &[
                (":value1", json!(3)),
                (":value2", json!(5)),
                (":value3", json!("alice")),
                (":value4", json!("bob")),
            ],
        );
        assert!(eval_expression("#key1 BETWEEN :value1 AND :value2", &doc(), &p).unwrap());
        assert!(eval_expression("#key2 IN (:value3,:value4)", &doc(), &p).unwrap());
        assert!(!eval_expression("#key2 NOT IN (:value3,:value4)", &doc(), &p).unwrap());
    }

    #[test]
    fn test_eval_functions_and_bare_keys() {
        let p = placeholders(
            &[
                ("#key1", "userName"),
                ("#key2", "tags"),
                ("#key3", "active"),
                ("#key4", "missing"),
            ],
            &[(":value1", json!("al")), (":value2", json!("rock"))],
        );
        assert!(eval_expression("begins_with(#key1, :value1)", &doc(), &p).unwrap());
        assert!(eval_expression("contains(#key2,:value2)", &doc(), &p).unwrap());
        assert!(!eval_expression("NOT contains(#key2,:value2)", &doc(), &p).unwrap());
        assert!(eval_expression("#key3", &doc(), &p).unwrap());
        assert!(eval_expression("NOT #key4", &doc(), &p).unwrap());
        assert!(eval_expression("attribute_exists(#key1)", &doc(), &p).unwrap());
        assert!(eval_expression("attribute_not_exists(#key4)", &doc(), &p).unwrap());
    }

    #[test]
    fn test_eval_empty_expression_matches_everything() {
        let p = ExpressionPlaceholders::default();
        assert!(eval_expression("", &doc(), &p).unwrap());
        assert!(eval_expression("   ", &doc(), &p).unwrap());
    }

    #[test]
    fn test_eval_unknown_and_deferred_placeholders() {
        let p = placeholders(&[("#key1", "userName")], &[]);
        let err = eval_expression("#key1 = :value1", &doc(), &p).unwrap_err();
        assert!(matches!(
            err,
            Error::Expression(ExpressionError::UnknownPlaceholder(_))
        ));

        let mut p = placeholders(&[("#key1", "userName")], &[]);
        p.deferred
            .insert(":value1".to_string(), "userName".to_string());
        let err = eval_expression("#key1 = :value1", &doc(), &p).unwrap_err();
        assert!(matches!(
            err,
            Error::Expression(ExpressionError::DeferredValue(_))
        ));
    }

    #[test]
    fn test_eval_rejects_malformed_input() {
        let p = placeholders(&[("#key1", "rating")], &[(":value1", json!(4))]);
        for bad in ["#key1 =", "= :value1", "#key1 = :value1 )", "#key1 ~ :value1", "#"] {
            assert!(matches!(
                eval_expression(bad, &doc(), &p),
                Err(Error::Expression(ExpressionError::Parse(_)))
            ));
        }
    }
}
