//! Entity key-schema metadata consumed during planning.
//!
//! The schema collaborator answers the structural questions the access path
//! selector asks: which property is the hash key, which is the range key,
//! which secondary indexes a property participates in, attribute name
//! overrides, and per-property value marshalling. It is read-only for the
//! duration of a planning pass and may be shared across concurrent passes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A secondary index: an alternate hash(+range) projection over the table.
///
/// Local secondary indexes are represented as indexes whose `hash_key`
/// equals the table's own hash key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub hash_key: String,
    pub range_key: Option<String>,
}

impl IndexSchema {
    /// Whether `property` is this index's hash or range key.
    pub fn contains(&self, property: &str) -> bool {
        self.hash_key == property || self.range_key.as_deref() == Some(property)
    }
}

/// Structural metadata for one entity type.
///
/// Implementations must return `indexes()` in a stable declaration order;
/// that order is the documented tie-break of last resort when several
/// candidate indexes could satisfy the same predicate.
pub trait EntitySchema {
    /// The primary hash-key property name.
    fn hash_key(&self) -> &str;

    /// The primary range-key property name, if the table has one.
    fn range_key(&self) -> Option<&str>;

    /// Secondary indexes in declaration order.
    fn indexes(&self) -> &[IndexSchema];

    /// The stored attribute name for a property (override or the property
    /// name itself).
    fn attribute_name<'a>(&'a self, property: &'a str) -> &'a str {
        property
    }

    /// Convert a bound value to its stored representation. Applied before a
    /// value enters any placeholder or condition. Identity by default.
    fn marshal(&self, _property: &str, value: Value) -> Value {
        value
    }

    fn is_hash_key(&self, property: &str) -> bool {
        self.hash_key() == property
    }

    fn is_range_key(&self, property: &str) -> bool {
        self.range_key() == Some(property)
    }

    /// Whether `property` is the sort key of a local secondary index (an
    /// index sharing the table's hash key).
    fn is_index_range_key(&self, property: &str) -> bool {
        self.indexes()
            .iter()
            .any(|idx| idx.hash_key == self.hash_key() && idx.range_key.as_deref() == Some(property))
    }

    /// Whether `property` is the hash key of a global secondary index.
    fn is_global_index_hash_key(&self, property: &str) -> bool {
        self.indexes()
            .iter()
            .any(|idx| idx.hash_key != self.hash_key() && idx.hash_key == property)
    }

    /// Whether `property` is the range key of a global secondary index.
    fn is_global_index_range_key(&self, property: &str) -> bool {
        self.indexes()
            .iter()
            .any(|idx| idx.hash_key != self.hash_key() && idx.range_key.as_deref() == Some(property))
    }

    /// All indexes in which `property` participates, in declaration order.
    fn indexes_containing(&self, property: &str) -> Vec<&IndexSchema> {
        self.indexes()
            .iter()
            .filter(|idx| idx.contains(property))
            .collect()
    }
}

type Marshaller = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// A concrete, declaration-ordered [`EntitySchema`].
pub struct TableKeySchema {
    hash_key: String,
    range_key: Option<String>,
    indexes: Vec<IndexSchema>,
    attribute_overrides: HashMap<String, String>,
    marshallers: HashMap<String, Marshaller>,
}

impl std::fmt::Debug for TableKeySchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableKeySchema")
            .field("hash_key", &self.hash_key)
            .field("range_key", &self.range_key)
            .field("indexes", &self.indexes)
            .field("attribute_overrides", &self.attribute_overrides)
            .finish_non_exhaustive()
    }
}

impl TableKeySchema {
    /// Start building a schema with the given primary hash-key property.
    pub fn builder(hash_key: &str) -> TableKeySchemaBuilder {
        TableKeySchemaBuilder {
            hash_key: hash_key.to_string(),
            range_key: None,
            indexes: Vec::new(),
            attribute_overrides: HashMap::new(),
            marshallers: HashMap::new(),
        }
    }
}

/// Builder for [`TableKeySchema`].
pub struct TableKeySchemaBuilder {
    hash_key: String,
    range_key: Option<String>,
    indexes: Vec<IndexSchema>,
    attribute_overrides: HashMap<String, String>,
    marshallers: HashMap<String, Marshaller>,
}

impl TableKeySchemaBuilder {
    /// Set the primary range-key property.
    pub fn range_key(mut self, name: &str) -> Self {
        self.range_key = Some(name.to_string());
        self
    }

    /// Declare a secondary index. Declaration order is significant: it is
    /// the final tie-break among otherwise equivalent candidate indexes.
    pub fn index(mut self, name: &str, hash_key: &str, range_key: Option<&str>) -> Self {
        self.indexes.push(IndexSchema {
            name: name.to_string(),
            hash_key: hash_key.to_string(),
            range_key: range_key.map(str::to_string),
        });
        self
    }

    /// Override the stored attribute name for a property.
    pub fn attribute_name(mut self, property: &str, stored: &str) -> Self {
        self.attribute_overrides
            .insert(property.to_string(), stored.to_string());
        self
    }

    /// Register a marshaller converting a property's bound values to their
    /// stored representation.
    pub fn marshal_with(
        mut self,
        property: &str,
        f: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.marshallers.insert(property.to_string(), Box::new(f));
        self
    }

    pub fn build(self) -> TableKeySchema {
        TableKeySchema {
            hash_key: self.hash_key,
            range_key: self.range_key,
            indexes: self.indexes,
            attribute_overrides: self.attribute_overrides,
            marshallers: self.marshallers,
        }
    }
}

impl EntitySchema for TableKeySchema {
    fn hash_key(&self) -> &str {
        &self.hash_key
    }

    fn range_key(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    fn indexes(&self) -> &[IndexSchema] {
        &self.indexes
    }

    fn attribute_name<'a>(&'a self, property: &'a str) -> &'a str {
        self.attribute_overrides
            .get(property)
            .map(String::as_str)
            .unwrap_or(property)
    }

    fn marshal(&self, property: &str, value: Value) -> Value {
        match self.marshallers.get(property) {
            Some(f) => f(value),
            None => value,
        }
    }
}
