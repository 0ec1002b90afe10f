//! Item, key and cursor types shared by every layer
//!
//! Items are JSON documents (`serde_json::Map`). A key is an item that holds
//! only the table's primary key attributes. Key attribute values are limited
//! to strings and integers so they have a total order inside a partition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A stored document: attribute name to JSON value
pub type Item = serde_json::Map<String, Value>;

/// Primary key attributes of an item
pub type Key = Item;

/// Orderable scalar used for partition and sort key values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyToken {
    /// Integer key value
    Number(i64),
    /// String key value
    String(String),
}

impl KeyToken {
    /// Convert a JSON value into a key token
    ///
    /// Returns None for anything other than strings and integers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(KeyToken::String(s.clone())),
            Value::Number(n) => n.as_i64().map(KeyToken::Number),
            _ => None,
        }
    }

    /// Convert back into a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            KeyToken::Number(n) => Value::from(*n),
            KeyToken::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyToken::Number(n) => write!(f, "{}", n),
            KeyToken::String(s) => write!(f, "{}", s),
        }
    }
}

/// Primary key layout of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    /// Partition (hash) key attribute
    pub partition_key: String,
    /// Optional sort (range) key attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Schema with a partition key only
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    /// Schema with partition and sort keys
    pub fn composite(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: Some(sort_key.into()),
        }
    }

    /// Key attribute names, partition first
    pub fn attributes(&self) -> Vec<&str> {
        let mut attrs = vec![self.partition_key.as_str()];
        if let Some(sort) = &self.sort_key {
            attrs.push(sort.as_str());
        }
        attrs
    }

    /// Extract the key attributes of an item
    ///
    /// Returns None when a key attribute is missing or is not a valid key value.
    pub fn key_of(&self, item: &Item) -> Option<Key> {
        let mut key = Key::new();
        for attr in self.attributes() {
            let value = item.get(attr)?;
            KeyToken::from_value(value)?;
            key.insert(attr.to_string(), value.clone());
        }
        Some(key)
    }

    /// Composite identifier: key values joined by `delimiter`, partition first
    pub fn composite_id(&self, item: &Item, delimiter: &str) -> Option<String> {
        let parts = self
            .attributes()
            .into_iter()
            .map(|attr| item.get(attr).and_then(KeyToken::from_value))
            .collect::<Option<Vec<_>>>()?;
        Some(
            parts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(delimiter),
        )
    }
}

/// A table name paired with its key schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Table name
    pub name: String,
    /// Primary key layout
    pub key_schema: KeySchema,
}

impl TableRef {
    /// Create a table reference
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
        }
    }
}

/// Opaque continuation token: the last key evaluated by the store
///
/// Only store adapters construct cursors. A cursor must be fed back into the
/// same logical query or scan that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Key);

impl Cursor {
    /// Wrap the last evaluated key (store adapters only)
    pub fn from_key(key: Key) -> Self {
        Cursor(key)
    }

    /// Borrow the underlying key
    pub fn as_key(&self) -> &Key {
        &self.0
    }

    /// Take the underlying key
    pub fn into_key(self) -> Key {
        self.0
    }
}

/// One page of results from a query or scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in store order
    pub items: Vec<Item>,
    /// Continuation cursor; None means no more pages
    pub cursor: Option<Cursor>,
}

impl Page {
    /// Final page with no continuation
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }
}

/// Build an item from `(attribute, value)` pairs
pub fn item<I, K, V>(pairs: I) -> Item
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
