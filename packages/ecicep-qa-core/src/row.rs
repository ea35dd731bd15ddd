//! Named-field rows.

use std::collections::BTreeMap;

use serde_json::Value;

/// A database row keyed by column name.
///
/// Callers depend only on field presence by name, never on column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictRow {
    fields: BTreeMap<String, Value>,
}

impl DictRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, returning `false` if the name was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> bool {
        self.fields.insert(name.into(), value).is_none()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field rendered as text: strings as-is, numbers and booleans through
    /// their JSON form, `NULL` and missing fields as `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DictRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = DictRow::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}
