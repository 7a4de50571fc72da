//! Field-name/value records.
//!
//! A `Record` is the unit every data operation works on: the values of an
//! insert, the SET list of an update, the conjunctive WHERE of a select, or a
//! fetched row. Field order is preserved and becomes the column order of the
//! generated SQL.

use crate::{DbalError, DbalResult, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from column name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder form of [`Record::insert`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Value of the first column, used for single-value queries.
    pub fn first_value(&self) -> Option<&Value> {
        self.fields.first().map(|(_, v)| v)
    }

    /// Fields present in both records.
    pub fn overlapping_keys<'a>(&'a self, other: &'a Record) -> Vec<&'a str> {
        self.keys().filter(|k| other.contains_key(k)).collect()
    }

    /// Copy of `self` with every field of `other` applied on top.
    ///
    /// Fields of `other` overwrite fields of `self` with the same name; new
    /// fields are appended in `other`'s order.
    pub fn merged(&self, other: &Record) -> Record {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    /// Build a record from a JSON object.
    ///
    /// Nested arrays or objects fail with `UnsupportedValue`.
    pub fn from_json(json: serde_json::Value) -> DbalResult<Self> {
        match json {
            serde_json::Value::Object(map) => {
                let mut record = Record::new();
                for (field, value) in map {
                    let value = Value::from_json(&field, value)?;
                    record.insert(field, value);
                }
                Ok(record)
            }
            other => Err(DbalError::invalid_record(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Record {
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl std::ops::Index<&str> for Record {
    type Output = Value;

    /// Missing fields index as `Null`.
    fn index(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }
}

/// Build a [`Record`] from `field => value` pairs.
///
/// ```
/// use palimpsest_core::{record, Value};
///
/// let r = record! { "foo" => 1, "bar" => "FUBAR", "boo" => true };
/// assert_eq!(r["foo"], Value::Integer(1));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($field, $value); )+
        record
    }};
}

// =============================================================================
// TESTS
// =============================================================================
