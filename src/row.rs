//! The uniform record flowing through ETL pipelines.
//!
//! A [`Row`] is an ordered mapping from field name to [`Value`]. Names are
//! matched case-insensitively (`"Age"`, `"age"` and `"AGE"` address the same
//! field) while the spelling used on first insertion is kept for enumeration
//! and serialization. Insertion order is preserved.
//!
//! ```
//! use rowbeam::{row, Row, Value};
//!
//! let mut r = row! { "Name" => "Alice", "Age" => "42" };
//! assert_eq!(r.get_typed::<i64>("age").unwrap(), 42);
//! r.set("active", true);
//! assert_eq!(r.field_names(), vec!["Name", "Age", "active"]);
//! assert!(r.get("missing").is_none());
//! ```

use crate::error::{ConversionError, EtlError, Result};
use crate::value::{FromValue, Value};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered, case-insensitive record of named values.
#[derive(Clone, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
    /// Lowercased name -> position in `fields`.
    index: HashMap<String, usize>,
}

/// Build a [`Row`] from `name => value` pairs.
///
/// Values go through `Into<Value>`, so literals of most primitive types work.
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $( row.set($name, $value); )+
        row
    }};
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Case-insensitive lookup.
    ///
    /// `None` means the field does not exist; a field explicitly set to null is
    /// returned as `Some(&Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(&fold(name)).map(|&i| &self.fields[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let i = *self.index.get(&fold(name))?;
        Some(&mut self.fields[i].1)
    }

    /// Look a field up and coerce it into `T`.
    ///
    /// # Errors
    /// [`EtlError::FieldNotFound`] when the field is absent, and
    /// [`EtlError::Conversion`] when the stored value cannot be represented as `T`.
    pub fn get_typed<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| EtlError::FieldNotFound {
            field: name.to_string(),
        })?;
        T::from_value(value).ok_or_else(|| {
            EtlError::Conversion(ConversionError {
                field: name.to_string(),
                source_type: value.type_name(),
                target_type: T::TYPE_NAME,
            })
        })
    }

    /// Non-failing variant of [`get_typed`](Self::get_typed): `None` on a missing
    /// field or a failed conversion.
    pub fn try_get_typed<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_value)
    }

    /// Insert or overwrite a field.
    ///
    /// Overwriting keeps the field's position and its original spelling; new
    /// fields are appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let key = fold(&name);
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => self.fields[i].1 = value,
            None => {
                self.index.insert(key, self.fields.len());
                self.fields.push((name, value));
            }
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&fold(name))
    }

    /// Remove a field, returning its value. Later fields shift down one position.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.index.remove(&fold(name))?;
        let (_, value) = self.fields.remove(i);
        for pos in self.index.values_mut() {
            if *pos > i {
                *pos -= 1;
            }
        }
        Some(value)
    }

    /// Rename `old` to `new` in place.
    ///
    /// If another field already answers to `new` it is overwritten (removed and
    /// replaced by the renamed one). Returns `false` when `old` does not exist.
    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> bool {
        let new = new.into();
        let old_key = fold(old);
        let new_key = fold(&new);
        if !self.index.contains_key(&old_key) {
            return false;
        }
        if old_key != new_key {
            self.remove(&new);
        }
        let Some(i) = self.index.remove(&old_key) else {
            return false;
        };
        self.fields[i].0 = new;
        self.index.insert(new_key, i);
        true
    }

    /// Field names in insertion order, spelled as first inserted.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Positional access.
    pub fn get_index(&self, i: usize) -> Option<(&str, &Value)> {
        self.fields.get(i).map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Snapshot copy as a plain map (names as spelled in the row).
    pub fn to_mapping(&self) -> HashMap<String, Value> {
        self.fields.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

// Equality, hashing and ordering follow the case-insensitive naming rule and
// are positional: the same fields in a different order are different rows.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Row {}

impl Ord for Row {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.fields.iter().map(|(k, v)| (fold(k), v));
        let rhs = other.fields.iter().map(|(k, v)| (fold(k), v));
        lhs.cmp(rhs)
    }
}

impl PartialOrd for Row {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.len().hash(state);
        for (k, v) in &self.fields {
            fold(k).hash(state);
            v.hash(state);
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of named fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Row, A::Error> {
        let mut row = Row::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry::<String, Value>()? {
            row.set(k, v);
        }
        Ok(row)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}
