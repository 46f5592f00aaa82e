use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};

use crate::types::Value;

/// Column name to value mapping used as the row interchange format.
///
/// Entries keep insertion order, which for query results is the order of the selected
/// columns. Keys are unique: inserting an existing key replaces its value in place.
///
/// The typed getters return `None` when the key is absent or when the stored kind cannot be
/// read as the requested type. Integers are stored as `i64` and narrowed with a truncating
/// conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Values {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(&idx) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[idx].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// True when `key` is present and holds NULL.
    #[must_use]
    pub fn is_null(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_null)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => String::from_utf8(b.clone()).ok(),
            _ => None,
        }
    }

    /// Binary value; a present NULL reads as an empty slice.
    #[must_use]
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key)? {
            Value::Blob(b) => Some(b),
            Value::Null => Some(&[]),
            _ => None,
        }
    }

    /// Boolean value; integers read as `value != 0`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_int()
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_float()
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get_f64(key).map(|f| f as f32)
    }

    /// Timestamp value; a present NULL reads as the zero timestamp (the Unix epoch).
    ///
    /// `SQLite` has no timestamp storage class, so text in the formats it writes
    /// (`YYYY-MM-DD HH:MM:SS[.fff]` or RFC 3339) is accepted as well.
    #[must_use]
    pub fn get_time(&self, key: &str) -> Option<NaiveDateTime> {
        match self.get(key)? {
            Value::Timestamp(ts) => Some(*ts),
            Value::Null => Some(NaiveDateTime::default()),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

macro_rules! int_getters {
    ($($name:ident => $ty:ty),* $(,)?) => {
        impl Values {
            $(
                #[must_use]
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
                pub fn $name(&self, key: &str) -> Option<$ty> {
                    self.get_i64(key).map(|i| i as $ty)
                }
            )*
        }
    };
}

int_getters!(
    get_i8 => i8,
    get_i16 => i16,
    get_i32 => i32,
    get_isize => isize,
    get_u8 => u8,
    get_u16 => u16,
    get_u32 => u32,
    get_u64 => u64,
    get_usize => usize,
);

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Values::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}

impl IntoIterator for Values {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
