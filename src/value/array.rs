use std::collections::HashMap;

use super::{PhpString, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(PhpString),
}

impl ArrayKey {
    /// Normalize a value used as an array key: integral strings become ints,
    /// floats truncate, bools become 0/1 and null becomes `""`.
    pub fn from_value(value: &Value) -> Option<ArrayKey> {
        match value {
            Value::Int(i) => Some(ArrayKey::Int(*i)),
            Value::Str(s) => Some(ArrayKey::from_str_key(s)),
            Value::Bool(b) => Some(ArrayKey::Int(*b as i64)),
            Value::Float(_) => Some(ArrayKey::Int(value.to_int())),
            Value::Null => Some(ArrayKey::Str(PhpString::new())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Decimal integers in canonical form (`"5"`, `"-3"`, not `"05"` or
    /// `"+5"`) become int keys; everything else stays a string key.
    pub fn from_str_key(s: impl AsRef<[u8]>) -> ArrayKey {
        let bytes = s.as_ref();
        let canonical = std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<i64>().ok().filter(|i| i.to_string() == text));
        match canonical {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(PhpString::from(bytes)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl std::fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{}", i),
            ArrayKey::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Insertion-ordered PHP array.
#[derive(Debug, Clone, Default)]
pub struct PhpArray {
    entries: Vec<(ArrayKey, Value)>,
    index: HashMap<ArrayKey, usize>,
    next_index: i64,
}

impl PhpArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut arr = PhpArray::new();
        for value in values {
            arr.push(value);
        }
        arr
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<&mut Value> {
        let pos = *self.index.get(key)?;
        Some(&mut self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn insert(&mut self, key: ArrayKey, value: Value) {
        *self.entry(key) = value;
    }

    /// Mutable slot for `key`, created as `NULL` when missing.
    pub fn entry(&mut self, key: ArrayKey) -> &mut Value {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                if let ArrayKey::Int(i) = key
                    && i >= self.next_index
                {
                    self.next_index = i.saturating_add(1);
                }
                self.entries.push((key.clone(), Value::Null));
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    /// Mutable slot for `$a[] = ...`.
    pub fn push_slot(&mut self) -> &mut Value {
        let key = ArrayKey::Int(self.next_index);
        self.entry(key)
    }

    pub fn push(&mut self, value: Value) {
        *self.push_slot() = value;
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_uses_next_free_index() {
        let mut arr = PhpArray::new();
        arr.push(Value::Int(1));
        arr.insert(ArrayKey::Int(10), Value::Int(2));
        arr.push(Value::Int(3));
        let keys: Vec<_> = arr.keys().cloned().collect();
        assert_eq!(keys, vec![ArrayKey::Int(0), ArrayKey::Int(10), ArrayKey::Int(11)]);
    }

    #[test]
    fn integral_string_keys_are_normalized() {
        assert_eq!(ArrayKey::from_str_key("5"), ArrayKey::Int(5));
        assert_eq!(ArrayKey::from_str_key("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from_str_key("05"), ArrayKey::Str("05".into()));
        assert_eq!(ArrayKey::from_str_key("1.5"), ArrayKey::Str("1.5".into()));
        assert_eq!(ArrayKey::from_value(&Value::Bool(true)), Some(ArrayKey::Int(1)));
        assert_eq!(ArrayKey::from_value(&Value::Null), Some(ArrayKey::Str(PhpString::new())));
    }

    #[test]
    fn remove_keeps_order_and_index() {
        let mut arr = PhpArray::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        arr.remove(&ArrayKey::Int(1));
        assert_eq!(arr.len(), 2);
        assert!(matches!(arr.get(&ArrayKey::Int(2)), Some(Value::Int(3))));
        arr.push(Value::Int(4));
        assert!(arr.contains_key(&ArrayKey::Int(3)));
    }
}
