//! Insertion-ordered hash table
//!
//! Entries live in a vector in insertion order, with a hash index from key to
//! slot. Assigning nil to an existing key leaves a tombstone in place, so a
//! traversal with [`Table::next`] stays valid while fields are cleared.
//! Tombstones are compacted away when a new key is inserted and they
//! outnumber live entries.
//!
//! ```text
//! entries:  [(a, 1), (b, nil), (c, 3)]     b is a tombstone
//! index:    { a: 0, b: 1, c: 2 }
//! ```

use std::rc::Rc;

use lunabind_sdk::{ApiError, ApiResult};
use rustc_hash::FxHashMap;

use crate::value::{float_to_integer, Value};

/// Hashable identity of a table key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Boolean(bool),
    Integer(i64),
    Float(u64),
    String(Rc<[u8]>),
    Reference(usize),
    LightUserdata(usize),
}

impl Key {
    /// Key identity and the normalised key value to store
    fn from_value(value: &Value) -> ApiResult<(Key, Value)> {
        let key = match value {
            Value::Nil => return Err(ApiError::InvalidKey("nil")),
            Value::Boolean(b) => Key::Boolean(*b),
            Value::Integer(i) => Key::Integer(*i),
            Value::Number(n) => {
                if n.is_nan() {
                    return Err(ApiError::InvalidKey("NaN"));
                }
                match float_to_integer(*n) {
                    Some(i) => return Ok((Key::Integer(i), Value::Integer(i))),
                    None => Key::Float(n.to_bits()),
                }
            }
            Value::String(s) => Key::String(s.clone()),
            Value::Table(t) => Key::Reference(Rc::as_ptr(t) as *const () as usize),
            Value::Function(f) => Key::Reference(Rc::as_ptr(f) as *const () as usize),
            Value::LightUserdata(p) => Key::LightUserdata(*p),
        };
        Ok((key, value.clone()))
    }
}

/// A runtime table
#[derive(Default)]
pub struct Table {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<Key, usize>,
    tombstones: usize,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            tombstones: 0,
        }
    }

    /// Number of live (non-nil) entries
    pub fn len(&self) -> usize {
        self.entries.len() - self.tombstones
    }

    /// Check for no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `t[key]`; invalid keys read as nil
    pub fn get(&self, key: &Value) -> Value {
        match Key::from_value(key) {
            Ok((key, _)) => self.lookup(&key),
            Err(_) => Value::Nil,
        }
    }

    /// Read `t[name]`
    pub fn get_field(&self, name: &str) -> Value {
        self.lookup(&Key::String(Rc::from(name.as_bytes())))
    }

    fn lookup(&self, key: &Key) -> Value {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1.clone(),
            None => Value::Nil,
        }
    }

    /// Perform `t[key] = value`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidKey` for nil and NaN keys.
    pub fn set(&mut self, key: Value, value: Value) -> ApiResult<()> {
        let (key, key_value) = Key::from_value(&key)?;
        self.insert(key, key_value, value);
        Ok(())
    }

    /// Perform `t[name] = value`
    pub fn set_field(&mut self, name: &str, value: Value) {
        let bytes: Rc<[u8]> = Rc::from(name.as_bytes());
        self.insert(Key::String(bytes.clone()), Value::String(bytes), value);
    }

    fn insert(&mut self, key: Key, key_value: Value, value: Value) {
        if let Some(&slot) = self.index.get(&key) {
            let entry = &mut self.entries[slot].1;
            match (entry.is_nil(), value.is_nil()) {
                (false, true) => self.tombstones += 1,
                (true, false) => self.tombstones -= 1,
                _ => {}
            }
            *entry = value;
            return;
        }

        if value.is_nil() {
            return;
        }

        if self.tombstones > self.len() {
            self.compact();
        }

        self.index.insert(key, self.entries.len());
        self.entries.push((key_value, value));
    }

    fn compact(&mut self) {
        self.entries.retain(|(_, v)| !v.is_nil());
        self.index.clear();
        for (slot, (k, _)) in self.entries.iter().enumerate() {
            if let Ok((key, _)) = Key::from_value(k) {
                self.index.insert(key, slot);
            }
        }
        self.tombstones = 0;
    }

    /// Traversal step: the entry following `key` (nil starts the traversal)
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidNextKey` if `key` is not in the table.
    pub fn next(&self, key: &Value) -> ApiResult<Option<(Value, Value)>> {
        let start = if key.is_nil() {
            0
        } else {
            let (key, _) = Key::from_value(key).map_err(|_| ApiError::InvalidNextKey)?;
            match self.index.get(&key) {
                Some(&slot) => slot + 1,
                None => return Err(ApiError::InvalidNextKey),
            }
        };

        Ok(self.entries[start.min(self.entries.len())..]
            .iter()
            .find(|(_, v)| !v.is_nil())
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    /// A border: `n` such that `t[n]` is non-nil (or `n` is 0) and `t[n + 1]` is nil
    pub fn border(&self) -> usize {
        let mut n = 0;
        while !self.lookup(&Key::Integer(n as i64 + 1)).is_nil() {
            n += 1;
        }
        n
    }

    /// Iterate live entries in traversal order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries
            .iter()
            .filter(|(_, v)| !v.is_nil())
            .map(|(k, v)| (k, v))
    }

    /// Append `value` at index `border() + 1`
    pub fn push(&mut self, value: Value) {
        let n = self.border() as i64 + 1;
        self.insert(Key::Integer(n), Value::Integer(n), value);
    }

    fn drain_values(&mut self) -> impl Iterator<Item = Value> + '_ {
        self.index.clear();
        self.tombstones = 0;
        self.entries.drain(..).flat_map(|(k, v)| [k, v])
    }
}

impl Drop for Table {
    // Nested tables are released from a worklist instead of recursively, so
    // dropping a deeply nested structure cannot overflow the host stack.
    fn drop(&mut self) {
        let mut pending: Vec<Value> = self.drain_values().collect();
        while let Some(value) = pending.pop() {
            if let Value::Table(table) = value {
                if let Ok(cell) = Rc::try_unwrap(table) {
                    let mut inner = cell.into_inner();
                    pending.extend(inner.drain_values());
                }
            }
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
