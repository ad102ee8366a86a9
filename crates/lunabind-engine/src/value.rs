//! Dynamic host value
//!
//! [`Value`] is the host-side counterpart of an untyped runtime value: it
//! describes as `any`, so the runtime type of whatever it is decoded from
//! picks the representation. Tables always come back as [`Value::Map`];
//! the runtime does not distinguish arrays from maps.
//!
//! Building, writing and dropping a `Value` never recurse per nesting level,
//! so arbitrarily deep tables are safe. The serde impls below are for other
//! formats and follow serde's usual recursion.

use std::fmt;

use lunabind_sdk::{Kind, Pointer, Token};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::de::TokenSource;
use crate::descriptor::{Describe, TypeDescriptor};
use crate::error::{Error, Result};
use crate::ser::TokenSink;

/// Untyped host value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Nil / unit
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Floating-point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Byte string that is not valid UTF-8
    Bytes(Vec<u8>),
    /// Light userdata
    Pointer(Pointer),
    /// Ordered sequence
    Array(Vec<Value>),
    /// Key/value pairs in traversal order
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content, converting integral floats and in-range unsigned values
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            Value::Uint(n) => i64::try_from(n).ok(),
            Value::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Some(f as i64)
            }
            _ => None,
        }
    }

    /// Unsigned content
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint(n) => Some(n),
            Value::Int(n) => u64::try_from(n).ok(),
            _ => self.as_i64().and_then(|n| u64::try_from(n).ok()),
        }
    }

    /// Numeric content as a float
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Int(n) => Some(n as f64),
            Value::Uint(n) => Some(n as f64),
            _ => None,
        }
    }

    /// String content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a string or byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Pointer content
    pub fn as_pointer(&self) -> Option<Pointer> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Sequence content
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Map content
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Entry of a map keyed by the string `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

// ============================================================================
// Token streams
// ============================================================================

/// Container under construction in [`Value::from_source`]
enum Open {
    Array(Vec<Value>),
    Map {
        entries: Vec<(Value, Value)>,
        key: Option<Value>,
        end: Kind,
    },
}

/// Work item of [`Value::write_tokens`]
enum Pending<'a> {
    Value(&'a Value),
    End(Token),
}

impl Value {
    /// Read one complete value from `source`
    pub fn from_source<S: TokenSource + ?Sized>(source: &mut S) -> Result<Value> {
        let mut open: Vec<Open> = Vec::new();
        loop {
            let token = source
                .next_token()?
                .ok_or_else(|| Error::Message("unexpected end of token stream".into()))?;
            let value = match token {
                Token::Array => {
                    open.push(Open::Array(Vec::new()));
                    continue;
                }
                Token::Map | Token::Object => {
                    let end = if token.kind() == Kind::Map { Kind::MapEnd } else { Kind::ObjectEnd };
                    open.push(Open::Map {
                        entries: Vec::new(),
                        key: None,
                        end,
                    });
                    continue;
                }
                end @ (Token::ArrayEnd | Token::MapEnd | Token::ObjectEnd) => {
                    match (open.pop(), end.kind()) {
                        (Some(Open::Array(items)), Kind::ArrayEnd) => Value::Array(items),
                        (Some(Open::Map { entries, key: None, end: expected }), kind)
                            if kind == expected =>
                        {
                            Value::Map(entries)
                        }
                        _ => return Err(Error::Message(format!("unexpected {}", end.kind()))),
                    }
                }
                scalar => Value::from_scalar(scalar),
            };

            match open.last_mut() {
                None => return Ok(value),
                Some(Open::Array(items)) => items.push(value),
                Some(Open::Map { entries, key, .. }) => match key.take() {
                    None => *key = Some(value),
                    Some(k) => entries.push((k, value)),
                },
            }
        }
    }

    fn from_scalar(token: Token) -> Value {
        match token {
            Token::Bool(b) => Value::Bool(b),
            Token::String(s) => Value::String(s),
            Token::Bytes(b) => Value::Bytes(b),
            Token::Int(n) => Value::Int(n as i64),
            Token::Int8(n) => Value::Int(n.into()),
            Token::Int16(n) => Value::Int(n.into()),
            Token::Int32(n) => Value::Int(n.into()),
            Token::Int64(n) => Value::Int(n),
            Token::Uint(n) => Value::Uint(n as u64),
            Token::Uint8(n) => Value::Uint(n.into()),
            Token::Uint16(n) => Value::Uint(n.into()),
            Token::Uint32(n) => Value::Uint(n.into()),
            Token::Uint64(n) => Value::Uint(n),
            Token::Float32(f) => Value::Float(f.into()),
            Token::Float64(f) => Value::Float(f),
            Token::Pointer(p) => Value::Pointer(p),
            _ => Value::Nil,
        }
    }

    /// Write the value into `sink`, containers first
    pub fn write_tokens<K: TokenSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        let mut pending = vec![Pending::Value(self)];
        while let Some(item) = pending.pop() {
            let value = match item {
                Pending::End(token) => {
                    sink.accept(token)?;
                    continue;
                }
                Pending::Value(value) => value,
            };
            let token = match value {
                Value::Nil => Token::Nil,
                Value::Bool(b) => Token::Bool(*b),
                Value::Int(n) => Token::Int64(*n),
                Value::Uint(n) => Token::Uint64(*n),
                Value::Float(f) => Token::Float64(*f),
                Value::String(s) => Token::String(s.clone()),
                Value::Bytes(b) => Token::Bytes(b.clone()),
                Value::Pointer(p) => Token::Pointer(*p),
                Value::Array(items) => {
                    pending.push(Pending::End(Token::ArrayEnd));
                    pending.extend(items.iter().rev().map(Pending::Value));
                    Token::Array
                }
                Value::Map(entries) => {
                    pending.push(Pending::End(Token::MapEnd));
                    for (k, v) in entries.iter().rev() {
                        pending.push(Pending::Value(v));
                        pending.push(Pending::Value(k));
                    }
                    Token::Map
                }
            };
            sink.accept(token)?;
        }
        Ok(())
    }

    /// Move the children out so nested values drop one level at a time
    fn take_children(&mut self, into: &mut Vec<Value>) {
        match self {
            Value::Array(items) => into.append(items),
            Value::Map(entries) => {
                for (k, v) in entries.drain(..) {
                    into.push(k);
                    into.push(v);
                }
            }
            _ => {}
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut children = Vec::new();
        self.take_children(&mut children);
        while let Some(mut child) = children.pop() {
            child.take_children(&mut children);
        }
    }
}

impl Describe for Value {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Any
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Uint,
    u16 => Uint,
    u32 => Uint,
    u64 => Uint,
    f32 => Float,
    f64 => Float,
    String => String,
    &str => String,
    Pointer => Pointer,
    Vec<Value> => Array,
}

// ============================================================================
// serde
// ============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Uint(n) => serializer.serialize_u64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Pointer(p) => p.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Uint(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    // Only pointers arrive as newtype structs
    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        let address = u64::deserialize(deserializer)?;
        Ok(Value::Pointer(Pointer(address as usize)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Value::Map(entries))
    }
}
