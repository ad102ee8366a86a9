//! Token vocabulary shared by both marshaling directions
//!
//! A value is represented as a flat stream of tokens. Scalars are a single
//! token; containers open with `Array`, `Object` or `Map` and close with the
//! matching end token, with their contents in between:
//!
//! ```text
//! [1, 2]            Array Int32(1) Int32(2) ArrayEnd
//! { x = true }      Object String("x") Bool(true) ObjectEnd
//! { [1] = "a" }     Map Int64(1) String("a") MapEnd
//! ```
//!
//! Scalar payloads are typed exactly to their kind; nothing is widened at
//! this layer.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Newtype name reserved for [`Pointer`] so serde adapters can recognise it
pub const POINTER_NAME: &str = "$lunabind::Pointer";

// ============================================================================
// Kind
// ============================================================================

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Nil / absent value
    Nil,
    /// Boolean
    Bool,
    /// UTF-8 text
    String,
    /// Raw byte string
    Bytes,
    /// Platform-width signed integer
    Int,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// Platform-width unsigned integer
    Uint,
    /// 8-bit unsigned integer
    Uint8,
    /// 16-bit unsigned integer
    Uint16,
    /// 32-bit unsigned integer
    Uint32,
    /// 64-bit unsigned integer
    Uint64,
    /// Single precision float
    Float32,
    /// Double precision float
    Float64,
    /// Light userdata address
    Pointer,
    /// Start of a sequence
    Array,
    /// End of a sequence
    ArrayEnd,
    /// Start of a struct; keys are `String` tokens
    Object,
    /// End of a struct
    ObjectEnd,
    /// Start of a key/value map
    Map,
    /// End of a map
    MapEnd,
}

impl Kind {
    /// Whether this kind opens a container
    pub fn is_container_start(self) -> bool {
        matches!(self, Kind::Array | Kind::Object | Kind::Map)
    }

    /// Whether this kind closes a container
    pub fn is_container_end(self) -> bool {
        matches!(self, Kind::ArrayEnd | Kind::ObjectEnd | Kind::MapEnd)
    }

    /// The end kind closing a container start, if any
    pub fn end_kind(self) -> Option<Kind> {
        match self {
            Kind::Array => Some(Kind::ArrayEnd),
            Kind::Object => Some(Kind::ObjectEnd),
            Kind::Map => Some(Kind::MapEnd),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Token
// ============================================================================

/// Smallest unit of the intermediate value representation
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Nil / absent value
    Nil,
    /// Boolean
    Bool(bool),
    /// UTF-8 text
    String(String),
    /// Raw byte string
    Bytes(Vec<u8>),
    /// Platform-width signed integer
    Int(isize),
    /// 8-bit signed integer
    Int8(i8),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// Platform-width unsigned integer
    Uint(usize),
    /// 8-bit unsigned integer
    Uint8(u8),
    /// 16-bit unsigned integer
    Uint16(u16),
    /// 32-bit unsigned integer
    Uint32(u32),
    /// 64-bit unsigned integer
    Uint64(u64),
    /// Single precision float
    Float32(f32),
    /// Double precision float
    Float64(f64),
    /// Light userdata address
    Pointer(Pointer),
    /// Start of a sequence
    Array,
    /// End of a sequence
    ArrayEnd,
    /// Start of a struct; keys are `String` tokens
    Object,
    /// End of a struct
    ObjectEnd,
    /// Start of a key/value map
    Map,
    /// End of a map
    MapEnd,
}

impl Token {
    /// Kind of this token
    pub fn kind(&self) -> Kind {
        match self {
            Token::Nil => Kind::Nil,
            Token::Bool(_) => Kind::Bool,
            Token::String(_) => Kind::String,
            Token::Bytes(_) => Kind::Bytes,
            Token::Int(_) => Kind::Int,
            Token::Int8(_) => Kind::Int8,
            Token::Int16(_) => Kind::Int16,
            Token::Int32(_) => Kind::Int32,
            Token::Int64(_) => Kind::Int64,
            Token::Uint(_) => Kind::Uint,
            Token::Uint8(_) => Kind::Uint8,
            Token::Uint16(_) => Kind::Uint16,
            Token::Uint32(_) => Kind::Uint32,
            Token::Uint64(_) => Kind::Uint64,
            Token::Float32(_) => Kind::Float32,
            Token::Float64(_) => Kind::Float64,
            Token::Pointer(_) => Kind::Pointer,
            Token::Array => Kind::Array,
            Token::ArrayEnd => Kind::ArrayEnd,
            Token::Object => Kind::Object,
            Token::ObjectEnd => Kind::ObjectEnd,
            Token::Map => Kind::Map,
            Token::MapEnd => Kind::MapEnd,
        }
    }

    /// Whether this token is a complete value on its own
    pub fn is_scalar(&self) -> bool {
        let kind = self.kind();
        !kind.is_container_start() && !kind.is_container_end()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Nil => write!(f, "nil"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Bytes(b) => write!(f, "bytes({})", b.len()),
            Token::Int(v) => write!(f, "{}", v),
            Token::Int8(v) => write!(f, "{}i8", v),
            Token::Int16(v) => write!(f, "{}i16", v),
            Token::Int32(v) => write!(f, "{}i32", v),
            Token::Int64(v) => write!(f, "{}i64", v),
            Token::Uint(v) => write!(f, "{}", v),
            Token::Uint8(v) => write!(f, "{}u8", v),
            Token::Uint16(v) => write!(f, "{}u16", v),
            Token::Uint32(v) => write!(f, "{}u32", v),
            Token::Uint64(v) => write!(f, "{}u64", v),
            Token::Float32(v) => write!(f, "{}f32", v),
            Token::Float64(v) => write!(f, "{}", v),
            Token::Pointer(p) => write!(f, "{}", p),
            other => write!(f, "{}", other.kind()),
        }
    }
}

// ============================================================================
// Pointer
// ============================================================================

/// Light userdata address.
///
/// A bit pattern, not a reference: neither side of the bridge owns or
/// dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pointer(pub usize);

impl Pointer {
    /// The null address
    pub const fn null() -> Self {
        Pointer(0)
    }

    /// Check for the null address
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Address of a host value
    pub fn from_ref<T>(value: &T) -> Self {
        Pointer(value as *const T as usize)
    }

    /// Raw address
    pub const fn address(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pointer({:#x})", self.0)
    }
}

impl Serialize for Pointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(POINTER_NAME, &(self.0 as u64))
    }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(POINTER_NAME, PointerVisitor)
    }
}

struct PointerVisitor;

impl<'de> Visitor<'de> for PointerVisitor {
    type Value = Pointer;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a light userdata address")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Pointer, E> {
        Ok(Pointer(v as usize))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Pointer, E> {
        Ok(Pointer::null())
    }

    fn visit_none<E: de::Error>(self) -> Result<Pointer, E> {
        Ok(Pointer::null())
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<Pointer, D::Error> {
        u64::deserialize(d).map(|v| Pointer(v as usize))
    }
}
