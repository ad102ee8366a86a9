//! Type descriptors
//!
//! A [`TypeDescriptor`] is the runtime-inspectable shape of a host type. The
//! decode engine matches on it at every step to choose the token a runtime
//! value becomes; the function bridge captures one per parameter and return
//! value at registration time.
//!
//! Host types expose their descriptor through [`Describe`]. Structs derive it
//! with `#[derive(Describe)]`; their field lists are produced lazily through
//! the layout cache, so recursive types are fine.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};

use lunabind_sdk::Pointer;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

// ============================================================================
// TypeDescriptor
// ============================================================================

/// Shape of a host type
#[derive(Clone, PartialEq)]
pub enum TypeDescriptor {
    /// `bool`
    Bool,
    /// `isize`
    Int,
    /// `i8`
    Int8,
    /// `i16`
    Int16,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `usize`
    Uint,
    /// `u8`
    Uint8,
    /// `u16`
    Uint16,
    /// `u32`
    Uint32,
    /// `u64`
    Uint64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// UTF-8 text
    String,
    /// Raw byte string
    Bytes,
    /// Light userdata address
    Pointer,
    /// Any value; the runtime type decides the token
    Any,
    /// Homogeneous sequence
    Sequence(Box<TypeDescriptor>),
    /// Key/value map
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// Struct with named fields
    Struct(StructType),
    /// Trailing variadic parameter list; never registrable
    Variadic(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Sequence of `element`
    pub fn sequence(element: TypeDescriptor) -> Self {
        TypeDescriptor::Sequence(Box::new(element))
    }

    /// Map from `key` to `value`
    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(key), Box::new(value))
    }

    /// Struct descriptor for `T`; `fields` is called at most once per
    /// process, when the layout is first needed
    pub fn structure<T: 'static>(name: &'static str, fields: fn() -> Vec<FieldDescriptor>) -> Self {
        TypeDescriptor::Struct(StructType {
            name,
            type_id: TypeId::of::<T>(),
            fields,
        })
    }

    /// Check for a fixed-width or platform integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Int
                | TypeDescriptor::Int8
                | TypeDescriptor::Int16
                | TypeDescriptor::Int32
                | TypeDescriptor::Int64
                | TypeDescriptor::Uint
                | TypeDescriptor::Uint8
                | TypeDescriptor::Uint16
                | TypeDescriptor::Uint32
                | TypeDescriptor::Uint64
        )
    }

    /// Check for `f32` or `f64`
    pub fn is_float(&self) -> bool {
        matches!(self, TypeDescriptor::Float32 | TypeDescriptor::Float64)
    }

    /// Check for a variadic marker
    pub fn is_variadic(&self) -> bool {
        matches!(self, TypeDescriptor::Variadic(_))
    }

    /// Whether a runtime string decodes to `Bytes` for this target
    pub fn wants_bytes(&self) -> bool {
        match self {
            TypeDescriptor::Bytes => true,
            TypeDescriptor::Sequence(element) => **element == TypeDescriptor::Uint8,
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Bool => f.write_str("bool"),
            TypeDescriptor::Int => f.write_str("isize"),
            TypeDescriptor::Int8 => f.write_str("i8"),
            TypeDescriptor::Int16 => f.write_str("i16"),
            TypeDescriptor::Int32 => f.write_str("i32"),
            TypeDescriptor::Int64 => f.write_str("i64"),
            TypeDescriptor::Uint => f.write_str("usize"),
            TypeDescriptor::Uint8 => f.write_str("u8"),
            TypeDescriptor::Uint16 => f.write_str("u16"),
            TypeDescriptor::Uint32 => f.write_str("u32"),
            TypeDescriptor::Uint64 => f.write_str("u64"),
            TypeDescriptor::Float32 => f.write_str("f32"),
            TypeDescriptor::Float64 => f.write_str("f64"),
            TypeDescriptor::String => f.write_str("String"),
            TypeDescriptor::Bytes => f.write_str("bytes"),
            TypeDescriptor::Pointer => f.write_str("pointer"),
            TypeDescriptor::Any => f.write_str("any"),
            TypeDescriptor::Sequence(element) => write!(f, "[{}]", element),
            TypeDescriptor::Map(key, value) => write!(f, "{{{}: {}}}", key, value),
            TypeDescriptor::Struct(s) => f.write_str(s.name),
            TypeDescriptor::Variadic(element) => write!(f, "...{}", element),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ============================================================================
// Structs
// ============================================================================

/// Identity and lazily built field list of a struct type
#[derive(Clone, Copy)]
pub struct StructType {
    name: &'static str,
    type_id: TypeId,
    fields: fn() -> Vec<FieldDescriptor>,
}

impl StructType {
    /// Struct name used in error messages
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type identity, the layout cache key
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Build the field list (uncached; see [`crate::cache::layout`])
    pub fn build_fields(&self) -> Vec<FieldDescriptor> {
        (self.fields)()
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructType").field("name", &self.name).finish()
    }
}

/// A named struct field and its type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Name as it appears in runtime tables
    pub name: &'static str,
    /// Field type
    pub descriptor: TypeDescriptor,
}

impl FieldDescriptor {
    /// Create a field descriptor
    pub fn new(name: &'static str, descriptor: TypeDescriptor) -> Self {
        Self { name, descriptor }
    }
}

// ============================================================================
// Describe
// ============================================================================

/// Host types with a known descriptor
pub trait Describe {
    /// Descriptor of `Self`
    fn describe() -> TypeDescriptor;
}

macro_rules! describe_as {
    ($($ty:ty => $desc:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                #[inline]
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::$desc
                }
            }
        )*
    };
}

describe_as! {
    bool => Bool,
    isize => Int,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    usize => Uint,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    char => String,
    Bytes => Bytes,
    Pointer => Pointer,
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::sequence(T::describe())
    }
}

impl<T: Describe> Describe for VecDeque<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::sequence(T::describe())
    }
}

impl<T: Describe> Describe for Box<[T]> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::sequence(T::describe())
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::sequence(T::describe())
    }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::map(K::describe(), V::describe())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::map(K::describe(), V::describe())
    }
}

// Optional and boxed values are described by what they hold; nil decodes to
// `None` through the Nil token.
impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<T: Describe> Describe for Variadic<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Variadic(Box::new(T::describe()))
    }
}

// ============================================================================
// Bytes
// ============================================================================

/// Byte string that marshals as a runtime string rather than a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Consume into the inner vector
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for Bytes {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Bytes(v.to_vec())
    }
}

impl From<&str> for Bytes {
    fn from(s: &str) -> Self {
        Bytes(s.as_bytes().to_vec())
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

struct BytesVisitor;

impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Bytes;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Bytes, E> {
        Ok(Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Bytes, E> {
        Ok(Bytes(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Bytes, E> {
        Ok(Bytes(v.as_bytes().to_vec()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Bytes, E> {
        Ok(Bytes(v.into_bytes()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Bytes, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            out.push(b);
        }
        Ok(Bytes(out))
    }
}

// ============================================================================
// Variadic
// ============================================================================

/// Marker for a trailing variadic parameter list.
///
/// Functions taking one describe as variadic and are rejected at
/// registration; the runtime passes arguments positionally only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variadic<T>(pub Vec<T>);

impl<T: Serialize> Serialize for Variadic<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for item in &self.0 {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Variadic<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Variadic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(bool::describe().to_string(), "bool");
        assert_eq!(i32::describe().to_string(), "i32");
        assert_eq!(usize::describe().to_string(), "usize");
        assert_eq!(Vec::<i32>::describe().to_string(), "[i32]");
        assert_eq!(
            HashMap::<String, i32>::describe().to_string(),
            "{String: i32}"
        );
        assert_eq!(Variadic::<u8>::describe().to_string(), "...u8");
        assert_eq!(Pointer::describe().to_string(), "pointer");
    }

    #[test]
    fn test_transparent_wrappers() {
        assert_eq!(Option::<f64>::describe(), TypeDescriptor::Float64);
        assert_eq!(Box::<i16>::describe(), TypeDescriptor::Int16);
        assert_eq!(
            Option::<Vec<u8>>::describe(),
            TypeDescriptor::sequence(TypeDescriptor::Uint8)
        );
    }

    #[test]
    fn test_wants_bytes() {
        assert!(Bytes::describe().wants_bytes());
        assert!(Vec::<u8>::describe().wants_bytes());
        assert!(!Vec::<i8>::describe().wants_bytes());
        assert!(!String::describe().wants_bytes());
    }

    #[test]
    fn test_struct_identity() {
        struct A;
        struct B;
        let a = TypeDescriptor::structure::<A>("Same", Vec::new);
        let b = TypeDescriptor::structure::<B>("Same", Vec::new);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "Same");
    }

    #[test]
    fn test_classification() {
        assert!(u64::describe().is_integer());
        assert!(!f32::describe().is_integer());
        assert!(f32::describe().is_float());
        assert!(Variadic::<i32>::describe().is_variadic());
    }
}
