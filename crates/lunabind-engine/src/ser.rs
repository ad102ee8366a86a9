//! serde `Serializer` into a token stream
//!
//! Any `Serialize` host value becomes tokens pushed into a [`TokenSink`]: a
//! `Vec<Token>` for inspection, or an [`Encoder`](crate::encode::Encoder)
//! writing straight onto a runtime stack.
//!
//! Structs become `Object` with string keys, maps become `Map`, sequences
//! and tuples become `Array`. Enum variants with content are wrapped in a
//! one-entry `Map` keyed by the variant name; unit variants are plain
//! strings.
//!
//! Containers deeper than [`RECURSION_LIMIT`] fail with
//! [`EncodeError::RecursionLimit`]. [`Value`](crate::value::Value) has its
//! own iterative writer, [`Value::write_tokens`](crate::value::Value::write_tokens).

use serde::ser::{self, Serialize};

use lunabind_sdk::{Pointer, Token, POINTER_NAME};

use crate::encode::Encoder;
use crate::error::{EncodeError, Error, Result};

/// Default container depth a [`Serializer`] accepts
pub const RECURSION_LIMIT: usize = 128;

/// Consumer of tokens
pub trait TokenSink {
    /// Take the next token
    fn accept(&mut self, token: Token) -> Result<()>;
}

impl TokenSink for Vec<Token> {
    fn accept(&mut self, token: Token) -> Result<()> {
        self.push(token);
        Ok(())
    }
}

impl TokenSink for Encoder<'_> {
    fn accept(&mut self, token: Token) -> Result<()> {
        Encoder::accept(self, token).map_err(Error::from)
    }
}

/// Serialize `value` into a token list
pub fn to_tokens<T: Serialize + ?Sized>(value: &T) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    value.serialize(Serializer::new(&mut tokens))?;
    Ok(tokens)
}

/// serde serializer feeding a [`TokenSink`]
pub struct Serializer<'a, K: TokenSink + ?Sized> {
    sink: &'a mut K,
    pointer: bool,
    remaining_depth: usize,
}

impl<'a, K: TokenSink + ?Sized> Serializer<'a, K> {
    /// Serialize into `sink`
    pub fn new(sink: &'a mut K) -> Self {
        Self::with_depth(sink, RECURSION_LIMIT)
    }

    /// Accept at most `limit` nested containers
    pub fn with_recursion_limit(self, limit: usize) -> Self {
        Self::with_depth(self.sink, limit)
    }

    fn with_depth(sink: &'a mut K, remaining_depth: usize) -> Self {
        Self {
            sink,
            pointer: false,
            remaining_depth,
        }
    }

    fn emit(self, token: Token) -> Result<()> {
        self.sink.accept(token)
    }

    fn open(
        self,
        prefix: &[Token],
        start: Token,
        end: Token,
    ) -> Result<Compound<'a, K>> {
        let remaining_depth = self
            .remaining_depth
            .checked_sub(1)
            .ok_or(Error::Encode(EncodeError::RecursionLimit))?;
        Compound::open(self.sink, remaining_depth, prefix, start, end)
    }
}

impl<'a, K: TokenSink + ?Sized> ser::Serializer for Serializer<'a, K> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Compound<'a, K>;
    type SerializeTuple = Compound<'a, K>;
    type SerializeTupleStruct = Compound<'a, K>;
    type SerializeTupleVariant = Compound<'a, K>;
    type SerializeMap = Compound<'a, K>;
    type SerializeStruct = Compound<'a, K>;
    type SerializeStructVariant = Compound<'a, K>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.emit(Token::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.emit(Token::Int8(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.emit(Token::Int16(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.emit(Token::Int32(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.emit(Token::Int64(v))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.emit(Token::Uint8(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.emit(Token::Uint16(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.emit(Token::Uint32(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        if self.pointer {
            return self.emit(Token::Pointer(Pointer(v as usize)));
        }
        self.emit(Token::Uint64(v))
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.emit(Token::Float32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.emit(Token::Float64(v))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.emit(Token::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.emit(Token::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.emit(Token::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<()> {
        self.emit(Token::Nil)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.emit(Token::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.emit(Token::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.emit(Token::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        mut self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        if name == POINTER_NAME {
            self.pointer = true;
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        let mut wrapper = self.open(&[], Token::Map, Token::MapEnd)?;
        wrapper.sink.accept(Token::String(variant.to_string()))?;
        wrapper.element(value)?;
        wrapper.close()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound<'a, K>> {
        self.open(&[], Token::Array, Token::ArrayEnd)
    }

    fn serialize_tuple(self, len: usize) -> Result<Compound<'a, K>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<Compound<'a, K>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a, K>> {
        self.open(
            &[Token::Map, Token::String(variant.to_string())],
            Token::Array,
            Token::ArrayEnd,
        )
        .map(Compound::in_variant)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Compound<'a, K>> {
        self.open(&[], Token::Map, Token::MapEnd)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Compound<'a, K>> {
        self.open(&[], Token::Object, Token::ObjectEnd)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a, K>> {
        self.open(
            &[Token::Map, Token::String(variant.to_string())],
            Token::Object,
            Token::ObjectEnd,
        )
        .map(Compound::in_variant)
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Open container; writes its closing token(s) on `end`
pub struct Compound<'a, K: TokenSink + ?Sized> {
    sink: &'a mut K,
    remaining_depth: usize,
    end: Token,
    variant: bool,
}

impl<'a, K: TokenSink + ?Sized> Compound<'a, K> {
    fn open(
        sink: &'a mut K,
        remaining_depth: usize,
        prefix: &[Token],
        start: Token,
        end: Token,
    ) -> Result<Self> {
        for token in prefix {
            sink.accept(token.clone())?;
        }
        sink.accept(start)?;
        Ok(Self {
            sink,
            remaining_depth,
            end,
            variant: false,
        })
    }

    fn in_variant(mut self) -> Self {
        self.variant = true;
        self
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(Serializer::with_depth(&mut *self.sink, self.remaining_depth))
    }

    fn close(self) -> Result<()> {
        self.sink.accept(self.end)?;
        if self.variant {
            self.sink.accept(Token::MapEnd)?;
        }
        Ok(())
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeSeq for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeTuple for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeTupleStruct for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeTupleVariant for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeMap for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.element(key)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeStruct for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.sink.accept(Token::String(key.to_string()))?;
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<K: TokenSink + ?Sized> ser::SerializeStructVariant for Compound<'_, K> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.sink.accept(Token::String(key.to_string()))?;
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}
