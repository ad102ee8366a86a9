//! serde `Deserializer` over a token stream
//!
//! The host-side representation is whatever serde can build: any
//! [`TokenSource`] (a live [`Decoder`](crate::decode::Decoder) or a plain
//! token list) feeds a [`Deserializer`].
//!
//! | token                  | visitor call                  |
//! |------------------------|-------------------------------|
//! | `Nil`                  | `visit_unit` / `visit_none`   |
//! | scalars                | the matching `visit_*`        |
//! | `Pointer`              | `visit_newtype_struct(u64)`   |
//! | `Array .. ArrayEnd`    | `visit_seq`                   |
//! | `Object .. ObjectEnd`  | `visit_map` (string keys)     |
//! | `Map .. MapEnd`        | `visit_map`                   |
//!
//! Enums: a `String` token is a unit variant, a one-entry map or object is
//! `{ variant = content }`.
//!
//! serde builds nested values by recursion, so containers deeper than
//! [`RECURSION_LIMIT`] fail with [`DecodeError::RecursionLimit`] instead of
//! exhausting the host stack. [`Value`](crate::value::Value) is built
//! without recursion by [`Value::from_source`](crate::value::Value::from_source).

use serde::de::value::{SeqDeserializer, StringDeserializer, U64Deserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use lunabind_sdk::{Kind, Token, POINTER_NAME};

use crate::decode::Decoder;
use crate::error::{DecodeError, Error, Result};

/// Default container depth a [`Deserializer`] accepts
pub const RECURSION_LIMIT: usize = 128;

// ============================================================================
// Sources
// ============================================================================

/// Producer of tokens, one at a time
pub trait TokenSource {
    /// Next token, or `None` at the end of the stream
    fn next_token(&mut self) -> Result<Option<Token>>;
}

impl TokenSource for Decoder<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Decoder::next_token(self).map_err(Error::from)
    }
}

/// [`TokenSource`] over an iterator of tokens
pub struct Tokens<I>(pub I);

impl<I: Iterator<Item = Token>> TokenSource for Tokens<I> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.0.next())
    }
}

/// Build a `T` from a complete token list
pub fn from_tokens<T, I>(tokens: I) -> Result<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = Token>,
{
    let mut de = Deserializer::new(Tokens(tokens.into_iter()));
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

// ============================================================================
// Deserializer
// ============================================================================

/// serde deserializer reading one value from a [`TokenSource`]
pub struct Deserializer<S> {
    source: S,
    peeked: Option<Token>,
    remaining_depth: usize,
}

impl<S: TokenSource> Deserializer<S> {
    /// Wrap a token source
    pub fn new(source: S) -> Self {
        Self {
            source,
            peeked: None,
            remaining_depth: RECURSION_LIMIT,
        }
    }

    /// Accept at most `limit` nested containers
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.remaining_depth = limit;
        self
    }

    /// Check that the stream holds nothing after the value
    pub fn end(&mut self) -> Result<()> {
        match self.take()? {
            None => Ok(()),
            Some(token) => Err(Error::Message(format!(
                "trailing {} after a complete value",
                token.kind()
            ))),
        }
    }

    /// Recover the source
    pub fn into_source(self) -> S {
        self.source
    }

    fn take(&mut self) -> Result<Option<Token>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.source.next_token(),
        }
    }

    fn next(&mut self) -> Result<Token> {
        self.take()?
            .ok_or_else(|| Error::Message("unexpected end of token stream".into()))
    }

    fn peek_kind(&mut self) -> Result<Option<Kind>> {
        if self.peeked.is_none() {
            self.peeked = self.source.next_token()?;
        }
        Ok(self.peeked.as_ref().map(Token::kind))
    }

    /// Consume the next token, which must be `kind`
    fn expect(&mut self, kind: Kind) -> Result<()> {
        let token = self.next()?;
        if token.kind() == kind {
            Ok(())
        } else {
            Err(Error::Message(format!(
                "expecting {}, found {}",
                kind,
                token.kind()
            )))
        }
    }

    /// Consume one complete value without building anything
    fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let kind = self.next()?.kind();
            if kind.is_container_start() {
                depth += 1;
            } else if kind.is_container_end() {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::Message(format!("unexpected {}", kind)))?;
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Run `f` over the entries of a container closed by `end`
    fn nested<T>(
        &mut self,
        end: Kind,
        f: impl FnOnce(&mut Compound<'_, S>) -> Result<T>,
    ) -> Result<T> {
        self.remaining_depth = self
            .remaining_depth
            .checked_sub(1)
            .ok_or(Error::Decode(DecodeError::RecursionLimit))?;
        let mut access = Compound::new(self, end);
        let value = f(&mut access)?;
        access.finish()?;
        self.remaining_depth += 1;
        Ok(value)
    }

    fn visit_token<'de, V: Visitor<'de>>(&mut self, token: Token, visitor: V) -> Result<V::Value> {
        match token {
            Token::Nil => visitor.visit_unit(),
            Token::Bool(b) => visitor.visit_bool(b),
            Token::String(s) => visitor.visit_string(s),
            Token::Bytes(b) => visitor.visit_byte_buf(b),
            Token::Int(v) => visitor.visit_i64(v as i64),
            Token::Int8(v) => visitor.visit_i8(v),
            Token::Int16(v) => visitor.visit_i16(v),
            Token::Int32(v) => visitor.visit_i32(v),
            Token::Int64(v) => visitor.visit_i64(v),
            Token::Uint(v) => visitor.visit_u64(v as u64),
            Token::Uint8(v) => visitor.visit_u8(v),
            Token::Uint16(v) => visitor.visit_u16(v),
            Token::Uint32(v) => visitor.visit_u32(v),
            Token::Uint64(v) => visitor.visit_u64(v),
            Token::Float32(v) => visitor.visit_f32(v),
            Token::Float64(v) => visitor.visit_f64(v),
            Token::Pointer(p) => visitor.visit_newtype_struct(pointer_deserializer(p.0)),
            Token::Array => self.nested(Kind::ArrayEnd, |access| visitor.visit_seq(access)),
            Token::Object => self.nested(Kind::ObjectEnd, |access| visitor.visit_map(access)),
            Token::Map => self.nested(Kind::MapEnd, |access| visitor.visit_map(access)),
            end @ (Token::ArrayEnd | Token::ObjectEnd | Token::MapEnd) => {
                Err(Error::Message(format!("unexpected {}", end.kind())))
            }
        }
    }
}

fn pointer_deserializer(address: usize) -> U64Deserializer<Error> {
    (address as u64).into_deserializer()
}

impl<'de, S: TokenSource> de::Deserializer<'de> for &mut Deserializer<S> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.next()?;
        self.visit_token(token, visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.peek_kind()? == Some(Kind::Nil) {
            self.next()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name != POINTER_NAME {
            return visitor.visit_newtype_struct(self);
        }
        match self.next()? {
            Token::Pointer(p) => visitor.visit_newtype_struct(pointer_deserializer(p.0)),
            Token::Nil => visitor.visit_unit(),
            other => Err(Error::Message(format!(
                "expecting a pointer, found {}",
                other.kind()
            ))),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.next()? {
            Token::Bytes(bytes) => {
                let mut seq = SeqDeserializer::<_, Error>::new(bytes.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            token => self.visit_token(token, visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.next()? {
            Token::String(variant) => {
                let access: StringDeserializer<Error> = variant.into_deserializer();
                visitor.visit_enum(access)
            }
            Token::Map => {
                let value = visitor.visit_enum(Variant { de: &mut *self })?;
                self.expect(Kind::MapEnd)?;
                Ok(value)
            }
            Token::Object => {
                let value = visitor.visit_enum(Variant { de: &mut *self })?;
                self.expect(Kind::ObjectEnd)?;
                Ok(value)
            }
            other => Err(Error::Message(format!(
                "expecting an enum, found {}",
                other.kind()
            ))),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.skip_value()?;
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct map struct identifier
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Sequence and map access until the closing token
struct Compound<'a, S> {
    de: &'a mut Deserializer<S>,
    end: Kind,
    finished: bool,
}

impl<'a, S: TokenSource> Compound<'a, S> {
    fn new(de: &'a mut Deserializer<S>, end: Kind) -> Self {
        Self {
            de,
            end,
            finished: false,
        }
    }

    fn at_end(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(true);
        }
        if self.de.peek_kind()? == Some(self.end) {
            self.de.next()?;
            self.finished = true;
        }
        Ok(self.finished)
    }

    /// Consume the closing token if the visitor stopped early
    fn finish(&mut self) -> Result<()> {
        if self.at_end()? {
            Ok(())
        } else {
            Err(Error::Message(format!(
                "expecting {}, found more elements",
                self.end
            )))
        }
    }
}

impl<'de, S: TokenSource> SeqAccess<'de> for Compound<'_, S> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.at_end()? {
            return Ok(None);
        }
        seed.deserialize(&mut *self.de).map(Some)
    }
}

impl<'de, S: TokenSource> MapAccess<'de> for Compound<'_, S> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        if self.at_end()? {
            return Ok(None);
        }
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        seed.deserialize(&mut *self.de)
    }
}

/// `{ variant = content }` enum access
struct Variant<'a, S> {
    de: &'a mut Deserializer<S>,
}

impl<'de, 'a, S: TokenSource> EnumAccess<'de> for Variant<'a, S> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self)> {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'de, 'a, S: TokenSource> VariantAccess<'de> for Variant<'a, S> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.de.next()? {
            Token::Nil => Ok(()),
            other => Err(Error::Message(format!(
                "expecting nil for a unit variant, found {}",
                other.kind()
            ))),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(&mut *self.de)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_tuple(&mut *self.de, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_any(&mut *self.de, visitor)
    }
}
