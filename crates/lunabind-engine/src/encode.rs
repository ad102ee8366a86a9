//! Encode engine: token stream to runtime stack value
//!
//! An [`Encoder`] accepts tokens one at a time and builds exactly one value
//! on top of the runtime stack. Open containers live on an explicit frame
//! stack; each one owns a table on the runtime stack, so the runtime stack
//! grows with nesting depth and the host call stack does not.
//!
//! ```text
//! Array   ->  t[1], t[2], ... in arrival order
//! Object  ->  string key, value, string key, value, ...
//! Map     ->  key, value, key, value, ...
//! ```
//!
//! Scalars map onto the primitive pushes: integers of every width become
//! runtime integers (`u64` values above `i64::MAX` wrap), floats become
//! runtime numbers, pointers become light userdata.

use std::any::Any;

use lunabind_sdk::{Kind, LuaApi, Token};
use serde::Serialize;
use tracing::trace;

use crate::error::{EncodeError, Result};
use crate::ser::Serializer;
use crate::value::Value;

/// Slots needed per pending value: the key or index plus the value
const VALUE_SLOTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Key,
    Value,
}

#[derive(Debug)]
enum Frame {
    Array { next: i64 },
    Map { awaiting: Slot },
    Object { awaiting: Slot },
}

impl Frame {
    fn end_kind(&self) -> Kind {
        match self {
            Frame::Array { .. } => Kind::ArrayEnd,
            Frame::Map { .. } => Kind::MapEnd,
            Frame::Object { .. } => Kind::ObjectEnd,
        }
    }

    /// Whether a closing token is allowed now
    fn can_close(&self) -> bool {
        match self {
            Frame::Array { .. } => true,
            Frame::Map { awaiting } | Frame::Object { awaiting } => *awaiting == Slot::Key,
        }
    }
}

/// Incremental writer of one runtime value
pub struct Encoder<'a> {
    state: &'a mut dyn LuaApi,
    frames: Vec<Frame>,
    complete: bool,
    start_top: i32,
}

impl<'a> Encoder<'a> {
    /// Encode onto the top of `state`
    pub fn new(state: &'a mut dyn LuaApi) -> Self {
        let start_top = state.get_top();
        Self {
            state,
            frames: Vec::new(),
            complete: false,
            start_top,
        }
    }

    /// Whether one complete value has been written
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Nesting depth of open containers
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Take the next token.
    ///
    /// On error the stack top is restored to where it was when the encoder
    /// was created.
    pub fn accept(&mut self, token: Token) -> std::result::Result<(), EncodeError> {
        let result = self.write(token);
        if result.is_err() {
            self.frames.clear();
            self.state.set_top(self.start_top);
        }
        result
    }

    /// Check that a complete value was written
    pub fn finish(self) -> std::result::Result<(), EncodeError> {
        if self.complete {
            Ok(())
        } else {
            self.state.set_top(self.start_top);
            Err(EncodeError::ExpectingValue)
        }
    }

    fn write(&mut self, token: Token) -> std::result::Result<(), EncodeError> {
        if self.complete {
            return Err(EncodeError::TrailingToken(token.kind()));
        }

        let kind = token.kind();
        if kind.is_container_end() {
            return self.close(kind);
        }

        match self.frames.last_mut() {
            Some(Frame::Array { next }) => {
                if !self.state.check_stack(VALUE_SLOTS) {
                    return Err(EncodeError::StackOverflow);
                }
                let index = *next;
                *next += 1;
                self.state.push_integer(index);
            }
            Some(Frame::Object { awaiting: Slot::Key }) if kind != Kind::String => {
                return Err(EncodeError::ObjectKey(kind));
            }
            Some(Frame::Object { awaiting: Slot::Key }) | Some(Frame::Map { awaiting: Slot::Key }) => {
                if !self.state.check_stack(VALUE_SLOTS) {
                    return Err(EncodeError::StackOverflow);
                }
            }
            _ => {}
        }

        match token {
            Token::Array => self.open(Frame::Array { next: 1 }),
            Token::Map => self.open(Frame::Map { awaiting: Slot::Key }),
            Token::Object => self.open(Frame::Object { awaiting: Slot::Key }),
            scalar => {
                self.push_scalar(scalar)?;
                self.value_done()
            }
        }
    }

    fn push_scalar(&mut self, token: Token) -> std::result::Result<(), EncodeError> {
        if self.frames.is_empty() && !self.state.check_stack(1) {
            return Err(EncodeError::StackOverflow);
        }
        match token {
            Token::Nil => self.state.push_nil(),
            Token::Bool(b) => self.state.push_boolean(b),
            Token::String(s) => self.state.push_string(&s),
            Token::Bytes(b) => self.state.push_bytes(&b),
            Token::Int(v) => self.state.push_integer(v as i64),
            Token::Int8(v) => self.state.push_integer(i64::from(v)),
            Token::Int16(v) => self.state.push_integer(i64::from(v)),
            Token::Int32(v) => self.state.push_integer(i64::from(v)),
            Token::Int64(v) => self.state.push_integer(v),
            Token::Uint(v) => self.state.push_integer(v as i64),
            Token::Uint8(v) => self.state.push_integer(i64::from(v)),
            Token::Uint16(v) => self.state.push_integer(i64::from(v)),
            Token::Uint32(v) => self.state.push_integer(i64::from(v)),
            Token::Uint64(v) => self.state.push_integer(v as i64),
            Token::Float32(v) => self.state.push_number(f64::from(v)),
            Token::Float64(v) => self.state.push_number(v),
            Token::Pointer(p) => self.state.push_light_userdata(p.address()),
            other => {
                return Err(EncodeError::InvalidValue(format!("unexpected {}", other.kind())));
            }
        }
        Ok(())
    }

    fn open(&mut self, frame: Frame) -> std::result::Result<(), EncodeError> {
        if !self.state.check_stack(VALUE_SLOTS) {
            return Err(EncodeError::StackOverflow);
        }
        self.state.create_table(0, 0);
        self.frames.push(frame);
        Ok(())
    }

    fn close(&mut self, kind: Kind) -> std::result::Result<(), EncodeError> {
        match self.frames.last() {
            Some(frame) if frame.end_kind() == kind && frame.can_close() => {
                self.frames.pop();
                self.value_done()
            }
            _ => Err(EncodeError::InvalidValue(format!("unexpected {}", kind))),
        }
    }

    /// Attach the value just pushed to its parent container
    fn value_done(&mut self) -> std::result::Result<(), EncodeError> {
        match self.frames.last_mut() {
            None => {
                self.complete = true;
                Ok(())
            }
            Some(Frame::Array { .. }) => {
                self.state.set_table(-3)?;
                Ok(())
            }
            Some(Frame::Map { awaiting }) | Some(Frame::Object { awaiting }) => match *awaiting {
                Slot::Key => {
                    *awaiting = Slot::Value;
                    Ok(())
                }
                Slot::Value => {
                    *awaiting = Slot::Key;
                    self.state.set_table(-3)?;
                    Ok(())
                }
            },
        }
    }
}

/// Push `value` onto the runtime stack
///
/// Exactly one value is pushed on success; on failure the stack top is
/// restored. A [`Value`] is written without recursion, whatever its depth.
pub fn encode_value<T: Serialize + 'static>(state: &mut dyn LuaApi, value: &T) -> Result<()> {
    let top = state.get_top();
    let result = serialize_into(&mut *state, value);
    if result.is_err() {
        state.set_top(top);
    }
    result
}

fn serialize_into<T: Serialize + 'static>(state: &mut dyn LuaApi, value: &T) -> Result<()> {
    let mut encoder = Encoder::new(state);
    match (value as &dyn Any).downcast_ref::<Value>() {
        Some(dynamic) => dynamic.write_tokens(&mut encoder)?,
        None => value.serialize(Serializer::new(&mut encoder))?,
    }
    encoder.finish()?;
    trace!("encoded value");
    Ok(())
}

/// Push a value given as a complete token list
pub fn encode_tokens<I>(state: &mut dyn LuaApi, tokens: I) -> Result<()>
where
    I: IntoIterator<Item = Token>,
{
    let mut encoder = Encoder::new(state);
    for token in tokens {
        encoder.accept(token)?;
    }
    encoder.finish()?;
    Ok(())
}
