//! Decode engine: runtime stack value to token stream
//!
//! A [`Decoder`] walks one runtime value against a target [`TypeDescriptor`]
//! and yields its tokens lazily. Traversal state lives in an explicit step
//! stack instead of the host call stack, so nesting depth is bounded by the
//! heap and by the runtime's own stack limit, never by native frames.
//!
//! # Steps
//!
//! ```text
//! Value { index, target }     read the value at `index`, emit one token
//! Array { table, element }    advance `next` on `table`, schedule the element
//! Object { table, layout }    advance `next`, emit the field name, schedule the value
//! Map { table, key, value }   advance `next`, schedule key then value
//! PopValue                    drop the entry value once its tokens are out
//! ```
//!
//! Steps that emit nothing (`PopValue`, a skipped lenient field, an array
//! advance) loop inside [`Decoder::next_token`], which keeps host stack use
//! constant per token.
//!
//! # Stack discipline
//!
//! Each table traversal pushes a key, then `next` replaces it with a
//! key/value pair; `PopValue` drops the value, leaving the key for the next
//! advance. When `next` reports the end, the key is gone and the stack is
//! exactly as it was when the table was reached. A failed decoder restores
//! the top it started from.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use lunabind_sdk::{LuaApi, LuaType, Pointer, Token};
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::cache::{self, StructLayout};
use crate::de::{Deserializer, TokenSource};
use crate::descriptor::{Describe, TypeDescriptor};
use crate::error::{DecodeError, Error, Result};
use crate::options::{DecodeOptions, FieldPolicy, IntegerConversion};
use crate::value::Value;

/// Slots a table traversal needs: the key, the value and one spare
const TRAVERSAL_SLOTS: usize = 3;

enum Step {
    Value {
        index: i32,
        target: Rc<TypeDescriptor>,
    },
    Array {
        table: i32,
        element: Rc<TypeDescriptor>,
    },
    Object {
        table: i32,
        layout: Arc<StructLayout>,
    },
    Map {
        table: i32,
        key: Rc<TypeDescriptor>,
        value: Rc<TypeDescriptor>,
    },
    PopValue,
}

/// Lazy token stream over one runtime value
pub struct Decoder<'a> {
    state: &'a mut dyn LuaApi,
    options: DecodeOptions,
    steps: Vec<Step>,
    start_top: i32,
    failed: bool,
}

impl<'a> Decoder<'a> {
    /// Decode the value at `index` against `target`
    pub fn new(
        state: &'a mut dyn LuaApi,
        index: i32,
        target: &TypeDescriptor,
        options: DecodeOptions,
    ) -> Self {
        let index = state.abs_index(index);
        let start_top = state.get_top();
        Self {
            state,
            options,
            steps: vec![Step::Value {
                index,
                target: Rc::new(target.clone()),
            }],
            start_top,
            failed: false,
        }
    }

    /// Produce the next token; `None` once the value is complete.
    ///
    /// After the first error the stream is exhausted and the stack top is
    /// back where it was when the decoder was created.
    pub fn next_token(&mut self) -> std::result::Result<Option<Token>, DecodeError> {
        if self.failed {
            return Ok(None);
        }
        match self.advance() {
            Ok(token) => Ok(token),
            Err(err) => {
                self.failed = true;
                self.steps.clear();
                self.state.set_top(self.start_top);
                Err(err)
            }
        }
    }

    /// Whether every token has been produced (or the decoder failed)
    pub fn is_done(&self) -> bool {
        self.failed || self.steps.is_empty()
    }

    fn advance(&mut self) -> std::result::Result<Option<Token>, DecodeError> {
        while let Some(step) = self.steps.pop() {
            match step {
                Step::Value { index, target } => return self.value(index, target).map(Some),

                Step::PopValue => self.state.set_top(-2),

                Step::Array { table, element } => {
                    if !self.state.next(table)? {
                        return Ok(Some(Token::ArrayEnd));
                    }
                    let index = self.state.abs_index(-1);
                    self.steps.push(Step::Array {
                        table,
                        element: Rc::clone(&element),
                    });
                    self.steps.push(Step::PopValue);
                    self.steps.push(Step::Value {
                        index,
                        target: element,
                    });
                }

                Step::Object { table, layout } => {
                    if !self.state.next(table)? {
                        return Ok(Some(Token::ObjectEnd));
                    }
                    match self.field_name(&layout) {
                        Some((name, target)) => {
                            let index = self.state.abs_index(-1);
                            self.steps.push(Step::Object { table, layout });
                            self.steps.push(Step::PopValue);
                            self.steps.push(Step::Value { index, target });
                            return Ok(Some(Token::String(name)));
                        }
                        None => {
                            let field = self.key_display(-2);
                            match self.options.unknown_fields {
                                FieldPolicy::Lenient => {
                                    warn!(%field, structure = layout.name(), "skipping unknown field");
                                    self.state.set_top(-2);
                                    self.steps.push(Step::Object { table, layout });
                                }
                                FieldPolicy::Strict => {
                                    return Err(DecodeError::FieldNotFound {
                                        field,
                                        structure: layout.name().to_string(),
                                    });
                                }
                            }
                        }
                    }
                }

                Step::Map { table, key, value } => {
                    if !self.state.next(table)? {
                        return Ok(Some(Token::MapEnd));
                    }
                    let key_index = self.state.abs_index(-2);
                    let value_index = self.state.abs_index(-1);
                    self.steps.push(Step::Map {
                        table,
                        key: Rc::clone(&key),
                        value: Rc::clone(&value),
                    });
                    self.steps.push(Step::PopValue);
                    self.steps.push(Step::Value {
                        index: value_index,
                        target: value,
                    });
                    self.steps.push(Step::Value {
                        index: key_index,
                        target: key,
                    });
                }
            }
        }
        Ok(None)
    }

    /// Field name and type for the key at -2, if the struct declares it
    fn field_name(&self, layout: &StructLayout) -> Option<(String, Rc<TypeDescriptor>)> {
        if self.state.type_of(-2) != LuaType::String {
            return None;
        }
        let name = std::str::from_utf8(self.state.to_bytes(-2)?).ok()?;
        let target = layout.field(name)?;
        Some((name.to_string(), Rc::new(target.clone())))
    }

    fn key_display(&self, index: i32) -> String {
        match self.state.type_of(index) {
            LuaType::String => self
                .state
                .to_bytes(index)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default(),
            LuaType::Number if self.state.is_integer(index) => {
                self.state.to_integer(index).to_string()
            }
            LuaType::Number => self.state.to_number(index).to_string(),
            LuaType::Boolean => self.state.to_boolean(index).to_string(),
            other => other.name().to_string(),
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn value(
        &mut self,
        index: i32,
        target: Rc<TypeDescriptor>,
    ) -> std::result::Result<Token, DecodeError> {
        match self.state.type_of(index) {
            LuaType::None | LuaType::Nil => Ok(Token::Nil),

            LuaType::Boolean => match *target {
                TypeDescriptor::Bool | TypeDescriptor::Any => {
                    Ok(Token::Bool(self.state.to_boolean(index)))
                }
                _ => Err(mismatch(&target)),
            },

            LuaType::Number => self.number(index, &target),

            LuaType::String => self.string(index, &target),

            LuaType::LightUserdata => match *target {
                TypeDescriptor::Pointer | TypeDescriptor::Any => {
                    Ok(Token::Pointer(Pointer(self.state.to_pointer(index))))
                }
                _ => Err(mismatch(&target)),
            },

            LuaType::Table => self.table(index, &target),

            LuaType::Function => Err(DecodeError::FunctionNotSupported),

            other => Err(DecodeError::UnexpectedType(other)),
        }
    }

    fn number(
        &mut self,
        index: i32,
        target: &TypeDescriptor,
    ) -> std::result::Result<Token, DecodeError> {
        if target.is_integer() {
            let n = self.integer(index, target)?;
            return integer_token(n, target, self.options.integers);
        }
        match target {
            TypeDescriptor::Float32 => Ok(Token::Float32(self.state.to_number(index) as f32)),
            TypeDescriptor::Float64 | TypeDescriptor::Any => {
                Ok(Token::Float64(self.state.to_number(index)))
            }
            _ => Err(mismatch(target)),
        }
    }

    fn integer(&self, index: i32, target: &TypeDescriptor) -> std::result::Result<i64, DecodeError> {
        match self.options.integers {
            IntegerConversion::Truncate => Ok(self.state.to_integer(index)),
            IntegerConversion::Checked => {
                self.state
                    .to_integerx(index)
                    .ok_or_else(|| DecodeError::NotAnInteger {
                        expected: target.to_string(),
                    })
            }
        }
    }

    fn string(&mut self, index: i32, target: &TypeDescriptor) -> std::result::Result<Token, DecodeError> {
        let bytes = self.state.to_bytes(index).unwrap_or_default();
        if target.wants_bytes() {
            return Ok(Token::Bytes(bytes.to_vec()));
        }
        match target {
            TypeDescriptor::String => std::str::from_utf8(bytes)
                .map(|s| Token::String(s.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8),
            // Binary strings still reach untyped targets, as bytes
            TypeDescriptor::Any => Ok(match std::str::from_utf8(bytes) {
                Ok(s) => Token::String(s.to_string()),
                Err(_) => Token::Bytes(bytes.to_vec()),
            }),
            _ => Err(mismatch(target)),
        }
    }

    fn table(&mut self, index: i32, target: &TypeDescriptor) -> std::result::Result<Token, DecodeError> {
        let (token, step) = match target {
            TypeDescriptor::Sequence(element) => (
                Token::Array,
                Step::Array {
                    table: index,
                    element: Rc::new((**element).clone()),
                },
            ),
            TypeDescriptor::Bytes => (
                Token::Array,
                Step::Array {
                    table: index,
                    element: Rc::new(TypeDescriptor::Uint8),
                },
            ),
            TypeDescriptor::Struct(ty) => (
                Token::Object,
                Step::Object {
                    table: index,
                    layout: cache::layout(ty),
                },
            ),
            TypeDescriptor::Map(key, value) => (
                Token::Map,
                Step::Map {
                    table: index,
                    key: Rc::new((**key).clone()),
                    value: Rc::new((**value).clone()),
                },
            ),
            TypeDescriptor::Any => {
                let any = Rc::new(TypeDescriptor::Any);
                (
                    Token::Map,
                    Step::Map {
                        table: index,
                        key: Rc::clone(&any),
                        value: any,
                    },
                )
            }
            _ => return Err(mismatch(target)),
        };

        if !self.state.check_stack(TRAVERSAL_SLOTS) {
            return Err(DecodeError::StackOverflow);
        }
        self.state.push_nil();
        self.steps.push(step);
        Ok(token)
    }
}

impl Iterator for Decoder<'_> {
    type Item = std::result::Result<Token, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Narrow a runtime integer to the token of the target width
fn integer_token(
    n: i64,
    target: &TypeDescriptor,
    conversion: IntegerConversion,
) -> std::result::Result<Token, DecodeError> {
    macro_rules! narrow {
        ($n:expr, $variant:ident, $ty:ty) => {
            match conversion {
                IntegerConversion::Truncate => Token::$variant($n as $ty),
                IntegerConversion::Checked => Token::$variant(<$ty>::try_from($n).map_err(|_| {
                    DecodeError::IntegerOutOfRange {
                        expected: target.to_string(),
                    }
                })?),
            }
        };
    }

    Ok(match target {
        TypeDescriptor::Int => narrow!(n, Int, isize),
        TypeDescriptor::Int8 => narrow!(n, Int8, i8),
        TypeDescriptor::Int16 => narrow!(n, Int16, i16),
        TypeDescriptor::Int32 => narrow!(n, Int32, i32),
        TypeDescriptor::Int64 => narrow!(n, Int64, i64),
        TypeDescriptor::Uint => narrow!(n, Uint, usize),
        TypeDescriptor::Uint8 => narrow!(n, Uint8, u8),
        TypeDescriptor::Uint16 => narrow!(n, Uint16, u16),
        TypeDescriptor::Uint32 => narrow!(n, Uint32, u32),
        TypeDescriptor::Uint64 => narrow!(n, Uint64, u64),
        _ => return Err(mismatch(target)),
    })
}

fn mismatch(target: &TypeDescriptor) -> DecodeError {
    DecodeError::TypeMismatch {
        expected: target.to_string(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decode the value at `index` into `T`
///
/// The stack top is restored if decoding fails.
pub fn decode_value<T>(state: &mut dyn LuaApi, index: i32, options: DecodeOptions) -> Result<T>
where
    T: Describe + DeserializeOwned + 'static,
{
    decode_value_as(state, index, &T::describe(), options)
}

/// Decode the value at `index` against an explicit descriptor
///
/// The stack top is restored if decoding fails. A [`Value`] target is built
/// without recursion, whatever the nesting depth; other targets go through
/// serde and fail past the deserializer's recursion limit.
pub fn decode_value_as<T>(
    state: &mut dyn LuaApi,
    index: i32,
    target: &TypeDescriptor,
    options: DecodeOptions,
) -> Result<T>
where
    T: DeserializeOwned + 'static,
{
    let top = state.get_top();
    trace!(index, %target, "decode");
    let result = deserialize_from(&mut *state, index, target, options);
    if result.is_err() {
        state.set_top(top);
    }
    result
}

fn deserialize_from<T: DeserializeOwned + 'static>(
    state: &mut dyn LuaApi,
    index: i32,
    target: &TypeDescriptor,
    options: DecodeOptions,
) -> Result<T> {
    let mut decoder = Decoder::new(state, index, target, options);

    let mut slot: Option<T> = None;
    if let Some(dynamic) = (&mut slot as &mut dyn Any).downcast_mut::<Option<Value>>() {
        *dynamic = Some(Value::from_source(&mut decoder)?);
        if let Some(token) = TokenSource::next_token(&mut decoder)? {
            return Err(Error::Message(format!(
                "trailing {} after a complete value",
                token.kind()
            )));
        }
    }
    if let Some(value) = slot {
        return Ok(value);
    }

    let mut de = Deserializer::new(decoder);
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Collect every token of the value at `index`
pub fn decode_tokens(
    state: &mut dyn LuaApi,
    index: i32,
    target: &TypeDescriptor,
    options: DecodeOptions,
) -> Result<Vec<Token>> {
    let decoder = Decoder::new(state, index, target, options);
    Ok(decoder.collect::<std::result::Result<Vec<_>, _>>()?)
}
