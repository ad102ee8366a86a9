//! LuaApi trait - the stack-based primitive API of a scripting runtime
//!
//! Runtimes implement this trait; the marshaling engine programs against it
//! through `&mut dyn LuaApi` and never touches runtime internals.
//!
//! # Stack addressing
//!
//! ```text
//! index  1 .. top     absolute slots of the current call frame
//! index -1 .. -top    relative to the top (-1 is the topmost value)
//! ```
//!
//! Reading an index above the top yields [`LuaType::None`]. Only
//! [`LuaApi::check_stack`] guarantees room for further pushes; callers that
//! push proportionally to data size must ask for it first.

use std::fmt;
use std::rc::Rc;

use crate::error::ApiResult;

/// `nresults` value for [`LuaApi::call`] that keeps every returned value
pub const MULTRET: i32 = -1;

/// Result of a native function: number of results left on the stack, or an
/// error message. Errors cross the runtime boundary as text only.
pub type NativeResult = Result<usize, String>;

/// A host function callable from scripts
pub type NativeFunction = Rc<dyn Fn(&mut dyn LuaApi) -> NativeResult>;

/// Wrap a closure as a [`NativeFunction`]
pub fn native_function<F>(f: F) -> NativeFunction
where
    F: Fn(&mut dyn LuaApi) -> NativeResult + 'static,
{
    Rc::new(f)
}

// ============================================================================
// Runtime type tags
// ============================================================================

/// Type tag of a value on the runtime stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaType {
    /// Index does not refer to a stack slot
    None,
    /// Nil
    Nil,
    /// Boolean
    Boolean,
    /// Raw pointer-like value; a bit pattern, never owned
    LightUserdata,
    /// Number (integer or float subtype)
    Number,
    /// Byte string
    String,
    /// Table
    Table,
    /// Function
    Function,
    /// Full userdata
    Userdata,
    /// Coroutine
    Thread,
}

impl LuaType {
    /// Name used by the runtime in its own error messages
    pub fn name(self) -> &'static str {
        match self {
            LuaType::None => "no value",
            LuaType::Nil => "nil",
            LuaType::Boolean => "boolean",
            LuaType::LightUserdata | LuaType::Userdata => "userdata",
            LuaType::Number => "number",
            LuaType::String => "string",
            LuaType::Table => "table",
            LuaType::Function => "function",
            LuaType::Thread => "thread",
        }
    }

    /// Check for nil or an empty slot
    pub fn is_none_or_nil(self) -> bool {
        matches!(self, LuaType::None | LuaType::Nil)
    }
}

impl fmt::Display for LuaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Primitive API
// ============================================================================

/// Stack-based primitive API exposed by a scripting runtime.
///
/// One runtime instance is confined to one thread; nothing here is locked.
pub trait LuaApi {
    // ========================================================================
    // Stack
    // ========================================================================

    /// Index of the top slot (number of values in the current frame)
    fn get_top(&self) -> i32;

    /// Set the top, popping values or filling new slots with nil.
    /// Negative indices count from the current top (`-2` pops one value).
    fn set_top(&mut self, index: i32);

    /// Convert a relative index to an absolute one
    fn abs_index(&self, index: i32) -> i32;

    /// Ensure room for `extra` more values; false if the stack cannot grow
    fn check_stack(&mut self, extra: usize) -> bool;

    // ========================================================================
    // Queries
    // ========================================================================

    /// Type tag of the value at `index`
    fn type_of(&self, index: i32) -> LuaType;

    /// Whether the value at `index` is a number with the integer subtype
    fn is_integer(&self, index: i32) -> bool;

    /// Truthiness of the value at `index` (only nil and false are false)
    fn to_boolean(&self, index: i32) -> bool;

    /// Integer coercion. Floats truncate toward zero (saturating at the
    /// 64-bit bounds); non-numbers yield 0.
    fn to_integer(&self, index: i32) -> i64;

    /// Exact integer coercion: `None` unless the value is a number with an
    /// exact 64-bit integer representation
    fn to_integerx(&self, index: i32) -> Option<i64>;

    /// Float coercion; non-numbers yield 0.0
    fn to_number(&self, index: i32) -> f64;

    /// Raw bytes of a string value, without coercing other types
    fn to_bytes(&self, index: i32) -> Option<&[u8]>;

    /// Address of a light userdata (0 for other types)
    fn to_pointer(&self, index: i32) -> usize;

    /// Raw length: byte length of strings, border of tables, 0 otherwise
    fn raw_len(&self, index: i32) -> usize;

    // ========================================================================
    // Pushes
    // ========================================================================

    /// Push nil
    fn push_nil(&mut self);

    /// Push a boolean
    fn push_boolean(&mut self, b: bool);

    /// Push an integer-subtype number
    fn push_integer(&mut self, n: i64);

    /// Push a float-subtype number
    fn push_number(&mut self, n: f64);

    /// Push a byte string
    fn push_bytes(&mut self, bytes: &[u8]);

    /// Push a UTF-8 string
    fn push_string(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    /// Push a light userdata address
    fn push_light_userdata(&mut self, address: usize);

    /// Push a native function
    fn push_function(&mut self, function: NativeFunction);

    /// Push a copy of the value at `index`
    fn push_value(&mut self, index: i32);

    // ========================================================================
    // Tables
    // ========================================================================

    /// Push a new empty table with preallocated array/record space
    fn create_table(&mut self, narr: usize, nrec: usize);

    /// Table traversal. Pops a key and pushes the next key/value pair,
    /// returning true; returns false (pushing nothing) at the end.
    /// Start a traversal by pushing nil.
    fn next(&mut self, index: i32) -> ApiResult<bool>;

    /// Pop a key and push `t[key]` for the table at `index`
    fn get_table(&mut self, index: i32) -> ApiResult<LuaType>;

    /// Pop a value and a key and perform `t[key] = value`
    fn set_table(&mut self, index: i32) -> ApiResult<()>;

    /// Push `t[name]` for the table at `index`
    fn get_field(&mut self, index: i32, name: &str) -> ApiResult<LuaType>;

    /// Pop a value and perform `t[name] = value`
    fn set_field(&mut self, index: i32, name: &str) -> ApiResult<()>;

    /// Like [`LuaApi::set_table`] without metamethods
    fn raw_set(&mut self, index: i32) -> ApiResult<()>;

    // ========================================================================
    // Globals
    // ========================================================================

    /// Push the global `name`
    fn get_global(&mut self, name: &str) -> LuaType;

    /// Pop a value and store it as the global `name`
    fn set_global(&mut self, name: &str);

    // ========================================================================
    // Calls
    // ========================================================================

    /// Protected call. The function sits below `nargs` arguments; on success
    /// it is replaced by `nresults` results (all of them for [`MULTRET`]).
    /// On failure the function and arguments are popped and the error is
    /// returned.
    fn call(&mut self, nargs: i32, nresults: i32) -> ApiResult<()>;
}
