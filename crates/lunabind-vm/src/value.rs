//! Runtime values
//!
//! Values are reference-counted and confined to the thread that owns the
//! [`State`](crate::State). Strings are immutable byte slices shared between
//! copies; tables and functions compare by identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lunabind_sdk::{LuaType, NativeFunction};

use crate::table::Table;

/// Shared handle to a table
pub type TableRef = Rc<RefCell<Table>>;

/// A value stored on the stack or inside a table
#[derive(Clone, Default)]
pub enum Value {
    /// Nil
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// Number, integer subtype
    Integer(i64),
    /// Number, float subtype
    Number(f64),
    /// Byte string
    String(Rc<[u8]>),
    /// Table
    Table(TableRef),
    /// Native function
    Function(NativeFunction),
    /// Light userdata address
    LightUserdata(usize),
}

impl Value {
    /// Create a string value
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s.as_bytes()))
    }

    /// Create a string value from raw bytes
    pub fn bytes(b: &[u8]) -> Self {
        Value::String(Rc::from(b))
    }

    /// Wrap a table
    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    /// Create an empty table
    pub fn new_table() -> Self {
        Self::table(Table::new())
    }

    /// Type tag of this value
    pub fn type_tag(&self) -> LuaType {
        match self {
            Value::Nil => LuaType::Nil,
            Value::Boolean(_) => LuaType::Boolean,
            Value::Integer(_) | Value::Number(_) => LuaType::Number,
            Value::String(_) => LuaType::String,
            Value::Table(_) => LuaType::Table,
            Value::Function(_) => LuaType::Function,
            Value::LightUserdata(_) => LuaType::LightUserdata,
        }
    }

    /// Check for nil
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness (only nil and false are false)
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Get the table handle, if this is a table
    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Get the string bytes, if this is a string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the string as UTF-8, if this is a valid UTF-8 string
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Exact integer view of a number
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Number(n) => float_to_integer(*n),
            _ => None,
        }
    }

    /// Float view of a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Read `self[key]` if this is a table
    pub fn get(&self, key: impl Into<Value>) -> Value {
        match self {
            Value::Table(t) => t.borrow().get(&key.into()),
            _ => Value::Nil,
        }
    }
}

/// Convert a float with an exact 64-bit integer representation
pub fn float_to_integer(n: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it is out of range
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && n >= -LIMIT && n < LIMIT {
        Some(n as i64)
    } else {
        None
    }
}

fn same_allocation<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(i), Value::Number(n)) | (Value::Number(n), Value::Integer(i)) => {
                float_to_integer(*n) == Some(*i)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => same_allocation(a, b),
            (Value::LightUserdata(a), Value::LightUserdata(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(func) => write!(f, "function: {:p}", Rc::as_ptr(func) as *const ()),
            Value::LightUserdata(p) => write!(f, "userdata: {:#x}", p),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::Function(f)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::table(t)
    }
}
