//! Runtime state: value stack, call frames and globals
//!
//! # Stack layout
//!
//! ```text
//! ┌──────────────────────────┐
//! │ results / temporaries    │  ← top
//! │ arg₂                     │
//! │ arg₁                     │  ← base of the running native call (index 1)
//! ├──────────────────────────┤
//! │ function                 │
//! │ caller's slots           │
//! └──────────────────────────┘
//! ```
//!
//! Positive indices address slots from the current frame's base, negative
//! indices count down from the top. A native function sees only its own frame.

use std::cell::RefCell;
use std::rc::Rc;

use lunabind_sdk::{ApiError, ApiResult, LuaApi, LuaType, NativeFunction, MULTRET};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::table::Table;
use crate::value::{float_to_integer, TableRef, Value};

/// Default maximum number of stack slots
pub const DEFAULT_MAX_STACK: usize = 1_000_000;

/// Default maximum depth of nested native calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// State configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateOptions {
    /// Maximum number of stack slots across all frames
    pub max_stack: usize,
    /// Maximum depth of nested native calls
    pub max_call_depth: usize,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// A single-threaded runtime instance
pub struct State {
    /// Stack slots for all frames
    stack: Vec<Value>,
    /// First slot of the current frame
    base: usize,
    /// Number of native calls in progress
    depth: usize,
    /// Global table
    globals: TableRef,
    options: StateOptions,
}

impl State {
    /// Create a state with default options
    pub fn new() -> Self {
        Self::with_options(StateOptions::default())
    }

    /// Create a state with the given options
    pub fn with_options(options: StateOptions) -> Self {
        Self {
            stack: Vec::with_capacity(256),
            base: 0,
            depth: 0,
            globals: Rc::new(RefCell::new(Table::new())),
            options,
        }
    }

    /// Current options
    pub fn options(&self) -> &StateOptions {
        &self.options
    }

    /// Global table
    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    /// Read a global
    pub fn global(&self, name: &str) -> Value {
        self.globals.borrow().get_field(name)
    }

    /// Store a global
    pub fn set_global_value(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().set_field(name, value);
    }

    /// Install a native function as a global
    pub fn register(&mut self, name: &str, function: NativeFunction) {
        self.set_global_value(name, Value::Function(function));
    }

    /// Resolve a dotted path (`a.b.c`) through the global table
    pub fn lookup(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let mut current = match segments.next() {
            Some(first) => self.global(first),
            None => return Value::Nil,
        };
        for segment in segments {
            current = match &current {
                Value::Table(t) => t.borrow().get_field(segment),
                _ => return Value::Nil,
            };
        }
        current
    }

    /// Push a value
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop the top value of the current frame (nil if the frame is empty)
    pub fn pop(&mut self) -> Value {
        if self.stack.len() > self.base {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::Nil
        }
    }

    /// Copy of the value at `index` (nil if out of range)
    pub fn value(&self, index: i32) -> Value {
        self.slot(index).cloned().unwrap_or_default()
    }

    /// Call `function` with `args` the way a script call site would,
    /// returning every result
    pub fn call_value(&mut self, function: Value, args: Vec<Value>) -> ApiResult<Vec<Value>> {
        let top = self.stack.len();
        let nargs = args.len() as i32;
        self.stack.push(function);
        self.stack.extend(args);
        self.call(nargs, MULTRET)?;
        Ok(self.stack.split_off(top))
    }

    /// Call the function found at a dotted global path
    pub fn call_path(&mut self, path: &str, args: Vec<Value>) -> ApiResult<Vec<Value>> {
        let function = self.lookup(path);
        self.call_value(function, args)
    }

    /// Total number of slots in use across all frames
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of native calls in progress
    pub fn call_depth(&self) -> usize {
        self.depth
    }

    // ========================================================================
    // Index resolution
    // ========================================================================

    fn position(&self, index: i32) -> Option<usize> {
        if index > 0 {
            let pos = self.base + (index as usize - 1);
            (pos < self.stack.len()).then_some(pos)
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            let len = self.stack.len();
            (back <= len - self.base).then(|| len - back)
        } else {
            None
        }
    }

    fn slot(&self, index: i32) -> Option<&Value> {
        self.position(index).map(|pos| &self.stack[pos])
    }

    fn table_at(&self, index: i32) -> ApiResult<TableRef> {
        match self.slot(index) {
            Some(Value::Table(t)) => Ok(t.clone()),
            Some(other) => Err(ApiError::NotATable(other.type_tag())),
            None => Err(ApiError::NotATable(LuaType::None)),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("top", &self.get_top())
            .field("base", &self.base)
            .field("depth", &self.depth)
            .field("options", &self.options)
            .finish()
    }
}

impl LuaApi for State {
    fn get_top(&self) -> i32 {
        (self.stack.len() - self.base) as i32
    }

    fn set_top(&mut self, index: i32) {
        let len = self.stack.len();
        let new_len = if index >= 0 {
            self.base + index as usize
        } else {
            let drop = (index.unsigned_abs() as usize - 1).min(len - self.base);
            len - drop
        };
        self.stack.resize(new_len, Value::Nil);
    }

    fn abs_index(&self, index: i32) -> i32 {
        if index >= 0 {
            index
        } else {
            self.get_top() + index + 1
        }
    }

    fn check_stack(&mut self, extra: usize) -> bool {
        if self.stack.len() + extra > self.options.max_stack {
            return false;
        }
        self.stack.reserve(extra);
        true
    }

    fn type_of(&self, index: i32) -> LuaType {
        self.slot(index).map_or(LuaType::None, Value::type_tag)
    }

    fn is_integer(&self, index: i32) -> bool {
        matches!(self.slot(index), Some(Value::Integer(_)))
    }

    fn to_boolean(&self, index: i32) -> bool {
        self.slot(index).map_or(false, Value::is_truthy)
    }

    fn to_integer(&self, index: i32) -> i64 {
        match self.slot(index) {
            Some(Value::Integer(i)) => *i,
            // `as` truncates toward zero, saturates and maps NaN to 0
            Some(Value::Number(n)) => *n as i64,
            _ => 0,
        }
    }

    fn to_integerx(&self, index: i32) -> Option<i64> {
        match self.slot(index) {
            Some(Value::Integer(i)) => Some(*i),
            Some(Value::Number(n)) => float_to_integer(*n),
            _ => None,
        }
    }

    fn to_number(&self, index: i32) -> f64 {
        self.slot(index).and_then(Value::as_number).unwrap_or(0.0)
    }

    fn to_bytes(&self, index: i32) -> Option<&[u8]> {
        self.slot(index).and_then(Value::as_bytes)
    }

    fn to_pointer(&self, index: i32) -> usize {
        match self.slot(index) {
            Some(Value::LightUserdata(p)) => *p,
            _ => 0,
        }
    }

    fn raw_len(&self, index: i32) -> usize {
        match self.slot(index) {
            Some(Value::String(s)) => s.len(),
            Some(Value::Table(t)) => t.borrow().border(),
            _ => 0,
        }
    }

    fn push_nil(&mut self) {
        self.push(Value::Nil);
    }

    fn push_boolean(&mut self, b: bool) {
        self.push(Value::Boolean(b));
    }

    fn push_integer(&mut self, n: i64) {
        self.push(Value::Integer(n));
    }

    fn push_number(&mut self, n: f64) {
        self.push(Value::Number(n));
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.push(Value::bytes(bytes));
    }

    fn push_light_userdata(&mut self, address: usize) {
        self.push(Value::LightUserdata(address));
    }

    fn push_function(&mut self, function: NativeFunction) {
        self.push(Value::Function(function));
    }

    fn push_value(&mut self, index: i32) {
        let value = self.value(index);
        self.push(value);
    }

    fn create_table(&mut self, narr: usize, nrec: usize) {
        self.push(Value::table(Table::with_capacity(narr + nrec)));
    }

    fn next(&mut self, index: i32) -> ApiResult<bool> {
        let table = self.table_at(index)?;
        let key = self.pop();
        let entry = table.borrow().next(&key)?;
        match entry {
            Some((k, v)) => {
                self.push(k);
                self.push(v);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_table(&mut self, index: i32) -> ApiResult<LuaType> {
        let table = self.table_at(index)?;
        let key = self.pop();
        let value = table.borrow().get(&key);
        let ty = value.type_tag();
        self.push(value);
        Ok(ty)
    }

    fn set_table(&mut self, index: i32) -> ApiResult<()> {
        let table = self.table_at(index)?;
        let value = self.pop();
        let key = self.pop();
        table.borrow_mut().set(key, value)?;
        Ok(())
    }

    fn get_field(&mut self, index: i32, name: &str) -> ApiResult<LuaType> {
        let table = self.table_at(index)?;
        let value = table.borrow().get_field(name);
        let ty = value.type_tag();
        self.push(value);
        Ok(ty)
    }

    fn set_field(&mut self, index: i32, name: &str) -> ApiResult<()> {
        let table = self.table_at(index)?;
        let value = self.pop();
        table.borrow_mut().set_field(name, value);
        Ok(())
    }

    fn raw_set(&mut self, index: i32) -> ApiResult<()> {
        self.set_table(index)
    }

    fn get_global(&mut self, name: &str) -> LuaType {
        let value = self.global(name);
        let ty = value.type_tag();
        self.push(value);
        ty
    }

    fn set_global(&mut self, name: &str) {
        let value = self.pop();
        self.set_global_value(name, value);
    }

    fn call(&mut self, nargs: i32, nresults: i32) -> ApiResult<()> {
        let nargs = nargs.max(0) as usize;
        let available = self.stack.len() - self.base;
        if available < nargs + 1 {
            return Err(ApiError::Runtime(format!(
                "call needs {} stack values, frame has {}",
                nargs + 1,
                available
            )));
        }
        let func_slot = self.stack.len() - nargs - 1;

        let function = match &self.stack[func_slot] {
            Value::Function(f) => f.clone(),
            other => {
                let ty = other.type_tag();
                self.stack.truncate(func_slot);
                return Err(ApiError::NotCallable(ty));
            }
        };

        if self.depth >= self.options.max_call_depth {
            self.stack.truncate(func_slot);
            return Err(ApiError::CallDepth);
        }

        let saved_base = self.base;
        self.base = func_slot + 1;
        self.depth += 1;
        trace!(nargs, depth = self.depth, "native call");

        let outcome = function(self);

        self.depth -= 1;
        let frame_base = self.base;
        self.base = saved_base;

        match outcome {
            Ok(count) => {
                let len = self.stack.len();
                let count = count.min(len - frame_base);
                let results = self.stack.split_off(len - count);
                self.stack.truncate(func_slot);
                self.stack.extend(results);
                if nresults != MULTRET {
                    self.stack.resize(func_slot + nresults.max(0) as usize, Value::Nil);
                }
                Ok(())
            }
            Err(message) => {
                trace!(%message, "native call failed");
                self.stack.truncate(func_slot);
                Err(ApiError::Runtime(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunabind_sdk::native_function;

    #[test]
    fn test_top_and_indices() {
        let mut state = State::new();
        state.push_integer(1);
        state.push_integer(2);
        state.push_integer(3);
        assert_eq!(state.get_top(), 3);
        assert_eq!(state.abs_index(-1), 3);
        assert_eq!(state.to_integer(-3), 1);
        assert_eq!(state.type_of(4), LuaType::None);
        assert_eq!(state.type_of(-4), LuaType::None);

        state.set_top(-2);
        assert_eq!(state.get_top(), 2);
        state.set_top(4);
        assert_eq!(state.type_of(4), LuaType::Nil);
        state.set_top(0);
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn test_integer_coercion() {
        let mut state = State::new();
        state.push_number(3.9);
        state.push_number(-3.9);
        state.push_number(1e300);
        state.push_string("12");
        assert_eq!(state.to_integer(1), 3);
        assert_eq!(state.to_integer(2), -3);
        assert_eq!(state.to_integer(3), i64::MAX);
        assert_eq!(state.to_integer(4), 0);
        assert_eq!(state.to_integerx(1), None);
        assert!(!state.is_integer(1));
    }

    #[test]
    fn test_check_stack_limit() {
        let mut state = State::with_options(StateOptions {
            max_stack: 4,
            ..StateOptions::default()
        });
        assert!(state.check_stack(4));
        state.push_nil();
        assert!(!state.check_stack(4));
    }

    #[test]
    fn test_call_adjusts_results() {
        let mut state = State::new();
        state.push_function(native_function(|s| {
            let a = s.to_integer(1);
            let b = s.to_integer(2);
            s.push_integer(a + b);
            s.push_integer(a * b);
            Ok(2)
        }));
        state.push_integer(3);
        state.push_integer(4);
        state.call(2, 1).unwrap();
        assert_eq!(state.get_top(), 1);
        assert_eq!(state.to_integer(-1), 7);
    }

    #[test]
    fn test_call_error_pops_frame() {
        let mut state = State::new();
        state.push_boolean(true);
        state.push_function(native_function(|_| Err("boom".to_string())));
        state.push_integer(1);
        let err = state.call(1, 0).unwrap_err();
        assert_eq!(err, ApiError::Runtime("boom".into()));
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn test_call_non_function() {
        let mut state = State::new();
        state.push_integer(5);
        assert_eq!(
            state.call(0, 0),
            Err(ApiError::NotCallable(LuaType::Number))
        );
        assert_eq!(state.get_top(), 0);
    }
}
