//! Integration tests for the reference runtime
//!
//! Tests cover:
//! - Table traversal through the stack API
//! - Nested native calls and frame isolation
//! - Call depth limits
//! - Global namespaces

use lunabind_sdk::{native_function, ApiError, LuaApi, LuaType, MULTRET};
use lunabind_vm::{State, StateOptions, Table, Value};

// ============================================================================
// Tables
// ============================================================================

#[test]
fn test_table_traversal_via_api() {
    let mut state = State::new();
    state.create_table(0, 2);
    state.push_string("foo");
    state.push_integer(4);
    state.set_table(-3).unwrap();
    state.push_integer(2);
    state.set_field(-2, "bar").unwrap();

    let mut seen = Vec::new();
    state.push_nil();
    while state.next(1).unwrap() {
        let key = String::from_utf8(state.to_bytes(-2).unwrap().to_vec()).unwrap();
        seen.push((key, state.to_integer(-1)));
        state.set_top(-2);
    }

    assert_eq!(seen, vec![("foo".to_string(), 4), ("bar".to_string(), 2)]);
    assert_eq!(state.get_top(), 1);
}

#[test]
fn test_table_ops_on_non_table() {
    let mut state = State::new();
    state.push_integer(1);
    state.push_nil();
    assert_eq!(state.next(1), Err(ApiError::NotATable(LuaType::Number)));
    assert_eq!(
        state.get_field(5, "x"),
        Err(ApiError::NotATable(LuaType::None))
    );
}

#[test]
fn test_raw_len() {
    let mut state = State::new();
    let mut table = Table::new();
    for i in 1..=3 {
        table.push(Value::Integer(i));
    }
    state.push(Value::table(table));
    state.push_string("hello");
    assert_eq!(state.raw_len(1), 3);
    assert_eq!(state.raw_len(2), 5);
    assert_eq!(state.raw_len(3), 0);
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_nested_calls_see_own_frame() {
    let mut state = State::new();
    state.register(
        "inner",
        native_function(|s| {
            assert_eq!(s.get_top(), 1);
            let n = s.to_integer(1);
            s.push_integer(n * 2);
            Ok(1)
        }),
    );
    state.register(
        "outer",
        native_function(|s| {
            let n = s.to_integer(1);
            s.get_global("inner");
            s.push_integer(n + 1);
            s.call(1, 1).map_err(|e| e.to_string())?;
            assert_eq!(s.get_top(), 2);
            Ok(1)
        }),
    );

    let results = state.call_path("outer", vec![Value::Integer(4)]).unwrap();
    assert_eq!(results, vec![Value::Integer(10)]);
    assert_eq!(state.stack_depth(), 0);
    assert_eq!(state.call_depth(), 0);
}

#[test]
fn test_multret_keeps_all_results() {
    let mut state = State::new();
    state.push_function(native_function(|s| {
        s.push_integer(1);
        s.push_integer(2);
        s.push_integer(3);
        Ok(3)
    }));
    state.call(0, MULTRET).unwrap();
    assert_eq!(state.get_top(), 3);
}

#[test]
fn test_call_depth_limit() {
    let mut state = State::with_options(StateOptions {
        max_call_depth: 8,
        ..StateOptions::default()
    });
    state.register(
        "recurse",
        native_function(|s| {
            s.get_global("recurse");
            s.call(0, 0).map_err(|e| e.to_string())?;
            Ok(0)
        }),
    );

    let err = state.call_path("recurse", vec![]).unwrap_err();
    assert_eq!(err, ApiError::Runtime("C stack overflow".into()));
    assert_eq!(state.call_depth(), 0);
    assert_eq!(state.stack_depth(), 0);
}

#[test]
fn test_lookup_dotted_path() {
    let mut state = State::new();
    let mut inner = Table::new();
    inner.set_field("c", Value::Integer(7));
    let mut outer = Table::new();
    outer.set_field("b", Value::table(inner));
    state.set_global_value("a", Value::table(outer));

    assert_eq!(state.lookup("a.b.c"), Value::Integer(7));
    assert_eq!(state.lookup("a.x.c"), Value::Nil);
    assert_eq!(state.lookup("missing"), Value::Nil);
}

#[test]
fn test_default_options() {
    let options = StateOptions::default();
    assert_eq!(options.max_stack, 1_000_000);
    assert_eq!(options.max_call_depth, 200);
}
