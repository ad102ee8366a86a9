//! Integration tests for the function bridge
//!
//! Tests cover:
//! - Argument and return kinds for every scalar width
//! - Untyped (`Value`) arguments, pointers and byte strings
//! - Struct arguments under strict and lenient field policies
//! - Dotted namespaces and collisions
//! - Arity and return count checks
//! - Panics, host errors and script errors
//! - Calls from the host into runtime functions
//! - Concurrent registration

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lunabind_engine::{
    decode_value, encode_tokens, Bridge, Bytes, DecodeError, DecodeOptions, Describe, Error,
    FieldPolicy, FunctionRegistry, HostFunction, Pointer, Token, TypeDescriptor, Value, Variadic,
};
use lunabind_sdk::{native_function, ApiError, LuaApi};
use lunabind_vm::{State, Value as LuaValue};
use serde::{Deserialize, Serialize};

fn bridge() -> Bridge<State> {
    Bridge::new(State::new())
}

/// Call `path` the way a script would, flattening errors to their text
fn run(bridge: &mut Bridge<State>, path: &str, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, String> {
    bridge
        .state_mut()
        .call_path(path, args)
        .map_err(|err| err.to_string())
}

fn empty_table() -> LuaValue {
    LuaValue::new_table()
}

// ============================================================================
// Argument and return kinds
// ============================================================================

#[test]
fn test_scalar_arguments() {
    let mut b = bridge();
    b.register_function("bool", |v: bool| v).unwrap();
    b.register_function("i8", |v: i8| v).unwrap();
    b.register_function("i16", |v: i16| v).unwrap();
    b.register_function("i32", |v: i32| v).unwrap();
    b.register_function("i64", |v: i64| v).unwrap();
    b.register_function("isize", |v: isize| v).unwrap();
    b.register_function("u8", |v: u8| v).unwrap();
    b.register_function("u16", |v: u16| v).unwrap();
    b.register_function("u32", |v: u32| v).unwrap();
    b.register_function("u64", |v: u64| v).unwrap();
    b.register_function("usize", |v: usize| v).unwrap();
    b.register_function("f32", |v: f32| v).unwrap();
    b.register_function("f64", |v: f64| v).unwrap();
    b.register_function("string", |v: String| v).unwrap();

    assert_eq!(
        run(&mut b, "bool", vec![LuaValue::Boolean(true)]).unwrap(),
        vec![LuaValue::Boolean(true)]
    );
    for name in ["i8", "i16", "i32", "i64", "isize", "u8", "u16", "u32", "u64", "usize"] {
        assert_eq!(
            run(&mut b, name, vec![LuaValue::Integer(42)]).unwrap(),
            vec![LuaValue::Integer(42)],
            "{}",
            name
        );
    }
    assert_eq!(
        run(&mut b, "f32", vec![LuaValue::Number(0.5)]).unwrap(),
        vec![LuaValue::Number(0.5)]
    );
    assert_eq!(
        run(&mut b, "f64", vec![LuaValue::Number(4.2)]).unwrap(),
        vec![LuaValue::Number(4.2)]
    );
    assert_eq!(
        run(&mut b, "string", vec![LuaValue::string("foo")]).unwrap(),
        vec![LuaValue::string("foo")]
    );
}

#[test]
fn test_integer_from_float_truncates() {
    let mut b = bridge();
    b.register_function("int", |v: i32| v).unwrap();
    assert_eq!(
        run(&mut b, "int", vec![LuaValue::Number(42.9)]).unwrap(),
        vec![LuaValue::Integer(42)]
    );
}

#[test]
fn test_type_mismatch_messages() {
    let mut b = bridge();
    b.register_function("b", |_: bool| {}).unwrap();
    b.register_function("i", |_: isize| {}).unwrap();
    b.register_function("u", |_: usize| {}).unwrap();
    b.register_function("f", |_: f64| {}).unwrap();
    b.register_function("s", |_: String| {}).unwrap();
    b.register_function("slice", |_: Vec<i32>| {}).unwrap();
    b.register_function("map", |_: HashMap<i32, bool>| {}).unwrap();

    assert_eq!(
        run(&mut b, "b", vec![empty_table()]).unwrap_err(),
        "type mismatch, expecting bool"
    );
    assert_eq!(
        run(&mut b, "i", vec![empty_table()]).unwrap_err(),
        "type mismatch, expecting isize"
    );
    assert_eq!(
        run(&mut b, "u", vec![empty_table()]).unwrap_err(),
        "type mismatch, expecting usize"
    );
    assert_eq!(
        run(&mut b, "f", vec![empty_table()]).unwrap_err(),
        "type mismatch, expecting f64"
    );
    assert_eq!(
        run(&mut b, "s", vec![LuaValue::Integer(1)]).unwrap_err(),
        "type mismatch, expecting String"
    );
    assert_eq!(
        run(&mut b, "slice", vec![LuaValue::Integer(1)]).unwrap_err(),
        "type mismatch, expecting [i32]"
    );
    assert_eq!(
        run(&mut b, "map", vec![LuaValue::Integer(1)]).unwrap_err(),
        "type mismatch, expecting {i32: bool}"
    );
}

#[test]
fn test_multiple_returns() {
    let mut b = bridge();
    b.register_function("three", || (1i32, "two".to_string(), 3.5f64))
        .unwrap();
    assert_eq!(
        run(&mut b, "three", vec![]).unwrap(),
        vec![
            LuaValue::Integer(1),
            LuaValue::string("two"),
            LuaValue::Number(3.5)
        ]
    );
}

#[test]
fn test_container_arguments() {
    let mut b = bridge();
    b.register_function("sum", |v: Vec<i32>| v.iter().sum::<i32>())
        .unwrap();
    b.register_function("lookup", |m: HashMap<String, i64>| m["foo"] * 10 + m["bar"])
        .unwrap();

    let mut list = lunabind_vm::Table::new();
    for i in 1..=3 {
        list.push(LuaValue::Integer(i));
    }
    assert_eq!(
        run(&mut b, "sum", vec![LuaValue::table(list)]).unwrap(),
        vec![LuaValue::Integer(6)]
    );

    let mut map = lunabind_vm::Table::new();
    map.set_field("foo", LuaValue::Integer(4));
    map.set_field("bar", LuaValue::Integer(2));
    assert_eq!(
        run(&mut b, "lookup", vec![LuaValue::table(map)]).unwrap(),
        vec![LuaValue::Integer(42)]
    );
}

#[test]
fn test_container_returns() {
    let mut b = bridge();
    b.register_function("list", || vec![1i32, 2, 3]).unwrap();

    let result = run(&mut b, "list", vec![]).unwrap();
    let table = result[0].as_table().unwrap().borrow();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get_field("1"), LuaValue::Nil);
    assert_eq!(table.get(&LuaValue::Integer(1)), LuaValue::Integer(1));
    assert_eq!(table.get(&LuaValue::Integer(3)), LuaValue::Integer(3));
}

// ============================================================================
// Untyped values, pointers, bytes
// ============================================================================

#[test]
fn test_value_arguments() {
    let mut b = bridge();
    b.register_function("kind", |v: Value| {
        let kind = match v {
            Value::Bool(true) => "true",
            Value::Float(f) if f == 42.0 => "number",
            Value::String(_) => "string",
            Value::Map(_) => "table",
            Value::Nil => "nil",
            _ => "other",
        };
        kind.to_string()
    })
    .unwrap();

    // Numbers reach untyped parameters as floats, even integer-valued ones
    let cases = vec![
        (LuaValue::Boolean(true), "true"),
        (LuaValue::Integer(42), "number"),
        (LuaValue::string("foo"), "string"),
        (empty_table(), "table"),
        (LuaValue::Nil, "nil"),
    ];
    for (arg, expected) in cases {
        assert_eq!(
            run(&mut b, "kind", vec![arg]).unwrap(),
            vec![LuaValue::string(expected)]
        );
    }
}

#[test]
fn test_value_rejects_functions() {
    let mut b = bridge();
    b.register_function("any", |_: Value| {}).unwrap();
    let f = LuaValue::Function(native_function(|_| Ok(0)));
    assert_eq!(
        run(&mut b, "any", vec![f]).unwrap_err(),
        "function type not supported"
    );
}

#[test]
fn test_pointer_round_trip() {
    let mut b = bridge();
    b.register_function("ptr", |p: Pointer| p).unwrap();
    b.register_function("opt", |p: Option<Pointer>| p.is_none())
        .unwrap();

    let target = 7u32;
    let address = Pointer::from_ref(&target).address();
    assert_eq!(
        run(&mut b, "ptr", vec![LuaValue::LightUserdata(address)]).unwrap(),
        vec![LuaValue::LightUserdata(address)]
    );
    assert_eq!(
        run(&mut b, "opt", vec![LuaValue::Nil]).unwrap(),
        vec![LuaValue::Boolean(true)]
    );
}

#[test]
fn test_bytes_from_strings() {
    let mut b = bridge();
    b.register_function("len", |v: Bytes| v.len()).unwrap();
    b.register_function("raw", |v: Vec<u8>| Bytes(v)).unwrap();

    assert_eq!(
        run(&mut b, "len", vec![LuaValue::bytes(&[0xff, 0x00, 0x41])]).unwrap(),
        vec![LuaValue::Integer(3)]
    );
    assert_eq!(
        run(&mut b, "raw", vec![LuaValue::string("foo")]).unwrap(),
        vec![LuaValue::string("foo")]
    );
}

#[test]
fn test_invalid_utf8_into_string() {
    let mut b = bridge();
    b.register_function("text", |_: String| {}).unwrap();
    b.register_function("any", |v: Value| v.as_bytes().map(<[u8]>::len))
        .unwrap();

    assert_eq!(
        run(&mut b, "text", vec![LuaValue::bytes(&[0xff])]).unwrap_err(),
        "invalid UTF-8 in string value"
    );
    assert_eq!(
        run(&mut b, "any", vec![LuaValue::bytes(&[0xff, 0xfe])]).unwrap(),
        vec![LuaValue::Integer(2)]
    );
}

#[test]
fn test_boxed_argument() {
    let mut b = bridge();
    b.register_function("boxed", |v: Box<i32>| *v + 1).unwrap();
    assert_eq!(
        run(&mut b, "boxed", vec![LuaValue::Integer(1)]).unwrap(),
        vec![LuaValue::Integer(2)]
    );
}

// ============================================================================
// Structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Describe, Serialize, Deserialize)]
struct Inner {
    depth: u8,
}

#[derive(Debug, Clone, PartialEq, Describe, Serialize, Deserialize)]
struct Baz {
    name: String,
    #[serde(rename = "Count")]
    count: i32,
    inner: Inner,
}

fn baz_table(extra: Option<&str>) -> LuaValue {
    let mut inner = lunabind_vm::Table::new();
    inner.set_field("depth", LuaValue::Integer(3));

    let mut table = lunabind_vm::Table::new();
    table.set_field("name", LuaValue::string("baz"));
    table.set_field("Count", LuaValue::Integer(2));
    table.set_field("inner", LuaValue::table(inner));
    if let Some(field) = extra {
        table.set_field(field, LuaValue::Boolean(true));
    }
    LuaValue::table(table)
}

#[test]
fn test_struct_argument() {
    let mut b = bridge();
    b.register_function("describe", |v: Baz| {
        format!("{}:{}:{}", v.name, v.count, v.inner.depth)
    })
    .unwrap();
    assert_eq!(
        run(&mut b, "describe", vec![baz_table(None)]).unwrap(),
        vec![LuaValue::string("baz:2:3")]
    );
}

#[test]
fn test_struct_unknown_field_strict() {
    let mut b = bridge();
    b.register_function("take", |_: Baz| {}).unwrap();
    assert_eq!(
        run(&mut b, "take", vec![baz_table(Some("Foo"))]).unwrap_err(),
        "no Foo in Baz"
    );
}

fn expected_baz() -> Baz {
    Baz {
        name: "baz".into(),
        count: 2,
        inner: Inner { depth: 3 },
    }
}

#[test]
fn test_struct_unknown_field_lenient() {
    let mut b = bridge();
    b.register_function("take", |v: Baz| {
        assert_eq!(v, expected_baz());
        v.count
    })
    .unwrap();
    b.register_function("echo", |v: Baz| v).unwrap();

    b.set_field_policy(FieldPolicy::Lenient);
    assert_eq!(
        run(&mut b, "take", vec![baz_table(Some("Foo"))]).unwrap(),
        vec![LuaValue::Integer(2)]
    );

    let top = b.state().get_top();
    let echoed = run(&mut b, "echo", vec![baz_table(Some("Foo"))]).unwrap();
    assert_eq!(b.state().get_top(), top);
    assert_eq!(echoed.len(), 1);
    assert_eq!(echoed[0].get("name"), LuaValue::string("baz"));
    assert_eq!(echoed[0].get("Count"), LuaValue::Integer(2));
    assert_eq!(echoed[0].get("inner").get("depth"), LuaValue::Integer(3));
    assert_eq!(echoed[0].get("Foo"), LuaValue::Nil);

    // Toggling back applies to functions bound earlier
    b.set_field_policy(FieldPolicy::Strict);
    assert!(run(&mut b, "take", vec![baz_table(Some("Foo"))]).is_err());
}

#[test]
fn test_lenient_decode_keeps_stack_balanced() {
    let mut state = State::new();
    state.push_integer(11);
    state.push(baz_table(Some("Foo")));
    let v: Baz = decode_value(&mut state, 2, DecodeOptions::lenient()).unwrap();
    assert_eq!(v, expected_baz());
    assert_eq!(state.get_top(), 2);
    assert_eq!(state.to_integer(1), 11);
}

#[test]
fn test_struct_return() {
    let mut b = bridge();
    b.register_function("make", || Baz {
        name: "made".into(),
        count: 9,
        inner: Inner { depth: 1 },
    })
    .unwrap();
    b.register_function("echo", |v: Baz| v).unwrap();

    let made = run(&mut b, "make", vec![]).unwrap();
    let table = made[0].as_table().unwrap().borrow();
    assert_eq!(table.get_field("name"), LuaValue::string("made"));
    assert_eq!(table.get_field("Count"), LuaValue::Integer(9));
    drop(table);

    let echoed = run(&mut b, "echo", made).unwrap();
    assert_eq!(echoed[0].get("inner").get("depth"), LuaValue::Integer(1));
}

#[test]
fn test_struct_descriptor() {
    let ty = match Baz::describe() {
        TypeDescriptor::Struct(ty) => ty,
        other => panic!("unexpected descriptor {}", other),
    };
    assert_eq!(ty.name(), "Baz");
    let layout = lunabind_engine::cache::layout(&ty);
    assert_eq!(layout.field_names(), &["name", "Count", "inner"]);
    assert_eq!(layout.field("inner"), Some(&Inner::describe()));
}

// ============================================================================
// Namespaces
// ============================================================================

#[test]
fn test_namespaces() {
    let mut b = bridge();
    b.register_function("Foo.bar", |i: i32| i == 42).unwrap();
    b.register_function("bar.bar.bar", |i: i32| i == 42).unwrap();
    b.register_function("bar.foo.baz.quux", |i: i32| i == 42)
        .unwrap();

    for path in ["Foo.bar", "bar.bar.bar", "bar.foo.baz.quux"] {
        assert_eq!(
            run(&mut b, path, vec![LuaValue::Integer(42)]).unwrap(),
            vec![LuaValue::Boolean(true)],
            "{}",
            path
        );
    }
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_namespace_chain_created_once() {
    let mut b = bridge();
    b.register_function("a.b.first", || 1i32).unwrap();
    let table = b.state().lookup("a.b");
    b.register_function("a.b.second", || 2i32).unwrap();

    assert_eq!(b.state().lookup("a.b"), table);
    assert_eq!(
        run(&mut b, "a.b.first", vec![]).unwrap(),
        vec![LuaValue::Integer(1)]
    );
    assert_eq!(
        run(&mut b, "a.b.second", vec![]).unwrap(),
        vec![LuaValue::Integer(2)]
    );
}

#[test]
fn test_invalid_global_namespace() {
    let mut b = bridge();
    b.state_mut().set_global_value("Foo", LuaValue::Integer(1));
    let err = b.register_function("Foo.bar", || {}).unwrap_err();
    assert_eq!(err.to_string(), "global Foo is not a table");
    assert!(b.registry().is_empty());
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_invalid_namespace() {
    let mut b = bridge();
    let mut bar = lunabind_vm::Table::new();
    bar.set_field("Bar", LuaValue::Integer(1));
    b.state_mut().set_global_value("Bar", LuaValue::table(bar));

    let err = b.register_function("Bar.Bar.bar", || {}).unwrap_err();
    assert_eq!(err.to_string(), "namespace Bar is not a table");
    assert!(b.registry().is_empty());
}

#[test]
fn test_invalid_names() {
    let mut b = bridge();
    for name in ["", "a..b", "a."] {
        assert!(matches!(
            b.register_function(name, || {}),
            Err(Error::InvalidName(_))
        ));
    }
}

// ============================================================================
// Arity and returns
// ============================================================================

#[test]
fn test_variadic_rejected() {
    let mut b = bridge();
    let err = b
        .register_function("foo", |_: Variadic<i32>| {})
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("cannot register variadic function"));
}

#[test]
fn test_arguments_not_match() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut b = bridge();
    b.register_function("foo", move |_: i32, _: i32| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    let err = b.call_function::<()>("foo", (1,)).unwrap_err();
    assert!(err.to_string().starts_with("arguments not match"), "{}", err);
    assert!(matches!(err, Error::Script(_)));

    let err = run(&mut b, "foo", vec![LuaValue::Integer(1), LuaValue::Integer(2), LuaValue::Nil]).unwrap_err();
    assert_eq!(err, "arguments not match: foo expects 2, got 3");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    b.call_function::<()>("foo", (1, 2)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_returns_not_match() {
    let mut b = bridge();
    let f = HostFunction::from_parts(vec![], vec![TypeDescriptor::Int32], |_| Ok(()));
    b.register_host_function("liar", f).unwrap();
    assert_eq!(
        run(&mut b, "liar", vec![]).unwrap_err(),
        "return values not match: liar declares 1, pushed 0"
    );
}

#[test]
fn test_host_error() {
    let mut b = bridge();
    b.register_function("checked", |v: i32| -> Result<i32, String> {
        if v < 0 {
            Err(format!("negative: {}", v))
        } else {
            Ok(v)
        }
    })
    .unwrap();

    assert_eq!(
        run(&mut b, "checked", vec![LuaValue::Integer(5)]).unwrap(),
        vec![LuaValue::Integer(5)]
    );
    assert_eq!(
        run(&mut b, "checked", vec![LuaValue::Integer(-1)]).unwrap_err(),
        "negative: -1"
    );
}

#[test]
#[should_panic(expected = "foo")]
fn test_panic_propagates() {
    let mut b = bridge();
    b.register_function("panic", || -> () { panic!("foo") })
        .unwrap();
    let _ = b.call_function::<()>("panic", ());
}

#[test]
fn test_batch_registration() {
    let mut b = bridge();
    let handles = b
        .register_functions(vec![
            ("one".to_string(), HostFunction::wrap(|| 1i32)),
            ("math.two".to_string(), HostFunction::wrap(|| 2i32)),
        ])
        .unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(b.call_function::<i32>("math.two", ()).unwrap(), 2);
}

// ============================================================================
// Calls into the runtime
// ============================================================================

#[test]
fn test_call_script_function() {
    let mut b = bridge();
    b.state_mut().register(
        "foo",
        native_function(|state| {
            if state.to_integer(1) != 42 {
                return Err("not 42".into());
            }
            if !state.to_boolean(2) {
                return Err("not true".into());
            }
            if state.to_boolean(3) {
                return Err("not false".into());
            }
            Ok(0)
        }),
    );
    b.call_function::<()>("foo", (42, true, false)).unwrap();

    let err = b.call_function::<()>("foo", (41, true, false)).unwrap_err();
    assert_eq!(err, Error::Script("not 42".into()));
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_call_typed_results() {
    let mut b = bridge();
    b.register_function("util.swap", |a: String, n: i64| (n, a))
        .unwrap();
    let (n, s): (i64, String) = b
        .call_function("util.swap", ("x".to_string(), 7i64))
        .unwrap();
    assert_eq!((n, s.as_str()), (7, "x"));
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_call_missing_function() {
    let mut b = bridge();
    let err = b.call_function::<()>("nope", ()).unwrap_err();
    assert_eq!(err, Error::Script(ApiError::NotCallable(lunabind_engine::LuaType::Nil).to_string()));
}

#[test]
fn test_wrong_return_type() {
    let mut b = bridge();
    b.state_mut().register(
        "foo",
        native_function(|state| {
            state.push_function(native_function(|_| Ok(0)));
            Ok(1)
        }),
    );
    let err = b.call_function::<Value>("foo", ()).unwrap_err();
    assert_eq!(err.to_string(), "function type not supported");
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_nested_host_calls() {
    let mut b = bridge();
    b.register_function("inner", |x: i32| x * 2).unwrap();
    b.state_mut().register(
        "outer",
        native_function(|state| {
            state.get_global("inner");
            state.push_integer(21);
            state.call(1, 1).map_err(|e| e.to_string())?;
            Ok(1)
        }),
    );
    assert_eq!(b.call_function::<i32>("outer", ()).unwrap(), 42);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_registration() {
    let registry = Arc::new(FunctionRegistry::new());
    let threads: Vec<_> = (0..100)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                registry
                    .register(&format!("worker.f{}", i), HostFunction::wrap(move || i as i64))
                    .unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    assert_eq!(registry.len(), 100);

    let mut unique = handles.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 100);

    let mut b = Bridge::with_registry(State::new(), registry);
    b.bind_all().unwrap();
    for i in 0..100i64 {
        let got: i64 = b.call_function(&format!("worker.f{}", i), ()).unwrap();
        assert_eq!(got, i);
    }
}

// ============================================================================
// Deep values
// ============================================================================

const DEPTH: usize = 10_000;

/// A table nested `DEPTH` levels deep, built on `state` and popped again
fn deep_table(state: &mut State) -> LuaValue {
    let mut tokens = vec![Token::Array; DEPTH];
    tokens.push(Token::Bool(true));
    tokens.extend(std::iter::repeat(Token::ArrayEnd).take(DEPTH));
    encode_tokens(&mut *state, tokens).unwrap();
    let table = state.value(-1);
    state.set_top(-2);
    table
}

fn levels(mut value: &Value) -> usize {
    let mut depth = 0;
    while let Some([(_, inner)]) = value.as_map() {
        depth += 1;
        value = inner;
    }
    depth
}

#[test]
fn test_deep_value_argument() {
    let mut b = bridge();
    b.register_function("depth", |v: Value| levels(&v) as i64).unwrap();

    let table = deep_table(b.state_mut());
    assert_eq!(
        run(&mut b, "depth", vec![table]).unwrap(),
        vec![LuaValue::Integer(DEPTH as i64)]
    );
}

#[test]
fn test_deep_value_round_trip_through_call() {
    let mut b = bridge();
    b.register_function("echo", |v: Value| v).unwrap();

    let mut deep = Value::Bool(true);
    for _ in 0..DEPTH {
        deep = Value::Array(vec![deep]);
    }
    let echoed: Value = b.call_function("echo", (deep,)).unwrap();
    assert_eq!(levels(&echoed), DEPTH);
    assert_eq!(b.state().get_top(), 0);
}

#[test]
fn test_deep_typed_argument_is_an_error() {
    let mut b = bridge();
    b.register_function("typed", |_: Vec<Value>| {}).unwrap();

    let table = deep_table(b.state_mut());
    assert_eq!(
        run(&mut b, "typed", vec![table]).unwrap_err(),
        Error::Decode(DecodeError::RecursionLimit).to_string()
    );
}
