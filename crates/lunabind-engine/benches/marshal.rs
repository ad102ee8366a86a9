use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lunabind_engine::{decode_value, encode_value, Bridge, DecodeOptions, Describe};
use lunabind_sdk::LuaApi;
use lunabind_vm::{State, Value};
use serde::{Deserialize, Serialize};

#[derive(Clone, Describe, Serialize, Deserialize)]
struct Record {
    id: u64,
    name: String,
    score: f64,
    tags: Vec<String>,
}

fn record(id: u64) -> Record {
    Record {
        id,
        name: format!("record-{}", id),
        score: id as f64 * 0.5,
        tags: vec!["alpha".into(), "beta".into()],
    }
}

fn bench_scalars(c: &mut Criterion) {
    let mut state = State::new();

    c.bench_function("encode_i64", |b| {
        b.iter(|| {
            encode_value(&mut state, black_box(&42i64)).unwrap();
            state.set_top(0);
        });
    });

    state.push_integer(42);
    c.bench_function("decode_i64", |b| {
        b.iter(|| decode_value::<i64>(&mut state, 1, DecodeOptions::default()).unwrap());
    });
}

fn bench_sequences(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequences");

    for len in [16usize, 256, 4096] {
        let values: Vec<i32> = (0..len as i32).collect();
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("encode", len), &values, |b, values| {
            let mut state = State::new();
            b.iter(|| {
                encode_value(&mut state, black_box(values)).unwrap();
                state.set_top(0);
            });
        });

        group.bench_with_input(BenchmarkId::new("decode", len), &values, |b, values| {
            let mut state = State::new();
            encode_value(&mut state, values).unwrap();
            b.iter(|| decode_value::<Vec<i32>>(&mut state, 1, DecodeOptions::default()).unwrap());
        });
    }

    group.finish();
}

fn bench_structs(c: &mut Criterion) {
    let mut group = c.benchmark_group("structs");

    let records: Vec<Record> = (0..64).map(record).collect();
    group.bench_function("encode_64", |b| {
        let mut state = State::new();
        b.iter(|| {
            encode_value(&mut state, black_box(&records)).unwrap();
            state.set_top(0);
        });
    });

    group.bench_function("decode_64", |b| {
        let mut state = State::new();
        encode_value(&mut state, &records).unwrap();
        b.iter(|| decode_value::<Vec<Record>>(&mut state, 1, DecodeOptions::default()).unwrap());
    });

    let mut map = HashMap::new();
    for i in 0..64u64 {
        map.insert(format!("key-{}", i), i);
    }
    group.bench_function("map_round_trip_64", |b| {
        let mut state = State::new();
        b.iter(|| {
            encode_value(&mut state, black_box(&map)).unwrap();
            let back: HashMap<String, u64> =
                decode_value(&mut state, 1, DecodeOptions::default()).unwrap();
            state.set_top(0);
            back
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let mut bridge = Bridge::new(State::new());
    bridge.register_function("math.add", |a: i64, b: i64| a + b).unwrap();
    bridge
        .register_function("records.score", |r: Record| r.score + r.tags.len() as f64)
        .unwrap();

    group.bench_function("script_to_host", |b| {
        b.iter(|| {
            bridge
                .state_mut()
                .call_path("math.add", vec![Value::Integer(1), Value::Integer(2)])
                .unwrap()
        });
    });

    group.bench_function("host_to_script", |b| {
        b.iter(|| bridge.call_function::<i64>("math.add", (1i64, 2i64)).unwrap());
    });

    let r = record(7);
    group.bench_function("struct_argument", |b| {
        b.iter(|| bridge.call_function::<f64>("records.score", (black_box(r.clone()),)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_scalars, bench_sequences, bench_structs, bench_dispatch);

criterion_main!(benches);
