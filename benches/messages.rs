//! Benchmarks for JSON-RPC message decoding and encoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use wsrpc::rpc::{Message, RequestId};

const REQUEST: &str = r#"{"jsonrpc":"2.0","id":42,"method":"textDocument/didOpen","params":{"uri":"file:///workspace/src/lib.rs","languageId":"rust","version":1}}"#;
const RESPONSE: &str = r#"{"jsonrpc":"2.0","id":42,"result":["/workspace","/workspace/crates/core","/workspace/crates/cli"]}"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.bench_function("request", |b| {
        b.iter(|| Message::parse(black_box(REQUEST)))
    });
    group.bench_function("response", |b| {
        b.iter(|| Message::parse(black_box(RESPONSE)))
    });
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let message = Message::Request {
        id: RequestId::Number(42),
        method: "workspace/getRoots".into(),
        params: json!({"includeHidden": false, "depth": 3}),
    };
    c.bench_function("encode_request", |b| b.iter(|| black_box(&message).to_text()));
}

criterion_group!(benches, bench_parse, bench_encode);
criterion_main!(benches);
