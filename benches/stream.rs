//! Performance benchmarks for a3s-llm
//!
//! Run with: cargo bench

use a3s_llm::adapters::truncate_chars;
use a3s_llm::{CallOptions, LlmRunner, MemoryCallbackHandler, TruncatingBatchLlm, TruncatingLlm};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::StreamExt;
use std::sync::Arc;

const PROMPT: &str = "The quick brown fox jumps over the lazy dog, again and again, until the prompt is long enough to matter.";

fn bench_truncate(c: &mut Criterion) {
    c.bench_function("truncate_chars", |b| {
        b.iter(|| truncate_chars(PROMPT, 32));
    });
}

fn bench_invoke(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let runner = LlmRunner::from_llm(TruncatingLlm::new(32));

    c.bench_function("LlmRunner invoke", |b| {
        b.to_async(&rt)
            .iter(|| async { runner.invoke(PROMPT, &CallOptions::default()).await.unwrap() });
    });
}

fn bench_stream_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("stream_throughput");
    for n in [8, 32, 100] {
        let runner = LlmRunner::from_llm(TruncatingLlm::new(n))
            .with_callback(Arc::new(MemoryCallbackHandler::new(1_000)));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.to_async(&rt).iter(|| async {
                runner
                    .stream(PROMPT, CallOptions::default())
                    .count()
                    .await
            });
        });
    }
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let runner = LlmRunner::new(TruncatingBatchLlm::new(16));

    let mut group = c.benchmark_group("generate_batch");
    for size in [1, 10, 100] {
        let prompts: Vec<String> = (0..size).map(|i| format!("{} #{}", PROMPT, i)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &prompts, |b, prompts| {
            b.to_async(&rt).iter(|| async {
                runner
                    .generate(prompts, &CallOptions::default())
                    .await
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_truncate,
    bench_invoke,
    bench_stream_throughput,
    bench_generate
);
criterion_main!(benches);
