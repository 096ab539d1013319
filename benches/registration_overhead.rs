//! Benchmarks for bootstrap and dispatch overhead.
//!
//! `bootstrap_prepare` measures discovery, manifest parsing, validation and
//! registration for trees of increasing size. `dispatch` measures the latency
//! the assembled middleware stack adds to a single request.

use axum::{Router, body::Body, extract::Request, middleware::Next, routing::get};
use axum_autoroutes::{AxumApp, Bootstrap, Checkpoint, HandlerRegistry, Middleware, RawOptions};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::{hint::black_box, path::Path};
use tower::ServiceExt;

/// Writes `count` manifests spread over a few nested directories.
fn write_tree(root: &Path, count: usize) {
    for i in 0..count {
        let dir = root.join("routes").join(format!("group{}", i % 4));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("route{i}.toml")),
            format!("method = \"GET\"\npath = \"/items/{i}\"\nhandler = \"ok\"\n"),
        )
        .unwrap();
    }
}

fn handlers() -> HandlerRegistry {
    HandlerRegistry::new().handler("ok", |_req: Request| async { "OK" })
}

fn options(root: &Path) -> RawOptions {
    RawOptions::new()
        .with_routes_directory(root.join("routes"))
        .with_public_directory(root.join("public"))
        .with_autostart(false)
}

/// Creates a minimal request for benchmarking
fn test_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn bench_prepare(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("bootstrap_prepare");

    for count in [10, 100, 500] {
        let root = tempfile::tempdir().unwrap();
        write_tree(root.path(), count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                let prepared = Bootstrap::new(AxumApp::new())
                    .options(options(root.path()))
                    .handlers(handlers())
                    .prepare()
                    .await
                    .unwrap();
                black_box(prepared)
            })
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let root = tempfile::tempdir().unwrap();
    write_tree(root.path(), 10);

    // Bare axum router, as a baseline
    let bare = Router::new().route("/items/3", get(|| async { "OK" }));

    let bootstrapped = rt.block_on(async {
        Bootstrap::new(AxumApp::new())
            .options(options(root.path()))
            .handlers(handlers())
            .prepare()
            .await
            .unwrap()
            .into_app()
            .into_router()
    });

    let with_checkpoints = rt.block_on(async {
        let mut raw = options(root.path());
        for checkpoint in Checkpoint::ALL {
            raw = raw.with_checkpoint(
                checkpoint,
                Middleware::new(|req: Request, next: Next| next.run(req)),
            );
        }
        Bootstrap::new(AxumApp::new())
            .options(raw)
            .handlers(handlers())
            .prepare()
            .await
            .unwrap()
            .into_app()
            .into_router()
    });

    let mut group = c.benchmark_group("dispatch");
    for (name, router) in [
        ("bare_axum", bare),
        ("bootstrapped", bootstrapped),
        ("all_checkpoints", with_checkpoints),
    ] {
        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| async {
                let response = router
                    .clone()
                    .oneshot(test_request("/items/3"))
                    .await
                    .unwrap();
                black_box(response)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prepare, bench_dispatch);
criterion_main!(benches);
