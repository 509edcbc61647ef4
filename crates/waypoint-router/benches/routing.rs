//! Routing benchmarks.
//!
//! Run with: `cargo bench -p waypoint-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use waypoint_router::{
    CompiledRoutes, GenerateParams, MatchRequest, ReferenceType, Route, RouteTable, UriGenerator,
};

fn build_table(num_routes: usize) -> CompiledRoutes {
    let mut table = RouteTable::new();

    // Static routes
    for i in 0..num_routes / 3 {
        table
            .add(Route::get(format!("/api/v1/resource{i}"), format!("getResource{i}")))
            .unwrap();
    }

    // Param routes
    for i in 0..num_routes / 3 {
        table
            .add(Route::get(
                format!("/api/v1/resource{i}/{{id:int}}"),
                format!("getResourceById{i}"),
            ))
            .unwrap();
    }

    // Nested routes
    for i in 0..num_routes / 3 {
        table
            .add(Route::get(
                format!("/api/v1/org/{{orgId}}/resource{i}/{{id}}"),
                format!("getOrgResource{i}"),
            ))
            .unwrap();
    }

    table.build().unwrap()
}

fn get(path: &str) -> MatchRequest {
    MatchRequest::new("GET", path)
}

fn bench_static_match(c: &mut Criterion) {
    let table = build_table(100);
    let request = get("/api/v1/resource20");

    c.bench_function("static_match", |b| {
        b.iter(|| black_box(table.match_request(&request)));
    });
}

fn bench_param_match(c: &mut Criterion) {
    let table = build_table(100);
    let request = get("/api/v1/resource25/12345");

    c.bench_function("param_match", |b| {
        b.iter(|| black_box(table.match_request(&request)));
    });
}

fn bench_nested_param_match(c: &mut Criterion) {
    let table = build_table(100);
    let request = get("/api/v1/org/acme-corp/resource10/12345");

    c.bench_function("nested_param_match", |b| {
        b.iter(|| black_box(table.match_request(&request)));
    });
}

fn bench_miss(c: &mut Criterion) {
    let table = build_table(100);
    let request = get("/api/v1/nonexistent/path/deeper");

    c.bench_function("miss", |b| {
        b.iter(|| black_box(table.match_request(&request)));
    });
}

fn bench_generate(c: &mut Criterion) {
    let table = build_table(100);
    let route = table.get(40).unwrap();
    let generator = UriGenerator::new();
    let params = GenerateParams::new().arg("id", "12345");

    c.bench_function("generate", |b| {
        b.iter(|| black_box(generator.generate(route, &params, ReferenceType::AbsolutePath)));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for num_routes in [10, 50, 100, 500, 1000] {
        let table = build_table(num_routes);

        group.bench_with_input(
            BenchmarkId::new("build", num_routes),
            &num_routes,
            |b, &n| b.iter(|| black_box(build_table(n))),
        );

        group.bench_with_input(
            BenchmarkId::new("param_match", num_routes),
            &num_routes,
            |b, &n| {
                let request = get(&format!("/api/v1/resource{}/12345", n / 6));
                b.iter(|| black_box(table.match_request(&request)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_static_match,
    bench_param_match,
    bench_nested_param_match,
    bench_miss,
    bench_generate,
    bench_scaling
);
criterion_main!(benches);
