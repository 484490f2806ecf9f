use bencher::{TestCase, TestRequest, ROUTE_TABLE};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use micro_dispatch::router::{on, Router};
use micro_dispatch::{handler_fn, Args, VersioningStrategy};
use std::hint::black_box;

fn build_router() -> Router {
    let mut builder = Router::builder().versioning(VersioningStrategy::header("x-api-version"));
    for (method, pattern, version) in ROUTE_TABLE {
        let method = Method::from_bytes(method.as_bytes()).expect("route table methods are valid");
        let mut item = on(method, handler_fn(|_args: Args| async { "ok" }));
        if let Some(version) = version {
            item = item.version(*version);
        }
        builder = builder.route(*pattern, item);
    }
    builder.build().expect("route table patterns are valid")
}

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::static_route("root", TestRequest::new("GET", "/")),
        TestCase::static_route("users_me", TestRequest::new("GET", "/users/me")),
        TestCase::dynamic_route("user_by_id", TestRequest::new("GET", "/users/42")),
        TestCase::dynamic_route("comment", TestRequest::new("GET", "/users/42/posts/7/comments/99")),
        TestCase::dynamic_route("pull", TestRequest::new("GET", "/orgs/foldright/repos/micro-http/pulls/12")),
        TestCase::versioned_route("item_v3", TestRequest::versioned("GET", "/items/5", "3")),
        TestCase::versioned_route("health_v9_fallback", TestRequest::versioned("GET", "/health", "9")),
    ]
}

fn benchmark_router_resolve(criterion: &mut Criterion) {
    let router = build_router();
    let mut group = criterion.benchmark_group("router_resolve");

    for case in create_test_cases() {
        let method = Method::from_bytes(case.request().method().as_bytes()).expect("test case methods are valid");
        group.bench_with_input(BenchmarkId::new(format!("{:?}", case.group()), case.name()), &case, |b, case| {
            b.iter(|| {
                let matched = router.resolve(&method, black_box(case.path()), case.request().version());
                black_box(matched.expect("test case paths are routable").params().len());
            });
        });
    }

    group.finish();
}

criterion_group!(router, benchmark_router_resolve);
criterion_main!(router);
