use std::hint::black_box;

use bencher::BenchInput;
use criterion::measurement::WallTime;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use loopbridge_protocol::cookie::{Cookie, format_cookie};
use loopbridge_protocol::query::decode_query;
use loopbridge_protocol::route::{ParamValidation, compile_route_path_with};

static SHORT_QUERY: BenchInput = BenchInput::small("short_query", "q=rust&page=2");
static ENCODED_QUERY: BenchInput = BenchInput::normal(
    "encoded_query",
    "search=hello+world%21&tags=a&tags=b&tags=c&redirect=%2Fusers%2F42%3Ftab%3Dposts&empty=&flag&utf8=%E4%BD%A0%E5%A5%BD",
);
static SIMPLE_ROUTE: BenchInput = BenchInput::small("simple_route", "/users/{id}");
static NESTED_ROUTE: BenchInput =
    BenchInput::normal("nested_route", "/orgs/{org}/teams/{team}/members/{member}/roles/{role}/permissions");

fn long_query() -> &'static str {
    let pairs = (0..500).map(|i| format!("key{i}=value%20{i}")).collect::<Vec<_>>();
    Box::leak(pairs.join("&").into_boxed_str())
}

/// Applies the sampling budget of `input`'s size class to the next benchmarks of `group`.
fn budget(group: &mut BenchmarkGroup<'_, WallTime>, input: &BenchInput) {
    group.sample_size(input.size().sample_size());
    group.measurement_time(input.size().measurement_time());
}

fn benchmark_query_decoder(criterion: &mut Criterion) {
    let inputs = [SHORT_QUERY, ENCODED_QUERY, BenchInput::large("long_query", long_query())];
    let mut group = criterion.benchmark_group("query_decoder");

    for input in inputs {
        budget(&mut group, &input);
        group.throughput(Throughput::Bytes(input.content().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(input.label()), &input, |b, input| {
            b.iter(|| black_box(decode_query(black_box(input.content()))));
        });
    }

    group.finish();
}

fn benchmark_route_compiler(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("route_compiler");

    for input in [SIMPLE_ROUTE, NESTED_ROUTE] {
        budget(&mut group, &input);
        for validation in [ParamValidation::Lenient, ParamValidation::Strict] {
            let id = BenchmarkId::new(input.label(), format!("{validation:?}"));
            group.bench_with_input(id, &input, |b, input| {
                b.iter(|| black_box(compile_route_path_with(black_box(input.content()), validation)));
            });
        }
    }

    group.finish();
}

fn benchmark_cookie_serializer(criterion: &mut Criterion) {
    let plain = Cookie::new("session", "3f2a9c");
    let full = Cookie::new("prefs", "theme=dark, lang=en")
        .max_age(86_400)
        .expires("Wed, 21 Oct 2026 07:28:00 GMT")
        .path("/app")
        .domain("example.com")
        .secure(true)
        .http_only(true)
        .same_site(Some("Strict"));

    let mut group = criterion.benchmark_group("cookie_serializer");
    group.bench_function("plain_cookie", |b| b.iter(|| black_box(format_cookie(black_box(&plain)))));
    group.bench_function("full_cookie", |b| b.iter(|| black_box(format_cookie(black_box(&full)))));
    group.finish();
}

criterion_group!(protocol, benchmark_query_decoder, benchmark_route_compiler, benchmark_cookie_serializer);
criterion_main!(protocol);
