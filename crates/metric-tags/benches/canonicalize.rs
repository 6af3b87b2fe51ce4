//! Benchmarks for canonicalization, search evaluation and line decoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metric_tags::{canonicalize, decode_line, NoitField, TagLimit, TagSearch, TagSet};

/// Already canonical, no tags
const PLAIN: &str = "simple string with spaces";

/// Out of order, duplicated and split across blocks
const UNSORTED: &str = "woop|ST[a:b,c:d]|MT{foo:bar}|ST[c:d,e:f,a:b]";

/// Base64 halves that canonicalize to raw text
const ENCODED: &str = "/transmissions`latency|ST[b\"bjo6Og==\":b\"YT1i\",customer:noone,node:j.mta2vrest.cc.aws-usw2a.prd.acme,cluster:mta2]";

const LINE: &str = "M\t127.0.0.1\t1526493506.214\tunknown`fault`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo|ST[color:orange]\ti\t100";

fn benchmark_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Canonicalize");
    for (name, input) in [("plain", PLAIN), ("unsorted", UNSORTED), ("encoded", ENCODED)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| black_box(canonicalize(black_box(input)).unwrap()))
        });
    }
    group.finish();
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tag Search");
    let tags = TagSet::parse(
        "foo:bar,b\"c29tZTpzdHVmZltoZXJlXQ==\":/value,empty:,env:prod,team:red",
        TagLimit::Standard,
    )
    .unwrap();

    for query in [
        "and(foo:bar)",
        "and(env:prod,or(service:web,team:/^(red|blue)$/),not(special))",
        "and(*:b*r,not(quux:*))",
    ] {
        let search = TagSearch::parse(query).unwrap();
        group.bench_with_input(BenchmarkId::new("evaluate", query), &search, |b, search| {
            b.iter(|| black_box(search.matches(black_box(&tags))))
        });
    }

    group.bench_function("parse", |b| {
        b.iter(|| {
            black_box(
                TagSearch::parse(black_box(
                    "and(env:prod,or(service:web,team:/^(red|blue)$/),not(special))",
                ))
                .unwrap(),
            )
        })
    });
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    c.bench_function("decode_line", |b| {
        b.iter(|| black_box(decode_line(black_box(LINE.as_bytes()), NoitField::Auto).unwrap()))
    });
}

criterion_group!(benches, benchmark_canonicalize, benchmark_search, benchmark_decode);
criterion_main!(benches);
