//! Benchmarks for graph construction and validation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rustc_hash::FxHashMap;

use phaseflow::dag::Dag;

/// n0 -> n1 -> ... -> n{count-1}
fn linear_edges(count: usize) -> Vec<(String, String)> {
    (0..count.saturating_sub(1))
        .map(|i| (format!("n{i}"), format!("n{}", i + 1)))
        .collect()
}

/// hub -> s{i} -> sink for every spoke.
fn fan_edges(spokes: usize) -> Vec<(String, String)> {
    let mut edges = Vec::with_capacity(spokes * 2);
    for i in 0..spokes {
        edges.push(("hub".to_string(), format!("s{i}")));
        edges.push((format!("s{i}"), "sink".to_string()));
    }
    edges
}

fn build(edges: &[(String, String)]) -> usize {
    let mut dag = Dag::new();
    dag.add_node_links(edges, &[], &FxHashMap::default())
        .expect("links");
    dag.init(|_| true).expect("valid");
    dag.len()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("dag_build");
    for &count in &[16usize, 128, 512] {
        let edges = linear_edges(count);
        group.bench_with_input(BenchmarkId::new("linear", count), &edges, |b, edges| {
            b.iter(|| build(edges))
        });
        let edges = fan_edges(count);
        group.bench_with_input(BenchmarkId::new("fan", count), &edges, |b, edges| {
            b.iter(|| build(edges))
        });
    }
    group.finish();
}

fn bench_session_copy(c: &mut Criterion) {
    let edges = linear_edges(256);
    let mut template = Dag::new();
    template
        .add_node_links(&edges, &[], &FxHashMap::default())
        .expect("links");
    template.init(|_| true).expect("valid");
    c.bench_function("dag_copy_256", |b| {
        b.iter(|| Dag::copy_from(&template).expect("copy").len())
    });
}

criterion_group!(benches, bench_build, bench_session_copy);
criterion_main!(benches);
