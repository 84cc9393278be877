use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use discussion::comment::{
    CommentEdge,
    tree::{CommentNode, build_tree},
    trim::{TrimLimits, trim_tree},
};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("comment_tree");
    for p in [(10, 2), (100, 5), (1000, 20)].iter() {
        let edges = generate_edges(p.0, p.1);
        group.bench_function(BenchmarkId::new("rescan", p.0), |b| {
            b.iter(|| rescan_tree(edges.clone(), None))
        });
        group.bench_function(BenchmarkId::new("indexed", p.0), |b| {
            b.iter(|| build_tree(&edges))
        });
        group.bench_function(BenchmarkId::new("indexed_and_trimmed", p.0), |b| {
            b.iter(|| trim_tree(build_tree(&edges), &TrimLimits::default(), None))
        });
    }
    group.finish();
}

/// Every comment replies to one of the previous `fan_out` comments, or starts
/// a new thread. Deterministic so runs stay comparable.
fn generate_edges(n: usize, fan_out: usize) -> Vec<CommentEdge> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut edges = Vec::with_capacity(n);
    for i in 0..n {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;

        let back = (seed as usize) % (fan_out + 1);
        let parent = (back > 0 && back <= i).then(|| format!("c{}", i - back));
        edges.push(CommentEdge {
            cid: format!("c{i}"),
            parent_cid: parent,
        });
    }
    edges
}

/// Scans the remaining list for the children of `parent`, then recurses.
fn rescan_tree(mut remaining: Vec<CommentEdge>, parent: Option<&str>) -> Vec<CommentNode> {
    let mut level = vec![];
    let mut i = 0;
    while i < remaining.len() {
        if remaining[i].parent_cid.as_deref() == parent {
            level.push(remaining.remove(i));
        } else {
            i += 1;
        }
    }

    level
        .into_iter()
        .map(|edge| {
            let children = rescan_tree(remaining.clone(), Some(&edge.cid));
            CommentNode {
                cid: edge.cid,
                parent_cid: edge.parent_cid,
                children,
            }
        })
        .collect()
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
