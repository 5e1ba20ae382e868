//! Benchmarks for credibility-weighted traversal.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use aletheia::graph::index::CredibilityGraph;
use aletheia::graph::traverse::{self, TraversalBudget};
use aletheia::graph::{Edge, ExpandDirection, Node, NodeId, NodeProps};

const GRID: u64 = 30;

fn nid(x: u64, y: u64) -> NodeId {
    NodeId::new(y * GRID + x + 1).unwrap()
}

/// A GRID x GRID lattice with rightward and downward edges of weight 0.9.
fn lattice() -> CredibilityGraph {
    let graph = CredibilityGraph::new();
    for y in 0..GRID {
        for x in 0..GRID {
            graph.insert_node(Node::new(nid(x, y), NodeProps::default()).with_weight(0.7));
        }
    }
    for y in 0..GRID {
        for x in 0..GRID {
            if x + 1 < GRID {
                graph
                    .insert_edge(&Edge::new(nid(x, y), nid(x + 1, y), "supports").with_weight(0.9))
                    .unwrap();
            }
            if y + 1 < GRID {
                graph
                    .insert_edge(&Edge::new(nid(x, y), nid(x, y + 1), "supports").with_weight(0.9))
                    .unwrap();
            }
        }
    }
    graph
}

fn bench_find_path(c: &mut Criterion) {
    let graph = lattice();
    let budget = TraversalBudget::new(2 * GRID as usize, 10_000).unwrap();

    c.bench_function("find_path_lattice_corner_to_corner", |b| {
        b.iter(|| {
            black_box(
                traverse::find_path(
                    &graph,
                    nid(0, 0),
                    nid(GRID - 1, GRID - 1),
                    budget,
                    0.5,
                )
                .unwrap(),
            )
        })
    });
}

fn bench_subgraph(c: &mut Criterion) {
    let graph = lattice();
    let budget = TraversalBudget::new(6, 200).unwrap();

    c.bench_function("subgraph_depth6_cap200", |b| {
        b.iter(|| {
            black_box(
                traverse::subgraph(
                    &graph,
                    nid(GRID / 2, GRID / 2),
                    ExpandDirection::Both,
                    budget,
                    0.5,
                )
                .unwrap(),
            )
        })
    });
}

fn bench_high_veracity(c: &mut Criterion) {
    let graph = lattice();

    c.bench_function("high_veracity_neighbors", |b| {
        b.iter(|| {
            black_box(
                traverse::high_veracity_neighbors(&graph, nid(GRID / 2, GRID / 2), 10, 0.5)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_find_path, bench_subgraph, bench_high_veracity);
criterion_main!(benches);
