//! FILENAME: core/pivot-tree/benches/tree_layout.rs
//! Layout and viewport benchmarks over synthetic row trees.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pivot_tree::{Axis, TreeNode, TreeService};

/// Three-level forest with `regions * 10 * 5` leaves.
fn build_roots(regions: usize) -> Vec<TreeNode> {
    (0..regions)
        .map(|r| {
            TreeNode::new(format!("Region {}", r)).with_children(
                (0..10)
                    .map(|p| {
                        TreeNode::new(format!("Product {}", p))
                            .with_children((0..5).map(|q| TreeNode::new(format!("Q{}", q))).collect())
                    })
                    .collect(),
            )
        })
        .collect()
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("TreeService");

    for regions in [10usize, 100, 400].iter() {
        let roots = build_roots(*regions);

        group.bench_with_input(BenchmarkId::new("build_grid", regions), regions, |b, _| {
            b.iter(|| {
                let service = TreeService::new(Axis::Rows, roots.clone());
                black_box(service.get_grid().len());
            });
        });

        let service = TreeService::new(Axis::Rows, roots.clone());
        let leaves = service.get_tree_child_length();
        let _ = service.get_grid();

        group.bench_with_input(BenchmarkId::new("align_viewport", regions), regions, |b, _| {
            b.iter(|| {
                let start = service.align_start_index(black_box(leaves / 3), true);
                let stop = service.align_stop_index(black_box(leaves / 3 + 40), true);
                black_box((start, stop));
            });
        });

        group.bench_with_input(BenchmarkId::new("partial_tree", regions), regions, |b, _| {
            b.iter(|| {
                black_box(service.get_partial_tree(leaves / 2, Some(leaves / 2 + 100), None));
            });
        });

        group.bench_with_input(BenchmarkId::new("metadata", regions), regions, |b, _| {
            b.iter(|| {
                black_box(service.get_metadata(leaves / 2, 2, None));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_layout);
criterion_main!(benches);
