//! FILENAME: tests/test_layout_properties.rs
//! Structural properties of tree grids over builder-produced trees.

use pivot_tree::{
    Axis, BuildOptions, CellValue, FlatRecord, GridCell, PivotBuilder, TreeNode, TreeService,
    UserType,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Region / product / quarter rows with uneven branching, subtotals and a
/// grand total.
fn sales_rows() -> TreeService {
    let records = vec![
        FlatRecord::data(&["East", "Apples", "Q1"], &[], vec![CellValue::Number(10.0)]),
        FlatRecord::data(&["East", "Apples", "Q2"], &[], vec![CellValue::Number(12.0)]),
        FlatRecord::data(&["East", "Pears", "Q1"], &[], vec![CellValue::Number(4.0)]),
        FlatRecord::subtotal(&["East"], &[], vec![CellValue::Number(26.0)]),
        FlatRecord::data(&["West", "Apples", "Q1"], &[], vec![CellValue::Number(7.0)]),
        FlatRecord::data(&["West", "Apples", "Q3"], &[], vec![CellValue::Number(3.0)]),
        FlatRecord::data(&["West", "Apples", "Q4"], &[], vec![CellValue::Number(5.0)]),
        FlatRecord::subtotal(&["West"], &[], vec![CellValue::Number(15.0)]),
        FlatRecord::grand_total(&[], vec![CellValue::Number(41.0)]),
    ];
    let mut builder = PivotBuilder::new(BuildOptions {
        measures: vec!["Sales".to_string()],
        ..Default::default()
    });
    builder.extend(records).unwrap();
    builder.build().unwrap().rows
}

fn year_columns() -> TreeService {
    TreeService::new(
        Axis::Columns,
        vec![
            TreeNode::new("2023").with_children(vec![TreeNode::new("H1"), TreeNode::new("H2")]),
            TreeNode::new("2024"),
        ],
    )
}

/// Resolves every grid cell to the display origin of the region covering it.
fn origins(service: &TreeService) -> Vec<Vec<(usize, usize)>> {
    service
        .get_grid()
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, cell)| match cell {
                    GridCell::Node(_) => (r, c),
                    GridCell::Merged { origin_row, origin_col } => (*origin_row, *origin_col),
                })
                .collect()
        })
        .collect()
}

// ============================================================================
// GRID SHAPE
// ============================================================================

#[test]
fn test_grid_is_rectangular() {
    for service in [sales_rows(), year_columns()] {
        let (rows, cols) = service.grid_size();
        let grid = service.get_grid();
        assert_eq!(grid.len(), rows);
        assert!(grid.iter().all(|row| row.len() == cols));
    }
}

#[test]
fn test_rows_grid_is_transposed() {
    let rows = sales_rows();
    assert_eq!(
        rows.grid_size(),
        (rows.get_tree_child_length(), rows.get_tree_deeps_length())
    );
    let columns = year_columns();
    assert_eq!(
        columns.grid_size(),
        (columns.get_tree_deeps_length(), columns.get_tree_child_length())
    );
}

#[test]
fn test_merged_cells_point_inside_origin_region() {
    for service in [sales_rows(), year_columns()] {
        let origins = origins(&service);
        for (r, row) in origins.iter().enumerate() {
            for (c, &(or, oc)) in row.iter().enumerate() {
                assert!(or <= r && oc <= c, "origin ({}, {}) after cell ({}, {})", or, oc, r, c);
                let spans = service.get_main_cell_spans(or, oc);
                assert!(r < or + spans.rows() && c < oc + spans.cols());
                assert_eq!(service.is_children(r, c), (or, oc) != (r, c));
            }
        }
    }
}

#[test]
fn test_every_cell_covered_once() {
    let service = sales_rows();
    let (rows, cols) = service.grid_size();
    let mut covered = vec![vec![0u32; cols]; rows];
    for (r, row) in service.get_grid().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.node().is_some() {
                let spans = service.get_main_cell_spans(r, c);
                for rr in r..r + spans.rows() {
                    for cc in c..c + spans.cols() {
                        covered[rr][cc] += 1;
                    }
                }
            }
        }
    }
    assert!(covered.iter().flatten().all(|&n| n == 1));
}

#[test]
fn test_totals_span_remaining_levels() {
    let rows = sales_rows();
    let deeps = rows.get_tree_deeps_length();
    assert_eq!(deeps, 3);

    // East: Apples(Q1, Q2), Pears(Q1), subtotal
    let subtotal = rows.get_tree_node(3, 1);
    assert_eq!(subtotal.user_type, UserType::SubTotal);
    assert_eq!(rows.get_main_cell_spans(3, 1).col_span, Some(2));

    let last = rows.get_tree_child_length() - 1;
    assert_eq!(rows.get_tree_node(last, 0).user_type, UserType::GrandTotal);
    assert_eq!(rows.get_main_cell_spans(last, 0).col_span, Some(deeps));
}

// ============================================================================
// CONSECUTIVE GROUPING
// ============================================================================

#[test]
fn test_duplicate_paths_merge_into_one_region() {
    let records = [["A", "1"], ["A", "1"], ["A", "2"], ["B", "1"], ["B", "1"]]
        .iter()
        .map(|path| FlatRecord::data(path, &[], vec![CellValue::Number(1.0)]));
    let mut builder = PivotBuilder::new(BuildOptions::default());
    builder.extend(records).unwrap();
    let rows = builder.build().unwrap().rows;

    assert_eq!(rows.roots().len(), 2);
    assert_eq!(rows.roots()[0].size, 2);
    assert_eq!(rows.roots()[1].size, 1);
    assert_eq!(rows.get_main_cell_spans(0, 0).row_span, Some(2));
    assert_eq!(rows.get_main_cell_spans(2, 0).row_span, None);
}

// ============================================================================
// VIEWPORT ALIGNMENT
// ============================================================================

#[test]
fn test_alignment_is_idempotent_and_widening() {
    let rows = sales_rows();
    let len = rows.get_tree_child_length();
    for i in 0..len {
        let start = rows.align_start_index(i, true);
        let stop = rows.align_stop_index(i, true);
        assert!(start <= i && i <= stop);
        assert_eq!(rows.align_start_index(start, true), start);
        assert_eq!(rows.align_stop_index(stop, true), stop);
    }
}

#[test]
fn test_aligned_window_splits_no_region() {
    let rows = sales_rows();
    let start = rows.align_start_index(2, true);
    let stop = rows.align_stop_index(5, true);
    let window = rows.get_partial_grid(start, stop + 1);
    // The window opens on real origins, never on a covered cell.
    assert!(window[0].iter().all(|cell| cell.node().is_some()));
}

#[test]
fn test_partial_tree_preserves_leaf_count() {
    let rows = sales_rows();
    let partial = rows.get_partial_tree(2, Some(6), None);
    let leaves: usize = partial.iter().map(TreeNode::leaf_count).sum();
    assert_eq!(leaves, 4);
    // The source is untouched.
    assert_eq!(rows.get_tree_child_length(), 9);
}

// ============================================================================
// EXTENSION
// ============================================================================

#[test]
fn test_extend_grows_child_length_monotonically() {
    let mut columns = year_columns();
    let before = columns.get_tree_child_length();
    assert!(!columns.has_grand_totals());
    columns.extend(TreeNode::total(UserType::GrandTotal, "Grand Total"));
    assert!(columns.has_grand_totals());
    assert_eq!(columns.get_tree_child_length(), before + 1);
    // The grand total fills both header levels.
    assert_eq!(columns.get_main_cell_spans(0, before).row_span, Some(2));
}

#[test]
fn test_extracted_data_aligns_with_columns() {
    let rows = sales_rows();
    let data = rows.extract_data(None);
    assert_eq!(data.len(), rows.get_tree_child_length());
    assert_eq!(data[3], vec![CellValue::Number(26.0)]);
    assert_eq!(data.last(), Some(&vec![CellValue::Number(41.0)]));
}
