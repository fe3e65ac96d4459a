//! FILENAME: core/pivot-tree/src/service.rs
//! Tree Service - grid-shaped read access over one header tree.
//!
//! A service owns exactly one node forest (rows, columns or corner). All
//! read methods take display coordinates and are pull-only: the renderer asks
//! for nodes, spans and metadata as it paints. The layout is computed lazily
//! on first read and cached until `extend()` mutates the forest.
//!
//! Orientation:
//! - Columns and corner trees lay out as `[deeps][children]`.
//! - Rows trees lay out transposed, `[children][deeps]`.

use std::ops::Range;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::layout::{Layout, Placement};
use crate::metadata::{Position, Positions, TreeNodeMetadata};
use crate::node::{CellValue, TreeNode, UserType};

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Which header area a tree describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    Rows,
    Columns,
    Corner,
}

impl Axis {
    /// True when leaf positions run down the screen.
    pub fn is_vertical(self) -> bool {
        matches!(self, Axis::Rows)
    }
}

/// One cell of the flattened grid.
#[derive(Debug, Clone, Copy)]
pub enum GridCell<'a> {
    /// Top-left cell of a node's region.
    Node(&'a TreeNode),
    /// Covered by the region whose origin is at the given display cell.
    Merged { origin_row: usize, origin_col: usize },
}

impl<'a> GridCell<'a> {
    pub fn node(&self) -> Option<&'a TreeNode> {
        match self {
            GridCell::Node(node) => Some(node),
            GridCell::Merged { .. } => None,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, GridCell::Merged { .. })
    }
}

/// Rectangular display grid.
pub type Grid<'a> = Vec<Vec<GridCell<'a>>>;

/// Spans of a merged region. `None` means a span of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSpans {
    pub col_span: Option<usize>,
    pub row_span: Option<usize>,
}

impl CellSpans {
    fn from_spans(row_span: usize, col_span: usize) -> Self {
        CellSpans {
            col_span: (col_span > 1).then_some(col_span),
            row_span: (row_span > 1).then_some(row_span),
        }
    }

    pub fn rows(&self) -> usize {
        self.row_span.unwrap_or(1)
    }

    pub fn cols(&self) -> usize {
        self.col_span.unwrap_or(1)
    }
}

/// Offsets between table coordinates and this tree's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellOffsets {
    /// Table rows above the tree (e.g. column header rows above a rows tree).
    pub offset_top: usize,
    /// Table columns left of the tree (e.g. the fixed row-header pane).
    pub columns_offset: usize,
}

// ============================================================================
// TREE SERVICE
// ============================================================================

#[derive(Debug, Clone)]
pub struct TreeService {
    axis: Axis,
    roots: Vec<TreeNode>,
    min_deeps: usize,
    deeps_length: usize,
    child_length: usize,
    has_grand_totals: bool,
    layout: OnceLock<Layout>,
}

impl TreeService {
    pub fn new(axis: Axis, roots: Vec<TreeNode>) -> Self {
        Self::with_min_deeps(axis, roots, 0)
    }

    /// Creates a service whose grid has at least `min_deeps` levels.
    /// Leaves above the last level stretch down to it.
    pub fn with_min_deeps(axis: Axis, roots: Vec<TreeNode>, min_deeps: usize) -> Self {
        let has_grand_totals = roots.iter().any(|r| r.user_type == UserType::GrandTotal);
        let mut service = TreeService {
            axis,
            roots,
            min_deeps,
            deeps_length: 0,
            child_length: 0,
            has_grand_totals,
            layout: OnceLock::new(),
        };
        service.remap();
        service
    }

    /// Re-derives levels and node caches after a structural change.
    fn remap(&mut self) {
        for root in &mut self.roots {
            root.map(0);
        }
        let deepest = self.roots.iter().map(TreeNode::depth).max().unwrap_or(0);
        self.deeps_length = if self.roots.is_empty() {
            0
        } else {
            deepest.max(self.min_deeps)
        };
        self.child_length = self.roots.iter().map(TreeNode::leaf_count).sum();
        for root in &mut self.roots {
            root.assign_last_levels(self.deeps_length);
        }
        self.layout = OnceLock::new();
    }

    fn layout(&self) -> &Layout {
        self.layout
            .get_or_init(|| Layout::build(&self.roots, self.deeps_length))
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    pub fn has_grand_totals(&self) -> bool {
        self.has_grand_totals
    }

    /// Number of leaf positions.
    pub fn get_tree_child_length(&self) -> usize {
        self.child_length
    }

    /// Number of levels.
    pub fn get_tree_deeps_length(&self) -> usize {
        self.deeps_length
    }

    pub fn is_empty(&self) -> bool {
        self.child_length == 0
    }

    /// Display size as (rows, cols).
    pub fn grid_size(&self) -> (usize, usize) {
        self.to_display(self.child_length, self.deeps_length)
    }

    // ------------------------------------------------------------------------
    // Coordinate mapping
    // ------------------------------------------------------------------------

    fn to_tree(&self, row: usize, col: usize) -> (usize, usize) {
        if self.axis.is_vertical() {
            (row, col)
        } else {
            (col, row)
        }
    }

    fn to_display(&self, child: usize, deep: usize) -> (usize, usize) {
        if self.axis.is_vertical() {
            (child, deep)
        } else {
            (deep, child)
        }
    }

    /// Placement covering a display cell.
    ///
    /// # Panics
    /// Panics when the cell lies outside the grid. Indices are always derived
    /// from a grid produced by this service, so a miss is a caller bug.
    fn placement_at(&self, row: usize, col: usize) -> (&Layout, usize) {
        let (child, deep) = self.to_tree(row, col);
        if child >= self.child_length || deep >= self.deeps_length {
            let (rows, cols) = self.grid_size();
            panic!(
                "cell ({}, {}) is outside the {:?} tree grid of {}x{}",
                row, col, self.axis, rows, cols
            );
        }
        let layout = self.layout();
        (layout, layout.placement_index(child, deep))
    }

    fn node_at(&self, placement: &Placement) -> &TreeNode {
        let mut iter = placement.path.iter();
        let first = iter.next().copied().unwrap_or_default() as usize;
        let mut node = &self.roots[first];
        for &i in iter {
            node = &node.children[i as usize];
        }
        node
    }

    fn is_origin(&self, placement: &Placement, row: usize, col: usize) -> bool {
        self.to_display(placement.child_start, placement.deep_start) == (row, col)
    }

    // ------------------------------------------------------------------------
    // Grid access
    // ------------------------------------------------------------------------

    /// Flattens the tree into the rectangular display grid.
    pub fn get_grid(&self) -> Grid<'_> {
        let (rows, cols) = self.grid_size();
        (0..rows)
            .map(|row| (0..cols).map(|col| self.grid_cell(row, col)).collect())
            .collect()
    }

    fn grid_cell(&self, row: usize, col: usize) -> GridCell<'_> {
        let (layout, idx) = self.placement_at(row, col);
        let placement = &layout.placements[idx];
        if self.is_origin(placement, row, col) {
            GridCell::Node(self.node_at(placement))
        } else {
            let (origin_row, origin_col) =
                self.to_display(placement.child_start, placement.deep_start);
            GridCell::Merged { origin_row, origin_col }
        }
    }

    /// The node covering a cell (whether or not the cell is its origin).
    ///
    /// # Panics
    /// Panics when the cell lies outside the grid.
    pub fn get_tree_node(&self, row: usize, col: usize) -> &TreeNode {
        let (layout, idx) = self.placement_at(row, col);
        self.node_at(&layout.placements[idx])
    }

    /// True when the cell is covered by a region whose origin is elsewhere.
    pub fn is_children(&self, row: usize, col: usize) -> bool {
        let (layout, idx) = self.placement_at(row, col);
        !self.is_origin(&layout.placements[idx], row, col)
    }

    /// True when the cell is the origin of a region larger than one cell.
    pub fn has_children(&self, row: usize, col: usize) -> bool {
        let (layout, idx) = self.placement_at(row, col);
        let placement = &layout.placements[idx];
        self.is_origin(placement, row, col) && placement.child_span * placement.deep_span > 1
    }

    /// Spans of the region originating at a cell. Empty for covered cells.
    pub fn get_main_cell_spans(&self, row: usize, col: usize) -> CellSpans {
        let (layout, idx) = self.placement_at(row, col);
        let placement = &layout.placements[idx];
        if !self.is_origin(placement, row, col) {
            return CellSpans::default();
        }
        let (row_span, col_span) = self.to_display(placement.child_span, placement.deep_span);
        CellSpans::from_spans(row_span, col_span)
    }

    /// Nodes from the top-level ancestor down to the node covering a cell.
    pub fn get_node_path(&self, row: usize, col: usize) -> Vec<&TreeNode> {
        let (layout, idx) = self.placement_at(row, col);
        let mut chain = vec![self.node_at(&layout.placements[idx])];
        let mut current = layout.placements[idx].parent;
        while let Some(parent) = current {
            chain.push(self.node_at(&layout.placements[parent]));
            current = layout.placements[parent].parent;
        }
        chain.reverse();
        chain
    }

    /// Deepest materialized node per leaf position, in display order.
    pub fn get_last_level_nodes(&self) -> Vec<&TreeNode> {
        if self.is_empty() {
            return Vec::new();
        }
        let layout = self.layout();
        (0..self.child_length)
            .map(|child| self.node_at(&layout.placements[layout.last_level_index(child)]))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Metadata of the node covering a cell.
    ///
    /// `range` is the caller's window over leaf positions; nodes touching its
    /// edges are classified as first/last siblings. `None` means the whole
    /// axis.
    pub fn get_metadata(&self, row: usize, col: usize, range: Option<Range<usize>>) -> TreeNodeMetadata {
        let (layout, idx) = self.placement_at(row, col);
        let window = range.unwrap_or(0..self.child_length);
        self.metadata_for(layout, idx, &window)
    }

    fn metadata_for(&self, layout: &Layout, idx: usize, window: &Range<usize>) -> TreeNodeMetadata {
        let placement = &layout.placements[idx];
        let node = self.node_at(placement);

        let mut levels = Positions::new();
        if placement.deep_start == 0 {
            levels.push(Position::First);
        }
        if placement.deep_end() >= self.deeps_length {
            levels.push(Position::Last);
        }

        let mut siblings = Positions::new();
        if placement.sibling_index == 0 || placement.child_start <= window.start {
            siblings.push(Position::First);
        }
        if placement.sibling_index + 1 == placement.sibling_count || placement.child_end() >= window.end {
            siblings.push(Position::Last);
        }

        let parent = placement
            .parent
            .map(|p| Box::new(self.metadata_for(layout, p, window)));
        let root = placement.parent.map(|_| {
            Box::new(self.metadata_for(layout, layout.root_of(idx), window))
        });

        let value_node = if node.measure_index().is_some() {
            Some(node.summary(placement.child_start))
        } else {
            let leaf = &layout.placements[layout.last_level_index(placement.child_start)];
            let leaf_node = self.node_at(leaf);
            leaf_node
                .measure_index()
                .map(|_| leaf_node.summary(leaf.child_start))
        };

        let next_node = layout.next_sibling(idx).map(|next| {
            let next = &layout.placements[next];
            self.node_at(next).summary(next.child_start)
        });

        TreeNodeMetadata {
            index: placement.child_start,
            level: node.level,
            min_level: node.min_level,
            user_type: node.user_type,
            levels,
            siblings,
            root,
            parent,
            value_node,
            next_node,
        }
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    /// Row-major data payload per leaf, aligned to the companion axis.
    ///
    /// With a companion tree every row has exactly its leaf count of values;
    /// without one, rows are padded to the widest payload.
    pub fn extract_data(&self, other_axis: Option<&TreeService>) -> Vec<Vec<CellValue>> {
        let leaves = self.get_last_level_nodes();
        let width = match other_axis {
            Some(other) => other.get_tree_child_length(),
            None => leaves.iter().map(|n| n.data.len()).max().unwrap_or(0),
        };
        leaves
            .iter()
            .map(|leaf| {
                let mut row: Vec<CellValue> = leaf.data.iter().take(width).cloned().collect();
                row.resize(width, CellValue::Empty);
                row
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Viewport alignment
    // ------------------------------------------------------------------------

    fn snap_table(&self, is_vertical: bool) -> &crate::layout::SnapTable {
        let layout = self.layout();
        if is_vertical == self.axis.is_vertical() {
            &layout.child_snap
        } else {
            &layout.deep_snap
        }
    }

    /// Snaps a viewport start outward so no region is split by it.
    pub fn align_start_index(&self, index: usize, is_vertical: bool) -> usize {
        self.snap_table(is_vertical).snap_start(index)
    }

    /// Snaps an inclusive viewport stop outward so no region is split by it.
    pub fn align_stop_index(&self, index: usize, is_vertical: bool) -> usize {
        self.snap_table(is_vertical).snap_stop(index)
    }

    // ------------------------------------------------------------------------
    // Partial extraction
    // ------------------------------------------------------------------------

    /// Forest restricted to leaf positions `[from, to)`. The source is not
    /// modified. `clone_fn` copies one node (its children are discarded and
    /// rebuilt from the window); defaults to `TreeNode::clone_shallow`.
    pub fn get_partial_tree(
        &self,
        from: usize,
        to: Option<usize>,
        clone_fn: Option<&dyn Fn(&TreeNode) -> TreeNode>,
    ) -> Vec<TreeNode> {
        let to = to.unwrap_or(self.child_length).min(self.child_length);
        let shallow = TreeNode::clone_shallow;
        let clone_fn: &dyn Fn(&TreeNode) -> TreeNode = match clone_fn {
            Some(f) => f,
            None => &shallow,
        };
        let mut cursor = 0;
        let mut result = Vec::new();
        for root in &self.roots {
            if let Some(node) = clip_node(root, cursor, from, to, clone_fn) {
                result.push(node);
            }
            cursor += root.leaf_count();
        }
        result
    }

    /// Grid slice over leaf positions `[from, to)`. Regions clipped at the
    /// window start get their first visible cell as origin; merged origins
    /// are rebased to the window.
    pub fn get_partial_grid(&self, from: usize, to: usize) -> Grid<'_> {
        let to = to.min(self.child_length);
        if from >= to {
            return Vec::new();
        }
        let layout = self.layout();
        let cell = |child: usize, deep: usize| {
            let placement = &layout.placements[layout.placement_index(child, deep)];
            let origin_child = placement.child_start.max(from);
            if (origin_child, placement.deep_start) == (child, deep) {
                GridCell::Node(self.node_at(placement))
            } else {
                let (origin_row, origin_col) =
                    self.to_display(origin_child - from, placement.deep_start);
                GridCell::Merged { origin_row, origin_col }
            }
        };

        if self.axis.is_vertical() {
            (from..to)
                .map(|child| (0..self.deeps_length).map(|deep| cell(child, deep)).collect())
                .collect()
        } else {
            (0..self.deeps_length)
                .map(|deep| (from..to).map(|child| cell(child, deep)).collect())
                .collect()
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Appends the grand-total subtree after the last root.
    ///
    /// # Panics
    /// Panics when the service already carries grand totals. Callers guard
    /// with `has_grand_totals()`.
    pub fn extend(&mut self, tree: TreeNode) {
        assert!(
            !self.has_grand_totals,
            "{:?} tree service already carries grand totals",
            self.axis
        );
        self.roots.push(tree);
        self.has_grand_totals = true;
        self.remap();
    }

    /// Swaps the trailing grand-total root for `tree`. Returns the first leaf
    /// position of the replaced root.
    ///
    /// # Panics
    /// Panics when the last root is not a grand total.
    pub fn replace_grand_total(&mut self, tree: TreeNode) -> usize {
        let last = self
            .roots
            .last_mut()
            .filter(|r| r.user_type == UserType::GrandTotal);
        let Some(last) = last else {
            panic!("{:?} tree service has no trailing grand total", self.axis);
        };
        let start = self.child_length - last.leaf_count();
        *last = tree;
        self.remap();
        start
    }

    // ------------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------------

    fn rebase(value: usize, offset: usize, what: &str) -> usize {
        match value.checked_sub(offset) {
            Some(v) => v,
            None => panic!("{} {} lies before the tree offset {}", what, value, offset),
        }
    }

    /// Pixel width of the merged cell at table coordinates `(row, col)`.
    ///
    /// Widths are looked up per table column; internal borders between the
    /// spanned columns are added back.
    pub fn get_main_cell_width(
        &self,
        row: usize,
        col: usize,
        column_width: impl Fn(usize) -> f64,
        border_width: f64,
        offsets: CellOffsets,
    ) -> f64 {
        let tree_row = Self::rebase(row, offsets.offset_top, "row");
        let tree_col = Self::rebase(col, offsets.columns_offset, "column");
        let (layout, idx) = self.placement_at(tree_row, tree_col);
        let placement = &layout.placements[idx];
        let (_, origin_col) = self.to_display(placement.child_start, placement.deep_start);
        let (_, col_span) = self.to_display(placement.child_span, placement.deep_span);
        let first = origin_col + offsets.columns_offset;
        let widths: f64 = (first..first + col_span).map(column_width).sum();
        widths + border_width * (col_span - 1) as f64
    }

    /// Pixel height of the merged cell at table coordinates `(row, col)`.
    pub fn get_main_cell_height(
        &self,
        row: usize,
        col: usize,
        row_height: impl Fn(usize) -> f64,
        border_width: f64,
        offsets: CellOffsets,
    ) -> f64 {
        let tree_row = Self::rebase(row, offsets.offset_top, "row");
        let tree_col = Self::rebase(col, offsets.columns_offset, "column");
        let (layout, idx) = self.placement_at(tree_row, tree_col);
        let placement = &layout.placements[idx];
        let (origin_row, _) = self.to_display(placement.child_start, placement.deep_start);
        let (row_span, _) = self.to_display(placement.child_span, placement.deep_span);
        let first = origin_row + offsets.offset_top;
        let heights: f64 = (first..first + row_span).map(row_height).sum();
        heights + border_width * (row_span - 1) as f64
    }

    /// Releases cached layout and node store handles.
    pub fn destroy(mut self) {
        for root in &mut self.roots {
            root.release();
        }
        self.layout = OnceLock::new();
    }
}

/// Copies the part of `node` that falls inside `[from, to)`.
fn clip_node(
    node: &TreeNode,
    start: usize,
    from: usize,
    to: usize,
    clone_fn: &dyn Fn(&TreeNode) -> TreeNode,
) -> Option<TreeNode> {
    let end = start + node.leaf_count();
    if end <= from || start >= to {
        return None;
    }
    let mut copy = clone_fn(node);
    copy.children = Vec::new();
    copy.invalidate();
    copy.index_divergence = node.index_divergence + from.saturating_sub(start);

    let mut cursor = start;
    for child in &node.children {
        if let Some(clipped) = clip_node(child, cursor, from, to, clone_fn) {
            copy.children.push(clipped);
        }
        cursor += child.leaf_count();
    }
    Some(copy)
}
