//! FILENAME: core/pivot-tree/src/layout.rs
//! Tree Layout - flattening of a node forest into grid placements.
//!
//! Coordinates here are tree coordinates: `child` enumerates leaf positions,
//! `deep` enumerates levels. `TreeService` maps them to display rows and
//! columns according to its axis.
//!
//! Algorithm:
//! 1. DFS over the forest; each node gets a placement covering its leaf range
//!    along `child` and one level along `deep` (or all remaining levels for
//!    early-terminating leaves).
//! 2. Every covered cell of the dense `[child][deep]` index points to the
//!    placement covering it.
//! 3. Snapping tables record, per index, the outermost start/stop of any
//!    region crossing it.

use smallvec::SmallVec;

use crate::node::TreeNode;

/// Child-index path from the forest roots to a node.
pub(crate) type NodePath = SmallVec<[u32; 8]>;

/// The region a single node occupies.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub path: NodePath,
    pub parent: Option<usize>,
    pub child_start: usize,
    pub child_span: usize,
    pub deep_start: usize,
    pub deep_span: usize,
    pub sibling_index: usize,
    pub sibling_count: usize,
}

impl Placement {
    pub fn child_end(&self) -> usize {
        self.child_start + self.child_span
    }

    pub fn deep_end(&self) -> usize {
        self.deep_start + self.deep_span
    }
}

/// Per-index outermost region boundaries along one dimension.
#[derive(Debug, Clone, Default)]
pub(crate) struct SnapTable {
    pub start: Vec<usize>,
    /// Inclusive.
    pub stop: Vec<usize>,
}

impl SnapTable {
    fn new(len: usize) -> Self {
        SnapTable {
            start: (0..len).collect(),
            stop: (0..len).collect(),
        }
    }

    fn widen(&mut self, start: usize, end: usize) {
        for i in start..end {
            self.start[i] = self.start[i].min(start);
            self.stop[i] = self.stop[i].max(end - 1);
        }
    }

    /// Follows start links to a fixed point.
    pub fn snap_start(&self, index: usize) -> usize {
        if self.start.is_empty() {
            return index;
        }
        let mut i = index.min(self.start.len() - 1);
        loop {
            let next = self.start[i];
            if next == i {
                return i;
            }
            i = next;
        }
    }

    /// Follows stop links to a fixed point.
    pub fn snap_stop(&self, index: usize) -> usize {
        if self.stop.is_empty() {
            return index;
        }
        let mut i = index.min(self.stop.len() - 1);
        loop {
            let next = self.stop[i];
            if next == i {
                return i;
            }
            i = next;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub placements: Vec<Placement>,
    /// Placement index per cell, `child * deeps_length + deep`.
    cells: Vec<u32>,
    pub child_length: usize,
    pub deeps_length: usize,
    pub child_snap: SnapTable,
    pub deep_snap: SnapTable,
}

impl Layout {
    pub fn build(roots: &[TreeNode], deeps_length: usize) -> Self {
        let child_length: usize = roots.iter().map(TreeNode::leaf_count).sum();
        let mut layout = Layout {
            placements: Vec::new(),
            cells: vec![0; child_length * deeps_length],
            child_length,
            deeps_length,
            child_snap: SnapTable::new(child_length),
            deep_snap: SnapTable::new(deeps_length),
        };

        let mut cursor = 0;
        let mut path = NodePath::new();
        for (i, root) in roots.iter().enumerate() {
            path.push(i as u32);
            cursor = layout.place(root, &mut path, None, 0, cursor, i, roots.len());
            path.pop();
        }

        for (idx, p) in layout.placements.iter().enumerate() {
            for child in p.child_start..p.child_end() {
                for deep in p.deep_start..p.deep_end() {
                    layout.cells[child * deeps_length + deep] = idx as u32;
                }
            }
        }
        for p in &layout.placements {
            layout.child_snap.widen(p.child_start, p.child_end());
            layout.deep_snap.widen(p.deep_start, p.deep_end());
        }

        layout
    }

    #[allow(clippy::too_many_arguments)]
    fn place(
        &mut self,
        node: &TreeNode,
        path: &mut NodePath,
        parent: Option<usize>,
        depth: usize,
        cursor: usize,
        sibling_index: usize,
        sibling_count: usize,
    ) -> usize {
        let deep_span = if node.children.is_empty() {
            self.deeps_length.saturating_sub(depth).max(1)
        } else {
            1
        };
        let idx = self.placements.len();
        self.placements.push(Placement {
            path: path.clone(),
            parent,
            child_start: cursor,
            child_span: node.leaf_count(),
            deep_start: depth,
            deep_span,
            sibling_index,
            sibling_count,
        });

        let mut next = cursor;
        for (i, child) in node.children.iter().enumerate() {
            path.push(i as u32);
            next = self.place(child, path, Some(idx), depth + 1, next, i, node.children.len());
            path.pop();
        }
        debug_assert!(node.children.is_empty() || next == cursor + node.leaf_count());
        cursor + node.leaf_count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Placement covering a tree cell. Callers check bounds.
    pub fn placement_index(&self, child: usize, deep: usize) -> usize {
        self.cells[child * self.deeps_length + deep] as usize
    }

    /// Placement on the deepest level at a leaf position.
    pub fn last_level_index(&self, child: usize) -> usize {
        self.placement_index(child, self.deeps_length - 1)
    }

    /// Index of the top-level ancestor of a placement.
    pub fn root_of(&self, mut idx: usize) -> usize {
        while let Some(parent) = self.placements[idx].parent {
            idx = parent;
        }
        idx
    }

    /// The next sibling of a placement, if any.
    pub fn next_sibling(&self, idx: usize) -> Option<usize> {
        let p = &self.placements[idx];
        if p.sibling_index + 1 >= p.sibling_count || p.child_end() >= self.child_length {
            return None;
        }
        let next = self.placement_index(p.child_end(), p.deep_start);
        (self.placements[next].parent == p.parent).then_some(next)
    }
}
