//! FILENAME: core/pivot-tree/src/node.rs
//! Tree Node - one position in a hierarchical header tree.
//!
//! Nodes are plain value objects. Children are owned by their parent, so a
//! forest of nodes is always a tree and never a DAG. Layout and traversal
//! logic lives on `TreeService`; the builders produce owned node forests.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Store key under which measure header nodes record their measure position.
pub const MEASURE_INDEX_KEY: &str = "measureIndex";

// ============================================================================
// USER TYPE
// ============================================================================

/// Classification of a node. Drives merge and metadata rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserType {
    /// A regular group-by value.
    #[default]
    Data,
    /// Aggregate inserted at a group boundary.
    SubTotal,
    /// Aggregate appended after the main data.
    GrandTotal,
    /// Header label inside the corner area.
    Corner,
}

impl UserType {
    /// True for subtotal and grand-total nodes.
    pub fn is_total(self) -> bool {
        matches!(self, UserType::SubTotal | UserType::GrandTotal)
    }
}

// ============================================================================
// CONTENT AND VALUES
// ============================================================================

/// Display content of a node. May differ from the raw `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeContent {
    /// Plain (possibly formatted) text.
    Text(String),
    /// A renderable component, identified by name, with its properties.
    Component {
        name: String,
        props: serde_json::Value,
    },
}

impl NodeContent {
    pub fn text(s: impl Into<String>) -> Self {
        NodeContent::Text(s.into())
    }

    /// Returns the text for `Text` content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeContent::Text(s) => Some(s),
            NodeContent::Component { .. } => None,
        }
    }
}

impl Default for NodeContent {
    fn default() -> Self {
        NodeContent::Text(String::new())
    }
}

/// A value in the data area of the pivot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Free-form per-node side channel.
pub type NodeStore = FxHashMap<String, serde_json::Value>;

// ============================================================================
// TREE NODE
// ============================================================================

/// Memoized traversal results. Valid only while `is_mapped` is set.
#[derive(Debug, Clone, Copy, Default)]
struct NodeCache {
    is_mapped: bool,
    child_count: usize,
    child_deep: usize,
}

/// A node in a hierarchical header tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Raw value (data value or header label key).
    pub value: String,

    /// Display content.
    pub content: NodeContent,

    /// Ordered children. Empty for leaves.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,

    /// Last level covered by this node.
    pub level: usize,

    /// First level covered by this node (its depth). Differs from `level`
    /// when a branch terminates early and the node spans the remaining levels.
    pub min_level: usize,

    /// Child count reported by the source result. May exceed the number of
    /// materialized children under partial loading; never shrinks.
    pub size: usize,

    /// Leading leaf positions of this node that lie outside the materialized
    /// window (set on nodes clipped by `TreeService::get_partial_tree`).
    pub index_divergence: usize,

    pub user_type: UserType,

    #[serde(default)]
    pub store: NodeStore,

    /// Data payload of a row leaf, indexed by column leaf position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<CellValue>,

    #[serde(skip)]
    cache: NodeCache,
}

impl TreeNode {
    /// Creates a data node whose content is its value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        TreeNode {
            content: NodeContent::Text(value.clone()),
            value,
            ..Default::default()
        }
    }

    /// Creates a subtotal or grand-total node with a display label.
    pub fn total(user_type: UserType, label: impl Into<String>) -> Self {
        TreeNode {
            content: NodeContent::Text(label.into()),
            user_type,
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: NodeContent) -> Self {
        self.content = content;
        self
    }

    pub fn with_user_type(mut self, user_type: UserType) -> Self {
        self.user_type = user_type;
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self.size = self.size.max(self.children.len());
        self.invalidate();
        self
    }

    pub fn with_data(mut self, data: Vec<CellValue>) -> Self {
        self.data = data;
        self
    }

    /// Appends a child. The reported size grows with it but never shrinks.
    pub fn push_child(&mut self, child: TreeNode) {
        self.children.push(child);
        self.size = self.size.max(self.children.len());
        self.invalidate();
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of leaf positions under this node (1 for a leaf).
    pub fn leaf_count(&self) -> usize {
        if self.cache.is_mapped {
            return self.cache.child_count;
        }
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(TreeNode::leaf_count).sum()
        }
    }

    /// Number of levels in the subtree rooted here, including this node.
    pub fn depth(&self) -> usize {
        if self.cache.is_mapped {
            return self.cache.child_deep;
        }
        1 + self.children.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Position of the measure this node stands for, if it is a measure header.
    pub fn measure_index(&self) -> Option<usize> {
        self.store
            .get(MEASURE_INDEX_KEY)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }

    /// Text of the content, falling back to the raw value.
    pub fn label(&self) -> &str {
        self.content.as_text().unwrap_or(&self.value)
    }

    /// Copy of this node without its children.
    pub fn clone_shallow(&self) -> TreeNode {
        TreeNode {
            value: self.value.clone(),
            content: self.content.clone(),
            children: Vec::new(),
            level: self.level,
            min_level: self.min_level,
            size: self.size,
            index_divergence: self.index_divergence,
            user_type: self.user_type,
            store: self.store.clone(),
            data: self.data.clone(),
            cache: NodeCache::default(),
        }
    }

    /// Lightweight description used by metadata cross-references.
    pub fn summary(&self, index: usize) -> NodeSummary {
        NodeSummary {
            value: self.value.clone(),
            user_type: self.user_type,
            level: self.level,
            min_level: self.min_level,
            index,
            measure_index: self.measure_index(),
        }
    }

    /// Drops memoized traversal results for this node.
    pub(crate) fn invalidate(&mut self) {
        self.cache = NodeCache::default();
    }

    /// Assigns depths and memoizes leaf count and subtree depth, bottom-up.
    pub(crate) fn map(&mut self, depth: usize) {
        self.min_level = depth;
        self.level = depth;
        let mut child_count = 0;
        let mut child_deep = 0;
        for child in &mut self.children {
            child.map(depth + 1);
            child_count += child.cache.child_count;
            child_deep = child_deep.max(child.cache.child_deep);
        }
        self.cache = NodeCache {
            is_mapped: true,
            child_count: child_count.max(1),
            child_deep: child_deep + 1,
        };
    }

    /// Stretches early-terminating leaves down to the last level.
    pub(crate) fn assign_last_levels(&mut self, deeps: usize) {
        if self.children.is_empty() {
            self.level = deeps.saturating_sub(1).max(self.min_level);
        } else {
            for child in &mut self.children {
                child.assign_last_levels(deeps);
            }
        }
    }

    /// Clears the store of this node and all descendants.
    pub(crate) fn release(&mut self) {
        self.store.clear();
        for child in &mut self.children {
            child.release();
        }
    }
}

/// Lightweight description of a node, detached from the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub value: String,
    pub user_type: UserType,
    pub level: usize,
    pub min_level: usize,
    /// First leaf position of the node.
    pub index: usize,
    pub measure_index: Option<usize>,
}
