//! FILENAME: core/pivot-tree/src/builder.rs
//! Tree Builders - grow header trees from flat query results.
//!
//! Every record carries a path of group-by values from outermost to
//! innermost. Rows sharing a path prefix share ancestor nodes. Input order is
//! display order, so nothing here sorts.
//!
//! Algorithm (`PivotBuilder::build`):
//! 1. Build the column tree (first-seen grouping) and append measure levels
//! 2. Assign every (column path, measure) pair its column leaf position
//! 3. Build the row tree (consecutive grouping), placing each record's values
//!    at the column leaf positions
//! 4. Build the corner tree from the row field titles

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::metadata::{CellMetadata, CellsMetadata};
use crate::node::{CellValue, TreeNode, UserType, MEASURE_INDEX_KEY};
use crate::service::{Axis, TreeService};

// ============================================================================
// SINGLE-AXIS BUILDER
// ============================================================================

/// How repeated values under the same parent are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingMode {
    /// A new node starts whenever the value differs from the parent's last
    /// child. Keeps every row at its encountered position.
    Consecutive,
    /// A value joins the first node created for it under the same parent.
    FirstSeen,
}

#[derive(Debug, Default)]
struct BuildNode {
    node: TreeNode,
    children: Vec<BuildNode>,
    /// Value to child position. Only populated in first-seen mode.
    by_value: FxHashMap<String, usize>,
    size_reported: bool,
}

impl BuildNode {
    fn new(node: TreeNode) -> Self {
        BuildNode {
            node,
            ..Default::default()
        }
    }

    fn find_child(&self, value: &str, mode: GroupingMode) -> Option<usize> {
        match mode {
            GroupingMode::Consecutive => self
                .children
                .last()
                .filter(|c| c.node.user_type == UserType::Data && c.node.value == value)
                .map(|_| self.children.len() - 1),
            GroupingMode::FirstSeen => self.by_value.get(value).copied(),
        }
    }

    fn push_child(&mut self, node: TreeNode, mode: GroupingMode) -> usize {
        let idx = self.children.len();
        if mode == GroupingMode::FirstSeen && node.user_type == UserType::Data {
            self.by_value.insert(node.value.clone(), idx);
        }
        self.children.push(BuildNode::new(node));
        self.node.size = self.node.size.max(self.children.len());
        idx
    }

    fn child_slot(&mut self, value: &str, level: usize, mode: GroupingMode) -> usize {
        if let Some(idx) = self.find_child(value, mode) {
            return idx;
        }
        let mut node = TreeNode::new(value);
        node.level = level;
        node.min_level = level;
        self.push_child(node, mode)
    }

    fn finish(self) -> TreeNode {
        let mut node = self.node;
        node.children = self.children.into_iter().map(BuildNode::finish).collect();
        node.size = node.size.max(node.children.len());
        node
    }
}

fn path_value<S: AsRef<str>>(segment: &Option<S>) -> &str {
    segment.as_ref().map_or("", |s| s.as_ref())
}

fn describe_path<S: AsRef<str>>(path: &[Option<S>]) -> String {
    path.iter().map(path_value).collect::<Vec<_>>().join(" / ")
}

/// Builds one header forest from value paths.
#[derive(Debug)]
pub struct TreeBuilder {
    mode: GroupingMode,
    root: BuildNode,
}

impl TreeBuilder {
    pub fn new(mode: GroupingMode) -> Self {
        TreeBuilder {
            mode,
            root: BuildNode::default(),
        }
    }

    /// Adds a path and returns the node at its end. `None` values become
    /// empty-string nodes so positions stay aligned.
    pub fn push_path<S: AsRef<str>>(&mut self, path: &[Option<S>]) -> Result<&mut TreeNode, BuildError> {
        if path.is_empty() {
            return Err(BuildError::EmptyPath);
        }
        let mode = self.mode;
        let mut current = &mut self.root;
        for (level, segment) in path.iter().enumerate() {
            let idx = current.child_slot(path_value(segment), level, mode);
            current = &mut current.children[idx];
        }
        Ok(&mut current.node)
    }

    /// Adds a subtotal or grand-total node under the node at `prefix`
    /// (creating the prefix if needed). An empty prefix adds a top-level node.
    /// Consecutive totals of the same kind share one node.
    pub fn push_total<S: AsRef<str>>(
        &mut self,
        prefix: &[Option<S>],
        user_type: UserType,
        label: &str,
    ) -> &mut TreeNode {
        let mode = self.mode;
        let mut current = &mut self.root;
        for (level, segment) in prefix.iter().enumerate() {
            let idx = current.child_slot(path_value(segment), level, mode);
            current = &mut current.children[idx];
        }
        if current.children.last().map(|c| c.node.user_type) == Some(user_type) {
            let idx = current.children.len() - 1;
            return &mut current.children[idx].node;
        }
        let mut node = TreeNode::total(user_type, label);
        node.level = prefix.len();
        node.min_level = prefix.len();
        let idx = current.push_child(node, mode);
        &mut current.children[idx].node
    }

    /// Records the child count reported by the source for an existing node.
    /// Only the first report counts; the size never drops below the number
    /// of materialized children.
    pub fn report_size<S: AsRef<str>>(&mut self, path: &[Option<S>], size: usize) -> Result<(), BuildError> {
        if path.is_empty() {
            return Err(BuildError::EmptyPath);
        }
        let mode = self.mode;
        let mut current = &mut self.root;
        for segment in path {
            let idx = current
                .find_child(path_value(segment), mode)
                .ok_or_else(|| BuildError::UnknownPath(describe_path(path)))?;
            current = &mut current.children[idx];
        }
        if !current.size_reported {
            current.size_reported = true;
            current.node.size = current.node.size.max(size).max(current.children.len());
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn build(self) -> Vec<TreeNode> {
        self.root.finish().children
    }
}

// ============================================================================
// PIVOT BUILDER
// ============================================================================

/// One flat result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
    /// Row group-by values. For subtotals, the prefix being summarized.
    pub row_path: Vec<Option<String>>,
    /// Column group-by values. Empty addresses the column grand total.
    #[serde(default)]
    pub column_path: Vec<Option<String>>,
    /// One value per measure.
    pub values: Vec<CellValue>,
    #[serde(default)]
    pub kind: UserType,
}

impl FlatRecord {
    pub fn data(row_path: &[&str], column_path: &[&str], values: Vec<CellValue>) -> Self {
        FlatRecord {
            row_path: row_path.iter().map(|s| Some(s.to_string())).collect(),
            column_path: column_path.iter().map(|s| Some(s.to_string())).collect(),
            values,
            kind: UserType::Data,
        }
    }

    pub fn subtotal(prefix: &[&str], column_path: &[&str], values: Vec<CellValue>) -> Self {
        FlatRecord {
            kind: UserType::SubTotal,
            ..FlatRecord::data(prefix, column_path, values)
        }
    }

    pub fn grand_total(column_path: &[&str], values: Vec<CellValue>) -> Self {
        FlatRecord {
            kind: UserType::GrandTotal,
            ..FlatRecord::data(&[], column_path, values)
        }
    }
}

/// Options controlling pivot tree construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Titles of the value fields, in query order.
    pub measures: Vec<String>,
    /// Titles of the row fields, shown in the corner.
    pub row_titles: Vec<String>,
    pub subtotal_label: String,
    pub grand_total_label: String,
    /// Keep the grand-total row out of the rows tree so it can be delivered
    /// separately.
    pub separate_grand_total: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            measures: Vec::new(),
            row_titles: Vec::new(),
            subtotal_label: "Total".to_string(),
            grand_total_label: "Grand Total".to_string(),
            separate_grand_total: false,
        }
    }
}

/// The trees of one pivot result.
#[derive(Debug, Clone)]
pub struct PivotTrees {
    pub rows: TreeService,
    pub columns: TreeService,
    pub corner: TreeService,
    pub cells_metadata: CellsMetadata,
    /// Grand-total row held back by `separate_grand_total`.
    pub grand_total_row: Option<TreeNode>,
}

/// Key of a column leaf: group-by values and measure position.
type ColumnKey = (Vec<String>, usize);

#[derive(Debug, Default)]
pub struct PivotBuilder {
    options: BuildOptions,
    records: Vec<FlatRecord>,
}

impl PivotBuilder {
    pub fn new(options: BuildOptions) -> Self {
        PivotBuilder {
            options,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: FlatRecord) -> Result<(), BuildError> {
        let expected = self.options.measures.len();
        if expected > 0 && record.values.len() != expected {
            return Err(BuildError::ValueCount {
                expected,
                found: record.values.len(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = FlatRecord>) -> Result<(), BuildError> {
        records.into_iter().try_for_each(|r| self.push(r))
    }

    fn measure_count(&self) -> usize {
        self.options
            .measures
            .len()
            .max(self.records.iter().map(|r| r.values.len()).max().unwrap_or(0))
            .max(1)
    }

    fn measure_node(&self, index: usize) -> TreeNode {
        let title = self
            .options
            .measures
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Value {}", index + 1));
        let mut node = TreeNode::new(title);
        node.store
            .insert(MEASURE_INDEX_KEY.to_string(), serde_json::json!(index));
        node
    }

    /// Column forest plus the leaf position of every column key.
    fn build_columns(&self) -> Result<(Vec<TreeNode>, FxHashMap<ColumnKey, usize>), BuildError> {
        let measures = self.measure_count();
        let mut builder = TreeBuilder::new(GroupingMode::FirstSeen);
        let mut has_grand_column = false;
        for record in &self.records {
            if record.column_path.is_empty() {
                has_grand_column = true;
            } else {
                builder.push_path(&record.column_path)?;
            }
        }

        let has_dimensions = !builder.is_empty();
        let mut roots = builder.build();
        if has_dimensions && has_grand_column {
            roots.push(TreeNode::total(UserType::GrandTotal, self.options.grand_total_label.as_str()));
        }

        if !has_dimensions {
            // Measures are the only column level, even for a single measure.
            roots = (0..measures).map(|m| self.measure_node(m)).collect();
        } else if measures > 1 {
            for root in &mut roots {
                self.append_measures(root, measures);
            }
        }

        let mut index = FxHashMap::default();
        let mut path = Vec::new();
        let mut cursor = 0;
        for root in &roots {
            collect_column_keys(root, &mut path, &mut cursor, &mut index);
        }
        Ok((roots, index))
    }

    fn append_measures(&self, node: &mut TreeNode, measures: usize) {
        if node.children.is_empty() {
            for m in 0..measures {
                node.push_child(self.measure_node(m));
            }
        } else {
            for child in &mut node.children {
                self.append_measures(child, measures);
            }
        }
    }

    pub fn build(self) -> Result<PivotTrees, BuildError> {
        let (column_roots, column_index) = self.build_columns()?;
        let columns = TreeService::new(Axis::Columns, column_roots);
        let width = columns.get_tree_child_length();

        let mut rows = TreeBuilder::new(GroupingMode::Consecutive);
        let mut grand_total_row: Option<TreeNode> = None;

        for record in &self.records {
            let key_path: Vec<String> = record.column_path.iter().map(|s| path_value(s).to_string()).collect();
            let node = match record.kind {
                UserType::SubTotal => {
                    let label = record
                        .row_path
                        .last()
                        .map(|s| format!("{} {}", path_value(s), self.options.subtotal_label))
                        .unwrap_or_else(|| self.options.subtotal_label.clone());
                    rows.push_total(&record.row_path, UserType::SubTotal, &label)
                }
                UserType::GrandTotal if self.options.separate_grand_total => grand_total_row
                    .get_or_insert_with(|| {
                        TreeNode::total(UserType::GrandTotal, self.options.grand_total_label.as_str())
                    }),
                UserType::GrandTotal => {
                    rows.push_total::<String>(&[], UserType::GrandTotal, &self.options.grand_total_label)
                }
                UserType::Data | UserType::Corner => {
                    if record.row_path.is_empty() {
                        rows.push_path(&[None::<String>])?
                    } else {
                        rows.push_path(&record.row_path)?
                    }
                }
            };

            if node.data.len() < width {
                node.data.resize(width, CellValue::Empty);
            }
            for (m, value) in record.values.iter().enumerate() {
                match column_index.get(&(key_path.clone(), m)) {
                    Some(&col) => node.data[col] = value.clone(),
                    None if value.is_empty() => {}
                    None => return Err(BuildError::UnknownColumn(key_path.join(" / "))),
                }
            }
        }

        let rows = TreeService::new(Axis::Rows, rows.build());
        let mut cells_metadata = CellsMetadata::default();
        extend_cells_metadata(&mut cells_metadata, &rows, &columns, 0);
        let corner_roots = self
            .options
            .row_titles
            .iter()
            .map(|t| TreeNode::new(t.as_str()).with_user_type(UserType::Corner))
            .collect();
        let corner = TreeService::with_min_deeps(
            Axis::Corner,
            corner_roots,
            columns.get_tree_deeps_length().max(1),
        );

        Ok(PivotTrees {
            rows,
            columns,
            corner,
            cells_metadata,
            grand_total_row,
        })
    }
}

/// Adds data-cell metadata for every row leaf from `from_row` on.
/// Existing entries at or past `from_row` are replaced.
pub fn extend_cells_metadata(
    metadata: &mut CellsMetadata,
    rows: &TreeService,
    columns: &TreeService,
    from_row: usize,
) {
    metadata.retain(|&(r, _), _| (r as usize) < from_row);
    let column_leaves = columns.get_last_level_nodes();
    for (r, row) in rows.get_last_level_nodes().iter().enumerate().skip(from_row) {
        for (c, column) in column_leaves.iter().enumerate() {
            metadata.insert(
                (r as u32, c as u32),
                CellMetadata {
                    row_type: row.user_type,
                    column_type: column.user_type,
                    measure_index: column.measure_index(),
                },
            );
        }
    }
}

/// Walks column leaves in display order, keying them by their group-by path
/// (measure levels and grand totals excluded) and measure position.
fn collect_column_keys(
    node: &TreeNode,
    path: &mut Vec<String>,
    cursor: &mut usize,
    index: &mut FxHashMap<ColumnKey, usize>,
) {
    let is_measure = node.measure_index().is_some();
    let pushed = !is_measure && node.user_type == UserType::Data;
    if pushed {
        path.push(node.value.clone());
    }
    if node.children.is_empty() {
        let key_path = if node.user_type == UserType::GrandTotal {
            Vec::new()
        } else {
            path.clone()
        };
        index.insert((key_path, node.measure_index().unwrap_or(0)), *cursor);
        *cursor += 1;
    } else {
        for child in &node.children {
            collect_column_keys(child, path, cursor, index);
        }
    }
    if pushed {
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    #[test]
    fn test_consecutive_grouping_dedups_on_value() {
        let mut builder = TreeBuilder::new(GroupingMode::Consecutive);
        for path in [["A", "1"], ["A", "1"], ["A", "2"], ["B", "1"], ["B", "1"]] {
            builder.push_path(&path.map(Some)).unwrap();
        }
        let roots = builder.build();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].size, 2);
        assert_eq!(roots[1].size, 1);
    }

    #[test]
    fn test_consecutive_grouping_preserves_order() {
        let mut builder = TreeBuilder::new(GroupingMode::Consecutive);
        for path in [["A", "1"], ["B", "1"], ["A", "2"]] {
            builder.push_path(&path.map(Some)).unwrap();
        }
        let values: Vec<String> = builder.build().into_iter().map(|n| n.value).collect();
        assert_eq!(values, vec!["A", "B", "A"]);
    }

    #[test]
    fn test_first_seen_grouping_merges() {
        let mut builder = TreeBuilder::new(GroupingMode::FirstSeen);
        for path in [["2023", "Q1"], ["2024", "Q1"], ["2023", "Q2"]] {
            builder.push_path(&path.map(Some)).unwrap();
        }
        let roots = builder.build();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].children.len(), 2);
        assert_eq!(roots[0].children[1].value, "Q2");
    }

    #[test]
    fn test_null_values_create_empty_nodes() {
        let mut builder = TreeBuilder::new(GroupingMode::Consecutive);
        builder.push_path(&[Some("A"), None]).unwrap();
        builder.push_path(&[None, Some("x")]).unwrap();
        let roots = builder.build();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].children[0].value, "");
        assert_eq!(roots[1].value, "");
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut builder = TreeBuilder::new(GroupingMode::Consecutive);
        assert_eq!(builder.push_path::<&str>(&[]).unwrap_err(), BuildError::EmptyPath);
    }

    #[test]
    fn test_reported_size_fixed_at_first_sight() {
        let mut builder = TreeBuilder::new(GroupingMode::Consecutive);
        builder.push_path(&[Some("A"), Some("1")]).unwrap();
        builder.report_size(&[Some("A")], 10).unwrap();
        builder.report_size(&[Some("A")], 3).unwrap();
        builder.push_path(&[Some("A"), Some("2")]).unwrap();
        assert!(builder.report_size(&[Some("Z")], 1).is_err());
        let roots = builder.build();
        assert_eq!(roots[0].size, 10);
        assert_eq!(roots[0].children.len(), 2);
    }

    #[test]
    fn test_pivot_single_measure_drops_measure_level() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![num(1.0)])).unwrap();
        builder.push(FlatRecord::data(&["A"], &["2024"], vec![num(2.0)])).unwrap();
        let trees = builder.build().unwrap();
        assert_eq!(trees.columns.get_tree_deeps_length(), 1);
        assert_eq!(trees.columns.get_tree_child_length(), 2);
        assert_eq!(trees.rows.extract_data(Some(&trees.columns)), vec![vec![num(1.0), num(2.0)]]);
    }

    #[test]
    fn test_pivot_multi_measure_adds_measure_level() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string(), "Cost".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![num(1.0), num(0.5)])).unwrap();
        builder.push(FlatRecord::data(&["B"], &["2023"], vec![num(2.0), num(1.5)])).unwrap();
        let trees = builder.build().unwrap();
        assert_eq!(trees.columns.get_tree_deeps_length(), 2);
        assert_eq!(trees.columns.get_tree_child_length(), 2);
        let data = trees.rows.extract_data(Some(&trees.columns));
        assert_eq!(data[1], vec![num(2.0), num(1.5)]);
        assert_eq!(
            trees.cells_metadata.get(&(0, 1)).and_then(|m| m.measure_index),
            Some(1)
        );
    }

    #[test]
    fn test_pivot_without_column_dimensions() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            row_titles: vec!["Region".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["North"], &[], vec![num(10.0)])).unwrap();
        let trees = builder.build().unwrap();
        assert_eq!(trees.columns.get_tree_child_length(), 1);
        assert_eq!(trees.columns.roots()[0].value, "Sales");
        assert_eq!(trees.corner.grid_size(), (1, 1));
        assert_eq!(trees.rows.extract_data(Some(&trees.columns)), vec![vec![num(10.0)]]);
    }

    #[test]
    fn test_pivot_subtotals_and_grand_totals() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder
            .extend([
                FlatRecord::data(&["A", "1"], &[], vec![num(1.0)]),
                FlatRecord::data(&["A", "2"], &[], vec![num(2.0)]),
                FlatRecord::subtotal(&["A"], &[], vec![num(3.0)]),
                FlatRecord::data(&["B", "1"], &[], vec![num(4.0)]),
                FlatRecord::grand_total(&[], vec![num(7.0)]),
            ])
            .unwrap();
        let trees = builder.build().unwrap();
        let rows = &trees.rows;
        assert_eq!(rows.get_tree_child_length(), 5);
        assert!(rows.has_grand_totals());
        let subtotal = &rows.roots()[0].children[2];
        assert_eq!(subtotal.user_type, UserType::SubTotal);
        assert_eq!(subtotal.label(), "A Total");
        assert_eq!(subtotal.data, vec![num(3.0)]);
        assert_eq!(rows.roots()[2].user_type, UserType::GrandTotal);
    }

    #[test]
    fn test_pivot_separate_grand_total() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            separate_grand_total: true,
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &[], vec![num(1.0)])).unwrap();
        builder.push(FlatRecord::grand_total(&[], vec![num(1.0)])).unwrap();
        let trees = builder.build().unwrap();
        assert!(!trees.rows.has_grand_totals());
        let total = trees.grand_total_row.unwrap();
        assert_eq!(total.user_type, UserType::GrandTotal);
        assert_eq!(total.data, vec![num(1.0)]);
    }

    #[test]
    fn test_pivot_rejects_wrong_value_count() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string(), "Cost".to_string()],
            ..Default::default()
        });
        let err = builder
            .push(FlatRecord::data(&["A"], &["2023"], vec![num(1.0)]))
            .unwrap_err();
        assert_eq!(err, BuildError::ValueCount { expected: 2, found: 1 });
    }

    #[test]
    fn test_column_grand_total_collects_empty_paths() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![num(1.0)])).unwrap();
        builder.push(FlatRecord::data(&["A"], &[], vec![num(9.0)])).unwrap();
        let trees = builder.build().unwrap();
        assert!(trees.columns.has_grand_totals());
        assert_eq!(trees.rows.extract_data(Some(&trees.columns)), vec![vec![num(1.0), num(9.0)]]);
    }

    #[test]
    fn test_ragged_column_paths_rejected() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![num(5.0)])).unwrap();
        builder.push(FlatRecord::data(&["A"], &["2023", "Q1"], vec![num(1.0)])).unwrap();
        let err = builder.build().unwrap_err();
        assert_eq!(err, BuildError::UnknownColumn("2023".to_string()));
    }

    #[test]
    fn test_ragged_column_path_without_value_is_ignored() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![CellValue::Empty])).unwrap();
        builder.push(FlatRecord::data(&["A"], &["2023", "Q1"], vec![num(1.0)])).unwrap();
        let trees = builder.build().unwrap();
        assert_eq!(trees.rows.extract_data(Some(&trees.columns)), vec![vec![num(1.0)]]);
    }

    #[test]
    fn test_extend_cells_metadata_covers_appended_rows() {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Sales".to_string()],
            ..Default::default()
        });
        builder.push(FlatRecord::data(&["A"], &["2023"], vec![num(1.0)])).unwrap();
        builder.push(FlatRecord::data(&["B"], &["2024"], vec![num(2.0)])).unwrap();
        let mut trees = builder.build().unwrap();
        assert_eq!(trees.cells_metadata.len(), 4);

        trees.rows.extend(TreeNode::total(UserType::GrandTotal, "Grand Total"));
        extend_cells_metadata(&mut trees.cells_metadata, &trees.rows, &trees.columns, 2);
        assert_eq!(trees.cells_metadata.len(), 6);
        assert_eq!(trees.cells_metadata[&(2, 1)].row_type, UserType::GrandTotal);
        assert_eq!(trees.cells_metadata[&(0, 0)].row_type, UserType::Data);
    }
}
