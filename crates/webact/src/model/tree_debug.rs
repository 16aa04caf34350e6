//! Indented dumps of a [`Tree`] for debugging.
//!
//! ```
//! use webact::model::{Tree, TreeDebug, TreeFormatOptions};
//!
//! let tree: Tree = Tree::new();
//! let root = tree.create_node("/");
//! tree.add_node(root, "/docs/intro").unwrap();
//!
//! let dump = TreeDebug::with_options(TreeFormatOptions::minimal())
//!     .format_subtree(&tree, root)
//!     .unwrap();
//! assert!(dump.contains("intro"));
//! ```

use std::fmt::Write;

use super::error::{TreeError, TreeResult};
use super::tree::{NodeId, Tree};

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node handles.
    pub show_ids: bool,
    /// Whether to list committed properties under each node.
    pub show_properties: bool,
    /// Whether to flag nodes with uncommitted field edits.
    pub show_changes: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_properties: false,
            show_changes: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_properties: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_properties: false,
            show_changes: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing node trees.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// Create a debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree<D: Send + Sync + 'static>(&self, tree: &Tree<D>, root: NodeId) -> TreeResult<String> {
        if !tree.contains(root) {
            return Err(TreeError::InvalidNode);
        }
        let mut output = String::new();
        self.format_subtree_into(tree, root, 0, true, &mut output);
        Ok(output)
    }

    fn format_subtree_into<D: Send + Sync + 'static>(
        &self,
        tree: &Tree<D>,
        id: NodeId,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(name) = tree.name(id) else {
            return;
        };

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(if name.is_empty() { "(unnamed)" } else { &name });
        if self.options.show_ids {
            let _ = write!(output, " [{id:?}]");
        }
        if self.options.show_changes && tree.is_changed(id) {
            output.push_str(" *");
        }
        output.push('\n');

        if self.options.show_properties {
            let prefix = self.build_property_prefix(depth);
            for (property, value) in tree.properties(id) {
                let _ = writeln!(output, "{prefix}  .{property} = {value}");
            }
        }

        let children = tree.children(id);
        let child_count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.format_subtree_into(tree, child, depth + 1, i == child_count - 1, output);
        }
    }

    /// Build the prefix string for a tree node.
    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }

    /// Build the prefix for property lines.
    fn build_property_prefix(&self, depth: usize) -> String {
        let branch = match self.options.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };

        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (Tree, NodeId) {
        let tree = Tree::new();
        let root = tree.create_node("/");
        tree.add_node(root, "/docs/intro").unwrap();
        tree.add_node(root, "/docs/guide").unwrap();
        tree.add_node(root, "/blog").unwrap();
        (tree, root)
    }

    #[test]
    fn test_format_hierarchy() {
        let (tree, root) = sample();
        let output = TreeDebug::new().format_subtree(&tree, root).unwrap();
        for name in ["docs", "intro", "guide", "blog"] {
            assert!(output.contains(name));
        }
        assert!(output.contains("\u{2514}\u{2500}\u{2500} blog"));
    }

    #[test]
    fn test_format_minimal_ascii() {
        let (tree, root) = sample();
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::minimal()
        };
        let output = TreeDebug::with_options(options).format_subtree(&tree, root).unwrap();
        assert_eq!(
            output,
            "/\n+-- docs\n|  +-- intro\n|  `-- guide\n`-- blog\n"
        );
    }

    #[test]
    fn test_max_depth_and_properties() {
        let (tree, root) = sample();
        let docs = tree.child_named(root, "docs").unwrap();
        tree.set_property(docs, "title", json!("Docs")).unwrap();
        tree.set_field(docs, "title", json!("Edited")).unwrap();

        let options = TreeFormatOptions {
            max_depth: Some(1),
            show_ids: false,
            ..TreeFormatOptions::detailed()
        };
        let output = TreeDebug::with_options(options).format_subtree(&tree, root).unwrap();
        assert!(output.contains("docs *"));
        assert!(output.contains(".title = \"Docs\""));
        assert!(!output.contains("intro"));
    }

    #[test]
    fn test_invalid_root() {
        let (tree, root) = sample();
        tree.destroy(root).unwrap();
        assert_eq!(TreeDebug::new().format_subtree(&tree, root), Err(TreeError::InvalidNode));
    }
}
