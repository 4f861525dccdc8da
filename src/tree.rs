//! Directory structure captured during the scan.
//!
//! The tree is assembled incrementally from the scanner's depth-first walk
//! and rendered with box-drawing connectors.

use std::fmt;

/// A node in the structure tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// File or directory name (not full path)
    pub name: String,

    /// Whether this node is a directory
    pub is_dir: bool,

    /// Link target when the entry is a symbolic link
    pub link_target: Option<String>,

    children: Vec<TreeNode>,
}

impl TreeNode {
    /// Creates a directory node.
    #[must_use]
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            link_target: None,
            children: Vec::new(),
        }
    }

    /// Creates a file node.
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            link_target: None,
            children: Vec::new(),
        }
    }

    /// Marks the node as a symbolic link to `target`.
    #[must_use]
    pub fn linked_to(mut self, target: impl Into<String>) -> Self {
        self.link_target = Some(target.into());
        self
    }

    fn render_children(&self, prefix: &str, out: &mut Vec<String>) {
        let last = self.children.len().saturating_sub(1);
        for (idx, child) in self.children.iter().enumerate() {
            let is_last = idx == last;
            let connector = if is_last { "└── " } else { "├── " };

            let mut line = format!("{prefix}{connector}{}", child.name);
            if let Some(target) = &child.link_target {
                line.push_str(" -> ");
                line.push_str(target);
            }
            out.push(line);

            if child.is_dir {
                let extension = if is_last { "    " } else { "│   " };
                child.render_children(&format!("{prefix}{extension}"), out);
            }
        }
    }
}

/// The scanned directory hierarchy, independent of any file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureTree {
    root: TreeNode,
}

impl StructureTree {
    /// Creates a tree that contains only the root.
    #[must_use]
    pub fn empty(root_name: impl Into<String>) -> Self {
        Self {
            root: TreeNode::directory(root_name),
        }
    }

    /// Renders the tree as text, one entry per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![self.root.name.clone()];
        self.root.render_children("", &mut lines);
        lines.join("\n")
    }
}

impl fmt::Display for StructureTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds a [`StructureTree`] from entries arriving in depth-first pre-order.
///
/// `stack[i]` is the open directory at depth `i`; the root sits at depth 0.
#[derive(Debug)]
pub(crate) struct TreeBuilder {
    stack: Vec<TreeNode>,
}

impl TreeBuilder {
    pub(crate) fn new(root_name: impl Into<String>) -> Self {
        Self {
            stack: vec![TreeNode::directory(root_name)],
        }
    }

    /// Adds an entry found at `depth` (the root's children have depth 1).
    pub(crate) fn push(&mut self, depth: usize, node: TreeNode) {
        self.close_until(depth.max(1));

        if node.is_dir {
            self.stack.push(node);
        } else if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    pub(crate) fn finish(mut self) -> StructureTree {
        self.close_until(1);
        let root = self
            .stack
            .pop()
            .unwrap_or_else(|| TreeNode::directory(String::new()));
        StructureTree { root }
    }

    fn close_until(&mut self, len: usize) {
        while self.stack.len() > len {
            if let Some(done) = self.stack.pop() {
                if let Some(parent) = self.stack.last_mut() {
                    parent.children.push(done);
                }
            }
        }
    }
}
