//! Forest rendering.
//!
//! - [`render`] yields one [`DisplayLine`] per node, depth-first pre-order, for terminal output.
//! - [`to_structured`] mirrors the forest as serializable [`StructuredNode`]s for JSON output.
//!
//! Neither touches the forest; rendering the same forest twice gives the same output.

use crate::lineage::{Forest, LineageNode};
use serde::Serialize;
use std::fmt;

/// Width of the id prefix shown in text output
pub const SHORT_ID_LEN: usize = 12;

const MEGABYTE: u64 = 1024 * 1024;

/// Strips the `sha256:` style algorithm prefix and truncates to [`SHORT_ID_LEN`]
pub fn short_id(id: &str) -> &str {
    let hex = id.split_once(':').map(|(_, hex)| hex).unwrap_or(id);
    match hex.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &hex[..end],
        None => hex,
    }
}

pub fn to_megabytes(bytes: u64) -> u64 {
    bytes / MEGABYTE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// 0 for forest roots
    pub depth: usize,
    pub id: String,
    pub own_mb: u64,
    pub cumulative_mb: u64,
    /// Tags joined with ", "
    pub tags: String,
    pub references: Option<u32>,
}

impl DisplayLine {
    fn from_node(node: &LineageNode, depth: usize) -> Self {
        Self {
            depth,
            id: short_id(&node.id).to_string(),
            own_mb: to_megabytes(node.own_size),
            cumulative_mb: to_megabytes(node.cumulative_size),
            tags: node.tags.join(", "),
            references: node.references,
        }
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:indent$}{:<width$} {:>6} MB {:>6} MB",
            "",
            self.id,
            self.own_mb,
            self.cumulative_mb,
            indent = self.depth * 2,
            width = SHORT_ID_LEN
        )?;
        if let Some(references) = self.references {
            write!(f, " [{}]", references)?;
        }
        if !self.tags.is_empty() {
            write!(f, " {}", self.tags)?;
        }
        Ok(())
    }
}

/// Lazy depth-first walk over a [`Forest`]; see [`render`]
pub struct Lines<'a> {
    stack: Vec<(usize, &'a LineageNode)>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = DisplayLine;

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        // Reversed so the first child is popped first
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some(DisplayLine::from_node(node, depth))
    }
}

/// Walks `forest` depth-first, pre-order, children in stored order
pub fn render(forest: &Forest) -> Lines<'_> {
    Lines {
        stack: forest.roots().iter().rev().map(|root| (0, root)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredNode {
    pub id: String,
    pub own_size: u64,
    pub cumulative_size: u64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<u32>,
    pub children: Vec<StructuredNode>,
}

impl From<&LineageNode> for StructuredNode {
    fn from(node: &LineageNode) -> Self {
        Self {
            id: node.id.clone(),
            own_size: node.own_size,
            cumulative_size: node.cumulative_size,
            tags: node.tags.clone(),
            references: node.references,
            children: node.children.iter().map(StructuredNode::from).collect(),
        }
    }
}

pub fn to_structured(forest: &Forest) -> Vec<StructuredNode> {
    forest.roots().iter().map(StructuredNode::from).collect()
}
