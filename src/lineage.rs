//! Layer lineage reconstruction.
//!
//! This module provides [`LineageBuilder`], which turns an unordered batch of
//! [`ImageRecord`]s into a [`Forest`] where every layer appears exactly once:
//! - walks each image's ancestry upward through `parent_id`, resolving ancestors on demand,
//! - stops at the first ancestor already present in the forest (hashed id index),
//! - grafts the unknown part of the chain below it as a linear path, oldest first.
//!
//! Resolution failures never abort the build. A missing ancestor truncates the chain
//! (the oldest resolvable ancestor becomes a root), a missing or malformed image skips
//! that image only. Both are recorded in the returned [`BuildReport`].

use crate::error::StoreResult;
use crate::record::ImageRecord;
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A layer in the lineage forest, owning its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageNode {
    pub id: String,
    pub own_size: u64,
    pub cumulative_size: u64,
    /// Tags of the listed image this node stands for, empty for pure ancestors
    pub tags: Vec<String>,
    /// Number of listed images whose chain runs through this node, when counting is enabled
    pub references: Option<u32>,
    /// In discovery order
    pub children: Vec<LineageNode>,
}

impl LineageNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(LineageNode::subtree_len)
            .sum::<usize>()
    }

    fn find(&self, id: &str) -> Option<&LineageNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn own_size_total(&self) -> u64 {
        self.own_size
            + self
                .children
                .iter()
                .map(LineageNode::own_size_total)
                .sum::<u64>()
    }
}

/// Ordered collection of lineage trees, one per distinct root layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    roots: Vec<LineageNode>,
}

impl Forest {
    pub fn roots(&self) -> &[LineageNode] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<LineageNode> {
        self.roots
    }

    /// Number of trees
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of distinct layers across all trees
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(LineageNode::subtree_len).sum()
    }

    pub fn find(&self, id: &str) -> Option<&LineageNode> {
        self.roots.iter().find_map(|root| root.find(id))
    }

    /// Bytes actually occupied on disk: every layer counted once
    pub fn total_size(&self) -> u64 {
        self.roots.iter().map(LineageNode::own_size_total).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Track how many listed images pass through each node
    pub count_references: bool,
}

/// A non-fatal problem met while building the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildIssue {
    /// The image's own record could not be fetched; the image was skipped
    OwnRecordMissing { id: String, reason: String },
    /// An ancestor could not be inspected; the chain of `child` stops below it
    RecordNotResolvable {
        id: String,
        child: String,
        reason: String,
    },
    /// The parent chain loops back onto `id`; the chain stops there
    CycleDetected { id: String },
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildIssue::OwnRecordMissing { id, reason } => {
                write!(f, "skipped image {}: {}", id, reason)
            }
            BuildIssue::RecordNotResolvable { id, child, reason } => write!(
                f,
                "parent {} of {} is not resolvable, chain truncated: {}",
                id, child, reason
            ),
            BuildIssue::CycleDetected { id } => {
                write!(f, "parent chain loops back to {}, chain truncated", id)
            }
        }
    }
}

/// What happened during a build, besides the forest itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Images that made it into the forest
    pub images: usize,
    /// Images whose full chain was already present
    pub duplicates: usize,
    pub issues: Vec<BuildIssue>,
}

impl BuildReport {
    /// Number of images left out of the forest
    pub fn skipped(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, BuildIssue::OwnRecordMissing { .. }))
            .count()
    }

    /// Number of chains that ended early
    pub fn truncated(&self) -> usize {
        self.issues.len() - self.skipped()
    }
}

struct Slot {
    record: ImageRecord,
    parent: Option<usize>,
    children: Vec<usize>,
    references: u32,
}

/// Incremental forest builder.
///
/// `resolve` is called once per ancestor the first time a chain walk meets it and the
/// ancestor is not already part of the forest. It must answer identically for the same id.
pub struct LineageBuilder<F> {
    resolve: F,
    options: BuildOptions,
    slots: Vec<Slot>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
    report: BuildReport,
}

impl<F> LineageBuilder<F>
where
    F: FnMut(&str) -> StoreResult<ImageRecord>,
{
    pub fn new(resolve: F) -> Self {
        Self::with_options(resolve, BuildOptions::default())
    }

    pub fn with_options(resolve: F, options: BuildOptions) -> Self {
        Self {
            resolve,
            options,
            slots: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            report: BuildReport::default(),
        }
    }

    /// Fetches the image's own record through the resolver, then adds it.
    /// An unresolvable id skips this image only.
    pub fn add_image_id(&mut self, id: &str) {
        match (self.resolve)(id) {
            Ok(record) => self.add_image(record),
            Err(err) => {
                debug!("Skipping image {}: {}", id, err);
                self.report.issues.push(BuildIssue::OwnRecordMissing {
                    id: id.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Adds one listed image, grafting whatever part of its chain is not yet known
    pub fn add_image(&mut self, image: ImageRecord) {
        if image.id.trim().is_empty() {
            debug!("Skipping image record without an id");
            self.report.issues.push(BuildIssue::OwnRecordMissing {
                id: String::new(),
                reason: "record has no id".to_string(),
            });
            return;
        }

        let tags = image.tags.clone();
        let image_id = image.id.clone();
        let (chain, anchor) = self.walk_chain(image);

        if chain.is_empty() {
            self.report.duplicates += 1;
            trace!("Image {} is already part of the forest", image_id);
        } else {
            debug!(
                "Grafting {} new layer(s) for image {} under {}",
                chain.len(),
                image_id,
                anchor
                    .map(|idx| self.slots[idx].record.id.as_str())
                    .unwrap_or("a new root")
            );
        }

        let Some(leaf) = self.graft(chain, anchor) else {
            return;
        };
        self.report.images += 1;
        self.merge_tags(leaf, tags);
        if self.options.count_references {
            self.count_reference(leaf);
        }
    }

    /// Walks from `image` towards its oldest resolvable ancestor.
    ///
    /// Returns the unknown part of the chain, leaf first, and the already-known node
    /// it hangs from (`None` when the chain starts a new tree).
    fn walk_chain(&mut self, image: ImageRecord) -> (Vec<ImageRecord>, Option<usize>) {
        if let Some(&known) = self.index.get(&image.id) {
            return (Vec::new(), Some(known));
        }

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = image;

        loop {
            seen.insert(current.id.clone());
            let parent_id = current.parent_id.clone();
            let child_id = current.id.clone();
            chain.push(current);

            let Some(parent_id) = parent_id else {
                break;
            };

            if seen.contains(&parent_id) {
                warn!("Parent chain of {} loops back to {}", child_id, parent_id);
                self.report
                    .issues
                    .push(BuildIssue::CycleDetected { id: parent_id });
                break;
            }

            if let Some(&known) = self.index.get(&parent_id) {
                return (chain, Some(known));
            }

            trace!("Resolving parent {} of {}", parent_id, child_id);
            match (self.resolve)(&parent_id) {
                // The store may answer with a differently spelled id for the same layer
                Ok(parent) if parent.id != parent_id => {
                    if let Some(&known) = self.index.get(&parent.id) {
                        return (chain, Some(known));
                    }
                    if seen.contains(&parent.id) {
                        warn!("Parent chain of {} loops back to {}", child_id, parent.id);
                        self.report
                            .issues
                            .push(BuildIssue::CycleDetected { id: parent.id });
                        break;
                    }
                    current = parent;
                }
                Ok(parent) => current = parent,
                Err(err) => {
                    warn!("Cannot resolve parent {} of {}: {}", parent_id, child_id, err);
                    self.report.issues.push(BuildIssue::RecordNotResolvable {
                        id: parent_id,
                        child: child_id,
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }

        (chain, None)
    }

    /// Attaches `chain` (leaf first) below `anchor` as a linear path and returns the leaf
    fn graft(&mut self, chain: Vec<ImageRecord>, anchor: Option<usize>) -> Option<usize> {
        let mut parent = anchor;
        for record in chain.into_iter().rev() {
            parent = Some(self.insert_node(record, parent));
        }
        parent
    }

    fn insert_node(&mut self, mut record: ImageRecord, parent: Option<usize>) -> usize {
        let idx = self.slots.len();
        // Tags belong to the listed image only; the leaf gets them in merge_tags
        record.tags.clear();
        self.index.insert(record.id.clone(), idx);
        self.slots.push(Slot {
            record,
            parent,
            children: Vec::new(),
            references: 0,
        });

        match parent {
            Some(parent) => self.slots[parent].children.push(idx),
            None => self.roots.push(idx),
        }
        idx
    }

    fn merge_tags(&mut self, idx: usize, tags: Vec<String>) {
        let existing = &mut self.slots[idx].record.tags;
        for tag in tags {
            if !existing.contains(&tag) {
                existing.push(tag);
            }
        }
    }

    fn count_reference(&mut self, leaf: usize) {
        let mut cursor = Some(leaf);
        while let Some(idx) = cursor {
            self.slots[idx].references += 1;
            cursor = self.slots[idx].parent;
        }
    }

    /// Finalizes the arena into an owned forest
    pub fn finish(self) -> (Forest, BuildReport) {
        let count_references = self.options.count_references;
        let mut slots: Vec<Option<Slot>> = self.slots.into_iter().map(Some).collect();
        let roots = self
            .roots
            .into_iter()
            .filter_map(|idx| into_node(&mut slots, idx, count_references))
            .collect();

        (Forest { roots }, self.report)
    }
}

fn into_node(
    slots: &mut [Option<Slot>],
    idx: usize,
    count_references: bool,
) -> Option<LineageNode> {
    let slot = slots.get_mut(idx)?.take()?;
    let children = slot
        .children
        .into_iter()
        .filter_map(|child| into_node(slots, child, count_references))
        .collect();

    Some(LineageNode {
        id: slot.record.id,
        own_size: slot.record.own_size,
        cumulative_size: slot.record.cumulative_size,
        tags: slot.record.tags,
        references: count_references.then_some(slot.references),
        children,
    })
}

/// Builds a forest from `images` in the given order
pub fn build<I, F>(images: I, resolve: F) -> (Forest, BuildReport)
where
    I: IntoIterator<Item = ImageRecord>,
    F: FnMut(&str) -> StoreResult<ImageRecord>,
{
    build_with_options(images, resolve, BuildOptions::default())
}

pub fn build_with_options<I, F>(
    images: I,
    resolve: F,
    options: BuildOptions,
) -> (Forest, BuildReport)
where
    I: IntoIterator<Item = ImageRecord>,
    F: FnMut(&str) -> StoreResult<ImageRecord>,
{
    let mut builder = LineageBuilder::with_options(resolve, options);
    for image in images {
        builder.add_image(image);
    }
    builder.finish()
}
