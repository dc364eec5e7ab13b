//! Image layer records as reported by an image store.
//!
//! [`ImageRecord`] is the immutable per-layer fact the lineage builder works on.
//! [`InspectedImage`] is the wire shape of one `docker image inspect` object; both
//! [`crate::sources::DockerStore`] and [`crate::sources::SnapshotStore`] decode it and
//! convert into [`ImageRecord`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    /// Immediate parent layer, `None` for a root layer
    pub parent_id: Option<String>,
    /// Bytes occupied by this layer alone
    pub own_size: u64,
    /// Bytes occupied by this layer plus all of its ancestors
    pub cumulative_size: u64,
    pub tags: Vec<String>,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            own_size: 0,
            cumulative_size: 0,
            tags: Vec::new(),
        }
    }

    pub fn with_sizes(mut self, own_size: u64, cumulative_size: u64) -> Self {
        self.own_size = own_size;
        self.cumulative_size = cumulative_size;
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// One object of `docker image inspect` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectedImage {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(default, rename = "Parent")]
    pub parent: Option<String>,
    #[serde(default, rename = "RepoTags")]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default, rename = "Size")]
    pub size: u64,
    /// Dropped by newer daemons, where `Size` already covers the whole image
    #[serde(default, rename = "VirtualSize", skip_serializing_if = "Option::is_none")]
    pub virtual_size: Option<u64>,
}

impl From<InspectedImage> for ImageRecord {
    fn from(image: InspectedImage) -> Self {
        let parent_id = image.parent.filter(|parent| !parent.trim().is_empty());
        // "<none>:<none>" is how the daemon spells "untagged"
        let tags = image
            .repo_tags
            .unwrap_or_default()
            .into_iter()
            .filter(|tag| tag != "<none>:<none>")
            .collect();

        Self {
            id: image.id,
            parent_id,
            own_size: image.size,
            cumulative_size: image.virtual_size.unwrap_or(image.size),
            tags,
        }
    }
}
