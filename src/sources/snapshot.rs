use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::record::{ImageRecord, InspectedImage};

/// Offline image store over a saved `docker image inspect` JSON array.
///
/// Useful for analysing another machine's images, e.g. a file produced by
/// `docker image inspect $(docker image ls -aq) > images.json`.
pub struct SnapshotStore {
    records: Vec<ImageRecord>,
}

impl SnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            StoreError::Unreachable(format!("cannot read snapshot {}: {}", path.display(), err))
        })?;
        let store = Self::from_json(&content)?;
        debug!(
            "Loaded {} record(s) from snapshot {}",
            store.records.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        let inspected: Vec<InspectedImage> = serde_json::from_str(json)?;
        Ok(Self::from_records(
            inspected.into_iter().map(ImageRecord::from).collect(),
        ))
    }

    pub fn from_records(records: Vec<ImageRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Store for SnapshotStore {
    fn name(&self) -> &str {
        "snapshot"
    }

    /// Without `include_intermediate`, hides untagged layers that other layers build on,
    /// the way `docker images` does without `--all`
    fn list_ids(&self, include_intermediate: bool) -> StoreResult<Vec<String>> {
        let parents: HashSet<&str> = self
            .records
            .iter()
            .filter_map(|record| record.parent_id.as_deref())
            .collect();

        let mut seen = HashSet::new();
        Ok(self
            .records
            .iter()
            .filter(|record| {
                include_intermediate
                    || record.is_tagged()
                    || !parents.contains(record.id.as_str())
            })
            .filter(|record| seen.insert(record.id.as_str()))
            .map(|record| record.id.clone())
            .collect())
    }

    fn inspect(&self, id: &str) -> StoreResult<ImageRecord> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"[
        {"Id": "sha256:base", "Parent": "", "RepoTags": ["alpine:3.20"], "Size": 8000000},
        {"Id": "sha256:step", "Parent": "sha256:base", "RepoTags": [], "Size": 1000, "VirtualSize": 8001000},
        {"Id": "sha256:app", "Parent": "sha256:step", "RepoTags": ["app:latest"], "Size": 2000, "VirtualSize": 8003000},
        {"Id": "sha256:dangling", "Parent": "sha256:base", "RepoTags": null, "Size": 10}
    ]"#;

    fn listed_ids(records: &[ImageRecord]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn test_open_snapshot_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let store = SnapshotStore::open(file.path()).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(
            store.inspect("sha256:step").unwrap().parent_id.as_deref(),
            Some("sha256:base")
        );
    }

    #[test]
    fn test_missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnapshotStore::open(dir.path().join("absent.json"))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            SnapshotStore::from_json("{\"Id\": 1}"),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_listing_hides_intermediate_layers() {
        let store = SnapshotStore::from_json(SNAPSHOT).unwrap();

        assert_eq!(
            listed_ids(&store.list_images(false).unwrap()),
            vec!["sha256:base", "sha256:app", "sha256:dangling"]
        );
        assert_eq!(store.list_images(true).unwrap().len(), 4);
        assert_eq!(
            store.list_ids(false).unwrap(),
            vec!["sha256:base", "sha256:app", "sha256:dangling"]
        );
    }

    #[test]
    fn test_inspect_unknown_id() {
        let store = SnapshotStore::from_json(SNAPSHOT).unwrap();
        assert!(matches!(
            store.inspect("sha256:nope"),
            Err(StoreError::NotFound(id)) if id == "sha256:nope"
        ));
    }
}
