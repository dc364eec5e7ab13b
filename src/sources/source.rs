use crate::error::StoreResult;
use crate::record::ImageRecord;

/// An image store that can list its images and inspect a single layer by id
pub trait Store {
    /// Returns the name of the store for identification purposes
    fn name(&self) -> &str;

    /// Ids of top-level images, or of every layer when `include_intermediate` is set.
    /// The order is the store's own listing order, each id once.
    fn list_ids(&self, include_intermediate: bool) -> StoreResult<Vec<String>>;

    /// Fetches one record by id; an id the store does not know is [`crate::StoreError::NotFound`]
    fn inspect(&self, id: &str) -> StoreResult<ImageRecord>;

    /// Fetches the records of `ids` in one go. Fails as a whole when any id fails.
    fn inspect_many(&self, ids: &[String]) -> StoreResult<Vec<ImageRecord>> {
        ids.iter().map(|id| self.inspect(id)).collect()
    }

    /// Lists images with their records, failing if any listed image cannot be inspected
    fn list_images(&self, include_intermediate: bool) -> StoreResult<Vec<ImageRecord>> {
        let ids = self.list_ids(include_intermediate)?;
        self.inspect_many(&ids)
    }
}

impl<S: Store + ?Sized> Store for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_ids(&self, include_intermediate: bool) -> StoreResult<Vec<String>> {
        (**self).list_ids(include_intermediate)
    }

    fn inspect(&self, id: &str) -> StoreResult<ImageRecord> {
        (**self).inspect(id)
    }

    fn inspect_many(&self, ids: &[String]) -> StoreResult<Vec<ImageRecord>> {
        (**self).inspect_many(ids)
    }

    fn list_images(&self, include_intermediate: bool) -> StoreResult<Vec<ImageRecord>> {
        (**self).list_images(include_intermediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DockerStore, SnapshotStore};

    fn store_name(store: &dyn Store) -> &str {
        store.name()
    }

    #[test]
    fn test_polymorphic_store_names() {
        let snapshot = SnapshotStore::from_records(Vec::new());
        assert_eq!(store_name(&snapshot), "snapshot");

        let docker = DockerStore::unchecked(None);
        assert_eq!(store_name(&docker), "docker");
    }

    #[test]
    fn test_inspect_many_fails_on_any_missing_id() {
        let store = SnapshotStore::from_records(vec![ImageRecord::new("sha256:a", None)]);

        let found = store.inspect_many(&["sha256:a".to_string()]).unwrap();
        assert_eq!(found.len(), 1);

        let ids = vec!["sha256:a".to_string(), "sha256:gone".to_string()];
        assert!(matches!(
            store.inspect_many(&ids),
            Err(crate::StoreError::NotFound(id)) if id == "sha256:gone"
        ));
    }
}
