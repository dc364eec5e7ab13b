mod docker;
mod snapshot;
mod source;

pub use docker::DockerStore;
pub use snapshot::SnapshotStore;
pub use source::Store;
