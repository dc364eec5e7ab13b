pub mod error;
pub mod lineage;
pub mod notifier;
pub mod processor;
pub mod record;
pub mod render;
pub mod sources;

// Re-exports for easy access
pub use error::{StoreError, StoreResult};
pub use lineage::{
    build, BuildIssue, BuildOptions, BuildReport, Forest, LineageBuilder, LineageNode,
};
pub use notifier::Notifier;
pub use processor::{DiskUsageProcessor, ImagesOptions, OutputFormat, Summary};
pub use record::ImageRecord;
pub use render::{render, to_structured, DisplayLine, StructuredNode};
pub use sources::DockerStore;
pub use sources::SnapshotStore;
pub use sources::Store;
