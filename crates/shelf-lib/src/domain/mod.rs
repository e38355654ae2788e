pub mod book;
pub mod layout;
pub mod manifest;
pub mod remote;
pub mod stage;
pub mod sync;
pub mod validation;

pub use book::{AssetKind, BookEntry, Folder};
pub use layout::ContentLayout;
pub use manifest::Manifest;
pub use remote::{ContentStore, RemoteFile, RevisionTag, StoreError};
pub use stage::{LogProgress, ProgressSink, PublishStage, StageBoard, StageOrderError, StageState};
pub use sync::{ManifestSnapshot, ManifestSynchronizer, SyncError};
pub use validation::ValidationError;
