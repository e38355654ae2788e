//! Publish a book: upload its files, then register it in the manifest.
//!
//! Stages run strictly in order, Images -> Audio -> Document -> Manifest,
//! and the first failure stops the run. Files always land before the manifest
//! entry that references them. A failed run can leave orphaned files on the
//! store (files the run created are reported in [`PublishError::Stage`]), but never a manifest
//! entry that points at a missing file. Nothing is rolled back or retried,
//! except the opt-in manifest retry in [`PublishOptions`].

use log::{debug, info, warn};
use serde_json::Map;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{
    AssetKind, BookEntry, ContentLayout, ContentStore, Folder, ManifestSynchronizer,
    ProgressSink, PublishStage, RevisionTag, StageBoard, StageOrderError, StageState, StoreError,
    SyncError, ValidationError,
};
use crate::encoding::{self, EncodingError};

/// Why a stage failed
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Manifest(#[from] SyncError),

    #[error(transparent)]
    Order(#[from] StageOrderError),
}

/// Errors that can occur during a publish
#[derive(Debug, Error)]
pub enum PublishError {
    /// Input was rejected. Nothing was sent to the remote store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another book already uses the folder (only checked when
    /// [`PublishOptions::require_unique_folder`] is set).
    #[error("folder \"{folder}\" is already used by a published book")]
    FolderTaken { folder: String },

    /// The manifest could not be read for the folder uniqueness check.
    #[error("failed to check whether the folder is already in use")]
    UniquenessCheck(#[source] SyncError),

    /// A stage failed. `uploaded` lists every file written before the failure,
    /// `orphaned` the subset this run created, which no manifest entry
    /// references. Overwritten files keep their earlier entry.
    #[error("{stage} stage failed")]
    Stage {
        stage: PublishStage,
        uploaded: Vec<String>,
        orphaned: Vec<String>,
        #[source]
        source: StageError,
    },
}

impl PublishError {
    /// The stage that failed, if the run got that far.
    #[must_use]
    pub fn stage(&self) -> Option<PublishStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Validation(_) | Self::FolderTaken { .. } | Self::UniquenessCheck(_) => None,
        }
    }

    /// Remote paths written before the failure, updates included.
    #[must_use]
    pub fn uploaded(&self) -> &[String] {
        match self {
            Self::Stage { uploaded, .. } => uploaded,
            Self::Validation(_) | Self::FolderTaken { .. } | Self::UniquenessCheck(_) => &[],
        }
    }

    /// Remote paths created before the failure that no manifest entry references.
    #[must_use]
    pub fn orphaned(&self) -> &[String] {
        match self {
            Self::Stage { orphaned, .. } => orphaned,
            Self::Validation(_) | Self::FolderTaken { .. } | Self::UniquenessCheck(_) => &[],
        }
    }

    /// Whether the failure was a manifest revision conflict, for which
    /// re-running the publish is the right response.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Stage {
                source: StageError::Manifest(e),
                ..
            } => e.is_conflict(),
            Self::Validation(_)
            | Self::FolderTaken { .. }
            | Self::UniquenessCheck(_)
            | Self::Stage { .. } => false,
        }
    }
}

/// Local files of a book, as picked by the admin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFiles {
    pub cover: Option<PathBuf>,
    pub infographic: Option<PathBuf>,
    pub audio_persian: Option<PathBuf>,
    pub audio_english: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
}

impl BookFiles {
    #[must_use]
    pub fn get(&self, kind: AssetKind) -> Option<&Path> {
        let path = match kind {
            AssetKind::Cover => &self.cover,
            AssetKind::Infographic => &self.infographic,
            AssetKind::AudioPersian => &self.audio_persian,
            AssetKind::AudioEnglish => &self.audio_english,
            AssetKind::Pdf => &self.pdf,
        };
        path.as_deref()
    }
}

/// What the admin submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishRequest {
    pub title: String,
    pub description: String,
    pub files: BookFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// Read the manifest before uploading and refuse a folder that is already
    /// in use. The check and the manifest write are not atomic.
    pub require_unique_folder: bool,
    /// Total tries for the Manifest stage when it hits a revision conflict.
    pub manifest_attempts: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            require_unique_folder: false,
            manifest_attempts: 1,
        }
    }
}

/// One file transfer of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub kind: AssetKind,
    pub local: PathBuf,
    pub remote: String,
}

/// A validated publish: every remote path and the manifest entry, computed
/// before any network call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPlan {
    folder: Folder,
    uploads: Vec<Upload>,
    entry: BookEntry,
    manifest_path: String,
}

impl PublishPlan {
    /// Validate `request` and lay it out under `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first missing or unusable input.
    pub fn prepare(
        request: &PublishRequest,
        layout: &ContentLayout,
    ) -> Result<Self, ValidationError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField { field: "title" });
        }
        let description = request.description.trim();
        if description.is_empty() {
            return Err(ValidationError::MissingField {
                field: "description",
            });
        }

        let folder = Folder::derive(title);
        if !folder.is_usable() {
            return Err(ValidationError::UnusableFolder {
                title: title.to_owned(),
            });
        }

        let mut uploads: Vec<Upload> = Vec::new();
        let mut names: Vec<(AssetKind, String)> = Vec::new();

        for kind in AssetKind::ALL {
            let Some(local) = request.files.get(kind) else {
                if kind.is_required() {
                    return Err(ValidationError::MissingField { field: kind.field() });
                }
                continue;
            };
            if !local.is_file() {
                return Err(ValidationError::FileNotFound {
                    field: kind.field(),
                    path: local.to_path_buf(),
                });
            }
            let name = local
                .file_name()
                .and_then(OsStr::to_str)
                .ok_or_else(|| ValidationError::UnusableFileName {
                    field: kind.field(),
                    path: local.to_path_buf(),
                })?;

            let remote = layout.asset_path(&folder, kind, name);
            if let Some(earlier) = uploads.iter().find(|u| u.remote == remote) {
                return Err(ValidationError::DuplicateRemotePath {
                    first: earlier.kind.field(),
                    second: kind.field(),
                    remote,
                });
            }

            uploads.push(Upload {
                kind,
                local: local.to_path_buf(),
                remote,
            });
            names.push((kind, name.to_owned()));
        }

        let name_of = |kind: AssetKind| {
            names
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, name)| name.clone())
        };

        let entry = BookEntry {
            folder: folder.as_str().to_owned(),
            title: title.to_owned(),
            description: description.to_owned(),
            cover: name_of(AssetKind::Cover).unwrap_or_default(),
            infographic: name_of(AssetKind::Infographic),
            audio_persian: name_of(AssetKind::AudioPersian),
            audio_english: name_of(AssetKind::AudioEnglish),
            pdf: name_of(AssetKind::Pdf).unwrap_or_default(),
            extra: Map::new(),
        };

        Ok(Self {
            folder,
            uploads,
            entry,
            manifest_path: layout.manifest_path(),
        })
    }

    #[must_use]
    pub fn folder(&self) -> &Folder {
        &self.folder
    }

    /// All uploads in execution order.
    #[must_use]
    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    pub fn uploads_for(&self, stage: PublishStage) -> impl Iterator<Item = &Upload> {
        self.uploads.iter().filter(move |u| u.kind.stage() == stage)
    }

    #[must_use]
    pub fn entry(&self) -> &BookEntry {
        &self.entry
    }

    #[must_use]
    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub folder: Folder,
    pub entry: BookEntry,
    /// Remote paths written, in upload order.
    pub uploaded: Vec<String>,
    pub manifest_revision: RevisionTag,
    pub board: StageBoard,
}

/// Sequences uploads and the manifest update for one book at a time.
pub struct Publisher<S: ContentStore> {
    store: S,
    layout: ContentLayout,
    options: PublishOptions,
}

impl<S: ContentStore> Publisher<S> {
    #[must_use]
    pub fn new(store: S, layout: ContentLayout) -> Self {
        Self {
            store,
            layout,
            options: PublishOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate `request`, then run every stage.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Validation`] without touching the store if the
    /// request is incomplete, or [`PublishError::Stage`] for the first stage
    /// that fails.
    pub fn publish(
        &self,
        request: &PublishRequest,
        progress: &mut dyn ProgressSink,
    ) -> Result<PublishReport, PublishError> {
        let plan = PublishPlan::prepare(request, &self.layout)?;
        self.execute(&plan, progress)
    }

    /// Run every stage of an already validated plan.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::FolderTaken`] or [`PublishError::UniquenessCheck`]
    /// when the uniqueness check is enabled and fails, and
    /// [`PublishError::Stage`] for the first stage that fails.
    pub fn execute(
        &self,
        plan: &PublishPlan,
        progress: &mut dyn ProgressSink,
    ) -> Result<PublishReport, PublishError> {
        let synchronizer = ManifestSynchronizer::new(&self.store, plan.manifest_path().to_owned());

        if self.options.require_unique_folder {
            let snapshot = synchronizer
                .load()
                .map_err(PublishError::UniquenessCheck)?;
            if snapshot.manifest.contains_folder(plan.folder()) {
                return Err(PublishError::FolderTaken {
                    folder: plan.folder().as_str().to_owned(),
                });
            }
        }

        info!(
            "Publishing \"{}\" into {}/{}",
            plan.entry().title,
            self.layout.root(),
            plan.folder()
        );

        let mut run = Run {
            board: StageBoard::new(),
            uploaded: Vec::new(),
            created: Vec::new(),
            progress,
        };

        for stage in [PublishStage::Images, PublishStage::Audio, PublishStage::Document] {
            run.stage(stage, |run| self.upload_stage(plan, stage, run))?;
        }
        let manifest_revision = run.stage(PublishStage::Manifest, |_| {
            synchronizer
                .append_with_retry(plan.entry(), self.options.manifest_attempts)
                .map_err(StageError::from)
        })?;

        info!("Published \"{}\"", plan.entry().title);
        Ok(PublishReport {
            folder: plan.folder().clone(),
            entry: plan.entry().clone(),
            uploaded: run.uploaded,
            manifest_revision,
            board: run.board,
        })
    }

    /// Upload the stage's files back to back. An existing file at the target
    /// path is overwritten at its current revision, so re-publishing the same
    /// folder updates files instead of failing.
    fn upload_stage(
        &self,
        plan: &PublishPlan,
        stage: PublishStage,
        run: &mut Run<'_>,
    ) -> Result<(), StageError> {
        for upload in plan.uploads_for(stage) {
            let content = encoding::encode_file(&upload.local)?;
            let revision = self.store.probe_revision(&upload.remote)?;
            if revision.is_some() {
                debug!("{} already exists, updating it", upload.remote);
            }

            let message = format!("Add {} of \"{}\"", upload.kind, plan.entry().title);
            self.store
                .put_file(&upload.remote, &content, revision.as_ref(), &message)?;

            if revision.is_none() {
                run.created.push(upload.remote.clone());
            }
            run.uploaded.push(upload.remote.clone());
            run.progress.file_uploaded(stage, &upload.remote);
        }
        Ok(())
    }
}

/// Mutable state of one publish run.
struct Run<'run> {
    board: StageBoard,
    uploaded: Vec<String>,
    /// Uploads that did not exist before this run.
    created: Vec<String>,
    progress: &'run mut dyn ProgressSink,
}

impl Run<'_> {
    fn stage<T, F>(&mut self, stage: PublishStage, work: F) -> Result<T, PublishError>
    where
        F: FnOnce(&mut Self) -> Result<T, StageError>,
    {
        let outcome = self
            .board
            .activate(stage)
            .map_err(StageError::from)
            .and_then(|()| {
                self.progress.stage_changed(stage, StageState::Active);
                work(self)
            });

        let failure = match outcome {
            Ok(value) => match self.board.complete(stage) {
                Ok(()) => {
                    self.progress.stage_changed(stage, StageState::Completed);
                    return Ok(value);
                }
                Err(e) => StageError::from(e),
            },
            Err(e) => e,
        };

        if self.board.fail(stage) {
            self.progress.stage_changed(stage, StageState::Failed);
        }
        debug!("{stage} stage failed: {failure}");
        if !self.created.is_empty() {
            warn!(
                "{} file(s) were uploaded but are not in the manifest: {}",
                self.created.len(),
                self.created.join(", ")
            );
        }

        Err(PublishError::Stage {
            stage,
            uploaded: std::mem::take(&mut self.uploaded),
            orphaned: std::mem::take(&mut self.created),
            source: failure,
        })
    }
}
