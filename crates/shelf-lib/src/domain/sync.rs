use log::{debug, info, warn};
use thiserror::Error;

use super::{BookEntry, ContentStore, Manifest, RevisionTag, StoreError};
use crate::encoding::{EncodedContent, EncodingError};

/// Errors that can occur while reading or updating the manifest
#[derive(Debug, Error)]
pub enum SyncError {
    /// Someone else wrote the manifest between our read and our write.
    /// Retrying the manifest update is safe.
    #[error("manifest {path} was changed by another publish; retry the manifest update")]
    Conflict {
        path: String,
        #[source]
        source: StoreError,
    },

    /// The stored manifest is not a catalog document. Needs manual repair.
    #[error("manifest {path} is not a valid catalog document")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stored manifest could not be decoded from its transport encoding.
    #[error("manifest {path} could not be decoded")]
    Undecodable {
        path: String,
        #[source]
        source: EncodingError,
    },

    #[error("failed to serialize manifest")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to access manifest {path}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Whether retrying the read-modify-write may succeed.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A manifest as read from the store, with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSnapshot {
    pub manifest: Manifest,
    /// `None` when the manifest does not exist yet.
    pub revision: Option<RevisionTag>,
}

/// Read-modify-write of the shared manifest.
///
/// There is no lock: every write carries the revision observed by the read,
/// and the store rejects it if the manifest moved in between. Concurrent
/// publishers are separate processes, so a local lock would protect nothing.
pub struct ManifestSynchronizer<S: ContentStore> {
    store: S,
    path: String,
}

impl<S: ContentStore> ManifestSynchronizer<S> {
    #[must_use]
    pub fn new(store: S, path: String) -> Self {
        Self { store, path }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch and parse the manifest. A missing manifest reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Corrupt`] or [`SyncError::Undecodable`] if the stored
    /// document cannot be parsed, [`SyncError::Store`] if the fetch fails.
    pub fn load(&self) -> Result<ManifestSnapshot, SyncError> {
        let file = match self.store.fetch_file(&self.path) {
            Ok(file) => file,
            Err(StoreError::NotFound { .. }) => {
                debug!("{} does not exist, starting from an empty manifest", self.path);
                return Ok(ManifestSnapshot {
                    manifest: Manifest::default(),
                    revision: None,
                });
            }
            Err(source) => {
                return Err(SyncError::Store {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let bytes = file
            .content
            .decode()
            .map_err(|source| SyncError::Undecodable {
                path: self.path.clone(),
                source,
            })?;
        let manifest = Manifest::from_json(&bytes).map_err(|source| SyncError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        debug!(
            "Read {} with {} book(s) at revision {}",
            self.path,
            manifest.len(),
            file.revision
        );
        Ok(ManifestSnapshot {
            manifest,
            revision: Some(file.revision),
        })
    }

    /// Append `entry` and write the whole manifest back, tagged with the
    /// revision that was read. Returns the manifest's new revision.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Conflict`] if the manifest changed since it was read,
    /// [`SyncError::Corrupt`] if the stored manifest cannot be parsed, or
    /// [`SyncError::Store`] for any other store failure.
    pub fn append_entry(&self, entry: &BookEntry) -> Result<RevisionTag, SyncError> {
        let ManifestSnapshot {
            mut manifest,
            revision,
        } = self.load()?;

        manifest.append(entry.clone());
        let bytes = manifest.to_json().map_err(SyncError::Serialize)?;
        let content = EncodedContent::from_bytes(&bytes);
        let message = format!("Add \"{}\" to the catalog", entry.title);

        match self
            .store
            .put_file(&self.path, &content, revision.as_ref(), &message)
        {
            Ok(new_revision) => {
                info!(
                    "Added \"{}\" to {} ({} book(s))",
                    entry.title,
                    self.path,
                    manifest.len()
                );
                Ok(new_revision)
            }
            Err(source @ StoreError::Conflict { .. }) => Err(SyncError::Conflict {
                path: self.path.clone(),
                source,
            }),
            Err(source) => Err(SyncError::Store {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// [`Self::append_entry`], repeated on conflict up to `attempts` times in
    /// total. Each attempt re-reads the manifest. `attempts` below 1 counts as 1.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error, or the first non-conflict error.
    pub fn append_with_retry(
        &self,
        entry: &BookEntry,
        attempts: u32,
    ) -> Result<RevisionTag, SyncError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.append_entry(entry) {
                Err(e) if e.is_conflict() && attempt < attempts => {
                    warn!(
                        "{} changed during update (attempt {attempt}/{attempts}), retrying",
                        self.path
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
