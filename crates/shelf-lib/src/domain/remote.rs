use log::debug;
use std::fmt;
use thiserror::Error;

use crate::encoding::EncodedContent;

/// Content hash the remote store assigns to a stored file version.
///
/// Supplying it on overwrite lets the store reject the write when someone
/// else changed the file in between. Never cache it across publishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionTag(pub String);

impl RevisionTag {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RevisionTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RevisionTag {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A file as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: EncodedContent,
    pub revision: RevisionTag,
}

/// Errors surfaced by a [`ContentStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Nothing is stored at the path. Callers treat this as "no prior revision".
    #[error("{path} does not exist on the remote store")]
    NotFound { path: String },

    /// The revision tag sent with a write is stale, or missing for an existing file.
    #[error("{path} was changed on the remote store: {message}")]
    Conflict { path: String, message: String },

    /// Any other non-success response.
    #[error("remote store returned status {status}: {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response.
    #[error("request for {path} failed: {reason}")]
    Transport { path: String, reason: String },

    /// The response arrived but could not be understood.
    #[error("unexpected response for {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Trait for reading and writing files on the remote content store
pub trait ContentStore {
    /// Fetch the file at `path` with its current revision tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no file exists at `path`, or any
    /// other [`StoreError`] when the request fails.
    fn fetch_file(&self, path: &str) -> Result<RemoteFile, StoreError>;

    /// Create or overwrite the file at `path` and return its new revision tag.
    ///
    /// Without `revision` the file is created. With it, the store only
    /// accepts the write if `revision` is still the file's current tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the tag is stale (or missing for
    /// an existing file). The store is never retried here.
    fn put_file(
        &self,
        path: &str,
        content: &EncodedContent,
        revision: Option<&RevisionTag>,
        message: &str,
    ) -> Result<RevisionTag, StoreError>;

    /// Current revision of `path`, or `None` when nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns any [`StoreError`] other than [`StoreError::NotFound`].
    fn probe_revision(&self, path: &str) -> Result<Option<RevisionTag>, StoreError> {
        match self.fetch_file(path) {
            Ok(file) => {
                debug!("{path} exists at revision {}", file.revision);
                Ok(Some(file.revision))
            }
            Err(StoreError::NotFound { .. }) => {
                debug!("{path} does not exist yet");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: ContentStore + ?Sized> ContentStore for &T {
    fn fetch_file(&self, path: &str) -> Result<RemoteFile, StoreError> {
        (**self).fetch_file(path)
    }

    fn put_file(
        &self,
        path: &str,
        content: &EncodedContent,
        revision: Option<&RevisionTag>,
        message: &str,
    ) -> Result<RevisionTag, StoreError> {
        (**self).put_file(path, content, revision, message)
    }

    fn probe_revision(&self, path: &str) -> Result<Option<RevisionTag>, StoreError> {
        (**self).probe_revision(path)
    }
}
