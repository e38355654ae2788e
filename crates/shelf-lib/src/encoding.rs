//! Base64 transport encoding for file content.
//!
//! Files are read and encoded whole. There is no streaming: the largest
//! file that can be published is bounded by available memory (roughly 2.3x
//! the file size while encoding). That is fine for covers, narration tracks
//! and PDFs; the remote contents API caps uploads well below that anyway.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when encoding or decoding file content
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("content is not valid base64")]
    Decode(#[source] base64::DecodeError),
}

/// Base64 text (standard alphabet, padded) of a whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent(String);

impl EncodedContent {
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Accept base64 as the remote store sends it. GitHub wraps the payload
    /// every 60 characters, so ASCII whitespace is removed.
    #[must_use]
    pub fn from_transport(text: &str) -> Self {
        Self(text.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Decode`] if the text is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, EncodingError> {
        STANDARD.decode(&self.0).map_err(EncodingError::Decode)
    }
}

/// Read a local file and encode it for upload.
///
/// # Errors
///
/// Returns [`EncodingError::Read`] if the file cannot be read.
pub fn encode_file(path: &Path) -> Result<EncodedContent, EncodingError> {
    let bytes = fs::read(path).map_err(|source| EncodingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(EncodedContent::from_bytes(&bytes))
}
