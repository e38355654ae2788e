use std::path::PathBuf;
use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field or file was not supplied.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A supplied file does not exist or is not a regular file.
    #[error("{field} file not found: {}", path.display())]
    FileNotFound { field: &'static str, path: PathBuf },

    /// The file has no UTF-8 base name that can be used as a remote file name.
    #[error("{field} file has no usable name: {}", path.display())]
    UnusableFileName { field: &'static str, path: PathBuf },

    /// Two files of the same book would land on the same remote path.
    #[error("{first} and {second} would both be stored as {remote}")]
    DuplicateRemotePath {
        first: &'static str,
        second: &'static str,
        remote: String,
    },

    /// The title has no Latin letter or digit to build a folder name from.
    #[error("title \"{title}\" does not produce a usable folder name")]
    UnusableFolder { title: String },
}
