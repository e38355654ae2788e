use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use super::{BookEntry, Folder};

/// The catalog document read by the browsing UI: `{ "books": [...] }`.
///
/// Books are kept in publication order. Top-level keys other than `books`
/// are preserved so that a whole-document overwrite does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    books: Vec<BookEntry>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Manifest {
    #[must_use]
    pub fn new(books: Vec<BookEntry>) -> Self {
        Self {
            books,
            extra: Map::new(),
        }
    }

    /// Parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns the parser error if `bytes` is not a JSON object with a `books`
    /// array of entries. A missing `books` key is an error, not an empty catalog.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize with four-space indentation and a trailing newline.
    /// Non-ASCII text is written as-is.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; in practice only unrepresentable values fail.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(out)
    }

    /// Append a book. No deduplication, no sorting.
    pub fn append(&mut self, entry: BookEntry) {
        self.books.push(entry);
    }

    #[must_use]
    pub fn books(&self) -> &[BookEntry] {
        &self.books
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Whether a published book already uses `folder`.
    #[must_use]
    pub fn contains_folder(&self, folder: &Folder) -> bool {
        self.books.iter().any(|b| b.folder == folder.as_str())
    }
}
