#![allow(dead_code, reason = "each test binary uses a different subset of these helpers")]

use shelf_lib::domain::{ContentStore, RemoteFile, RevisionTag, StoreError};
use shelf_lib::encoding::EncodedContent;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// A request the store received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(String),
    Put {
        path: String,
        revision: Option<String>,
    },
}

/// In-memory content store that behaves like the Github contents API:
/// a write must carry the current revision of an existing file.
#[derive(Default)]
pub struct MemoryStore {
    files: RefCell<BTreeMap<String, (Vec<u8>, RevisionTag)>>,
    next_revision: Cell<u32>,
    calls: RefCell<Vec<Call>>,
    failing_puts: RefCell<Vec<(String, u16)>>,
    concurrent_writes: RefCell<BTreeMap<String, VecDeque<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without recording a call.
    pub fn insert(&self, path: &str, bytes: &[u8]) -> RevisionTag {
        let revision = self.bump();
        self.files
            .borrow_mut()
            .insert(path.to_owned(), (bytes.to_vec(), revision.clone()));
        revision
    }

    /// Every put under `prefix` answers with `status`.
    pub fn fail_puts_under(&self, prefix: &str, status: u16) {
        self.failing_puts
            .borrow_mut()
            .push((prefix.to_owned(), status));
    }

    /// Before each of our next puts to `path`, another publisher writes
    /// `bytes` there first.
    pub fn race_next_put(&self, path: &str, bytes: &[u8]) {
        self.concurrent_writes
            .borrow_mut()
            .entry(path.to_owned())
            .or_default()
            .push_back(bytes.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).map(|(bytes, _)| bytes.clone())
    }

    pub fn revision(&self, path: &str) -> Option<RevisionTag> {
        self.files.borrow().get(path).map(|(_, rev)| rev.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Paths written, with the revision each put carried.
    pub fn puts(&self) -> Vec<(String, Option<String>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Put { path, revision } => Some((path.clone(), revision.clone())),
                Call::Fetch(_) => None,
            })
            .collect()
    }

    pub fn touched(&self, fragment: &str) -> bool {
        self.calls.borrow().iter().any(|call| match call {
            Call::Fetch(path) | Call::Put { path, .. } => path.contains(fragment),
        })
    }

    fn bump(&self) -> RevisionTag {
        let n = self.next_revision.get() + 1;
        self.next_revision.set(n);
        RevisionTag::from(format!("rev{n}"))
    }
}

impl ContentStore for MemoryStore {
    fn fetch_file(&self, path: &str) -> Result<RemoteFile, StoreError> {
        self.calls.borrow_mut().push(Call::Fetch(path.to_owned()));
        self.files
            .borrow()
            .get(path)
            .map(|(bytes, revision)| RemoteFile {
                content: EncodedContent::from_bytes(bytes),
                revision: revision.clone(),
            })
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_owned(),
            })
    }

    fn put_file(
        &self,
        path: &str,
        content: &EncodedContent,
        revision: Option<&RevisionTag>,
        _message: &str,
    ) -> Result<RevisionTag, StoreError> {
        self.calls.borrow_mut().push(Call::Put {
            path: path.to_owned(),
            revision: revision.map(|r| r.as_str().to_owned()),
        });

        if let Some((_, status)) = self
            .failing_puts
            .borrow()
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Remote {
                status: *status,
                message: "injected failure".to_owned(),
            });
        }

        let racing = self
            .concurrent_writes
            .borrow_mut()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        if let Some(bytes) = racing {
            self.insert(path, &bytes);
        }

        let current = self.revision(path);
        if current.as_ref() != revision {
            return Err(StoreError::Conflict {
                path: path.to_owned(),
                message: format!(
                    "expected {:?}, got {:?}",
                    current.map(|r| r.0),
                    revision.map(RevisionTag::as_str)
                ),
            });
        }

        let bytes = content.decode().map_err(|e| StoreError::InvalidResponse {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(self.insert(path, &bytes))
    }
}

/// Local files for a complete book, created inside `dir`.
pub struct BookFixture {
    pub cover: PathBuf,
    pub infographic: PathBuf,
    pub audio_persian: PathBuf,
    pub audio_english: PathBuf,
    pub pdf: PathBuf,
}

impl BookFixture {
    pub fn create(dir: &Path) -> Self {
        let write = |name: &str, bytes: &[u8]| {
            let path = dir.join(name);
            fs::write(&path, bytes).unwrap();
            path
        };
        Self {
            cover: write("cover.jpg", b"\xFF\xD8cover"),
            infographic: write("infographic.png", b"\x89PNGinfo"),
            audio_persian: write("persian.mp3", b"ID3fa"),
            audio_english: write("english.mp3", b"ID3en"),
            pdf: write("book.pdf", b"%PDF-1.7"),
        }
    }
}
