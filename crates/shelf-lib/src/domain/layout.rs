use super::{AssetKind, Folder};

pub const DEFAULT_CONTENT_ROOT: &str = "Contents";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Where things live inside the content repository.
///
/// ```text
/// <root>/manifest.json
/// <root>/<folder>/images/{cover,infographic}
/// <root>/<folder>/data/{audioPersian,audioEnglish,pdf}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    root: String,
}

impl ContentLayout {
    /// Create a layout rooted at `root`. Surrounding slashes are ignored and
    /// an empty root falls back to [`DEFAULT_CONTENT_ROOT`].
    #[must_use]
    pub fn new(root: &str) -> Self {
        let trimmed = root.trim().trim_matches('/');
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self {
                root: trimmed.to_owned(),
            }
        }
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn manifest_path(&self) -> String {
        format!("{}/{MANIFEST_FILE_NAME}", self.root)
    }

    /// Repository-relative path of an asset file.
    #[must_use]
    pub fn asset_path(&self, folder: &Folder, kind: AssetKind, file_name: &str) -> String {
        self.asset_path_in(folder.as_str(), kind, file_name)
    }

    /// Same as [`Self::asset_path`] for a folder read back from the manifest,
    /// which is not re-derived.
    #[must_use]
    pub fn asset_path_in(&self, folder: &str, kind: AssetKind, file_name: &str) -> String {
        format!("{}/{folder}/{}/{file_name}", self.root, kind.directory())
    }
}

impl Default for ContentLayout {
    fn default() -> Self {
        Self {
            root: DEFAULT_CONTENT_ROOT.to_owned(),
        }
    }
}
