use crate::domain::{AssetKind, ContentLayout, ContentStore, ManifestSynchronizer, SyncError};

/// A published book with its assets resolved to repository paths, the way
/// the browsing UI resolves them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedBook {
    pub title: String,
    pub folder: String,
    pub assets: Vec<(AssetKind, String)>,
}

/// Read the catalog. A missing manifest lists as empty.
///
/// # Errors
///
/// Returns [`SyncError`] if the manifest cannot be fetched or parsed.
pub fn run<S: ContentStore>(store: S, layout: &ContentLayout) -> Result<Vec<ListedBook>, SyncError> {
    let snapshot = ManifestSynchronizer::new(store, layout.manifest_path()).load()?;

    Ok(snapshot
        .manifest
        .books()
        .iter()
        .map(|book| ListedBook {
            title: book.title.clone(),
            folder: book.folder.clone(),
            assets: book
                .assets()
                .into_iter()
                .map(|(kind, name)| (kind, layout.asset_path_in(&book.folder, kind, name)))
                .collect(),
        })
        .collect())
}
