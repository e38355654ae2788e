mod common;

use common::{Call, MemoryStore};
use serde_json::{Map, Value};
use shelf_lib::domain::{BookEntry, Manifest, ManifestSynchronizer, RevisionTag, SyncError};

const MANIFEST: &str = "Contents/manifest.json";

fn entry(title: &str) -> BookEntry {
    BookEntry {
        folder: title.replace(' ', "_"),
        title: title.to_owned(),
        description: format!("About {title}"),
        cover: "cover.jpg".to_owned(),
        infographic: Some("infographic.png".to_owned()),
        audio_persian: Some("persian.mp3".to_owned()),
        audio_english: None,
        pdf: "book.pdf".to_owned(),
        extra: Map::new(),
    }
}

fn stored_manifest(store: &MemoryStore) -> Manifest {
    Manifest::from_json(&store.file(MANIFEST).unwrap()).unwrap()
}

fn titles(manifest: &Manifest) -> Vec<&str> {
    manifest.books().iter().map(|b| b.title.as_str()).collect()
}

#[test]
fn missing_manifest_is_created_with_one_book_and_no_revision() {
    let store = MemoryStore::new();
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    sync.append_entry(&entry("Dune")).unwrap();

    assert_eq!(
        store.calls(),
        vec![
            Call::Fetch(MANIFEST.to_owned()),
            Call::Put {
                path: MANIFEST.to_owned(),
                revision: None
            },
        ]
    );
    let manifest = stored_manifest(&store);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.books()[0], entry("Dune"));
}

#[test]
fn existing_manifest_is_extended_with_its_revision() {
    let store = MemoryStore::new();
    let existing = Manifest::new(vec![entry("Dune"), entry("Emma"), entry("Ulysses")]);
    let revision = store.insert(MANIFEST, &existing.to_json().unwrap());
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let new_revision = sync.append_entry(&entry("Beloved")).unwrap();

    assert_eq!(
        store.puts(),
        vec![(MANIFEST.to_owned(), Some(revision.as_str().to_owned()))]
    );
    assert_ne!(new_revision, revision);
    let manifest = stored_manifest(&store);
    assert_eq!(titles(&manifest), ["Dune", "Emma", "Ulysses", "Beloved"]);
}

#[test]
fn written_manifest_is_pretty_printed() {
    let store = MemoryStore::new();
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    sync.append_entry(&entry("Dune")).unwrap();

    let text = String::from_utf8(store.file(MANIFEST).unwrap()).unwrap();
    assert!(text.starts_with("{\n    \"books\": ["));
    assert!(text.contains("\"audioEnglish\": null"));
}

#[test]
fn unparseable_manifest_is_corrupt_and_not_overwritten() {
    let store = MemoryStore::new();
    store.insert(MANIFEST, b"{\"books\": [ oops");
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let err = sync.append_entry(&entry("Dune")).unwrap_err();

    assert!(matches!(err, SyncError::Corrupt { .. }));
    assert!(store.puts().is_empty());
    assert_eq!(store.file(MANIFEST).unwrap(), b"{\"books\": [ oops");
}

#[test]
fn manifest_without_books_key_is_corrupt_and_not_repaired() {
    let store = MemoryStore::new();
    let original: &[u8] = br#"{"catalog": [{"title": "Dune"}]}"#;
    store.insert(MANIFEST, original);
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let err = sync.append_with_retry(&entry("Emma"), 3).unwrap_err();

    assert!(matches!(err, SyncError::Corrupt { .. }));
    assert!(store.puts().is_empty());
    assert_eq!(store.file(MANIFEST).unwrap(), original);
}

#[test]
fn concurrent_write_surfaces_as_conflict() {
    let store = MemoryStore::new();
    store.insert(MANIFEST, &Manifest::new(vec![entry("Dune")]).to_json().unwrap());
    let theirs = Manifest::new(vec![entry("Dune"), entry("Emma")]);
    store.race_next_put(MANIFEST, &theirs.to_json().unwrap());
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let err = sync.append_entry(&entry("Beloved")).unwrap_err();

    assert!(err.is_conflict());
    // the other publisher's write survives
    assert_eq!(titles(&stored_manifest(&store)), ["Dune", "Emma"]);
}

#[test]
fn retry_rereads_and_keeps_the_concurrent_entry() {
    let store = MemoryStore::new();
    store.insert(MANIFEST, &Manifest::new(vec![entry("Dune")]).to_json().unwrap());
    let theirs = Manifest::new(vec![entry("Dune"), entry("Emma")]);
    store.race_next_put(MANIFEST, &theirs.to_json().unwrap());
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    sync.append_with_retry(&entry("Beloved"), 3).unwrap();

    assert_eq!(titles(&stored_manifest(&store)), ["Dune", "Emma", "Beloved"]);
    assert_eq!(store.puts().len(), 2);
}

#[test]
fn retry_gives_up_after_the_attempt_budget() {
    let store = MemoryStore::new();
    let racing = Manifest::new(vec![entry("Emma")]).to_json().unwrap();
    for _ in 0..3 {
        store.race_next_put(MANIFEST, &racing);
    }
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let err = sync.append_with_retry(&entry("Beloved"), 2).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(store.puts().len(), 2);
}

#[test]
fn zero_attempts_still_tries_once() {
    let store = MemoryStore::new();
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let revision: RevisionTag = sync.append_with_retry(&entry("Dune"), 0).unwrap();

    assert_eq!(store.revision(MANIFEST), Some(revision));
}

#[test]
fn non_conflict_failures_are_not_retried() {
    let store = MemoryStore::new();
    store.fail_puts_under("Contents/", 500);
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    let err = sync.append_with_retry(&entry("Dune"), 5).unwrap_err();

    assert!(matches!(err, SyncError::Store { .. }));
    assert_eq!(store.puts().len(), 1);
}

#[test]
fn load_keeps_unknown_keys_for_the_write_back() {
    let store = MemoryStore::new();
    store.insert(MANIFEST, br#"{"books": [], "theme": "dark"}"#);
    let sync = ManifestSynchronizer::new(&store, MANIFEST.to_owned());

    sync.append_entry(&entry("Dune")).unwrap();

    let written: Value = serde_json::from_slice(&store.file(MANIFEST).unwrap()).unwrap();
    assert_eq!(written["theme"], "dark");
}
