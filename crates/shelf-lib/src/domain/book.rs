use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::PublishStage;

/// Remote directory name of a book, derived from its title.
///
/// The folder doubles as a path segment on the remote store, so it only ever
/// holds ASCII letters, digits and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Folder(String);

impl Folder {
    /// Derive a folder from a title.
    ///
    /// Characters other than ASCII letters, digits, `_` and whitespace are
    /// dropped, then every run of whitespace becomes a single `_`.
    ///
    /// # Examples
    ///
    /// - `"My Book: Part 2!"` -> `"My_Book_Part_2"`
    /// - `"a ! b"` -> `"a_b"`
    /// - `"My_Book"` -> `"My_Book"` (derivation is idempotent)
    #[must_use]
    pub fn derive(title: &str) -> Self {
        let mut folder = String::with_capacity(title.len());
        let mut pending_space = false;

        for c in title.chars() {
            if c.is_whitespace() {
                pending_space = true;
            } else if c.is_ascii_alphanumeric() || c == '_' {
                if pending_space {
                    folder.push('_');
                    pending_space = false;
                }
                folder.push(c);
            }
        }
        if pending_space {
            folder.push('_');
        }

        Self(folder)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A folder is usable when it names something: at least one letter or digit.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.0.chars().any(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The five files a book can carry, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Cover,
    Infographic,
    AudioPersian,
    AudioEnglish,
    Pdf,
}

impl AssetKind {
    pub const ALL: [Self; 5] = [
        Self::Cover,
        Self::Infographic,
        Self::AudioPersian,
        Self::AudioEnglish,
        Self::Pdf,
    ];

    /// Manifest key of this asset.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Infographic => "infographic",
            Self::AudioPersian => "audioPersian",
            Self::AudioEnglish => "audioEnglish",
            Self::Pdf => "pdf",
        }
    }

    /// Sub-directory of the book folder the asset is stored in.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Cover | Self::Infographic => "images",
            Self::AudioPersian | Self::AudioEnglish | Self::Pdf => "data",
        }
    }

    /// Publish stage that uploads this asset.
    #[must_use]
    pub const fn stage(self) -> PublishStage {
        match self {
            Self::Cover | Self::Infographic => PublishStage::Images,
            Self::AudioPersian | Self::AudioEnglish => PublishStage::Audio,
            Self::Pdf => PublishStage::Document,
        }
    }

    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::AudioEnglish)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.field())
    }
}

/// One book record in the manifest.
///
/// File fields hold base names; the browsing UI resolves them against
/// `<root>/<folder>/images` or `<root>/<folder>/data`. Keys this type does not
/// know about are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookEntry {
    pub folder: String,
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub cover: String,
    #[serde(default)]
    pub infographic: Option<String>,
    #[serde(default)]
    pub audio_persian: Option<String>,
    #[serde(default)]
    pub audio_english: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub pdf: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BookEntry {
    /// File name recorded for `kind`, if any.
    #[must_use]
    pub fn file_name(&self, kind: AssetKind) -> Option<&str> {
        let name = match kind {
            AssetKind::Cover => Some(self.cover.as_str()),
            AssetKind::Infographic => self.infographic.as_deref(),
            AssetKind::AudioPersian => self.audio_persian.as_deref(),
            AssetKind::AudioEnglish => self.audio_english.as_deref(),
            AssetKind::Pdf => Some(self.pdf.as_str()),
        };
        name.filter(|n| !n.is_empty())
    }

    /// Every asset this entry references, in upload order.
    #[must_use]
    pub fn assets(&self) -> Vec<(AssetKind, &str)> {
        AssetKind::ALL
            .into_iter()
            .filter_map(|kind| self.file_name(kind).map(|name| (kind, name)))
            .collect()
    }
}

/// Older manifests were written with `null` for files that were never uploaded.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_strips_punctuation_and_joins_words() {
        assert_eq!(Folder::derive("My Book: Part 2!").as_str(), "My_Book_Part_2");
    }

    #[test]
    fn derive_collapses_whitespace_runs() {
        assert_eq!(Folder::derive("The \t  Long\n\nRoad").as_str(), "The_Long_Road");
        assert_eq!(Folder::derive("a ! b").as_str(), "a_b");
    }

    #[test]
    fn derive_is_idempotent() {
        for title in [
            "My Book: Part 2!",
            "  padded title  ",
            "snake_case already",
            "Atomic Habits (2018)",
            "كتاب Book",
            "",
        ] {
            let once = Folder::derive(title);
            let twice = Folder::derive(once.as_str());
            assert_eq!(once, twice, "title: {title:?}");
        }
    }

    #[test]
    fn asset_kind_display_honors_width() {
        assert_eq!(format!("{:<13}|", AssetKind::Pdf), "pdf          |");
        assert_eq!(AssetKind::AudioPersian.to_string(), "audioPersian");
    }

    #[test]
    fn derive_drops_non_latin_characters() {
        let folder = Folder::derive("عادت‌های اتمی");
        assert!(!folder.is_usable());

        let mixed = Folder::derive("عادت Atomic Habits");
        assert_eq!(mixed.as_str(), "_Atomic_Habits");
        assert!(mixed.is_usable());
    }

    #[test]
    fn asset_kinds_map_to_layout_directories_and_stages() {
        assert_eq!(AssetKind::Cover.directory(), "images");
        assert_eq!(AssetKind::Infographic.directory(), "images");
        assert_eq!(AssetKind::AudioEnglish.directory(), "data");
        assert_eq!(AssetKind::Pdf.directory(), "data");
        assert_eq!(AssetKind::Infographic.stage(), PublishStage::Images);
        assert_eq!(AssetKind::AudioPersian.stage(), PublishStage::Audio);
        assert_eq!(AssetKind::Pdf.stage(), PublishStage::Document);
        assert!(!AssetKind::AudioEnglish.is_required());
    }

    #[test]
    fn entry_serializes_camel_case_with_null_for_missing_audio() {
        let entry = BookEntry {
            folder: "Dune".to_owned(),
            title: "Dune".to_owned(),
            description: "Spice".to_owned(),
            cover: "cover.jpg".to_owned(),
            infographic: Some("info.png".to_owned()),
            audio_persian: Some("fa.mp3".to_owned()),
            audio_english: None,
            pdf: "dune.pdf".to_owned(),
            extra: Map::new(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["audioPersian"], "fa.mp3");
        assert!(json["audioEnglish"].is_null());
        assert!(json.get("audio_english").is_none());
    }

    #[test]
    fn entry_keeps_unknown_keys_and_tolerates_nulls() {
        let json = r#"{
            "folder": "Dune",
            "title": "Dune",
            "description": null,
            "cover": "cover.jpg",
            "pdf": null,
            "featured": true
        }"#;

        let entry: BookEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.description, "");
        assert_eq!(entry.file_name(AssetKind::Pdf), None);
        assert_eq!(entry.extra.get("featured"), Some(&Value::Bool(true)));
        assert_eq!(entry.assets(), vec![(AssetKind::Cover, "cover.jpg")]);

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["featured"], true);
    }
}
