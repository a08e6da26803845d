//! Playlist link book
//!
//! Loaded from a JSON file shaped like `{"youtube": {"lofi": "https://..."}}`.
//! Names are matched case-insensitively.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Default, Deserialize)]
struct LinksFile {
    #[serde(default)]
    youtube: HashMap<String, String>,
}

/// Named playlist URLs
#[derive(Debug, Clone, Default)]
pub struct PlaylistBook {
    playlists: HashMap<String, String>,
}

impl PlaylistBook {
    /// Build from `(name, url)` pairs
    #[must_use]
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            playlists: entries
                .into_iter()
                .map(|(name, url)| (normalize(name.as_ref()), url.into()))
                .collect(),
        }
    }

    /// Parse a links file body
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(content: &str) -> Result<Self> {
        let file: LinksFile = serde_json::from_str(content)?;
        Ok(Self::new(file.youtube))
    }

    /// Load a links file; a missing file yields an empty book
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "links file not found, no playlists available");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let book = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), playlists = book.len(), "loaded playlist links");
        Ok(book)
    }

    /// Look up a playlist URL by spoken name
    #[must_use]
    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.playlists.get(&normalize(name)).map(String::as_str)
    }

    /// Number of known playlists
    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// Whether no playlists are known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let book = PlaylistBook::from_json(
            r#"{"youtube": {"Lazy Lamhe": "https://youtube.com/playlist?list=abc"}}"#,
        )
        .unwrap();

        assert_eq!(
            book.url_for("lazy lamhe"),
            Some("https://youtube.com/playlist?list=abc")
        );
        assert_eq!(book.url_for("  LAZY LAMHE "), book.url_for("lazy lamhe"));
        assert_eq!(book.url_for("workout"), None);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let book = PlaylistBook::from_json("{}").unwrap();
        assert!(book.is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let book = PlaylistBook::load(Path::new("/no/such/links.json")).unwrap();
        assert!(book.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, r#"{"youtube": {"focus": "https://example.com/focus"}}"#).unwrap();

        let book = PlaylistBook::load(&path).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.url_for("Focus"), Some("https://example.com/focus"));
    }
}
