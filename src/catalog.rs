use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A song catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Stable identifier, used as the lookup key and in navigable state
    pub id: String,
    /// Display name
    pub title: String,
}

/// The static list of songs known to the viewer.
///
/// Invariant: a catalog always holds at least one song, so there is always a
/// default to fall back to when navigation carries an unknown identifier.
#[derive(Debug, Clone)]
pub struct Catalog {
    songs: Vec<Song>,
}

impl Catalog {
    /// Built-in catalog used when no catalog file is configured.
    pub fn builtin() -> Self {
        Catalog {
            songs: vec![
                Song {
                    id: "hanayuki".to_string(),
                    title: "花雪".to_string(),
                },
                Song {
                    id: "masterpiece".to_string(),
                    title: "M@STERPIECE".to_string(),
                },
                Song {
                    id: "contrast".to_string(),
                    title: "Contrast".to_string(),
                },
            ],
        }
    }

    /// Load a catalog from a JSON file holding an array of `{id, title}`
    /// objects.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;

        let songs: Vec<Song> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        if songs.is_empty() {
            anyhow::bail!("Catalog file {} contains no songs", path.display());
        }

        Ok(Catalog { songs })
    }

    /// All songs, in catalog order.
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Look up a song by identifier.
    pub fn find(&self, id: &str) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    /// The first catalog entry, used as the fallback for unknown
    /// identifiers and as the song shown on startup.
    pub fn default_song(&self) -> &Song {
        self.songs.first().expect("Catalog should never be empty")
    }

    /// Resolve a URL-fragment-like address (optional leading `#`) to a song.
    ///
    /// Unknown or empty fragments resolve to `None`; the caller falls back
    /// to `default_song` rather than treating this as an error.
    pub fn resolve_fragment(&self, fragment: &str) -> Option<&Song> {
        let id = fragment.strip_prefix('#').unwrap_or(fragment);
        if id.is_empty() {
            return None;
        }
        self.find(id)
    }
}
