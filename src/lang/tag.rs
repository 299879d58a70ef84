//! Tag type: the canonical language identifier attached to lyric lines.
//!
//! `Tag` is the only language representation used downstream of the parser;
//! every alternate spelling in a lyric file is resolved to one of these
//! variants at parse time via the registry.

use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::lang::TagRegistry;

/// A canonical lyric tag.
///
/// The four language variants identify real language tracks; `All` is the
/// catch-all used as a per-row fallback when no selected language has
/// content. Variant order matches the fixed on-screen display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "romaji")]
    Romaji,
    #[serde(rename = "zh")]
    Zh,
    #[serde(rename = "zh-jp")]
    ZhJp,
    #[serde(rename = "all")]
    All,
}

impl Tag {
    /// Language tags in display order: left-to-right on-screen ordering of
    /// stacked variants. `All` is deliberately absent; it is never toggled,
    /// only substituted as a fallback.
    pub const LANGUAGES: [Tag; 4] = [Tag::Ja, Tag::Romaji, Tag::Zh, Tag::ZhJp];

    /// Resolve a hand-written alias (any case, surrounding whitespace
    /// ignored) to its canonical tag.
    ///
    /// # Returns
    /// * `Some(Tag)` for a recognized alias (e.g. "JPN", " roma ", "*")
    /// * `None` for anything else
    pub fn from_alias(alias: &str) -> Option<Tag> {
        TagRegistry::get().resolve_alias(alias)
    }

    /// Create a Tag from its canonical code, strictly.
    ///
    /// Unlike `from_alias`, this accepts only the exact canonical spelling.
    /// It is the entry point for API input, where a typo should be rejected
    /// rather than silently dropped.
    ///
    /// # Returns
    /// * `Ok(Tag)` if the code is a canonical tag code
    /// * `Err` otherwise
    pub fn from_code(code: &str) -> Result<Tag> {
        match TagRegistry::get().get_by_code(code) {
            Some(config) => Ok(config.tag),
            None => bail!("Unknown tag code: '{}'", code),
        }
    }

    /// The canonical code (e.g. "ja", "zh-jp").
    pub fn code(&self) -> &'static str {
        TagRegistry::get().config(*self).code
    }

    /// The native display label for this tag's toggle.
    pub fn label(&self) -> &'static str {
        TagRegistry::get().config(*self).label
    }

    /// Whether this tag is a real language track (everything except `All`).
    pub fn is_language(&self) -> bool {
        !matches!(self, Tag::All)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
