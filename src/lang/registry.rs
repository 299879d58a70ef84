//! Tag registry: single source of truth for recognized lyric tags.
//!
//! The registry owns the alias table described by the lyric file format:
//! many case-insensitive spellings map onto one canonical tag. It is built
//! once behind a `OnceLock` and is immutable for the life of the process.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::lang::Tag;

/// Configuration for a recognized lyric tag.
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// The canonical tag this entry describes
    pub tag: Tag,

    /// Canonical code, as written in lyric files and API payloads
    /// (e.g. "ja", "zh-jp")
    pub code: &'static str,

    /// Native display label for the language toggle in a surrounding UI
    pub label: &'static str,

    /// Accepted alternate spellings, matched case-insensitively after
    /// trimming. The canonical code is always one of them.
    pub aliases: &'static [&'static str],
}

/// Global tag registry singleton.
///
/// Provides alias resolution (the hot path of the parser) through a prebuilt
/// index so lookup is a single hash probe rather than a cascade of string
/// comparisons.
pub struct TagRegistry {
    configs: Vec<TagConfig>,
    alias_index: HashMap<&'static str, Tag>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<TagRegistry> = OnceLock::new();

impl TagRegistry {
    /// Get the global tag registry instance.
    ///
    /// Initializes the registry on first call and returns the singleton on
    /// subsequent calls.
    ///
    /// # Panics
    /// Panics if a tag config does not list its own canonical code among its
    /// aliases, or if two configs claim the same alias (both indicate a
    /// configuration error).
    pub fn get() -> &'static TagRegistry {
        REGISTRY.get_or_init(|| {
            let configs = default_tags();
            let mut alias_index = HashMap::new();

            for config in &configs {
                assert!(
                    config.aliases.contains(&config.code),
                    "Tag '{}' must list its own code among its aliases",
                    config.code
                );
                for alias in config.aliases {
                    let previous = alias_index.insert(*alias, config.tag);
                    assert!(
                        previous.is_none(),
                        "Alias '{}' is claimed by more than one tag",
                        alias
                    );
                }
            }

            TagRegistry {
                configs,
                alias_index,
            }
        })
    }

    /// Resolve a hand-written alias to its canonical tag.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    ///
    /// # Returns
    /// * `Some(Tag)` if the alias is recognized
    /// * `None` for anything else (the parser treats this as a structural
    ///   no-op, never an error)
    pub fn resolve_alias(&self, alias: &str) -> Option<Tag> {
        let needle = alias.trim().to_lowercase();
        self.alias_index.get(needle.as_str()).copied()
    }

    /// Get the configuration for a canonical tag.
    ///
    /// # Panics
    /// Panics if the tag has no registry entry. This cannot happen as long as
    /// `default_tags` covers every `Tag` variant.
    pub fn config(&self, tag: Tag) -> &TagConfig {
        self.configs
            .iter()
            .find(|config| config.tag == tag)
            .expect("Registry should cover every tag variant")
    }

    /// Get a tag configuration by its canonical code (exact match).
    ///
    /// Unlike `resolve_alias` this does not accept alternate spellings; it is
    /// the strict lookup used for API input.
    pub fn get_by_code(&self, code: &str) -> Option<&TagConfig> {
        self.configs.iter().find(|config| config.code == code)
    }

    /// All registry entries, in display order.
    pub fn list_all(&self) -> Vec<&TagConfig> {
        self.configs.iter().collect()
    }
}

/// Default tag configurations.
///
/// Order matters: language entries appear in the on-screen display order,
/// with the catch-all `all` last.
fn default_tags() -> Vec<TagConfig> {
    vec![
        TagConfig {
            tag: Tag::Ja,
            code: "ja",
            label: "日语",
            aliases: &["ja", "jp", "jpn"],
        },
        TagConfig {
            tag: Tag::Romaji,
            code: "romaji",
            label: "罗马音",
            aliases: &["romaji", "roma", "rom"],
        },
        TagConfig {
            tag: Tag::Zh,
            code: "zh",
            label: "中文",
            aliases: &["zh", "cn", "chs", "cht", "zhs"],
        },
        TagConfig {
            tag: Tag::ZhJp,
            code: "zh-jp",
            label: "中文（日语语序）",
            aliases: &["zh-jp", "zhjp", "zhjpn"],
        },
        TagConfig {
            tag: Tag::All,
            code: "all",
            label: "通用",
            aliases: &["all", "any", "*"],
        },
    ]
}
