use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::lang::Tag;

#[derive(Debug, Clone)]
pub struct Config {
    // Lyrics origin
    pub lyrics_base_url: String,
    pub fetch_timeout_secs: u64,

    // Catalog
    pub catalog_file: Option<String>,

    // Display
    pub default_languages: BTreeSet<Tag>,

    // Server
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Lyrics origin serving GET {base}/lyrics/{id}
            lyrics_base_url: std::env::var("LYRICS_BASE_URL")
                .context("LYRICS_BASE_URL not set")?,
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            // Catalog
            catalog_file: std::env::var("CATALOG_FILE").ok(),

            // Display
            default_languages: match std::env::var("DEFAULT_LANGUAGES") {
                Ok(raw) => parse_language_list(&raw)?,
                Err(_) => [Tag::Ja, Tag::Romaji, Tag::Zh].into_iter().collect(),
            },

            // Server
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}

/// Parse a comma-separated list of canonical tag codes (e.g. "ja,romaji,zh")
fn parse_language_list(raw: &str) -> Result<BTreeSet<Tag>> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            let tag = Tag::from_code(code)
                .with_context(|| format!("DEFAULT_LANGUAGES entry '{}' is not a tag code", code))?;
            if !tag.is_language() {
                anyhow::bail!("DEFAULT_LANGUAGES cannot include the catch-all 'all'");
            }
            Ok(tag)
        })
        .collect()
}
