use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::retry::{with_retry, with_retry_if, RetryConfig};

/// Errors crossing the retrieval boundary internally.
///
/// Callers outside this module never see these; `fetch` collapses every
/// failure into an absence signal.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("lyrics origin returned HTTP {0}")]
    Status(StatusCode),

    #[error("lyrics request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for the lyrics origin serving `GET {base}/lyrics/{id}`.
#[derive(Debug, Clone)]
pub struct LyricsSource {
    client: reqwest::Client,
    base_url: String,
}

impl LyricsSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .context("Failed to build lyrics HTTP client")?;

        Ok(Self {
            client,
            base_url: config.lyrics_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Test whether the lyrics origin is reachable (with retries).
    ///
    /// Any HTTP response counts as reachable; only transport failures fail
    /// the probe. The caller decides what to do with a dead origin (the
    /// server keeps running and serves empty lyric states).
    pub async fn probe(&self) -> bool {
        let result = with_retry(
            &RetryConfig::health_check(),
            "Lyrics origin probe",
            || async {
                self.client
                    .get(&self.base_url)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(SourceError::from)
            },
        )
        .await;

        result.is_ok()
    }

    /// Fetch raw lyric text for a song, or `None` when unavailable.
    ///
    /// Absence — a 404, a persistent server error, a dead network — never
    /// escapes as an error. The worst case downstream is an empty parse and
    /// an explicit "no lyrics" display state.
    pub async fn fetch(&self, song_id: &str) -> Option<String> {
        let result = with_retry_if(
            &RetryConfig::lyrics_fetch(),
            &format!("Lyrics @{}", song_id),
            || self.try_fetch(song_id),
            is_retryable_error,
        )
        .await;

        match result {
            Ok(text) => Some(text),
            Err(SourceError::Status(StatusCode::NOT_FOUND)) => {
                debug!("No lyrics published for '{}'", song_id);
                None
            }
            Err(e) => {
                warn!("Giving up on lyrics for '{}': {}", song_id, e);
                None
            }
        }
    }

    async fn try_fetch(&self, song_id: &str) -> Result<String, SourceError> {
        let url = format!("{}/lyrics/{}", self.base_url, song_id);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        Ok(response.text().await?)
    }
}

/// Retry 429 (rate limit), 5xx, and transport errors.
/// Other 4xx responses mean the lyrics are simply not there.
fn is_retryable_error(error: &SourceError) -> bool {
    match error {
        SourceError::Status(status) => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        SourceError::Transport(_) => true,
    }
}
