use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::Song;
use crate::config::Config;
use crate::lang::Tag;
use crate::viewer::{SelectOutcome, ViewState, Viewer};

/// Shared handler state
#[derive(Clone)]
struct AppState {
    viewer: Arc<Viewer>,
}

/// Build the API router. Stands in for the UI shell: everything a frontend
/// needs to render the song list, the language toggles, and the lyrics.
pub fn router(viewer: Arc<Viewer>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/songs", get(list_songs))
        .route("/api/songs/:id", get(show_song))
        .route("/api/languages", get(list_languages).post(toggle_language))
        .route("/api/view", get(current_view))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { viewer })
}

/// Bind and serve until shutdown.
pub async fn run(config: &Config, viewer: Arc<Viewer>) -> Result<()> {
    let app = router(viewer);
    let addr = format!("0.0.0.0:{}", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✓ Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct SongsResponse {
    songs: Vec<Song>,
    current: Option<String>,
}

async fn list_songs(State(state): State<AppState>) -> Json<SongsResponse> {
    Json(SongsResponse {
        songs: state.viewer.catalog().songs().to_vec(),
        current: state.viewer.current_song_id().await,
    })
}

/// Select a song (idempotent) and return its view. Unknown ids fall back to
/// the default song; this endpoint never 404s.
async fn show_song(State(state): State<AppState>, Path(id): Path<String>) -> Json<ViewState> {
    match state.viewer.select_song(&id).await {
        SelectOutcome::Displayed(view) => Json(view),
        // The session moved to another song while this fetch was in
        // flight; answer with whatever is current now
        SelectOutcome::Superseded => Json(state.viewer.current_view().await),
    }
}

#[derive(Debug, Serialize)]
struct LanguageEntry {
    code: &'static str,
    label: &'static str,
    enabled: bool,
}

async fn list_languages(State(state): State<AppState>) -> Json<Vec<LanguageEntry>> {
    let enabled = state.viewer.enabled_languages().await;

    Json(
        Tag::LANGUAGES
            .iter()
            .map(|&tag| LanguageEntry {
                code: tag.code(),
                label: tag.label(),
                enabled: enabled.contains(&tag),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    tag: String,
    enabled: bool,
}

/// Toggle a language selection. The tag must be a canonical language code;
/// aliases and the catch-all `all` are rejected, unlike in lyric files where
/// leniency is the point.
async fn toggle_language(
    State(state): State<AppState>,
    Json(request): Json<ToggleRequest>,
) -> std::result::Result<Json<ViewState>, (StatusCode, String)> {
    let tag = Tag::from_code(&request.tag)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    if !tag.is_language() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "'all' is a fallback, not a toggleable language".to_string(),
        ));
    }

    Ok(Json(state.viewer.set_language(tag, request.enabled).await))
}

async fn current_view(State(state): State<AppState>) -> Json<ViewState> {
    Json(state.viewer.current_view().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::source::LyricsSource;
    use std::collections::BTreeSet;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_state(mock_server: &MockServer) -> AppState {
        let config = Config {
            lyrics_base_url: mock_server.uri(),
            fetch_timeout_secs: 5,
            catalog_file: None,
            default_languages: [Tag::Ja, Tag::Romaji, Tag::Zh].into_iter().collect(),
            port: 0,
        };
        let source = LyricsSource::new(&config).unwrap();
        AppState {
            viewer: Arc::new(Viewer::new(
                Catalog::builtin(),
                source,
                config.default_languages,
            )),
        }
    }

    // ==================== Handler Tests ====================

    #[tokio::test]
    async fn test_healthz() {
        assert_eq!(healthz().await, "ok");
    }

    #[tokio::test]
    async fn test_list_songs_includes_catalog_and_current() {
        let mock_server = MockServer::start().await;
        let state = test_state(&mock_server).await;

        let Json(response) = list_songs(State(state.clone())).await;
        assert_eq!(response.songs.len(), 3);
        assert_eq!(response.current, None);
    }

    #[tokio::test]
    async fn test_show_song_returns_view() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/lyrics/hanayuki"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[ja]花"))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let Json(view) = show_song(State(state), Path("hanayuki".to_string())).await;

        assert!(matches!(view, ViewState::Lines { .. }));
    }

    #[tokio::test]
    async fn test_list_languages_reflects_enabled_set() {
        let mock_server = MockServer::start().await;
        let state = test_state(&mock_server).await;

        let Json(languages) = list_languages(State(state)).await;

        assert_eq!(languages.len(), 4);
        let zh_jp = languages.iter().find(|l| l.code == "zh-jp").unwrap();
        assert!(!zh_jp.enabled);
        let ja = languages.iter().find(|l| l.code == "ja").unwrap();
        assert!(ja.enabled);
    }

    #[tokio::test]
    async fn test_toggle_language_rejects_unknown_code() {
        let mock_server = MockServer::start().await;
        let state = test_state(&mock_server).await;

        let result = toggle_language(
            State(state),
            Json(ToggleRequest {
                tag: "klingon".to_string(),
                enabled: true,
            }),
        )
        .await;

        let (status, _) = result.err().expect("should be rejected");
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_toggle_language_rejects_all() {
        let mock_server = MockServer::start().await;
        let state = test_state(&mock_server).await;

        let result = toggle_language(
            State(state),
            Json(ToggleRequest {
                tag: "all".to_string(),
                enabled: true,
            }),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_toggle_language_updates_view() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/lyrics/hanayuki"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[zh-jp]只有中文日语语序"))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        show_song(State(state.clone()), Path("hanayuki".to_string())).await;

        let Json(view) = toggle_language(
            State(state),
            Json(ToggleRequest {
                tag: "zh-jp".to_string(),
                enabled: true,
            }),
        )
        .await
        .expect("valid toggle");

        match view {
            ViewState::Lines { lines, .. } => {
                assert_eq!(lines[0].cells[0].tag, Tag::ZhJp);
            }
            other => panic!("expected lines, got {:?}", other),
        }
    }
}
