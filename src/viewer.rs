use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::catalog::{Catalog, Song};
use crate::lang::Tag;
use crate::parser::{parse, Row};
use crate::selector::{available_tags, select_display, DisplayLine};
use crate::source::LyricsSource;

/// A song's parsed rows plus the per-tag availability derived from them.
///
/// Availability is computed once, when the rows are first parsed; it never
/// depends on the current selection.
#[derive(Debug)]
pub struct ParsedSong {
    rows: Vec<Row>,
    available: BTreeSet<Tag>,
}

impl ParsedSong {
    fn from_text(raw: &str) -> Self {
        let rows = parse(raw);
        let available = available_tags(&rows);
        ParsedSong { rows, available }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Whether the song carries any non-blank content for the tag.
    pub fn available(&self, tag: Tag) -> bool {
        self.available.contains(&tag)
    }

    pub fn available_tags(&self) -> &BTreeSet<Tag> {
        &self.available
    }
}

/// What the surrounding UI should render right now.
///
/// The four states are deliberately distinct: "nothing selected", "still
/// fetching", "loaded but nothing to show for this selection", and actual
/// content must not be conflated on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    /// No song selected
    NoSong,
    /// The current song's lyrics are still being fetched
    Loading { id: String, title: String },
    /// Loaded, but no row is displayable for the current selection
    NoContent {
        id: String,
        title: String,
        available: Vec<Tag>,
        enabled: Vec<Tag>,
    },
    /// Displayable rows, already selected and ordered
    Lines {
        id: String,
        title: String,
        available: Vec<Tag>,
        enabled: Vec<Tag>,
        lines: Vec<DisplayLine>,
    },
}

/// Result of a song selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// The selection is still current; here is its view
    Displayed(ViewState),
    /// The fetch resolved after the session had moved to another song.
    /// The parse was cached for later but nothing was displayed.
    Superseded,
}

/// Per-song parse cache with single-flight fetches.
///
/// Each song id owns one async cell: concurrent selections of the same song
/// share one in-flight fetch, and completed parses are reused for the rest
/// of the session. Unbounded by design; the catalog is small.
#[derive(Default)]
struct SongCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<ParsedSong>>>>>,
}

impl SongCache {
    async fn cell(&self, id: &str) -> Arc<OnceCell<Arc<ParsedSong>>> {
        let mut entries = self.entries.lock().await;
        entries.entry(id.to_string()).or_default().clone()
    }

    /// Completed parse for a song, if any. Never triggers a fetch.
    async fn get(&self, id: &str) -> Option<Arc<ParsedSong>> {
        let entries = self.entries.lock().await;
        entries.get(id).and_then(|cell| cell.get().cloned())
    }
}

/// Session-scoped selection state: the current song and the enabled tags.
/// Mutated only by explicit selection and toggle calls.
#[derive(Debug)]
struct Session {
    current: Option<String>,
    enabled: BTreeSet<Tag>,
}

/// The viewing session: catalog, retrieval, cache, and selection state.
///
/// Parser and selector stay pure; this type owns the only mutable state in
/// the system and the only asynchronous edge (lyrics retrieval).
pub struct Viewer {
    catalog: Catalog,
    source: LyricsSource,
    cache: SongCache,
    session: Mutex<Session>,
}

impl Viewer {
    pub fn new(catalog: Catalog, source: LyricsSource, default_languages: BTreeSet<Tag>) -> Self {
        Viewer {
            catalog,
            source,
            cache: SongCache::default(),
            session: Mutex::new(Session {
                current: None,
                enabled: default_languages,
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The song id currently selected, if any.
    pub async fn current_song_id(&self) -> Option<String> {
        self.session.lock().await.current.clone()
    }

    /// The currently enabled languages.
    pub async fn enabled_languages(&self) -> BTreeSet<Tag> {
        self.session.lock().await.enabled.clone()
    }

    /// Select a song by identifier and return what to display.
    ///
    /// Accepts a plain id or a URL-fragment-like address (leading `#`).
    /// Unknown identifiers fall back to the default (first) catalog entry
    /// rather than erroring. Re-selecting the current song short-circuits
    /// before any fetch. A fetch that resolves after the session has moved
    /// to another song reports `Superseded`: its parse is cached, but it
    /// must not overwrite what the user is looking at.
    pub async fn select_song(&self, id: &str) -> SelectOutcome {
        let song = match self.catalog.resolve_fragment(id) {
            Some(song) => song.clone(),
            None => {
                let fallback = self.catalog.default_song().clone();
                debug!("Unknown song id '{}', falling back to '{}'", id, fallback.id);
                fallback
            }
        };

        {
            let mut session = self.session.lock().await;
            if session.current.as_deref() == Some(song.id.as_str()) {
                drop(session);
                return SelectOutcome::Displayed(self.current_view().await);
            }
            session.current = Some(song.id.clone());
        }

        info!("Selected song '{}' ({})", song.id, song.title);

        // Fetch and parse through the per-song cell: a second selection of
        // the same song, before or after completion, reuses this result
        let cell = self.cache.cell(&song.id).await;
        let parsed = cell
            .get_or_init(|| async {
                let text = self.source.fetch(&song.id).await;
                Arc::new(ParsedSong::from_text(text.as_deref().unwrap_or("")))
            })
            .await
            .clone();

        // Relevance check: selection may have moved on while the fetch was
        // in flight
        let session = self.session.lock().await;
        if session.current.as_deref() != Some(song.id.as_str()) {
            debug!("Lyrics for '{}' resolved after selection moved on", song.id);
            return SelectOutcome::Superseded;
        }

        SelectOutcome::Displayed(view_of(&song, &session.enabled, &parsed))
    }

    /// Enable or disable a language and return the refreshed view.
    ///
    /// Synchronous with respect to retrieval: toggling never fetches, it
    /// only recomputes the displayed sequence. The catch-all `all` is not a
    /// toggleable language and is ignored here.
    pub async fn set_language(&self, tag: Tag, enabled: bool) -> ViewState {
        if !tag.is_language() {
            debug!("Ignoring toggle for non-language tag '{}'", tag);
            return self.current_view().await;
        }

        {
            let mut session = self.session.lock().await;
            if enabled {
                session.enabled.insert(tag);
            } else {
                session.enabled.remove(&tag);
            }
        }

        self.current_view().await
    }

    /// Compute the current view without changing any state.
    pub async fn current_view(&self) -> ViewState {
        let session = self.session.lock().await;

        let Some(id) = session.current.clone() else {
            return ViewState::NoSong;
        };
        let Some(song) = self.catalog.find(&id).cloned() else {
            return ViewState::NoSong;
        };

        match self.cache.get(&id).await {
            Some(parsed) => view_of(&song, &session.enabled, &parsed),
            None => ViewState::Loading {
                id: song.id,
                title: song.title,
            },
        }
    }
}

fn view_of(song: &Song, enabled: &BTreeSet<Tag>, parsed: &ParsedSong) -> ViewState {
    let lines = select_display(parsed.rows(), enabled, &Tag::LANGUAGES);

    let available: Vec<Tag> = parsed.available_tags().iter().copied().collect();
    let enabled: Vec<Tag> = enabled.iter().copied().collect();

    if lines.is_empty() {
        ViewState::NoContent {
            id: song.id.clone(),
            title: song.title.clone(),
            available,
            enabled,
        }
    } else {
        ViewState::Lines {
            id: song.id.clone(),
            title: song.title.clone(),
            available,
            enabled,
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HANAYUKI: &str = "[ja]花のように\n[romaji]Hana no you ni\n\n[ja]雪のように\n[all]Like snow";

    fn enabled(tags: &[Tag]) -> BTreeSet<Tag> {
        tags.iter().copied().collect()
    }

    async fn viewer_against(mock_server: &MockServer, languages: &[Tag]) -> Viewer {
        let config = Config {
            lyrics_base_url: mock_server.uri(),
            fetch_timeout_secs: 5,
            catalog_file: None,
            default_languages: enabled(languages),
            port: 8080,
        };
        let source = LyricsSource::new(&config).unwrap();
        Viewer::new(Catalog::builtin(), source, config.default_languages)
    }

    async fn mount_lyrics(mock_server: &MockServer, id: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/lyrics/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(mock_server)
            .await;
    }

    fn displayed(outcome: SelectOutcome) -> ViewState {
        match outcome {
            SelectOutcome::Displayed(view) => view,
            SelectOutcome::Superseded => panic!("selection was superseded"),
        }
    }

    // ==================== Selection Tests ====================

    #[tokio::test]
    async fn test_select_song_displays_lines() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "hanayuki", HANAYUKI).await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja, Tag::Romaji]).await;
        let view = displayed(viewer.select_song("hanayuki").await);

        match view {
            ViewState::Lines {
                id,
                title,
                available,
                lines,
                ..
            } => {
                assert_eq!(id, "hanayuki");
                assert_eq!(title, "花雪");
                assert_eq!(available, vec![Tag::Ja, Tag::Romaji]);
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].cells.len(), 2);
                // Second row falls back nowhere: ja matched directly
                assert_eq!(lines[1].cells[0].tag, Tag::Ja);
            }
            other => panic!("expected lines, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_select_unknown_id_falls_back_to_default() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "hanayuki", HANAYUKI).await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        let view = displayed(viewer.select_song("no-such-song").await);

        match view {
            ViewState::Lines { id, .. } => assert_eq!(id, "hanayuki"),
            other => panic!("expected default song lines, got {:?}", other),
        }
        assert_eq!(viewer.current_song_id().await.as_deref(), Some("hanayuki"));
    }

    #[tokio::test]
    async fn test_select_accepts_fragment_address() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "contrast", "[ja]コントラスト").await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        let view = displayed(viewer.select_song("#contrast").await);

        match view {
            ViewState::Lines { id, .. } => assert_eq!(id, "contrast"),
            other => panic!("expected contrast lines, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reselect_current_song_is_noop() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lyrics/hanayuki"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HANAYUKI))
            .expect(1)
            .mount(&mock_server)
            .await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        let first = displayed(viewer.select_song("hanayuki").await);
        let second = displayed(viewer.select_song("hanayuki").await);

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_returning_to_song_reuses_cached_parse() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lyrics/hanayuki"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HANAYUKI))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_lyrics(&mock_server, "contrast", "[zh]对比").await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja, Tag::Zh]).await;
        displayed(viewer.select_song("hanayuki").await);
        displayed(viewer.select_song("contrast").await);

        // Back to the first song: served from cache, origin hit only once
        let view = displayed(viewer.select_song("hanayuki").await);
        assert!(matches!(view, ViewState::Lines { .. }));
    }

    // ==================== Failure Degradation Tests ====================

    #[tokio::test]
    async fn test_missing_lyrics_degrade_to_no_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lyrics/hanayuki"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        let view = displayed(viewer.select_song("hanayuki").await);

        match view {
            ViewState::NoContent { available, .. } => assert!(available.is_empty()),
            other => panic!("expected no-content, got {:?}", other),
        }
    }

    // ==================== Toggle Tests ====================

    #[tokio::test]
    async fn test_toggle_recomputes_view() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "hanayuki", HANAYUKI).await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        displayed(viewer.select_song("hanayuki").await);

        // Disable the only enabled language: everything drops, including
        // the [all] fallback
        let view = viewer.set_language(Tag::Ja, false).await;
        assert!(matches!(view, ViewState::NoContent { .. }));

        // Re-enable: content comes back without another fetch
        let view = viewer.set_language(Tag::Ja, true).await;
        assert!(matches!(view, ViewState::Lines { .. }));
    }

    #[tokio::test]
    async fn test_toggle_all_is_ignored() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "hanayuki", HANAYUKI).await;

        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;
        displayed(viewer.select_song("hanayuki").await);

        viewer.set_language(Tag::All, true).await;
        assert!(!viewer.enabled_languages().await.contains(&Tag::All));
    }

    #[tokio::test]
    async fn test_fallback_applies_after_toggle() {
        let mock_server = MockServer::start().await;
        mount_lyrics(&mock_server, "hanayuki", HANAYUKI).await;

        let viewer = viewer_against(&mock_server, &[Tag::Romaji]).await;
        let view = displayed(viewer.select_song("hanayuki").await);

        match view {
            ViewState::Lines { lines, .. } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].cells[0].tag, Tag::Romaji);
                // Second row has no romaji: the [all] entry stands in
                assert_eq!(lines[1].cells[0].tag, Tag::All);
                assert_eq!(lines[1].cells[0].text, "Like snow");
            }
            other => panic!("expected lines, got {:?}", other),
        }
    }

    // ==================== View State Tests ====================

    #[tokio::test]
    async fn test_view_without_selection_is_no_song() {
        let mock_server = MockServer::start().await;
        let viewer = viewer_against(&mock_server, &[Tag::Ja]).await;

        assert_eq!(viewer.current_view().await, ViewState::NoSong);
    }

    #[tokio::test]
    async fn test_view_reports_loading_while_fetch_in_flight() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lyrics/hanayuki"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(HANAYUKI)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let viewer = Arc::new(viewer_against(&mock_server, &[Tag::Ja]).await);

        let select = {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.select_song("hanayuki").await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        match viewer.current_view().await {
            ViewState::Loading { id, .. } => assert_eq!(id, "hanayuki"),
            other => panic!("expected loading, got {:?}", other),
        }

        let outcome = select.await.unwrap();
        assert!(matches!(outcome, SelectOutcome::Displayed(_)));
    }

    // ==================== Stale Fetch Race Tests ====================

    #[tokio::test]
    async fn test_stale_fetch_is_superseded_but_cached() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lyrics/hanayuki"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(HANAYUKI)
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_lyrics(&mock_server, "contrast", "[ja]コントラスト").await;

        let viewer = Arc::new(viewer_against(&mock_server, &[Tag::Ja]).await);

        // Start loading the slow song, then move on before it resolves
        let slow = {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.select_song("hanayuki").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let fast = displayed(viewer.select_song("contrast").await);
        match &fast {
            ViewState::Lines { id, .. } => assert_eq!(id, "contrast"),
            other => panic!("expected contrast lines, got {:?}", other),
        }

        // The slow fetch must not overwrite the current display
        assert_eq!(slow.await.unwrap(), SelectOutcome::Superseded);
        assert_eq!(viewer.current_song_id().await.as_deref(), Some("contrast"));

        // The superseded parse was still cached: going back is instant and
        // does not hit the origin a second time
        let back = displayed(viewer.select_song("hanayuki").await);
        assert!(matches!(back, ViewState::Lines { .. }));
    }
}
