use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use anisong_lyrics::catalog::Catalog;
use anisong_lyrics::config::Config;
use anisong_lyrics::server;
use anisong_lyrics::source::LyricsSource;
use anisong_lyrics::viewer::Viewer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("anisong_lyrics=info".parse()?),
        )
        .init();

    info!("Starting anisong lyrics service");

    // Load configuration from environment
    let config = Config::from_env()?;

    let catalog = match &config.catalog_file {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::builtin(),
    };
    info!("Loaded catalog with {} songs", catalog.songs().len());

    let source = LyricsSource::new(&config)?;

    info!("Testing lyrics origin: {}", config.lyrics_base_url);
    if source.probe().await {
        info!("✓ Lyrics origin is reachable");
    } else {
        warn!(
            "Lyrics origin {} is not responding; songs will display as having no lyrics until it returns",
            config.lyrics_base_url
        );
    }

    let viewer = Arc::new(Viewer::new(
        catalog,
        source,
        config.default_languages.clone(),
    ));

    // Show the default song on startup, like a fresh page load with no
    // fragment in the address
    let default_id = viewer.catalog().default_song().id.clone();
    let _ = viewer.select_song(&default_id).await;

    server::run(&config, viewer).await
}
