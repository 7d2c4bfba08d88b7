//! trackr: follows a location feed and caches public Flickr photos taken
//! near each fix.
//!
//! While tracking is on, every delivered fix triggers a radius search whose
//! results land in a local SQLite cache, deduplicated by photo id. The
//! on/off flag is persisted so an interrupted session resumes on the next
//! run.

#![warn(clippy::all)]

mod cli;
mod config;
mod location;
mod search;
mod shutdown;
mod store;
#[cfg(test)]
mod testing;
mod tracking;
mod types;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::{Config, TrackConfig};
use location::{Ingestor, LocationPipeline, RouteReplay};
use search::PhotoSearchClient;
use store::{PhotoStore, SqlitePhotoStore};
use tracking::{TrackingController, TrackingStateStore};

/// Run the track command until the route ends or a signal arrives.
async fn run_track(config: &Config, args: cli::TrackArgs) -> anyhow::Result<()> {
    let track = TrackConfig::from_args(args)?;
    tracing::debug!(?track, "Track configuration");

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let store = Arc::new(SqlitePhotoStore::open(&config.photos_db()).await?);
    let flag = Arc::new(TrackingStateStore::open(&config.preferences_db()).await?);
    tracing::info!(path = %store.path().display(), "Opened photo cache");

    let shutdown_token = shutdown::install_signal_handler()?;

    let search = Arc::new(PhotoSearchClient::new(
        track.api_base_url.clone(),
        track.api_key.clone(),
    )?);
    let replay = Arc::new(RouteReplay::load(&track.route, track.replay_interval));
    let route_finished = replay.route_finished();
    let ingestor = Arc::new(Ingestor::new(search, store.clone()).with_radius(track.radius_km));
    tracing::info!(radius_km = ingestor.radius_km(), "Searching around each fix");
    let pipeline = Arc::new(LocationPipeline::new(replay.clone(), ingestor));
    let controller = TrackingController::new(flag, replay, Arc::clone(&pipeline));

    let mut grant_needed = controller.grant_needed();
    let mut enable_needed = controller.enable_needed();
    let watcher = tokio::spawn(log_cache_updates(store.clone()));

    controller.start();
    controller.flush().await;

    if !controller.is_tracking() {
        watcher.abort();
        if grant_needed.try_recv().is_ok() {
            anyhow::bail!("Cannot read route file {}", track.route.display());
        }
        if enable_needed.try_recv().is_ok() {
            anyhow::bail!("Route file {} has no fixes", track.route.display());
        }
        anyhow::bail!("Location updates could not be started");
    }

    let mut state = controller.state();
    tokio::select! {
        _ = shutdown_token.cancelled() => {}
        _ = route_finished.cancelled() => {
            tracing::info!("End of route reached");
        }
        _ = state.wait_for(|tracking| !tracking) => {
            tracing::warn!("Tracking stopped unexpectedly");
        }
    }

    controller.stop();
    controller.flush().await;
    pipeline.drain().await;
    watcher.abort();

    let total = store.count().await?;
    tracing::info!(total, "Tracking stopped");
    Ok(())
}

/// Log every change of the cached photo set.
async fn log_cache_updates(store: Arc<SqlitePhotoStore>) {
    let mut live = store.query_all_live();
    while live.changed().await.is_ok() {
        let snapshot = live.borrow_and_update().clone();
        match snapshot.first() {
            Some(newest) => tracing::info!(
                total = snapshot.len(),
                newest = %newest.id,
                title = %newest.title,
                "Photo cache updated"
            ),
            None => tracing::info!("Photo cache cleared"),
        }
    }
}

/// Run the status command.
async fn run_status(config: &Config) -> anyhow::Result<()> {
    if !config.has_data() {
        println!("No data found in {}", config.data_dir.display());
        println!("Run `trackr track` first.");
        return Ok(());
    }

    let flag = TrackingStateStore::open(&config.preferences_db()).await?;
    let store = SqlitePhotoStore::open(&config.photos_db()).await?;
    let total = store.count().await?;
    let newest = store.newest_cached_at().await?;

    println!("Data directory: {}", config.data_dir.display());
    println!();
    println!(
        "Tracking:      {}",
        if flag.is_tracking() { "on" } else { "off" }
    );
    println!("Cached photos: {}", total);
    if let Some(newest) = newest {
        println!(
            "Last cached:   {}",
            newest.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}

/// Run the list command.
async fn run_list(config: &Config, args: cli::ListArgs) -> anyhow::Result<()> {
    if !config.photos_db().exists() {
        println!("No photo cache found at {}", config.photos_db().display());
        return Ok(());
    }

    let store = SqlitePhotoStore::open(&config.photos_db()).await?;
    let photos = store.get_all().await?;
    let limit = args.limit.unwrap_or(photos.len());

    for photo in photos.iter().take(limit) {
        let cached = photo
            .cached_at_utc()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let title: &str = if photo.title.is_empty() {
            "(untitled)"
        } else {
            &photo.title
        };
        println!(
            "{}  {:<12} {:>9.5},{:<10.5} {}",
            cached, photo.id, photo.latitude, photo.longitude, title
        );
        if photo.has_image() {
            println!("    {}", photo.image_url);
        }
    }
    if photos.len() > limit {
        println!("... and {} more", photos.len() - limit);
    }

    Ok(())
}

/// Run the clear command.
async fn run_clear(config: &Config, args: cli::ClearArgs) -> anyhow::Result<()> {
    if !config.photos_db().exists() {
        println!("No photo cache found at {}", config.photos_db().display());
        return Ok(());
    }

    let store = SqlitePhotoStore::open(&config.photos_db()).await?;
    let total = store.count().await?;

    if !args.yes {
        println!("This will delete {} cached photos from:", total);
        println!("  {}", config.photos_db().display());
        println!();
        print!("Are you sure? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = store.clear_all().await?;
    println!("Deleted {} cached photos.", removed);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(&cli);
    match cli.command {
        Command::Track(args) => run_track(&config, args).await,
        Command::Status => run_status(&config).await,
        Command::List(args) => run_list(&config, args).await,
        Command::Clear(args) => run_clear(&config, args).await,
    }
}
