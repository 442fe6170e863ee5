//! Harvester - automatic music acquisition service

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester::cli::Command;
use harvester::config::Config;
use harvester::db::Database;
use harvester::indexer::{HtmlTableIndexer, Indexer};
use harvester::jobs::{self, AcquisitionJob, CompletionPoller};
use harvester::media::LibraryPlacer;
use harvester::services::{
    Catalog, FileReconciler, MusicBrainzCatalog, QBittorrentClient, QueueOutcome,
    RateLimitedClient, TorrentClient,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "harvester=info".into());
    let pretty = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Command::from_args()?;
    let config = Config::from_env()?;

    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !config.database_path.starts_with("sqlite:") && !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let db = Database::connect(&config.database_url()).await?;
    tracing::info!(path = %config.database_path, "Database connected");

    let catalog = Arc::new(MusicBrainzCatalog::new(
        db.clone(),
        &config.musicbrainz_base_url,
        &config.musicbrainz_user_agent,
    )?);

    match command {
        Command::Run => run(config, db, catalog).await,
        Command::Queue(release_id) => {
            match catalog.queue_release(release_id).await? {
                QueueOutcome::Queued => println!("queued {}", release_id),
                QueueOutcome::AlreadyQueued => println!("{} is already queued", release_id),
                QueueOutcome::AlreadyInLibrary => println!("{} is already in the library", release_id),
            }
            Ok(())
        }
        Command::Failed => {
            for failed in db.failed().list().await? {
                println!(
                    "{}\t{}\t{} - {}",
                    failed.release_id,
                    failed.failed_at.to_rfc3339(),
                    failed.artist,
                    failed.title
                );
            }
            Ok(())
        }
        Command::Reset(release_id) => {
            if db.failed().reset(release_id).await? {
                println!("{} will be retried on the next acquisition cycle", release_id);
            } else {
                println!("{} is not marked failed", release_id);
            }
            Ok(())
        }
    }
}

async fn run(config: Config, db: Database, catalog: Arc<MusicBrainzCatalog>) -> Result<()> {
    tracing::info!("Starting Harvester");

    tokio::fs::create_dir_all(&config.library_path).await?;
    tokio::fs::create_dir_all(&config.downloads_path).await?;

    let client: Arc<dyn TorrentClient> = Arc::new(QBittorrentClient::new(
        &config.qbittorrent_url,
        &config.qbittorrent_user,
        &config.qbittorrent_password,
    )?);
    if let Err(e) = client.login().await {
        tracing::warn!(error = %e, "qBittorrent login failed, will retry on first use");
    }

    let acquisition = match &config.indexer_base_url {
        Some(base_url) => {
            let indexer: Arc<dyn Indexer> = Arc::new(HtmlTableIndexer::new(
                RateLimitedClient::for_indexer()?,
                base_url.clone(),
                config.indexer_parameters.clone(),
                config.indexer_retry_parameters.clone(),
            ));
            Some(AcquisitionJob::new(
                db.clone(),
                indexer,
                client.clone(),
                config.thresholds,
                config.downloads_path.clone(),
                config.torrent_max_concurrent,
            ))
        }
        None => None,
    };

    let catalog: Arc<dyn Catalog> = catalog;
    let poller = CompletionPoller::new(
        db.clone(),
        client,
        catalog.clone(),
        FileReconciler::new(catalog, config.thresholds),
        LibraryPlacer::new(config.library_path.clone()),
    );

    let cancel = CancellationToken::new();
    let handles = jobs::start(
        acquisition,
        poller,
        config.acquisition_interval,
        config.poll_interval,
        cancel,
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handles.shutdown().await;

    db.pool().close().await;
    Ok(())
}
