use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use polkasync::app::{self, AppState};
use polkasync::config::AppConfig;
use polkasync::db::preferences_repository::MongoPreferencesRepository;
use polkasync::db::repository::{MongoPostRepository, PostRepository};
use polkasync::indexer;
use polkasync::notifications::preferences::NotificationPreferencesService;
use polkasync::scheduler::{self, MaintenanceJobs};
use polkasync::search::client::{MeilisearchIndex, SearchIndex};
use polkasync::treasury::{self, HttpTreasuryClient, TreasuryStatsClient};

#[derive(Debug, Parser)]
#[command(name = "polkasync", version, about = "Governance search-index sync and maintenance service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and the maintenance scheduler (default).
    Serve,
    /// Resync the search index once and exit.
    SyncNetwork {
        /// Network to resync; all configured networks when omitted.
        network: Option<String>,
        /// Only posts updated at or after this RFC 3339 instant.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Refresh treasury stats of all networks once and exit.
    RefreshTreasury,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polkasync=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SyncNetwork { network, since } => sync_once(config, network, since).await,
        Command::RefreshTreasury => {
            let client = treasury_client(&config)?;
            let outcomes = treasury::refresh_all(client.as_ref(), &config.networks).await;
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            anyhow::ensure!(failed == 0, "{failed} treasury refreshes failed");
            Ok(())
        }
    }
}

async fn post_repository(config: &AppConfig) -> anyhow::Result<(mongodb::Database, Arc<dyn PostRepository>)> {
    let client = mongodb::Client::with_uri_str(&config.mongodb.uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let db = client.database(&config.mongodb.database);
    tracing::info!("Connected to MongoDB database {}", config.mongodb.database);

    let repo: Arc<dyn PostRepository> = Arc::new(MongoPostRepository::new(&db));
    Ok((db, repo))
}

async fn search_index(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn SearchIndex>>> {
    if !config.search_enabled() {
        tracing::warn!("search.url is empty; search indexing is disabled");
        return Ok(None);
    }

    let index = MeilisearchIndex::with_index(
        &config.search.url,
        config.search.api_key.clone(),
        &config.search.index_name,
    )?
    .with_task_timeout(Duration::from_secs(config.search.task_timeout_secs));
    if let Err(e) = index.configure_index().await {
        tracing::warn!("Failed to configure search index settings: {e}");
    }
    tracing::info!("Search index {} at {}", config.search.index_name, config.search.url);

    Ok(Some(Arc::new(index)))
}

fn treasury_client(config: &AppConfig) -> anyhow::Result<Arc<dyn TreasuryStatsClient>> {
    Ok(Arc::new(HttpTreasuryClient::new(
        &config.api.base_url,
        &config.api.api_key,
        Duration::from_secs(config.api.timeout_secs),
    )?))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting polkasync server...");

    let (db, post_repo) = post_repository(&config).await?;
    let search_index = search_index(&config).await?;
    let preferences = Arc::new(NotificationPreferencesService::new(Arc::new(
        MongoPreferencesRepository::new(&db),
    )));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = if config.scheduler.enabled {
        let jobs = MaintenanceJobs {
            post_repo: post_repo.clone(),
            search_index: search_index.clone(),
            treasury_client: treasury_client(&config)?,
            networks: config.networks.clone(),
            max_record_bytes: config.search.max_record_bytes,
            sync_concurrency: config.sync.concurrency,
        };
        Some(tokio::spawn(scheduler::run(
            jobs,
            config.scheduler.clone(),
            shutdown_rx,
        )))
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let state = AppState {
        post_repo,
        search_index,
        preferences,
        networks: Arc::new(config.networks.clone()),
        service_token: config.service_token.clone(),
        max_record_bytes: config.search.max_record_bytes,
        sync_concurrency: config.sync.concurrency,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app::router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        handle.await.context("Scheduler task panicked")?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let terminate = terminate_signal();
    wait_for_shutdown(tokio::signal::ctrl_c(), terminate).await;
}

/// Resolves on SIGTERM. The listener is installed when this is called.
#[cfg(unix)]
fn terminate_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let listener = signal(SignalKind::terminate());
    async move {
        match listener {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
fn terminate_signal() -> impl Future<Output = ()> {
    std::future::pending()
}

/// Wait for Ctrl+C or `terminate`. A Ctrl+C listener that fails to install
/// is logged and leaves only `terminate`.
async fn wait_for_shutdown(
    ctrl_c: impl Future<Output = std::io::Result<()>>,
    terminate: impl Future<Output = ()>,
) {
    let ctrl_c = async {
        if let Err(e) = ctrl_c.await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}

async fn sync_once(
    config: AppConfig,
    network: Option<String>,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let networks: Vec<String> = match network {
        Some(name) => {
            anyhow::ensure!(config.network(&name).is_some(), "Unknown network '{name}'");
            vec![name]
        }
        None => config.networks.iter().map(|n| n.name.clone()).collect(),
    };

    let (_db, post_repo) = post_repository(&config).await?;
    let index = search_index(&config)
        .await?
        .context("Search must be configured to resync the index")?;

    let results = indexer::sync_networks(
        post_repo.as_ref(),
        index.as_ref(),
        &networks,
        since,
        config.search.max_record_bytes,
        config.sync.concurrency,
    )
    .await;

    let mut failed = 0;
    for (network, result) in results {
        match result {
            Ok(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                failed += report.failures.len();
            }
            Err(e) => {
                eprintln!("{network}: {e}");
                failed += 1;
            }
        }
    }
    anyhow::ensure!(failed == 0, "{failed} sync failures");
    Ok(())
}
