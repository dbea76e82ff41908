use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_merge::{
    config::Config,
    database::Database,
    merge::{
        MergeOrchestrator, MergeSchedule, MergeScheduler, MergeService, sync_configured_sources,
    },
    sources::StandardFetcher,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "iptv-merge")]
#[command(version)]
#[command(about = "Merges IPTV playlists and XMLTV guides into one playlist and one guide")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Serve the merged artifacts and keep them fresh (default)
    Serve {
        /// Listening port (overrides config file)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },
    /// Run one merge pass and exit
    Merge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("iptv_merge={},tower_http=trace", cli.log_level)
    } else {
        format!("iptv_merge={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IPTV Merge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let command = cli.command.unwrap_or(Command::Serve { port: None });
    if let Command::Serve { port: Some(port) } = command {
        config.web.port = port;
    }
    let config = Arc::new(config);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    sync_configured_sources(&config, &database).await?;

    let fetcher = Arc::new(StandardFetcher::new(&config.http, config.providers.clone())?);
    let orchestrator = MergeOrchestrator::new(config.clone(), &database, fetcher);
    let service = Arc::new(MergeService::new(
        orchestrator,
        &database,
        MergeSchedule::from_config(&config.merge),
    ));

    match command {
        Command::Merge => {
            let report = service.force_merge().await?;
            info!(
                "Merged {} channels from {} playlists and {} guides ({} failed)",
                report.channels,
                report.playlist_sources,
                report.guide_sources,
                report.failed_sources
            );
            Ok(())
        }
        Command::Serve { .. } => serve(config, database, service).await,
    }
}

async fn serve(config: Arc<Config>, database: Database, service: Arc<MergeService>) -> Result<()> {
    let cancellation_token = CancellationToken::new();

    let scheduler = MergeScheduler::new(
        service.clone(),
        config.merge.service_delay,
        config.merge.check_interval,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(cancellation_token.clone()));

    let web_server = WebServer::new(
        &config.web,
        AppState {
            merge: service,
            database,
        },
    )?;
    info!("Playlist: {}/playlist.m3u8", config.web.base_url.trim_end_matches('/'));
    info!("Guide: {}", config.guide_link());

    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    let result = web_server.serve(cancellation_token.clone()).await;
    cancellation_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Merge scheduler task failed: {}", e);
    }
    result
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => {
                        info!("Received SIGINT (Ctrl+C), shutting down gracefully")
                    }
                }
            }
            _ => {
                error!("Failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully");
        }
    }
}
