//! Tracing setup and the foreground server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use web2api_browser::{BrowserPool, ChromeLauncher, PoolSettings};
use web2api_config::{Config, ConfigLoader, LoggingConfig, SiteStore, StaticSiteStore};

use crate::pages::{PageProvider, PooledPages};
use crate::routes::{AppState, create_router};

/// Console logging, plus daily rolling files when `logging.dir` is set.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file_layer = match &logging.dir {
        Some(dir) => {
            let log_dir = PathBuf::from(ConfigLoader::expand_path(dir));
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("web2api")
                .filename_suffix("log")
                .max_log_files(14)
                .build(&log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes pending lines on exit.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Run the server until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting web2api v{}", env!("CARGO_PKG_VERSION"));

    let sites: Arc<dyn SiteStore> = Arc::new(StaticSiteStore::from_config(&config));
    info!("Loaded {} site(s): {}", sites.domains().len(), sites.domains().join(", "));

    let pool = Arc::new(BrowserPool::new(
        ChromeLauncher::new(config.browser.clone()),
        PoolSettings::from_config(&config.pool),
    ));
    let sweeper_token = CancellationToken::new();
    let sweeper = pool.spawn_sweeper(config.pool.sweep_interval(), sweeper_token.clone());

    let pages: Arc<dyn PageProvider> =
        Arc::new(PooledPages::new(pool.clone(), config.tabs.clone()));
    let state = Arc::new(AppState::new(&config, sites, pages));
    let app = create_router(state.clone());

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    sweeper_token.cancel();
    if let Err(e) = sweeper.await {
        warn!("Sweeper task ended abnormally: {}", e);
    }
    state.pages().shutdown().await;
    info!("Browsers closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
