use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reuploader_core::{
    load_config, load_config_from_env, validate_config, AssetPlatform, BatchTracker, Config,
    CredentialStore, PlatformSession, PublishPipeline, RetryingTransport, RobloxPlatform, Session,
};
use reuploader_server::api::{create_router, handlers::VERSION};
use reuploader_server::state::AppState;

/// Config file read when `REUPLOADER_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Asset reuploader v{}", VERSION);

    let config = load_configuration()?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    // Credential file
    let store = CredentialStore::new(config.credentials.path.clone());
    if store
        .ensure_template()
        .with_context(|| format!("Failed to create {:?}", config.credentials.path))?
    {
        warn!(
            "Created {:?}; fill in ROBLOSECURITY_COOKIE before uploading",
            config.credentials.path
        );
    }

    // Platform client
    let transport =
        RetryingTransport::new(&config.transport).context("Failed to create HTTP client")?;
    let platform: Arc<dyn AssetPlatform> =
        Arc::new(RobloxPlatform::new(config.platform.clone(), transport));
    let session: Arc<dyn Session> = Arc::new(PlatformSession::new(store, Arc::clone(&platform)));

    // The credential is re-read for every batch, so a bad one here is not fatal
    log_signed_in_user(session.as_ref()).await;

    let pipeline = Arc::new(PublishPipeline::new(
        session,
        platform,
        &config.pipeline,
    ));
    info!(
        "Publishing up to {} assets at a time",
        pipeline.max_concurrent_jobs()
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(BatchTracker::new()),
        pipeline,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Load from `REUPLOADER_CONFIG` if set (the file must exist), otherwise from
/// `config.toml` when present, otherwise defaults plus environment.
fn load_configuration() -> Result<Config> {
    if let Ok(path) = std::env::var("REUPLOADER_CONFIG") {
        let path = PathBuf::from(path);
        info!("Loading configuration from {:?}", path);
        return load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
    } else {
        info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
        load_config_from_env().context("Failed to load config from environment")
    }
}

async fn log_signed_in_user(session: &dyn Session) {
    let credential = match session.credential().await {
        Ok(credential) => credential,
        Err(e) => {
            warn!("No usable credential yet: {}", e);
            return;
        }
    };

    match session.authenticated_user(&credential).await {
        Ok(user) => info!(
            user_id = user.id,
            "Signed in as {} ({})",
            user.display_name,
            user.name
        ),
        Err(e) => warn!("Could not verify credential: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
