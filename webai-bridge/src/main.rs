use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use webai_bridge::api::{ApiServer, ApiServerConfig, AppState};
use webai_bridge::config::AppConfig;
use webai_bridge::context::OpContext;
use webai_bridge::credentials::CredentialStore;
use webai_bridge::logging::init_logging;
use webai_bridge::scheduler::{RefreshScheduler, TokioClock};
use webai_bridge::session::SessionClient;
use webai_bridge::translator::RequestTranslator;
use webai_bridge::upstream::GeminiUpstream;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;

    let (logging, _guard) = init_logging(config.server.log_dir.as_deref())
        .context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = ?config.source,
        credentials = ?config.credentials.masked(),
        "Starting webai-bridge"
    );

    let request_timeout = config.server.request_timeout;
    let shutdown_grace = config.server.shutdown_grace;

    let upstream = GeminiUpstream::with_timeout(request_timeout)
        .context("failed to build upstream HTTP client")?;

    let store = Arc::new(CredentialStore::new(config.credentials.clone()));
    let client = Arc::new(SessionClient::new(Arc::new(upstream), Arc::clone(&store)));

    // Not fatal: the scheduler or a SIGHUP reload can still establish one.
    match client.init(&OpContext::with_timeout(request_timeout)).await {
        Ok(()) => info!("Upstream session ready"),
        Err(e) => warn!(error = %e, "Initial handshake failed, starting without a session"),
    }

    let scheduler = Arc::new(RefreshScheduler::new(
        Arc::clone(&client),
        Arc::new(TokioClock),
        request_timeout,
    ));
    scheduler.start();

    let translator = Arc::new(RequestTranslator::new(Arc::clone(&client)));
    let state = AppState::new(translator, logging, request_timeout);
    let server = ApiServer::new(ApiServerConfig::from(&config.server), state);
    let cancel_token = server.cancel_token();

    let reload_task = spawn_reload_handler(Arc::clone(&client), request_timeout);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel_token.cancel();
    });

    let served = server.run().await;
    if let Err(e) = &served {
        error!(error = %e, "API server failed");
    }

    info!("Shutting down");
    if let Some(task) = reload_task {
        task.abort();
    }
    scheduler.shutdown(shutdown_grace).await;
    client.shutdown(shutdown_grace).await;
    info!("Shutdown complete");

    served.context("API server failed")
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl-C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}

/// Reload the configuration on SIGHUP, replace the stored credentials and
/// refresh right away.
#[cfg(unix)]
fn spawn_reload_handler(
    client: Arc<SessionClient>,
    timeout: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to register SIGHUP handler");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading configuration");
            let config = match AppConfig::load() {
                Ok(config) => config,
                Err(e) => {
                    error!(error = %e, "Configuration reload failed");
                    continue;
                }
            };

            // Keep a rotated token the file does not know about yet.
            let current = client.store().get();
            let mut credentials = config.credentials;
            if credentials.identity_token() == current.identity_token()
                && credentials.timestamp_token() == current.timestamp_token()
            {
                credentials = credentials.with_rotation_token(current.rotation_token());
            }

            if !client.store().replace(credentials) {
                info!("Credentials unchanged");
            }

            match client.refresh(&OpContext::with_timeout(timeout)).await {
                Ok(outcome) => info!(
                    rotated = outcome.rotated,
                    status = %outcome.status,
                    "Refresh after reload finished"
                ),
                Err(e) => warn!(error = %e, "Refresh after reload failed"),
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_reload_handler(
    _client: Arc<SessionClient>,
    _timeout: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    None
}
