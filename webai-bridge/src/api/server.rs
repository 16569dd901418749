//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::config::ServerConfig;
use crate::context::OpContext;
use crate::error::Result;
use crate::logging::LoggingConfig;
use crate::session::SessionClient;
use crate::translator::RequestTranslator;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: crate::config::DEFAULT_BIND_ADDRESS.to_string(),
            port: crate::config::DEFAULT_PORT,
            enable_cors: true,
        }
    }
}

impl From<&ServerConfig> for ApiServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub client: Arc<SessionClient>,
    pub translator: Arc<RequestTranslator>,
    /// Reloadable log filter
    pub logging: Arc<LoggingConfig>,
    /// Deadline given to each request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        translator: Arc<RequestTranslator>,
        logging: Arc<LoggingConfig>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            client: Arc::clone(translator.client()),
            translator,
            logging,
            request_timeout,
        }
    }

    /// Context for one request, expiring after `request_timeout`.
    pub fn request_context(&self) -> OpContext {
        OpContext::with_timeout(self.request_timeout)
    }
}

fn is_health_path(req: &Request) -> bool {
    req.uri().path().starts_with("/health")
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Serve until the cancel token fires, then drain open connections.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::ApiError(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::error::Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

/// Router with CORS and request tracing. Health probes are not traced.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let mut router = routes::create_router(state);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request| {
                if is_health_path(req) {
                    Span::none()
                } else {
                    let mut make_span =
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                    use tower_http::trace::MakeSpan;
                    make_span.make_span(req)
                }
            })
            .on_request(|req: &Request, span: &Span| {
                if span.is_disabled() || is_health_path(req) {
                    return;
                }
                let mut on_request =
                    tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                use tower_http::trace::OnRequest;
                on_request.on_request(req, span);
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let on_response =
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnResponse;
                    on_response.on_response(res, latency, span);
                },
            ),
    )
}
