pub mod api;
pub mod certs;
pub mod cli;
pub mod config;
pub mod metrics;
pub mod tracing;

use ::tracing::{info, warn};
use admission_validators::{CronJobValidator, Decoder, PodValidator, Validator};
use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::{self, TraceLayer};

use crate::api::{
    handlers::{readiness_handler, validate_handler},
    state::ApiServerState,
};
use crate::config::{Config, Webhook};

/// Time given to in-flight requests to complete once a shutdown is requested
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookServer {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
}

impl WebhookServer {
    pub async fn new_from_config(config: Config) -> Result<Self> {
        // Every webhook receives its own handle to the decoder at construction time
        let decoder = Decoder::new();
        let validators: Vec<Box<dyn Validator>> = config
            .webhooks
            .iter()
            .map(|webhook| -> Box<dyn Validator> {
                match webhook {
                    Webhook::Pod => Box::new(PodValidator::new(decoder.clone())),
                    Webhook::CronJob => Box::new(CronJobValidator::new(decoder.clone())),
                }
            })
            .collect();

        let router = router(validators);

        let tls_config = match config.tls_config {
            Some(tls_config) => {
                Some(certs::create_tls_config_and_watch_certificate_changes(tls_config).await?)
            }
            None => None,
        };

        Ok(Self {
            router,
            addr: config.addr,
            tls_config,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve the webhooks until a termination signal is received.
    pub async fn run(self) -> Result<()> {
        let handle = Handle::new();
        tokio::spawn(shutdown_signal(handle.clone()));

        match self.tls_config {
            None => {
                info!(address = %self.addr, "started HTTP server");
                axum_server::bind(self.addr)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            Some(tls_config) => {
                info!(address = %self.addr, "started HTTPS server");
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
        }
        info!("server stopped");

        Ok(())
    }
}

fn router(validators: Vec<Box<dyn Validator>>) -> Router {
    let mut router = Router::new();
    for validator in validators {
        let path = validator.path();
        info!(webhook = validator.name(), path, "registering webhook");

        let state = Arc::new(ApiServerState { validator });
        router = router.route(path, post(validate_handler).with_state(state));
    }

    router.route("/readiness", get(readiness_handler)).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(::tracing::Level::DEBUG))
            .on_response(trace::DefaultOnResponse::new().level(::tracing::Level::DEBUG)),
    )
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
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

    info!("shutdown requested");
    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
}
