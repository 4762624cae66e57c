use axum::Router;
use std::{collections::BTreeSet, net::SocketAddr};
use webhook_server::{
    WebhookServer,
    config::{Config, Webhook},
};

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        tls_config: None,
        webhooks: BTreeSet::from([Webhook::Pod, Webhook::CronJob]),
        metrics_enabled: false,
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) async fn app(config: Config) -> Router {
    let server = WebhookServer::new_from_config(config).await.unwrap();

    server.router()
}
