use anyhow::Result;
use tracing::{debug, error};

use webhook_server::{WebhookServer, cli, config::Config, metrics, tracing::setup_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    // Setup the tracing system. This MUST be done inside of a tokio Runtime
    // because some collectors rely on it and would panic otherwise.
    let tracer_provider = setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color)?;
    debug!("tracing system ready");

    let meter_provider = if config.metrics_enabled {
        Some(metrics::setup_metrics()?)
    } else {
        None
    };

    let result = match WebhookServer::new_from_config(config).await {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        error!(error = %e, "webhook server failure");
    }

    if let Some(meter_provider) = meter_provider {
        if let Err(e) = meter_provider.shutdown() {
            eprintln!("cannot shut down the meter provider: {e}");
        }
    }
    if let Some(tracer_provider) = tracer_provider {
        if let Err(e) = tracer_provider.shutdown() {
            eprintln!("cannot shut down the tracer provider: {e}");
        }
    }

    result
}
