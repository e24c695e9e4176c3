//! chatrelay – relay server entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise tracing (JSON or human-readable).
//! 3. Build the upstream relay.
//! 4. Serve until Ctrl-C.

use std::net::SocketAddr;

use chatrelay::config::Config;
use chatrelay::providers::DeepSeekClient;
use chatrelay::server::{run_server, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::from_env();

    // RUST_LOG wins; otherwise RELAY_LOG, falling back to `info` if invalid.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: RELAY_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "chatrelay starting");

    if cfg.api_key.is_none() {
        return Err("DEEPSEEK_API_KEY must be set".into());
    }

    let relay = DeepSeekClient::new(cfg.model_options(), cfg.transport_options())?;
    info!(
        base_url = %cfg.base_url,
        model = %cfg.model,
        idle_timeout_secs = cfg.idle_timeout.as_secs(),
        "upstream relay ready"
    );

    let addr: SocketAddr = cfg.bind_address.parse()?;
    run_server(AppState::new(relay), addr, shutdown_signal()).await?;

    info!("chatrelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
