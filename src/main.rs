use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tgrelay::broadcast::Dispatcher;
use tgrelay::config::Config;
use tgrelay::events::EventHandler;
use tgrelay::server::{self, AppState};
use tgrelay::telegram::{HttpTransport, TelegramClient};
use tgrelay::{register_webhook, WebhookRegistration};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  API base: {}", config.telegram.api_base);
    info!("  Listening on: {}", config.server.bind);
    info!(
        "  Broadcast: concurrency {}, pause {}-{}ms",
        config.broadcast.concurrency, config.broadcast.min_delay_ms, config.broadcast.max_delay_ms
    );
    info!(
        "  Broadcast endpoint: {}",
        if config.server.admin_token.is_some() { "enabled" } else { "disabled" }
    );

    let transport = HttpTransport::new(
        config.telegram.api_url(),
        Duration::from_secs(config.telegram.request_timeout_secs),
    )
    .context("Failed to create Telegram transport")?;
    let client = Arc::new(TelegramClient::new(Arc::new(transport)));
    let dispatcher = Dispatcher::from_config(client.clone(), &config.broadcast)
        .context("Invalid broadcast settings")?;

    // A failed registration leaves any previously set webhook in place, so
    // keep serving instead of exiting.
    match register_webhook(&client, &config.telegram).await {
        Ok(WebhookRegistration::Registered { .. }) => {}
        Ok(WebhookRegistration::Skipped) => info!("Running without webhook registration"),
        Err(e) => error!("Failed to set Telegram webhook: {:#}", e),
    }

    let state = AppState {
        events: Arc::new(EventHandler::new(client.clone())),
        dispatcher: Arc::new(dispatcher),
        secret_token: config.telegram.secret_token.clone(),
        admin_token: config.server.admin_token.clone(),
    };
    let app = server::router(state, &config.telegram.webhook_path());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    info!("Relay is listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}
