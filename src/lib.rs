//! Webhook relay between Telegram and a bot backend.
//!
//! Inbound updates arrive on the webhook route and are classified in
//! [`events`]. Outbound Bot API calls go through [`telegram::TelegramClient`],
//! and [`broadcast::Dispatcher`] fans one message out to many chats with
//! bounded concurrency.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod events;
pub mod server;
pub mod telegram;

use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::error::TransportError;
use crate::telegram::TelegramClient;

/// What happened to webhook registration at startup.
#[derive(Debug)]
pub enum WebhookRegistration {
    Registered { url: String },
    Skipped,
}

/// Point Telegram at this server's webhook route. Returns the outcome so the
/// caller decides whether a failure is fatal.
pub async fn register_webhook(
    client: &TelegramClient,
    config: &TelegramConfig,
) -> Result<WebhookRegistration, TransportError> {
    let Some(url) = config.webhook_url() else {
        warn!("telegram.public_url is not set; skipping webhook registration");
        return Ok(WebhookRegistration::Skipped);
    };

    client
        .set_webhook(&url, config.secret_token.as_deref())
        .await?;
    info!("Webhook registered at {}", config.public_url.as_deref().unwrap_or_default());
    Ok(WebhookRegistration::Registered { url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::telegram::client::testing::FakeTransport;
    use crate::telegram::ApiMethod;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_registration_skipped_without_public_url() {
        let config = Config::parse("[telegram]\nbot_token = \"1:a\"\n").unwrap();
        let transport = Arc::new(FakeTransport::new());
        let client = TelegramClient::new(transport.clone());

        let outcome = register_webhook(&client, &config.telegram).await.unwrap();
        assert!(matches!(outcome, WebhookRegistration::Skipped));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_is_returned() {
        let config = Config::parse(
            "[telegram]\nbot_token = \"1:a\"\npublic_url = \"https://bot.example.com\"\n",
        )
        .unwrap();
        let transport = Arc::new(FakeTransport::new().failing_method(ApiMethod::SetWebhook));
        let client = TelegramClient::new(transport.clone());

        let err = register_webhook(&client, &config.telegram).await.unwrap_err();
        assert_eq!(err.method(), Some(ApiMethod::SetWebhook));
    }

    #[tokio::test]
    async fn test_registration_sends_webhook_url() {
        let config = Config::parse(
            "[telegram]\nbot_token = \"1:a\"\npublic_url = \"https://bot.example.com\"\nsecret_token = \"s\"\n",
        )
        .unwrap();
        let transport = Arc::new(FakeTransport::new());
        let client = TelegramClient::new(transport.clone());

        let outcome = register_webhook(&client, &config.telegram).await.unwrap();
        assert!(matches!(
            outcome,
            WebhookRegistration::Registered { ref url } if url == "https://bot.example.com/telegrambot1:a"
        ));
        let body = &transport.calls_to(ApiMethod::SetWebhook)[0];
        assert_eq!(body["secret_token"], "s");
    }
}
