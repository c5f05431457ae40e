use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use teloxide::types::ParseMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Public HTTPS origin Telegram should deliver updates to. Webhook
    /// registration is skipped when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Sent to `setWebhook` and expected back in the
    /// `X-Telegram-Bot-Api-Secret-Token` header of every delivery.
    #[serde(default)]
    pub secret_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token for `POST /broadcast`. The endpoint is disabled without it.
    #[serde(default)]
    pub admin_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub parse_mode: Option<ParseMode>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_token: None,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            parse_mode: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_concurrency() -> usize {
    15
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    300
}

impl TelegramConfig {
    /// Base URL every Bot API method is appended to.
    pub fn api_url(&self) -> String {
        format!("{}/bot{}", self.api_base.trim_end_matches('/'), self.bot_token)
    }

    /// Route the webhook receiver listens on. The token in the path keeps the
    /// endpoint unguessable even without a secret token.
    pub fn webhook_path(&self) -> String {
        format!("/telegrambot{}", self.bot_token)
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.public_url
            .as_deref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.webhook_path()))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }

        crate::broadcast::Pacing::from_config(&config.broadcast)
            .context("Invalid [broadcast] section")?;
        crate::broadcast::WorkerPool::limit_from_config(&config.broadcast)
            .context("Invalid [broadcast] section")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
"#,
        )
        .unwrap();

        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.telegram.request_timeout_secs, 30);
        assert!(config.telegram.public_url.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert!(config.server.admin_token.is_none());
        assert_eq!(config.broadcast.concurrency, 15);
        assert_eq!(config.broadcast.min_delay_ms, 100);
        assert_eq!(config.broadcast.max_delay_ms, 300);
        assert!(config.broadcast.parse_mode.is_none());
    }

    #[test]
    fn test_derived_urls() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
api_base = "http://localhost:8081/"
public_url = "https://bot.example.com/"
"#,
        )
        .unwrap();

        assert_eq!(config.telegram.api_url(), "http://localhost:8081/bot123:abc");
        assert_eq!(config.telegram.webhook_path(), "/telegrambot123:abc");
        assert_eq!(
            config.telegram.webhook_url().as_deref(),
            Some("https://bot.example.com/telegrambot123:abc")
        );
    }

    #[test]
    fn test_parse_mode_from_toml() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "t"

[broadcast]
parse_mode = "HTML"
"#,
        )
        .unwrap();
        assert_eq!(config.broadcast.parse_mode, Some(ParseMode::Html));
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Config::parse("[telegram]\nbot_token = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("bot_token"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::parse(
            r#"
[telegram]
bot_token = "t"

[broadcast]
concurrency = 0
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_inverted_delay_rejected() {
        let result = Config::parse(
            r#"
[telegram]
bot_token = "t"

[broadcast]
min_delay_ms = 500
max_delay_ms = 100
"#,
        );
        assert!(result.is_err());
    }
}
