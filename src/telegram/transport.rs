use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

/// Bot API methods this relay invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    SendMessage,
    SendPhoto,
    SendChatAction,
    EditMessageText,
    EditMessageCaption,
    EditMessageReplyMarkup,
    AnswerCallbackQuery,
    AnswerInlineQuery,
    SetWebhook,
}

impl ApiMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::SendMessage => "sendMessage",
            ApiMethod::SendPhoto => "sendPhoto",
            ApiMethod::SendChatAction => "sendChatAction",
            ApiMethod::EditMessageText => "editMessageText",
            ApiMethod::EditMessageCaption => "editMessageCaption",
            ApiMethod::EditMessageReplyMarkup => "editMessageReplyMarkup",
            ApiMethod::AnswerCallbackQuery => "answerCallbackQuery",
            ApiMethod::AnswerInlineQuery => "answerInlineQuery",
            ApiMethod::SetWebhook => "setWebhook",
        }
    }
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Bot API method invocation per call. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: ApiMethod, body: Value) -> Result<Value, TransportError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

/// POSTs JSON bodies to `{api_url}/{method}` with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: ApiMethod, body: Value) -> Result<Value, TransportError> {
        let url = format!("{}/{}", self.api_url, method);

        debug!("Calling Telegram method {}", method);

        let network = |e: reqwest::Error| TransportError::Network {
            method,
            source: e.without_url(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let text = response.text().await.map_err(network)?;

        if status != StatusCode::OK {
            return Err(TransportError::Status {
                method,
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: ApiResponse =
            serde_json::from_str(&text).map_err(|e| TransportError::Malformed {
                method,
                reason: e.to_string(),
            })?;

        if !envelope.ok {
            return Err(TransportError::Rejected {
                method,
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }
}
