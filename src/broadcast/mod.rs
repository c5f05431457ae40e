//! Fan-out of one message to many chats.
//!
//! A broadcast pushes every recipient through a [`WorkerPool`]: at most
//! `concurrency` sends are in flight, and each worker pauses for a random
//! interval after every send so the aggregate rate stays under Telegram's
//! limits regardless of the pool size. A failed send is logged and recorded;
//! it never stops the batch and is never retried.

mod pool;

pub use pool::{Pacing, WorkerPool};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, ParseMode};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::BroadcastConfig;
use crate::error::ValidationError;
use crate::telegram::{KeyboardDirective, MessagePayload, Recipient, TelegramClient};

/// Per-broadcast content options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastOptions {
    /// Send a photo with the message text as its caption.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub inline_keyboard: Option<Vec<Vec<InlineKeyboardButton>>>,
    #[serde(default)]
    pub reply_keyboard: Option<Vec<Vec<KeyboardButton>>>,
    #[serde(default)]
    pub remove_keyboard: bool,
    #[serde(default)]
    pub force_reply: bool,
}

impl BroadcastOptions {
    pub fn into_payload(
        self,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessagePayload, ValidationError> {
        let keyboard = KeyboardDirective::from_options(
            self.inline_keyboard.map(InlineKeyboardMarkup::new),
            self.reply_keyboard,
            self.remove_keyboard,
            self.force_reply,
        )?;

        let mut payload = MessagePayload::text(text)
            .parse_mode(parse_mode)
            .keyboard(keyboard);
        if let Some(url) = self.image_url {
            payload = payload.image(url);
        }
        payload.validate()?;
        Ok(payload)
    }
}

/// Which recipients a broadcast reached. Both lists are in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub succeeded: Vec<Recipient>,
    pub failed: Vec<Recipient>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub struct Dispatcher {
    client: Arc<TelegramClient>,
    pool: WorkerPool,
    parse_mode: Option<ParseMode>,
}

impl Dispatcher {
    pub fn new(client: Arc<TelegramClient>, pool: WorkerPool) -> Self {
        Self {
            client,
            pool,
            parse_mode: None,
        }
    }

    /// Parse mode for broadcast text only. Other sends through the shared
    /// client are unaffected.
    pub fn with_parse_mode(mut self, parse_mode: Option<ParseMode>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn from_config(
        client: Arc<TelegramClient>,
        config: &BroadcastConfig,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(client, WorkerPool::from_config(config)?).with_parse_mode(config.parse_mode))
    }

    /// Validate `options` against `text`, then deliver to every recipient.
    pub async fn broadcast(
        &self,
        recipients: Vec<Recipient>,
        text: &str,
        options: BroadcastOptions,
    ) -> Result<BroadcastReport, ValidationError> {
        let payload = options.into_payload(text, self.parse_mode)?;
        Ok(self.deliver(recipients, &payload).await)
    }

    /// Attempt `payload` exactly once per recipient (duplicates included).
    pub async fn deliver(
        &self,
        recipients: Vec<Recipient>,
        payload: &MessagePayload,
    ) -> BroadcastReport {
        if recipients.is_empty() {
            return BroadcastReport::default();
        }

        let total = recipients.len();
        info!(
            "Broadcasting to {} chat(s) with concurrency {}",
            total,
            self.pool.limit()
        );

        let report = Mutex::new(BroadcastReport::default());
        let client = &self.client;
        let shared = &report;

        self.pool
            .run(recipients, |recipient| async move {
                match client.send(&recipient, payload).await {
                    Ok(()) => shared.lock().await.succeeded.push(recipient),
                    Err(e) => {
                        warn!("Unable to send message to {}: {}", recipient, e);
                        shared.lock().await.failed.push(recipient);
                    }
                }
            })
            .await;

        let report = report.into_inner();
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Broadcast to {} chat(s) finished",
            total
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::client::testing::FakeTransport;
    use crate::telegram::ApiMethod;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn dispatcher(transport: &Arc<FakeTransport>, limit: usize, pacing: Pacing) -> Dispatcher {
        Dispatcher::new(
            Arc::new(TelegramClient::new(transport.clone())),
            WorkerPool::new(NonZeroUsize::new(limit).unwrap(), pacing),
        )
    }

    fn names(list: &[&str]) -> Vec<Recipient> {
        list.iter().map(|name| Recipient::from(*name)).collect()
    }

    fn sorted(mut list: Vec<Recipient>) -> Vec<Recipient> {
        list.sort_by_key(|r| r.to_string());
        list
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let transport = Arc::new(FakeTransport::new());
        let report = dispatcher(&transport, 15, Pacing::none())
            .broadcast(names(&["a", "b", "c"]), "hello", BroadcastOptions::default())
            .await
            .unwrap();

        assert_eq!(sorted(report.succeeded), names(&["a", "b", "c"]));
        assert!(report.failed.is_empty());
        assert_eq!(transport.calls_to(ApiMethod::SendMessage).len(), 3);
    }

    #[tokio::test]
    async fn test_one_failure_is_isolated() {
        let transport = Arc::new(FakeTransport::new().failing_chat("b"));
        let report = dispatcher(&transport, 15, Pacing::none())
            .broadcast(names(&["a", "b"]), "hello", BroadcastOptions::default())
            .await
            .unwrap();

        assert_eq!(report.succeeded, names(&["a"]));
        assert_eq!(report.failed, names(&["b"]));
    }

    #[tokio::test]
    async fn test_empty_recipients_make_no_calls() {
        let transport = Arc::new(FakeTransport::new());
        let report = dispatcher(&transport, 15, Pacing::none())
            .broadcast(Vec::new(), "hello", BroadcastOptions::default())
            .await
            .unwrap();

        assert_eq!(report, BroadcastReport::default());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_recipient_lands_in_exactly_one_list() {
        let recipients: Vec<Recipient> = (0..40).map(Recipient::Id).collect();
        let transport = Arc::new(
            FakeTransport::new()
                .failing_chat(3)
                .failing_chat(17)
                .failing_chat(39)
                .with_latency(Duration::from_millis(20)),
        );
        let pacing = Pacing::new(Duration::from_millis(1), Duration::from_millis(5)).unwrap();
        let report = dispatcher(&transport, 4, pacing)
            .deliver(recipients.clone(), &MessagePayload::text("hi"))
            .await;

        assert_eq!(report.attempted(), 40);
        let mut all: Vec<Recipient> = report
            .succeeded
            .iter()
            .chain(report.failed.iter())
            .cloned()
            .collect();
        all.sort_by_key(|r| match r {
            Recipient::Id(id) => *id,
            Recipient::Username(_) => i64::MAX,
        });
        assert_eq!(all, recipients);
        assert_eq!(
            sorted(report.failed),
            sorted(vec![Recipient::Id(3), Recipient::Id(17), Recipient::Id(39)])
        );
        assert!(transport.peak() <= 4);
    }

    #[tokio::test]
    async fn test_duplicates_are_sent_independently() {
        let transport = Arc::new(FakeTransport::new());
        let report = dispatcher(&transport, 2, Pacing::none())
            .broadcast(names(&["a", "a"]), "hi", BroadcastOptions::default())
            .await
            .unwrap();

        assert_eq!(report.succeeded, names(&["a", "a"]));
        assert_eq!(transport.calls_to(ApiMethod::SendMessage).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_concurrency_wall_clock() {
        let transport =
            Arc::new(FakeTransport::new().with_latency(Duration::from_millis(100)));
        let start = tokio::time::Instant::now();
        let report = dispatcher(&transport, 2, Pacing::none())
            .broadcast(
                names(&["a", "b", "c", "d", "e"]),
                "hi",
                BroadcastOptions::default(),
            )
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.succeeded.len(), 5);
        assert_eq!(transport.peak(), 2);
        // ceil(5 / 2) rounds of 100ms: slower than fully parallel, faster than serial.
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_image_and_inline_keyboard_share_one_send() {
        let transport = Arc::new(FakeTransport::new());
        let options = BroadcastOptions {
            image_url: Some("https://img/banner.png".to_string()),
            inline_keyboard: Some(vec![vec![InlineKeyboardButton::callback("Join", "join")]]),
            ..Default::default()
        };
        dispatcher(&transport, 15, Pacing::none())
            .broadcast(vec![Recipient::Id(1)], "news", options)
            .await
            .unwrap();

        assert!(transport.calls_to(ApiMethod::SendMessage).is_empty());
        let photos = transport.calls_to(ApiMethod::SendPhoto);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0]["caption"], "news");
        assert_eq!(
            photos[0]["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "join"
        );
    }

    #[tokio::test]
    async fn test_conflicting_options_rejected_before_sending() {
        let transport = Arc::new(FakeTransport::new());
        let options = BroadcastOptions {
            inline_keyboard: Some(vec![vec![InlineKeyboardButton::callback("A", "a")]]),
            reply_keyboard: Some(vec![vec![KeyboardButton::new("B")]]),
            ..Default::default()
        };
        let err = dispatcher(&transport, 15, Pacing::none())
            .broadcast(names(&["a"]), "hi", options)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::ConflictingKeyboards("inline_keyboard, reply_keyboard".to_string())
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_without_image_rejected() {
        let transport = Arc::new(FakeTransport::new());
        let err = dispatcher(&transport, 15, Pacing::none())
            .broadcast(names(&["a"]), "", BroadcastOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyMessage);
    }

    #[tokio::test]
    async fn test_broadcast_parse_mode_stays_on_broadcasts() {
        let transport = Arc::new(FakeTransport::new());
        let config = BroadcastConfig {
            parse_mode: Some(ParseMode::Html),
            ..Default::default()
        };
        let client = Arc::new(TelegramClient::new(transport.clone()));
        let dispatcher = Dispatcher::from_config(client.clone(), &config).unwrap();

        dispatcher
            .broadcast(names(&["a"]), "<b>news</b>", BroadcastOptions::default())
            .await
            .unwrap();
        client.send_message(&Recipient::from("b"), "plain").await.unwrap();

        let sent = transport.calls_to(ApiMethod::SendMessage);
        assert_eq!(sent[0]["parse_mode"], "HTML");
        assert!(sent[1].get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_repeat_broadcasts_are_independent() {
        let transport = Arc::new(FakeTransport::new().failing_chat("b"));
        let dispatcher = dispatcher(&transport, 3, Pacing::none());

        let first = dispatcher
            .broadcast(names(&["a", "b"]), "one", BroadcastOptions::default())
            .await
            .unwrap();
        let second = dispatcher
            .broadcast(names(&["a", "b"]), "two", BroadcastOptions::default())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.attempted(), 2);
        assert_eq!(transport.calls_to(ApiMethod::SendMessage).len(), 4);
    }
}
