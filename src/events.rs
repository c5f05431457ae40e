use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::telegram::{CallbackAnswer, MessagePayload, Recipient, TelegramClient};

/// One webhook delivery. Only the fields the relay reacts to are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
    pub edited_message: Option<Value>,
    pub channel_post: Option<Value>,
    pub edited_channel_post: Option<Value>,
    pub inline_query: Option<InlineQuery>,
    pub chosen_inline_result: Option<Value>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_to_message: Option<Value>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
}

#[derive(Debug)]
pub enum Event {
    Message(IncomingMessage),
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery(InlineQuery),
    ChosenInlineResult,
    CallbackQuery(CallbackQuery),
    Unknown,
}

impl From<Update> for Event {
    fn from(update: Update) -> Self {
        if let Some(message) = update.message {
            Event::Message(message)
        } else if update.edited_message.is_some() {
            Event::EditedMessage
        } else if update.channel_post.is_some() {
            Event::ChannelPost
        } else if update.edited_channel_post.is_some() {
            Event::EditedChannelPost
        } else if let Some(query) = update.inline_query {
            Event::InlineQuery(query)
        } else if update.chosen_inline_result.is_some() {
            Event::ChosenInlineResult
        } else if let Some(query) = update.callback_query {
            Event::CallbackQuery(query)
        } else {
            Event::Unknown
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum MessageKind {
    Reply,
    Command(String),
    Text(String),
    Location(Location),
    Unhandled,
}

impl IncomingMessage {
    pub fn classify(&self) -> MessageKind {
        if let Some(text) = self.text.as_deref() {
            let text = text.trim();
            if self.reply_to_message.is_some() {
                MessageKind::Reply
            } else if self
                .entities
                .first()
                .is_some_and(|entity| entity.kind == "bot_command")
            {
                let name = text.split('@').next().unwrap_or(text);
                MessageKind::Command(name.trim_start_matches('/').to_string())
            } else {
                MessageKind::Text(text.to_string())
            }
        } else if let Some(location) = self.location {
            MessageKind::Location(location)
        } else {
            MessageKind::Unhandled
        }
    }
}

/// Reacts to classified webhook events.
pub struct EventHandler {
    client: Arc<TelegramClient>,
}

impl EventHandler {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }

    pub async fn handle(&self, update: Update) {
        info!("Handling Telegram update {}", update.update_id);
        match Event::from(update) {
            Event::Message(message) => self.handle_message(message).await,
            Event::EditedMessage => info!("edited_message event detected"),
            Event::ChannelPost => info!("channel_post event detected"),
            Event::EditedChannelPost => info!("edited_channel_post event detected"),
            Event::InlineQuery(query) => {
                info!("inline_query {} detected: {:?}", query.id, query.query)
            }
            Event::ChosenInlineResult => info!("chosen_inline_result event detected"),
            Event::CallbackQuery(query) => self.handle_callback_query(query).await,
            Event::Unknown => info!("unknown event detected"),
        }
    }

    async fn handle_message(&self, message: IncomingMessage) {
        let chat = Recipient::Id(message.chat.id);
        match message.classify() {
            MessageKind::Reply => info!("Reply detected in chat {}", chat),
            MessageKind::Command(command) => {
                info!("Command detected in chat {}: {}", chat, command)
            }
            MessageKind::Text(text) => {
                info!("Natural language detected in chat {}", chat);
                // User text is echoed verbatim, never parsed as markup.
                if let Err(e) = self.client.send(&chat, &MessagePayload::text(text)).await {
                    error!("Failed to echo message to {}: {}", chat, e);
                }
            }
            MessageKind::Location(location) => info!(
                "Location received from chat {}: {}, {}",
                chat, location.latitude, location.longitude
            ),
            MessageKind::Unhandled => info!("Unhandled message event in chat {}", chat),
        }
    }

    async fn handle_callback_query(&self, query: CallbackQuery) {
        info!("callback_query {} detected: {:?}", query.id, query.data);
        if let Err(e) = self
            .client
            .answer_callback_query(&query.id, &CallbackAnswer::default())
            .await
        {
            error!("Failed to answer callback query {}: {}", query.id, e);
        }
    }
}
