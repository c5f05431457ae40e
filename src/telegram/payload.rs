use serde::{Deserialize, Serialize};
use teloxide::types::{
    ButtonRequest, ForceReply, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    KeyboardRemove, ParseMode, ReplyMarkup,
};

use crate::error::ValidationError;

/// A chat destination: numeric chat id or `@channelusername`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Id(i64),
    Username(String),
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Id(id) => write!(f, "{}", id),
            Recipient::Username(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for Recipient {
    fn from(id: i64) -> Self {
        Recipient::Id(id)
    }
}

impl From<&str> for Recipient {
    fn from(name: &str) -> Self {
        Recipient::Username(name.to_string())
    }
}

/// Which keyboard, if any, rides along with a message.
#[derive(Debug, Clone, Default)]
pub enum KeyboardDirective {
    #[default]
    None,
    ForceReply,
    Inline(InlineKeyboardMarkup),
    Reply(KeyboardMarkup),
    RemoveKeyboard,
}

impl KeyboardDirective {
    /// One-time, resized reply keyboard built from rows of buttons.
    pub fn reply_keyboard(rows: Vec<Vec<KeyboardButton>>) -> Self {
        KeyboardDirective::Reply(
            KeyboardMarkup::new(rows)
                .one_time_keyboard()
                .resize_keyboard(),
        )
    }

    /// "Send Location" plus "Cancel".
    pub fn location_request() -> Self {
        Self::reply_keyboard(vec![vec![
            KeyboardButton::new("Send Location 📌").request(ButtonRequest::Location),
            KeyboardButton::new("Cancel"),
        ]])
    }

    pub fn reply_markup(&self) -> Option<ReplyMarkup> {
        match self {
            KeyboardDirective::None => None,
            KeyboardDirective::ForceReply => Some(ReplyMarkup::ForceReply(ForceReply::new())),
            KeyboardDirective::Inline(markup) => Some(ReplyMarkup::InlineKeyboard(markup.clone())),
            KeyboardDirective::Reply(markup) => Some(ReplyMarkup::Keyboard(markup.clone())),
            KeyboardDirective::RemoveKeyboard => {
                Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new()))
            }
        }
    }

    /// Builds a directive from independently optional inputs, refusing to
    /// guess when more than one is present.
    pub fn from_options(
        inline: Option<InlineKeyboardMarkup>,
        reply: Option<Vec<Vec<KeyboardButton>>>,
        remove: bool,
        force_reply: bool,
    ) -> Result<Self, ValidationError> {
        let mut supplied = Vec::new();
        if inline.is_some() {
            supplied.push("inline_keyboard");
        }
        if reply.is_some() {
            supplied.push("reply_keyboard");
        }
        if remove {
            supplied.push("remove_keyboard");
        }
        if force_reply {
            supplied.push("force_reply");
        }
        if supplied.len() > 1 {
            return Err(ValidationError::ConflictingKeyboards(supplied.join(", ")));
        }

        Ok(match (inline, reply) {
            (Some(markup), _) => KeyboardDirective::Inline(markup),
            (_, Some(rows)) => Self::reply_keyboard(rows),
            _ if remove => KeyboardDirective::RemoveKeyboard,
            _ if force_reply => KeyboardDirective::ForceReply,
            _ => KeyboardDirective::None,
        })
    }
}

/// Everything needed to deliver one message to one chat.
#[derive(Debug, Clone, Default)]
pub struct MessagePayload {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: KeyboardDirective,
    /// Photo URL or file id. When set the text becomes the caption.
    pub image: Option<String>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn parse_mode(mut self, parse_mode: Option<ParseMode>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn keyboard(mut self, keyboard: KeyboardDirective) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() && self.image.is_none() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }
}

// ── Bot API request bodies ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: &'a Recipient,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
    pub disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendPhotoRequest<'a> {
    pub chat_id: &'a Recipient,
    pub photo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendChatActionRequest<'a> {
    pub chat_id: &'a Recipient,
    pub action: teloxide::types::ChatAction,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditMessageTextRequest<'a> {
    pub chat_id: &'a Recipient,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditMessageCaptionRequest<'a> {
    pub chat_id: &'a Recipient,
    pub message_id: i64,
    pub caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditMessageReplyMarkupRequest<'a> {
    pub chat_id: &'a Recipient,
    pub message_id: i64,
    pub reply_markup: &'a InlineKeyboardMarkup,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerInlineQueryRequest<'a> {
    pub inline_query_id: &'a str,
    pub results: &'a [serde_json::Value],
    pub is_personal: bool,
    pub cache_time: u32,
    pub next_offset: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetWebhookRequest<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
}
