use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use teloxide::types::{ChatAction, InlineKeyboardMarkup, KeyboardButton, ParseMode};
use tracing::{info, warn};

use super::payload::{
    AnswerInlineQueryRequest, EditMessageCaptionRequest, EditMessageReplyMarkupRequest,
    EditMessageTextRequest, SendChatActionRequest, SendMessageRequest, SendPhotoRequest,
    SetWebhookRequest,
};
use super::{ApiMethod, KeyboardDirective, MessagePayload, Recipient, Transport};
use crate::error::TransportError;

/// Optional fields for `answerCallbackQuery`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallbackAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<u32>,
}

#[derive(Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
    #[serde(flatten)]
    answer: &'a CallbackAnswer,
}

/// Stateless Bot API client. Safe to share across tasks.
#[derive(Clone)]
pub struct TelegramClient {
    transport: Arc<dyn Transport>,
    parse_mode: Option<ParseMode>,
}

impl TelegramClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            parse_mode: None,
        }
    }

    /// Parse mode applied by the convenience senders.
    pub fn with_parse_mode(mut self, parse_mode: Option<ParseMode>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn parse_mode(&self) -> Option<ParseMode> {
        self.parse_mode
    }

    async fn invoke<P: Serialize>(
        &self,
        method: ApiMethod,
        payload: &P,
    ) -> Result<Value, TransportError> {
        let body = serde_json::to_value(payload)
            .map_err(|source| TransportError::Encode { method, source })?;
        self.transport.call(method, body).await
    }

    /// Deliver one message to one chat: a photo when the payload carries an
    /// image (text becomes the caption), a text message otherwise.
    pub async fn send(
        &self,
        recipient: &Recipient,
        message: &MessagePayload,
    ) -> Result<(), TransportError> {
        match message.image.as_deref() {
            Some(photo) => self.send_photo_payload(recipient, photo, message).await,
            None => self.send_text_payload(recipient, message).await,
        }
    }

    async fn send_text_payload(
        &self,
        recipient: &Recipient,
        message: &MessagePayload,
    ) -> Result<(), TransportError> {
        info!("Sending message to chat_id: {}", recipient);
        let request = SendMessageRequest {
            chat_id: recipient,
            text: &message.text,
            parse_mode: message.parse_mode,
            reply_markup: message.keyboard.reply_markup(),
            disable_web_page_preview: true,
        };
        self.invoke(ApiMethod::SendMessage, &request).await?;
        info!("Message sent to chat_id: {}", recipient);
        Ok(())
    }

    async fn send_photo_payload(
        &self,
        recipient: &Recipient,
        photo: &str,
        message: &MessagePayload,
    ) -> Result<(), TransportError> {
        info!("Sending photo ({}) to chat_id: {}", photo, recipient);

        best_effort(
            "upload_photo chat action",
            self.send_chat_action(recipient, ChatAction::UploadPhoto).await,
        );

        let caption = Some(message.text.as_str()).filter(|text| !text.trim().is_empty());
        let request = SendPhotoRequest {
            chat_id: recipient,
            photo,
            caption,
            parse_mode: caption.and(message.parse_mode),
            reply_markup: message.keyboard.reply_markup(),
        };
        self.invoke(ApiMethod::SendPhoto, &request).await?;
        info!("Photo sent to chat_id: {}", recipient);
        Ok(())
    }

    fn convenience(&self, text: &str, keyboard: KeyboardDirective) -> MessagePayload {
        MessagePayload::text(text)
            .parse_mode(self.parse_mode)
            .keyboard(keyboard)
    }

    pub async fn send_message(&self, chat: &Recipient, text: &str) -> Result<(), TransportError> {
        self.send(chat, &self.convenience(text, KeyboardDirective::None))
            .await
    }

    pub async fn send_message_with_reply(
        &self,
        chat: &Recipient,
        text: &str,
    ) -> Result<(), TransportError> {
        info!("Forcing reply on message to chat_id: {}", chat);
        self.send(chat, &self.convenience(text, KeyboardDirective::ForceReply))
            .await
    }

    pub async fn send_message_with_inline_keyboard(
        &self,
        chat: &Recipient,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), TransportError> {
        info!("Sending message with inline keyboard to chat_id: {}", chat);
        self.send(chat, &self.convenience(text, KeyboardDirective::Inline(keyboard)))
            .await
    }

    pub async fn send_message_with_reply_keyboard(
        &self,
        chat: &Recipient,
        text: &str,
        rows: Vec<Vec<KeyboardButton>>,
    ) -> Result<(), TransportError> {
        info!("Sending message with reply keyboard to chat_id: {}", chat);
        self.send(
            chat,
            &self.convenience(text, KeyboardDirective::reply_keyboard(rows)),
        )
        .await
    }

    pub async fn send_message_with_keyboard_removed(
        &self,
        chat: &Recipient,
        text: &str,
    ) -> Result<(), TransportError> {
        info!("Sending message with reply keyboard removed to chat_id: {}", chat);
        self.send(chat, &self.convenience(text, KeyboardDirective::RemoveKeyboard))
            .await
    }

    /// Asks the user to share their location via a one-time reply keyboard.
    pub async fn request_location(
        &self,
        chat: &Recipient,
        text: &str,
    ) -> Result<(), TransportError> {
        info!("Requesting location from chat_id: {}", chat);
        self.send(
            chat,
            &self.convenience(text, KeyboardDirective::location_request()),
        )
        .await
    }

    pub async fn send_photo(
        &self,
        chat: &Recipient,
        photo: &str,
        caption: Option<&str>,
        keyboard: KeyboardDirective,
    ) -> Result<(), TransportError> {
        let payload = self
            .convenience(caption.unwrap_or_default(), keyboard)
            .image(photo);
        self.send(chat, &payload).await
    }

    pub async fn send_chat_action(
        &self,
        chat: &Recipient,
        action: ChatAction,
    ) -> Result<(), TransportError> {
        info!("Sending chat action ({:?}) to chat_id: {}", action, chat);
        let request = SendChatActionRequest {
            chat_id: chat,
            action,
        };
        self.invoke(ApiMethod::SendChatAction, &request).await?;
        info!("Chat action sent to chat_id: {}", chat);
        Ok(())
    }

    pub async fn edit_message_text(
        &self,
        chat: &Recipient,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        info!("Editing message[{}] for chat_id: {}", message_id, chat);
        let request = EditMessageTextRequest {
            chat_id: chat,
            message_id,
            text,
            parse_mode: self.parse_mode,
            reply_markup: keyboard,
        };
        self.invoke(ApiMethod::EditMessageText, &request).await?;
        info!("Message[{}] edited for chat_id: {}", message_id, chat);
        Ok(())
    }

    pub async fn edit_message_caption(
        &self,
        chat: &Recipient,
        message_id: i64,
        caption: &str,
    ) -> Result<(), TransportError> {
        info!("Editing caption for message[{}] for chat_id: {}", message_id, chat);
        let request = EditMessageCaptionRequest {
            chat_id: chat,
            message_id,
            caption,
            parse_mode: self.parse_mode,
        };
        self.invoke(ApiMethod::EditMessageCaption, &request).await?;
        info!("Caption updated for message[{}] in chat_id: {}", message_id, chat);
        Ok(())
    }

    pub async fn edit_inline_keyboard(
        &self,
        chat: &Recipient,
        message_id: i64,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), TransportError> {
        info!(
            "Editing inline keyboard for message[{}] for chat_id: {}",
            message_id, chat
        );
        let request = EditMessageReplyMarkupRequest {
            chat_id: chat,
            message_id,
            reply_markup: keyboard,
        };
        self.invoke(ApiMethod::EditMessageReplyMarkup, &request)
            .await?;
        info!("Inline keyboard updated for message[{}] in chat_id: {}", message_id, chat);
        Ok(())
    }

    /// Call whenever a user presses an inline button, even with an empty
    /// answer, so the client stops showing a progress indicator.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        answer: &CallbackAnswer,
    ) -> Result<(), TransportError> {
        info!("Answering callback query {}: {:?}", callback_query_id, answer);
        let request = AnswerCallbackQueryRequest {
            callback_query_id,
            answer,
        };
        self.invoke(ApiMethod::AnswerCallbackQuery, &request)
            .await?;
        info!("Callback query {} answered", callback_query_id);
        Ok(())
    }

    pub async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: &[Value],
    ) -> Result<(), TransportError> {
        info!(
            "Answering inline query {} with {} result(s)",
            inline_query_id,
            results.len()
        );
        let request = AnswerInlineQueryRequest {
            inline_query_id,
            results,
            is_personal: true,
            cache_time: 5,
            next_offset: "",
        };
        self.invoke(ApiMethod::AnswerInlineQuery, &request).await?;
        info!("Inline query {} answered", inline_query_id);
        Ok(())
    }

    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<(), TransportError> {
        info!("Setting webhook on Telegram");
        let request = SetWebhookRequest { url, secret_token };
        self.invoke(ApiMethod::SetWebhook, &request).await?;
        info!("Telegram webhook set");
        Ok(())
    }
}

/// Outcome of a cosmetic call whose failure must not affect delivery.
/// The error is logged and dropped.
fn best_effort(what: &str, result: Result<(), TransportError>) {
    if let Err(e) = result {
        warn!("Best-effort {} failed: {}", what, e);
    }
}
