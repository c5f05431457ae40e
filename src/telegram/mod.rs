pub mod client;
pub mod payload;
pub mod transport;

pub use client::{CallbackAnswer, TelegramClient};
pub use payload::{KeyboardDirective, MessagePayload, Recipient};
pub use transport::{ApiMethod, HttpTransport, Transport};
