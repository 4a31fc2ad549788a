pub mod client;
pub mod handlers;

use crate::error::Result;
use crate::models::{File, Message};
use async_trait::async_trait;

pub use client::TelegramClient;
pub use handlers::UpdateHandler;

/// The slice of the Bot API the update handlers need. The concrete client
/// speaks HTTP; tests drive the handlers against a recording fake.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_file(&self, file_id: &str) -> Result<File>;
    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>>;
    async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i64>)
        -> Result<Message>;
    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;
    async fn send_photo(&self, chat_id: i64, png_bytes: Vec<u8>, reply_to: Option<i64>)
        -> Result<()>;
}
