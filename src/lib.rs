pub mod config;
pub mod error;
pub mod gemini;
pub mod logger;
pub mod models;
pub mod normalize;
pub mod server;
pub mod session;
pub mod telegram;

pub use config::{Config, GeminiConfig, TelegramConfig};
pub use error::{RelayError, Result};
pub use gemini::{EditClient, ImageEditor};
pub use normalize::normalize_image;
pub use session::{MemorySessionStore, SessionStore};
pub use telegram::{BotApi, TelegramClient, UpdateHandler};
