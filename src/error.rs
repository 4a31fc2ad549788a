use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    ConfigError(String),
    DecodeError(String),
    RemediableRequest(String),
    NonRemediableRequest(String),
    GenerationError(String),
    TelegramError(String),
    SerializationError(String),
    ResponseError(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            RelayError::DecodeError(msg) => write!(f, "Image decode error: {}", msg),
            RelayError::RemediableRequest(msg) => write!(f, "Rejected request shape: {}", msg),
            RelayError::NonRemediableRequest(msg) => write!(f, "Generation request failed: {}", msg),
            RelayError::GenerationError(msg) => write!(f, "Generation error: {}", msg),
            RelayError::TelegramError(msg) => write!(f, "Telegram API error: {}", msg),
            RelayError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            RelayError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

pub type Result<T> = std::result::Result<T, RelayError>;
