use crate::config::TelegramConfig;
use crate::error::{RelayError, Result};
use crate::models::{ApiResponse, File, Message};
use crate::telegram::BotApi;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                // The method URL embeds the bot token.
                RelayError::TelegramError(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            RelayError::TelegramError(format!(
                "{} returned an unreadable reply: {}",
                method,
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(RelayError::TelegramError(format!(
                "{} failed: {}",
                method,
                envelope.description.unwrap_or_else(|| "no details".into())
            )));
        }

        envelope
            .result
            .ok_or_else(|| RelayError::TelegramError(format!("{} returned an empty result", method)))
    }

    /// Registers the command menu, mirroring the handlers in
    /// [`crate::telegram::handlers`].
    pub async fn set_my_commands(&self) -> Result<()> {
        let payload = json!({
            "commands": [
                { "command": "start", "description": "Greeting" },
                { "command": "help", "description": "How to use the bot" }
            ]
        });
        self.call::<bool>("setMyCommands", &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| {
                RelayError::TelegramError(format!("file download failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            return Err(RelayError::TelegramError(format!(
                "file download failed: {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            RelayError::TelegramError(format!("file download failed: {}", e.without_url()))
        })?;
        Ok(bytes.to_vec())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(message_id) = reply_to {
            payload["reply_to_message_id"] = json!(message_id);
        }
        self.call("sendMessage", &payload).await
    }

    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text
        });
        self.call::<Value>("editMessageText", &payload).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        png_bytes: Vec<u8>,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(png_bytes)
            .file_name("edited.png")
            .mime_str("image/png")
            .map_err(|e| RelayError::SerializationError(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        if let Some(message_id) = reply_to {
            form = form.text("reply_to_message_id", message_id.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                RelayError::TelegramError(format!("sendPhoto request failed: {}", e.without_url()))
            })?;

        let envelope: ApiResponse<Message> = response.json().await.map_err(|e| {
            RelayError::TelegramError(format!(
                "sendPhoto returned an unreadable reply: {}",
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(RelayError::TelegramError(format!(
                "sendPhoto failed: {}",
                envelope.description.unwrap_or_else(|| "no details".into())
            )));
        }
        Ok(())
    }
}
