use crate::error::{RelayError, Result};
use crate::gemini::ImageEditor;
use crate::logger;
use crate::models::{Message, Update};
use crate::session::SessionStore;
use crate::telegram::BotApi;
use std::sync::Arc;

const GREETING: &str = "I edit photos on request. Send a photo with a caption saying what \
to change and I will redraw the numbers or text. /help for examples.";

const HELP: &str = "📸 Send a screenshot and put what to change in the caption.\n\
Examples:\n\
• replace 1.45 with 2.15\n\
• set Total = 1580\n\
You can also send the photo first and the instruction right after as a plain message.\n\
/start — greeting\n\
/help — this message";

const AWAITING_INSTRUCTION: &str =
    "Got the photo. Now send the instruction — what should I change?";

const NO_PENDING_PHOTO: &str =
    "There is no photo waiting for an instruction. Send the photo first.";

const GENERATING: &str = "Generating…";

/// Routes inbound updates through the session store and the edit client.
/// Every failure is converted into a user-visible message here; nothing
/// escapes the handling task.
pub struct UpdateHandler {
    bot: Arc<dyn BotApi>,
    editor: Arc<dyn ImageEditor>,
    sessions: Arc<dyn SessionStore>,
}

impl UpdateHandler {
    pub fn new(
        bot: Arc<dyn BotApi>,
        editor: Arc<dyn ImageEditor>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            bot,
            editor,
            sessions,
        }
    }

    pub async fn handle_update(&self, update: Update) {
        let message = match update.message {
            Some(message) => message,
            None => return,
        };

        let req = logger::request_id();
        log::debug!("[{}] handling update {}", req, update.update_id);

        if let Err(e) = self.route_message(&req, &message).await {
            // Reaching the user already failed; logging is all that is left.
            log::error!("[{}] update {} failed: {}", req, update.update_id, e);
        }
    }

    async fn route_message(&self, req: &str, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;

        if let Some(text) = message.text.as_deref() {
            return match text.trim() {
                "/start" => {
                    self.bot.send_message(chat_id, GREETING, None).await?;
                    Ok(())
                }
                "/help" => {
                    self.bot.send_message(chat_id, HELP, None).await?;
                    Ok(())
                }
                instruction => self.handle_instruction(req, message, instruction).await,
            };
        }

        if let Some(file_id) = media_file_id(message) {
            return self.handle_media(req, message, file_id).await;
        }

        Ok(())
    }

    /// A photo (or image document) arrived. With a caption it goes straight
    /// to the edit; without one it waits in the session store for the
    /// instruction message.
    async fn handle_media(&self, req: &str, message: &Message, file_id: &str) -> Result<()> {
        let chat_id = message.chat.id;

        let image = match self.download(file_id).await {
            Ok(image) => image,
            Err(e) => {
                log::error!("[{}] download of {} failed: {}", req, file_id, e);
                self.bot
                    .send_message(
                        chat_id,
                        "I could not fetch that photo, please resend it.",
                        Some(message.message_id),
                    )
                    .await?;
                return Ok(());
            }
        };

        let instruction = message.caption.as_deref().map(str::trim).unwrap_or("");
        if instruction.is_empty() {
            self.sessions.put(owner_id(message), image);
            self.bot
                .send_message(chat_id, AWAITING_INSTRUCTION, Some(message.message_id))
                .await?;
            return Ok(());
        }

        self.run_edit(req, message, instruction, image).await
    }

    /// Plain text: an instruction for a previously sent photo.
    async fn handle_instruction(
        &self,
        req: &str,
        message: &Message,
        instruction: &str,
    ) -> Result<()> {
        let chat_id = message.chat.id;
        let owner = owner_id(message);

        if !self.sessions.has_fresh(owner) {
            self.bot
                .send_message(chat_id, NO_PENDING_PHOTO, Some(message.message_id))
                .await?;
            return Ok(());
        }

        match self.sessions.take_if_fresh(owner) {
            Some(image) => self.run_edit(req, message, instruction, image).await,
            // Consumed by a concurrent message between the probe and the take.
            None => {
                self.bot
                    .send_message(chat_id, NO_PENDING_PHOTO, Some(message.message_id))
                    .await?;
                Ok(())
            }
        }
    }

    async fn run_edit(
        &self,
        req: &str,
        message: &Message,
        instruction: &str,
        image: Vec<u8>,
    ) -> Result<()> {
        let chat_id = message.chat.id;
        let status = self
            .bot
            .send_message(chat_id, GENERATING, Some(message.message_id))
            .await?;

        log::info!("[{}] edit requested: {}", req, instruction);
        let timer = logger::timer("edit ladder");
        let outcome = self.editor.edit(instruction, &image).await;
        drop(timer);

        match outcome {
            Ok(png) => {
                self.bot
                    .send_photo(chat_id, png, Some(message.message_id))
                    .await?;
                Ok(())
            }
            Err(e) => {
                log::error!("[{}] edit failed: {}", req, e);
                self.bot
                    .edit_message_text(chat_id, status.message_id, &user_facing_error(&e))
                    .await?;
                Ok(())
            }
        }
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| RelayError::TelegramError("getFile returned no file_path".into()))?;
        self.bot.download_file(&file_path).await
    }
}

/// Sessions key on the sender; group chats without a sender fall back to
/// the chat itself.
fn owner_id(message: &Message) -> i64 {
    message
        .from
        .as_ref()
        .map(|user| user.id)
        .unwrap_or(message.chat.id)
}

/// Largest photo size, or an image document. Non-image media is ignored.
fn media_file_id(message: &Message) -> Option<&str> {
    if let Some(photo) = message.photo.as_ref() {
        if let Some(largest) = photo.last() {
            return Some(&largest.file_id);
        }
    }
    if let Some(document) = message.document.as_ref() {
        let is_image = document
            .mime_type
            .as_deref()
            .map(|mime| mime.starts_with("image/"))
            .unwrap_or(false);
        if is_image {
            return Some(&document.file_id);
        }
    }
    None
}

fn user_facing_error(e: &RelayError) -> String {
    match e {
        RelayError::DecodeError(_) => {
            "That file does not look like an image I can read. Try a different photo.".to_string()
        }
        RelayError::GenerationError(diagnostic) => {
            format!("The model could not apply the edit: {}", diagnostic)
        }
        RelayError::NonRemediableRequest(_) => {
            "The image service is unavailable right now. Please try again later.".to_string()
        }
        _ => "Something went wrong. Please resend the photo and try again.".to_string(),
    }
}
