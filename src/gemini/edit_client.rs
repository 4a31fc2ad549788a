use crate::config::GeminiConfig;
use crate::error::{RelayError, Result};
use crate::gemini::transport::{GenerateTransport, HttpTransport};
use crate::gemini::ImageEditor;
use crate::models::{AttemptOutcome, EditAttempt, NormalizedImage};
use crate::normalize::normalize_image;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;

/// Fixed directive placed in front of every instruction. The remote model
/// must stay inside the user's edit and keep the typography of whatever
/// text the source image carries.
const EDIT_DIRECTIVE: &str = "Edit the image strictly according to the instruction. \
Preserve the font, size, color, alignment and spacing of the original text. \
Do not change anything else. Instruction: ";

const MAX_DIAGNOSTIC_LEN: usize = 200;

/// How a variant asks the remote for binary output: newer models take a
/// response-modalities list, older ones a desired response mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputHint {
    ImageModality,
    PngMimeType,
    None,
}

/// One rung of the fallback ladder. The axes are independent: which model
/// receives the call, whether the content carries an explicit role tag,
/// and which output hint is attached.
#[derive(Debug, Clone, Copy)]
pub struct EditVariant {
    pub model: &'static str,
    pub role: Option<&'static str>,
    pub output_hint: OutputHint,
}

impl EditVariant {
    pub fn shape_label(&self) -> String {
        format!(
            "role={} hint={:?}",
            self.role.unwrap_or("none"),
            self.output_hint
        )
    }

    pub fn build_payload(&self, prompt: &str, image: &NormalizedImage, image_b64: &str) -> Value {
        let mut content = json!({
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": image.mime_type,
                        "data": image_b64
                    }
                }
            ]
        });
        if let Some(role) = self.role {
            content["role"] = json!(role);
        }

        let mut payload = json!({ "contents": [content] });
        match self.output_hint {
            OutputHint::ImageModality => {
                payload["responseModalities"] = json!(["IMAGE"]);
            }
            OutputHint::PngMimeType => {
                payload["generationConfig"] = json!({ "responseMimeType": "image/png" });
            }
            OutputHint::None => {}
        }
        payload
    }
}

/// Ordered most capable model and most explicit shape first, degrading to
/// simpler shapes and older models. Extending the ladder is an append here,
/// never new control flow.
pub const EDIT_LADDER: &[EditVariant] = &[
    EditVariant {
        model: "gemini-2.5-flash-image",
        role: Some("user"),
        output_hint: OutputHint::ImageModality,
    },
    EditVariant {
        model: "gemini-2.5-flash-image",
        role: None,
        output_hint: OutputHint::PngMimeType,
    },
    EditVariant {
        model: "gemini-2.5-flash-image-preview",
        role: Some("user"),
        output_hint: OutputHint::ImageModality,
    },
    EditVariant {
        model: "gemini-2.0-flash-preview-image-generation",
        role: None,
        output_hint: OutputHint::PngMimeType,
    },
];

pub struct EditClient {
    transport: Arc<dyn GenerateTransport>,
    ladder: Vec<EditVariant>,
}

impl EditClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(config)?),
            ladder: EDIT_LADDER.to_vec(),
        })
    }

    /// Swaps the submission seam, for tests and alternative transports.
    pub fn with_transport(transport: Arc<dyn GenerateTransport>) -> Self {
        Self {
            transport,
            ladder: EDIT_LADDER.to_vec(),
        }
    }

    pub fn with_ladder(mut self, ladder: Vec<EditVariant>) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn supported_models() -> Vec<&'static str> {
        let mut models: Vec<&'static str> = Vec::new();
        for variant in EDIT_LADDER {
            if !models.contains(&variant.model) {
                models.push(variant.model);
            }
        }
        models
    }

    /// Applies the instruction to the image through the fallback ladder and
    /// returns the edited image bytes.
    ///
    /// Normalization runs once; the result is reused across variants. A
    /// variant fails forward on a rejected request shape or an image-free
    /// reply; any other failure aborts the ladder.
    pub async fn edit(&self, instruction: &str, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let normalized = normalize_image(image_bytes)?;
        let image_b64 = STANDARD.encode(&normalized.bytes);
        let prompt = format!("{}{}", EDIT_DIRECTIVE, instruction);

        let mut attempts: Vec<EditAttempt> = Vec::new();
        let mut last_diagnostic = String::from("no variant produced an image");

        for (index, variant) in self.ladder.iter().enumerate() {
            log::info!(
                "Edit attempt {}/{} via {} ({})",
                index + 1,
                self.ladder.len(),
                variant.model,
                variant.shape_label()
            );
            let payload = variant.build_payload(&prompt, &normalized, &image_b64);

            match self.transport.submit(variant.model, &payload).await {
                Ok(body) => match extract_inline_image(&body)? {
                    Some(bytes) => {
                        attempts.push(EditAttempt {
                            model: variant.model.to_string(),
                            shape: variant.shape_label(),
                            outcome: AttemptOutcome::ImageReturned,
                        });
                        log::info!(
                            "Edit succeeded on attempt {} via {}",
                            attempts.len(),
                            variant.model
                        );
                        return Ok(bytes);
                    }
                    None => {
                        // The model answered with text instead of an image.
                        log::warn!("Model {} replied without image data", variant.model);
                        last_diagnostic = format!("{} replied without image data", variant.model);
                        attempts.push(EditAttempt {
                            model: variant.model.to_string(),
                            shape: variant.shape_label(),
                            outcome: AttemptOutcome::NoImageInReply,
                        });
                    }
                },
                Err(RelayError::RemediableRequest(diagnostic)) => {
                    log::warn!(
                        "Model {} rejected request shape: {}",
                        variant.model,
                        truncate(&diagnostic, MAX_DIAGNOSTIC_LEN)
                    );
                    last_diagnostic = diagnostic.clone();
                    attempts.push(EditAttempt {
                        model: variant.model.to_string(),
                        shape: variant.shape_label(),
                        outcome: AttemptOutcome::Rejected(diagnostic),
                    });
                }
                Err(other) => return Err(other),
            }
        }

        for attempt in &attempts {
            log::debug!(
                "Exhausted rung: {} ({}) -> {:?}",
                attempt.model,
                attempt.shape,
                attempt.outcome
            );
        }
        Err(RelayError::GenerationError(truncate(
            &last_diagnostic,
            MAX_DIAGNOSTIC_LEN,
        )))
    }
}

#[async_trait]
impl ImageEditor for EditClient {
    async fn edit(&self, instruction: &str, image_bytes: &[u8]) -> Result<Vec<u8>> {
        EditClient::edit(self, instruction, image_bytes).await
    }
}

/// Scans every part of every candidate for an inline binary payload and
/// decodes the first one found. Both field spellings occur in the wild.
/// TODO: validate against streamed partial replies once the remote API
/// documents them; today an image-free reply is treated as a shape failure.
pub fn extract_inline_image(body: &Value) -> Result<Option<Vec<u8>>> {
    let candidates = match body.get("candidates").and_then(Value::as_array) {
        Some(candidates) => candidates,
        None => return Ok(None),
    };

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array);
        let parts = match parts {
            Some(parts) => parts,
            None => continue,
        };

        for part in parts {
            let data = part
                .get("inline_data")
                .or_else(|| part.get("inlineData"))
                .and_then(|inline| inline.get("data"))
                .and_then(Value::as_str);
            if let Some(data) = data {
                if !data.is_empty() {
                    return STANDARD.decode(data).map(Some).map_err(|e| {
                        RelayError::ResponseError(format!("invalid base64 in image reply: {}", e))
                    });
                }
            }
        }
    }

    Ok(None)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum ScriptedReply {
        Body(Value),
        Remediable(&'static str),
        NonRemediable(&'static str),
    }

    struct ScriptedTransport {
        script: Mutex<VecDeque<ScriptedReply>>,
        calls: AtomicUsize,
        payloads: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<ScriptedReply>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerateTransport for ScriptedTransport {
        async fn submit(&self, model: &str, payload: &Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads
                .lock()
                .unwrap()
                .push((model.to_string(), payload.clone()));
            match self.script.lock().unwrap().pop_front() {
                Some(ScriptedReply::Body(body)) => Ok(body),
                Some(ScriptedReply::Remediable(msg)) => {
                    Err(RelayError::RemediableRequest(msg.to_string()))
                }
                Some(ScriptedReply::NonRemediable(msg)) => {
                    Err(RelayError::NonRemediableRequest(msg.to_string()))
                }
                None => panic!("transport called more often than scripted"),
            }
        }
    }

    fn sample_image_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(6, 4, image::Rgb([10, 20, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn image_reply(bytes: &[u8]) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inline_data": { "mime_type": "image/png", "data": STANDARD.encode(bytes) } }
                    ]
                }
            }]
        })
    }

    fn text_only_reply() -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": "I cannot edit this image." }] }
            }]
        })
    }

    #[tokio::test]
    async fn ladder_advances_past_remediable_failures() {
        let edited = vec![7u8, 8, 9];
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedReply::Remediable("400 Bad Request: unknown field"),
            ScriptedReply::Remediable("404 Not Found: no such model"),
            ScriptedReply::Body(image_reply(&edited)),
        ]));
        let client = EditClient::with_transport(transport.clone());

        let result = client
            .edit("replace 1.45 with 2.15", &sample_image_bytes())
            .await
            .unwrap();

        assert_eq!(result, edited);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn non_remediable_failure_aborts_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedReply::NonRemediable(
            "remote returned 429",
        )]));
        let client = EditClient::with_transport(transport.clone());

        let err = client.edit("x", &sample_image_bytes()).await.unwrap_err();

        assert!(matches!(err, RelayError::NonRemediableRequest(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_ladder_reports_last_diagnostic() {
        let script = (0..EDIT_LADDER.len())
            .map(|_| ScriptedReply::Remediable("400 Bad Request: contents[0] unknown"))
            .collect();
        let transport = Arc::new(ScriptedTransport::new(script));
        let client = EditClient::with_transport(transport.clone());

        let err = client.edit("x", &sample_image_bytes()).await.unwrap_err();

        assert_eq!(transport.calls(), EDIT_LADDER.len());
        match err {
            RelayError::GenerationError(diag) => {
                assert!(!diag.is_empty());
                assert!(diag.contains("400"));
            }
            other => panic!("expected GenerationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn text_only_reply_is_not_a_success() {
        let edited = vec![1u8, 2];
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedReply::Body(text_only_reply()),
            ScriptedReply::Body(image_reply(&edited)),
        ]));
        let client = EditClient::with_transport(transport.clone());

        let result = client.edit("x", &sample_image_bytes()).await.unwrap();

        assert_eq!(result, edited);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn normalization_happens_once_and_is_shared_across_variants() {
        let edited = vec![5u8];
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedReply::Remediable("400"),
            ScriptedReply::Body(image_reply(&edited)),
        ]));
        let client = EditClient::with_transport(transport.clone());

        client.edit("x", &sample_image_bytes()).await.unwrap();

        let payloads = transport.payloads.lock().unwrap();
        let data_of = |payload: &Value| {
            payload["contents"][0]["parts"][1]["inline_data"]["data"]
                .as_str()
                .unwrap()
                .to_string()
        };
        assert_eq!(data_of(&payloads[0].1), data_of(&payloads[1].1));
    }

    #[tokio::test]
    async fn prompt_carries_directive_and_instruction() {
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedReply::Body(
            image_reply(&[1]),
        )]));
        let client = EditClient::with_transport(transport.clone());

        client
            .edit("set Total = 1580", &sample_image_bytes())
            .await
            .unwrap();

        let payloads = transport.payloads.lock().unwrap();
        let text = payloads[0].1["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.starts_with("Edit the image strictly"));
        assert!(text.ends_with("set Total = 1580"));
    }

    #[tokio::test]
    async fn undecodable_input_fails_before_any_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = EditClient::with_transport(transport.clone());

        let err = client.edit("x", b"not an image").await.unwrap_err();

        assert!(matches!(err, RelayError::DecodeError(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn role_tag_axis_is_honored() {
        let image = NormalizedImage {
            bytes: vec![1],
            mime_type: "image/png",
        };
        let with_role = EditVariant {
            model: "m",
            role: Some("user"),
            output_hint: OutputHint::None,
        }
        .build_payload("p", &image, "AQ==");
        let without_role = EditVariant {
            model: "m",
            role: None,
            output_hint: OutputHint::None,
        }
        .build_payload("p", &image, "AQ==");

        assert_eq!(with_role["contents"][0]["role"], json!("user"));
        assert!(without_role["contents"][0].get("role").is_none());
    }

    #[test]
    fn output_hint_axis_is_honored() {
        let image = NormalizedImage {
            bytes: vec![1],
            mime_type: "image/jpeg",
        };
        let modality = EditVariant {
            model: "m",
            role: None,
            output_hint: OutputHint::ImageModality,
        }
        .build_payload("p", &image, "AQ==");
        let mime = EditVariant {
            model: "m",
            role: None,
            output_hint: OutputHint::PngMimeType,
        }
        .build_payload("p", &image, "AQ==");

        assert_eq!(modality["responseModalities"], json!(["IMAGE"]));
        assert!(modality.get("generationConfig").is_none());
        assert_eq!(
            mime["generationConfig"]["responseMimeType"],
            json!("image/png")
        );
        assert!(mime.get("responseModalities").is_none());
        assert_eq!(
            mime["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            json!("image/jpeg")
        );
    }

    #[test]
    fn extraction_accepts_camel_case_spelling() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [{ "inlineData": { "data": STANDARD.encode([9u8, 9]) } }]
                }
            }]
        });
        assert_eq!(extract_inline_image(&body).unwrap(), Some(vec![9, 9]));
    }

    #[test]
    fn supported_models_deduplicates_ladder() {
        let models = EditClient::supported_models();
        assert!(models.contains(&"gemini-2.5-flash-image"));
        let mut unique = models.clone();
        unique.dedup();
        assert_eq!(models.len(), unique.len());
    }
}
