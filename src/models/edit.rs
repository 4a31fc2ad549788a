/// Image payload reduced to a form the generation API accepts.
/// Derived per call, never cached.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// One rung of the fallback ladder, recorded for the duration of a single
/// edit call.
#[derive(Debug, Clone)]
pub struct EditAttempt {
    pub model: String,
    pub shape: String,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    ImageReturned,
    NoImageInReply,
    Rejected(String),
}
