pub mod edit_client;
pub mod transport;

use crate::error::Result;
use async_trait::async_trait;

pub use edit_client::{EditClient, EditVariant, OutputHint, EDIT_LADDER};
pub use transport::{classify_status, FailureKind, GenerateTransport, HttpTransport};

/// Seam the update handlers talk to; the concrete client runs the
/// fallback ladder against the remote API.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn edit(&self, instruction: &str, image_bytes: &[u8]) -> Result<Vec<u8>>;
}
