//! Generation client integration.
//!
//! The external try-on service is an opaque collaborator: one request with a
//! subject photo and a garment photo, one composited image back, or a single
//! failure. The orchestrator never retries and never inspects the failure.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{GenerationConfig, ImageData};

/// Trait for try-on generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Composite the garment onto the subject.
    ///
    /// Single attempt. Any failure (transport, service rejection, missing
    /// image in the response) surfaces as one [`GenerationError`].
    async fn generate(
        &self,
        subject: &ImageData,
        garment: &ImageData,
    ) -> Result<ImageData, GenerationError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Opaque generation failure.
///
/// The reason is kept for logs only; the user sees the configured generic
/// message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Generation failed: {reason}")]
pub struct GenerationError {
    reason: String,
}

impl GenerationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Build the configured provider.
pub fn client_from_config(config: &GenerationConfig) -> anyhow::Result<Arc<dyn GenerationClient>> {
    match config.provider.as_str() {
        #[cfg(feature = "gemini")]
        "gemini" => Ok(Arc::new(GeminiClient::from_config(config)?)),
        other => anyhow::bail!("Unknown generation provider: {other}"),
    }
}
