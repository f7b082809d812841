//! Vision-capability seam.
//!
//! The pipeline treats OCR as a black box: *given an encoded image and a
//! prompt, return a structured text transcript*. [`VisionProvider`] is that
//! contract. The library ships one concrete implementation
//! ([`OpenAiVisionProvider`]) speaking the OpenAI-compatible
//! chat-completions schema; tests inject scripted providers, and host
//! applications can wrap the trait with their own caching, retry, or
//! rate-limiting middleware — the pipeline itself never retries beyond the
//! single recovery attempt.

mod openai;

pub use openai::OpenAiVisionProvider;

use async_trait::async_trait;
use thiserror::Error;

/// A page image encoded for transmission to the capability.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        EncodedImage {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Errors surfaced by a capability call.
///
/// The pipeline does not distinguish beyond "this document failed": every
/// variant becomes a per-document error string. The split exists so
/// implementations can report honestly and host middleware can decide what
/// is worth retrying.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The API rejected the request or returned an error payload.
    #[error("capability API error: {0}")]
    Api(String),

    /// Authentication failed (missing or invalid key) — retry won't help.
    #[error("capability authentication error: {0}")]
    Auth(String),

    /// The capability endpoint could not be reached.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

/// The external OCR/vision capability.
///
/// Assumed synchronous-per-call, fallible, and stateless: one image plus one
/// prompt in, one text transcript out. Implementations must be `Send + Sync`
/// because the pipeline fans extraction calls out concurrently.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Transcribe one document image according to `prompt`.
    async fn extract(&self, image: &EncodedImage, prompt: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs.
    fn name(&self) -> &str {
        "vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl VisionProvider for EchoProvider {
        async fn extract(
            &self,
            image: &EncodedImage,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            Ok(format!("TYPE_DOCUMENT: AUTRE\n# {} bytes", image.data.len()))
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let provider: Box<dyn VisionProvider> = Box::new(EchoProvider);
        let img = EncodedImage::new("QUJD", "image/png");
        let out = provider.extract(&img, "prompt").await.unwrap();
        assert!(out.starts_with("TYPE_DOCUMENT:"));
    }

    #[test]
    fn provider_error_display() {
        let e = ProviderError::Auth("invalid key".into());
        assert!(e.to_string().contains("invalid key"));
    }
}
