//! Vision clients: the one network-facing seam of the crate.
//!
//! [`VisionClient`] is the request/response contract the pipeline depends
//! on. Two implementations ship with the crate:
//!
//! * [`AnthropicClient`] — talks to the Anthropic Messages API directly and
//!   takes its API key at construction.
//! * [`ProviderClient`] — adapts any `edgequake_llm` provider (OpenAI,
//!   Gemini, Ollama, …) for callers who pick a different backend.
//!
//! Tests inject their own implementation through
//! [`crate::config::ExtractionConfigBuilder::client`].

mod anthropic;
mod provider;

pub use anthropic::AnthropicClient;
pub use provider::ProviderClient;

use crate::error::Iso2BomError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;

/// One image-plus-prompt request.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub prompt: String,
    pub image: EncodedImage,
}

/// The model's textual reply plus usage accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// The reply stopped at the `max_tokens` ceiling.
    pub truncated: bool,
}

/// A multimodal completion endpoint.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;

    /// Send the request once and return the raw reply text.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Iso2BomError>;
}
