//! Adapter from `edgequake_llm` providers to [`VisionClient`].
//!
//! Used when the caller selects a non-Anthropic backend. The provider reads
//! its own credentials (`OPENAI_API_KEY`, `GEMINI_API_KEY`, …) when the
//! factory builds it.

use super::{VisionClient, VisionReply, VisionRequest};
use crate::error::Iso2BomError;
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LLMResponse, ProviderFactory,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// A [`VisionClient`] backed by any edgequake-llm provider.
pub struct ProviderClient {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    /// Wrap an already-constructed provider.
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    /// Build a provider by name through [`ProviderFactory`].
    ///
    /// # Errors
    /// [`Iso2BomError::ProviderNotConfigured`] when the factory rejects the
    /// name or the provider's API key is missing.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, Iso2BomError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            Iso2BomError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider_name, provider))
    }
}

#[async_trait]
impl VisionClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Iso2BomError> {
        let image = ImageData::new(
            request.image.data.clone(),
            request.image.media_type.as_str(),
        );
        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![image],
        )];
        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        debug!(provider = %self.name, model = %request.model, "Sending vision request");

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| Iso2BomError::ApiError {
                provider: self.name.clone(),
                status: None,
                message: format!("{e}"),
            })?;

        into_reply(&self.name, response, request.max_tokens)
    }
}

/// Map a provider response onto a [`VisionReply`].
///
/// A reply counts as truncated when the provider says it stopped on length
/// or when its completion tokens reach `max_tokens`.
fn into_reply(
    provider: &str,
    response: LLMResponse,
    max_tokens: usize,
) -> Result<VisionReply, Iso2BomError> {
    let stopped_on_length = matches!(
        response.finish_reason.as_deref(),
        Some("length" | "max_tokens")
    );
    let truncated = stopped_on_length || response.completion_tokens >= max_tokens;
    if truncated {
        warn!(
            output_tokens = response.completion_tokens,
            "Reply reached the max_tokens ceiling; JSON is likely cut off"
        );
    }
    if response.content.trim().is_empty() {
        return Err(Iso2BomError::EmptyResponse {
            provider: provider.to_string(),
        });
    }

    Ok(VisionReply {
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
        text: response.content,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedImage;
    use crate::pipeline::input::MediaType;
    use edgequake_llm::MockProvider;

    fn request() -> VisionRequest {
        VisionRequest {
            model: "mock-model".into(),
            max_tokens: 4096,
            temperature: Some(0.0),
            prompt: "extract".into(),
            image: EncodedImage {
                media_type: MediaType::Png,
                data: "iVBORw0K".into(),
                byte_len: 6,
            },
        }
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        match ProviderClient::from_name("no-such-provider", "m") {
            Err(Iso2BomError::ProviderNotConfigured { provider, hint }) => {
                assert_eq!(provider, "no-such-provider");
                assert!(!hint.is_empty());
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown provider was accepted"),
        }
    }

    #[tokio::test]
    async fn reply_text_comes_from_the_provider() {
        let mock = MockProvider::new();
        mock.add_response("{\"pipes\": []}").await;
        let client = ProviderClient::new("mock", Arc::new(mock));

        let reply = client.complete(&request()).await.unwrap();
        assert_eq!(client.name(), "mock");
        assert_eq!(reply.text, "{\"pipes\": []}");
        assert!(!reply.truncated);
    }

    #[tokio::test]
    async fn blank_reply_is_empty_response() {
        let mock = MockProvider::new();
        mock.add_response("  \n ").await;
        let client = ProviderClient::new("mock", Arc::new(mock));

        let err = client.complete(&request()).await.unwrap_err();
        assert!(
            matches!(err, Iso2BomError::EmptyResponse { ref provider } if provider == "mock"),
            "{err:?}"
        );
    }

    #[test]
    fn completion_at_the_ceiling_is_truncated() {
        let response = LLMResponse::new("{\"pipes\": [", "m").with_usage(1200, 4096);
        let reply = into_reply("openai", response, 4096).unwrap();
        assert!(reply.truncated);
        assert_eq!(reply.input_tokens, 1200);
        assert_eq!(reply.output_tokens, 4096);
    }

    #[test]
    fn length_finish_reason_is_truncated() {
        let response = LLMResponse::new("{", "m")
            .with_usage(10, 20)
            .with_finish_reason("length");
        assert!(into_reply("openai", response, 4096).unwrap().truncated);
    }

    #[test]
    fn normal_completion_is_not_truncated() {
        let response = LLMResponse::new("{}", "m")
            .with_usage(10, 20)
            .with_finish_reason("stop");
        let reply = into_reply("openai", response, 4096).unwrap();
        assert!(!reply.truncated);
        assert_eq!(reply.text, "{}");
    }
}
