//! Anthropic Messages API client.
//!
//! Sends exactly one `POST {base_url}/messages` per call: a single user turn
//! holding the base64 image block followed by the prompt text. There is no
//! retry here; a failed call is reported and the run ends.

use super::{VisionClient, VisionReply, VisionRequest};
use crate::config::{ExtractionConfig, DEFAULT_BASE_URL};
use crate::error::Iso2BomError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest slice of an unparseable error body echoed into an error message.
const MAX_ERROR_BODY: usize = 500;

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
    http: reqwest::Client,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicClient {
    /// Create a client for the public API endpoint.
    ///
    /// # Errors
    /// [`Iso2BomError::MissingApiKey`] if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Iso2BomError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Iso2BomError::MissingApiKey {
                var: crate::config::API_KEY_ENV.to_string(),
            });
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            http: reqwest::Client::new(),
        })
    }

    /// Create a client from the key, base URL and timeout in `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, Iso2BomError> {
        let mut client = Self::new(config.api_key.clone().unwrap_or_default())?
            .with_base_url(config.base_url.clone());
        if let Some(secs) = config.api_timeout_secs {
            client = client.with_timeout(Duration::from_secs(secs));
        }
        Ok(client)
    }

    /// Point the client at an Anthropic-compatible endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound the whole request/response exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn transport_error(&self, e: reqwest::Error) -> Iso2BomError {
        if e.is_timeout() {
            Iso2BomError::ApiTimeout {
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }
        } else {
            Iso2BomError::Transport {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl VisionClient for AnthropicClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Iso2BomError> {
        let url = format!("{}/messages", self.base_url);
        let body = MessagesRequest::new(request);

        debug!(
            url = %url,
            model = %request.model,
            max_tokens = request.max_tokens,
            image_b64_len = request.image.data.len(),
            "Sending request to Anthropic Messages API"
        );

        let mut builder = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &text));
        }

        parse_reply(&text, status.as_u16())
    }
}

fn parse_reply(body: &str, status: u16) -> Result<VisionReply, Iso2BomError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|e| Iso2BomError::ApiError {
            provider: PROVIDER.to_string(),
            status: Some(status),
            message: format!("unexpected response body: {e}"),
        })?;

    let usage = parsed.usage.unwrap_or_default();
    let truncated = parsed.stop_reason.as_deref() == Some("max_tokens");
    if truncated {
        warn!(
            output_tokens = usage.output_tokens,
            "Reply hit the max_tokens ceiling; JSON is likely cut off"
        );
    }

    let text = parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| Iso2BomError::EmptyResponse {
            provider: PROVIDER.to_string(),
        })?;

    info!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "Anthropic reply received"
    );

    Ok(VisionReply {
        text,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        truncated,
    })
}

/// Map a non-2xx answer to the error taxonomy.
fn error_from_status(status: u16, body: &str) -> Iso2BomError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if env.error.kind.is_empty() => env.error.message,
        Ok(env) => format!("{}: {}", env.error.kind, env.error.message),
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    };
    warn!(status, error = %message, "Anthropic API returned error response");

    match status {
        401 | 403 => Iso2BomError::AuthError {
            provider: PROVIDER.to_string(),
            detail: message,
        },
        _ => Iso2BomError::ApiError {
            provider: PROVIDER.to_string(),
            status: Some(status),
            message,
        },
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

impl<'a> MessagesRequest<'a> {
    fn new(request: &'a VisionRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: request.image.media_type.as_str(),
                            data: &request.image.data,
                        },
                    },
                    ContentBlock::Text {
                        text: &request.prompt,
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedImage;
    use crate::pipeline::input::MediaType;
    use serde_json::json;

    fn request() -> VisionRequest {
        VisionRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            temperature: None,
            prompt: "extract".into(),
            image: EncodedImage {
                media_type: MediaType::Png,
                data: "iVBORw0K".into(),
                byte_len: 6,
            },
        }
    }

    #[test]
    fn request_body_shape() {
        let req = request();
        let body = serde_json::to_value(MessagesRequest::new(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 4096,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0K"}},
                        {"type": "text", "text": "extract"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn temperature_serialised_when_set() {
        let mut req = request();
        req.temperature = Some(0.0);
        let body = serde_json::to_value(MessagesRequest::new(&req)).unwrap();
        assert_eq!(body["temperature"], json!(0.0));
    }

    #[test]
    fn blank_key_rejected() {
        let err = AnthropicClient::new("").unwrap_err();
        assert!(matches!(err, Iso2BomError::MissingApiKey { .. }));
    }

    #[test]
    fn debug_redacts_key() {
        let client = AnthropicClient::new("sk-ant-secret").unwrap();
        assert!(!format!("{client:?}").contains("sk-ant-secret"));
    }

    #[test]
    fn reply_takes_first_text_block() {
        let body = json!({
            "content": [{"type": "text", "text": "{\"a\":1}"}, {"type": "text", "text": "ignored"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1200, "output_tokens": 40}
        })
        .to_string();
        let reply = parse_reply(&body, 200).unwrap();
        assert_eq!(reply.text, "{\"a\":1}");
        assert_eq!(reply.input_tokens, 1200);
        assert_eq!(reply.output_tokens, 40);
        assert!(!reply.truncated);
    }

    #[test]
    fn max_tokens_stop_marks_truncated() {
        let body = json!({
            "content": [{"type": "text", "text": "{\"pipes\": ["}],
            "stop_reason": "max_tokens"
        })
        .to_string();
        assert!(parse_reply(&body, 200).unwrap().truncated);
    }

    #[test]
    fn reply_without_text_is_empty_response() {
        let body = json!({"content": [], "stop_reason": "end_turn"}).to_string();
        let err = parse_reply(&body, 200).unwrap_err();
        assert!(matches!(err, Iso2BomError::EmptyResponse { .. }));
    }

    #[test]
    fn unauthorised_maps_to_auth_error() {
        let body = json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}});
        let err = error_from_status(401, &body.to_string());
        match err {
            Iso2BomError::AuthError { detail, .. } => {
                assert_eq!(detail, "authentication_error: invalid x-api-key")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn overload_maps_to_api_error_with_status() {
        let err = error_from_status(529, "upstream overloaded");
        match err {
            Iso2BomError::ApiError { status, message, .. } => {
                assert_eq!(status, Some(529));
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
