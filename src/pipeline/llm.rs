//! Vision call: pair the encoded drawing with the extraction prompt and send
//! it to the configured client exactly once.
//!
//! There is no retry loop. A drawing costs one request; a transient failure
//! surfaces to the caller, who can simply run the command again.

use crate::client::{VisionClient, VisionReply, VisionRequest};
use crate::config::ExtractionConfig;
use crate::error::Iso2BomError;
use crate::pipeline::encode::EncodedImage;
use std::time::Instant;
use tracing::{debug, info};

/// Build the request for `image` from the config.
///
/// Image first, prompt second: the request carries a single user turn.
pub fn build_request(image: EncodedImage, config: &ExtractionConfig) -> VisionRequest {
    VisionRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        prompt: config.prompt_text().to_string(),
        image,
    }
}

/// Send one vision request and return the raw reply.
pub async fn call_vision(
    client: &dyn VisionClient,
    request: &VisionRequest,
) -> Result<VisionReply, Iso2BomError> {
    let start = Instant::now();
    debug!(
        "Sending {} ({} bytes) to {} / {}",
        request.image.media_type,
        request.image.byte_len,
        client.name(),
        request.model
    );

    let reply = client.complete(request).await?;

    info!(
        "{}: {} input tokens, {} output tokens, {:?}",
        client.name(),
        reply.input_tokens,
        reply.output_tokens,
        start.elapsed()
    );
    Ok(reply)
}
