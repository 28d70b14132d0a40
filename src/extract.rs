//! Top-level extraction entry points.
//!
//! One drawing in, one [`ExtractionOutput`] out. Every failure is terminal:
//! there is no retry and no partial result.

use crate::client::{AnthropicClient, ProviderClient, VisionClient};
use crate::config::{Backend, ExtractionConfig};
use crate::error::Iso2BomError;
use crate::model::{missing_sections, ExtractionResult};
use crate::output::{output_path_for, write_json, ExtractionOutput, ExtractionStats};
use crate::pipeline::{encode, input, llm, postprocess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract a bill of materials from a drawing image (local path or URL).
///
/// # Errors
/// Any [`Iso2BomError`]; see [`Iso2BomError::category`].
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Iso2BomError> {
    let client = resolve_client(config)?;
    extract_with_client(input_str, config, client.as_ref()).await
}

/// Like [`extract`], but with an explicit client. The config's own backend
/// and injected client are ignored.
pub async fn extract_with_client(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
    client: &dyn VisionClient,
) -> Result<ExtractionOutput, Iso2BomError> {
    let result = run(input_str.as_ref(), config, client).await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_extraction_error(&e.to_string());
    }
    result
}

/// Extract, then save the parsed reply as JSON in `config.output_dir` (or
/// the current directory).
///
/// Returns the output together with the path written.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, PathBuf), Iso2BomError> {
    let output = extract(input_str, config).await?;
    let path = save_output(&output, config).await?;
    Ok((output, path))
}

/// Persist `output.json` under the name derived from the drawing.
pub async fn save_output(
    output: &ExtractionOutput,
    config: &ExtractionConfig,
) -> Result<PathBuf, Iso2BomError> {
    let path = output_path_for(
        Path::new(&output.source_name),
        config.output_dir.as_deref(),
        &config.output_suffix,
    );
    write_json(&path, &output.json).await?;
    info!("Results saved to {}", path.display());
    Ok(path)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Iso2BomError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Iso2BomError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    input_str: &str,
    config: &ExtractionConfig,
    client: &dyn VisionClient,
) -> Result<ExtractionOutput, Iso2BomError> {
    let start = Instant::now();
    let cb = config.progress_callback.as_ref();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(
        input_str,
        config.strict_extensions,
        config.download_timeout_secs,
    )
    .await?;
    let source_name = resolved.display_name();
    info!("Analyzing drawing: {}", source_name);
    if let Some(cb) = cb {
        cb.on_extraction_start(&source_name);
    }

    // ── Step 2: Encode ───────────────────────────────────────────────────
    let image = encode::encode_file(resolved.path(), resolved.media_type()).await?;
    let image_bytes = image.byte_len;

    // ── Step 3: One vision call ──────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_request_start(client.name(), &config.model);
    }
    let request = llm::build_request(image, config);
    let reply = llm::call_vision(client, &request).await?;
    if let Some(cb) = cb {
        cb.on_reply(&reply);
    }

    // ── Step 4: Normalise + decode ───────────────────────────────────────
    let json = postprocess::parse_reply(&reply.text, config.fence_mode)?;
    let result = ExtractionResult::from_value(&json, &reply.text)?;

    let missing = missing_sections(&json);
    if !missing.is_empty() {
        warn!("Reply is missing sections: {}", missing.join(", "));
    }
    debug!(
        "Decoded {} items, {} below 70% confidence",
        result.item_count(),
        result.low_confidence_count()
    );

    if let Some(cb) = cb {
        cb.on_extraction_complete(result.item_count());
    }

    Ok(ExtractionOutput {
        result,
        json,
        raw_response: reply.text,
        media_type: resolved.media_type(),
        source_name,
        stats: ExtractionStats {
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
            truncated: reply.truncated,
            image_bytes,
        },
    })
}

/// Pick the client, from most-specific to least-specific:
///
/// 1. **Injected client** (`config.client`) — used as-is.
/// 2. **Named provider** (`Backend::Provider`) — built through edgequake-llm,
///    which reads that provider's own API key.
/// 3. **Anthropic** — the built-in client with `config.api_key`.
pub fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn VisionClient>, Iso2BomError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    match &config.backend {
        Backend::Provider(name) => Ok(Arc::new(ProviderClient::from_name(name, &config.model)?)),
        Backend::Anthropic => Ok(Arc::new(AnthropicClient::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{VisionReply, VisionRequest};
    use crate::progress::ExtractionProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned(&'static str);

    #[async_trait]
    impl VisionClient for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _: &VisionRequest) -> Result<VisionReply, Iso2BomError> {
            Ok(VisionReply {
                text: self.0.to_string(),
                input_tokens: 1200,
                output_tokens: 300,
                truncated: false,
            })
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl ExtractionProgressCallback for Events {
        fn on_extraction_start(&self, name: &str) {
            self.0.lock().unwrap().push(format!("start {name}"));
        }
        fn on_request_start(&self, backend: &str, _model: &str) {
            self.0.lock().unwrap().push(format!("request {backend}"));
        }
        fn on_extraction_complete(&self, n: usize) {
            self.0.lock().unwrap().push(format!("done {n}"));
        }
        fn on_extraction_error(&self, error: &str) {
            self.0.lock().unwrap().push(format!("error {error}"));
        }
    }

    fn drawing(dir: &Path) -> PathBuf {
        let path = dir.join("P-001.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
        path
    }

    #[tokio::test]
    async fn injected_client_wins_and_events_fire_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = drawing(dir.path());
        let events = Arc::new(Events::default());
        let config = ExtractionConfig::builder()
            .client(Arc::new(Canned("```json\n{\"pipes\": [{\"size\": \"2\\\"\"}]}\n```")))
            .progress_callback(events.clone())
            .build()
            .unwrap();

        let out = extract(path.to_str().unwrap(), &config).await.unwrap();
        assert_eq!(out.result.pipes.len(), 1);
        assert_eq!(out.source_name, "P-001.png");
        assert_eq!(out.stats.input_tokens, 1200);
        assert_eq!(out.stats.image_bytes, 12);
        assert_eq!(
            *events.0.lock().unwrap(),
            vec!["start P-001.png", "request canned", "done 1"]
        );
    }

    #[tokio::test]
    async fn parse_failure_reports_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = drawing(dir.path());
        let events = Arc::new(Events::default());
        let config = ExtractionConfig::builder()
            .client(Arc::new(Canned("I cannot read this drawing.")))
            .progress_callback(events.clone())
            .build()
            .unwrap();

        let err = extract(path.to_str().unwrap(), &config).await.unwrap_err();
        assert_eq!(err.raw_response(), Some("I cannot read this drawing."));
        let events = events.0.lock().unwrap();
        assert!(events.last().unwrap().starts_with("error Error parsing JSON response"));
    }

    #[tokio::test]
    async fn missing_file_never_reaches_the_client() {
        struct Unreachable;

        #[async_trait]
        impl VisionClient for Unreachable {
            fn name(&self) -> &str {
                "unreachable"
            }
            async fn complete(&self, _: &VisionRequest) -> Result<VisionReply, Iso2BomError> {
                panic!("client must not be called");
            }
        }

        let config = ExtractionConfig::builder().api_key("k").build().unwrap();
        let err = extract_with_client("nope/P-404.png", &config, &Unreachable)
            .await
            .unwrap_err();
        assert!(matches!(err, Iso2BomError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn save_output_honours_dir_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = drawing(dir.path());
        let out_dir = dir.path().join("out");
        let config = ExtractionConfig::builder()
            .client(Arc::new(Canned("{\"notes\": [\"n\"], \"extra_key\": true}")))
            .output_dir(&out_dir)
            .output_suffix("_bom.json")
            .build()
            .unwrap();

        let (out, saved) = extract_to_file(path.to_str().unwrap(), &config).await.unwrap();
        assert_eq!(saved, out_dir.join("P-001_bom.json"));
        let text = std::fs::read_to_string(&saved).unwrap();
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, out.json);
        assert_eq!(back["extra_key"], serde_json::json!(true));
    }

    #[test]
    fn anthropic_is_the_default_client() {
        let config = ExtractionConfig::builder().api_key("k").build().unwrap();
        assert_eq!(resolve_client(&config).unwrap().name(), "anthropic");
    }
}
