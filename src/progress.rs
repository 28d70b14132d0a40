//! Progress-callback trait for extraction status events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through a drawing. The CLI uses this to
//! print its status lines and drive a spinner; library callers can forward
//! events wherever they like.
//!
//! # Example
//!
//! ```rust
//! use iso2bom::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_extraction_start(&self, name: &str) {
//!         eprintln!("starting {name}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .api_key("sk-ant-test")
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::client::VisionReply;
use std::sync::Arc;

/// Called by the extraction pipeline at each stage boundary.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Input resolved; `name` is the drawing's file name.
    fn on_extraction_start(&self, name: &str) {
        let _ = name;
    }

    /// About to send the vision request.
    ///
    /// # Arguments
    /// * `backend` — client name (`anthropic`, `openai`, …)
    /// * `model`   — model identifier
    fn on_request_start(&self, backend: &str, model: &str) {
        let _ = (backend, model);
    }

    /// Reply received, before parsing.
    fn on_reply(&self, reply: &VisionReply) {
        let _ = reply;
    }

    /// The reply parsed; `item_count` is the number of BOM rows.
    fn on_extraction_complete(&self, item_count: usize) {
        let _ = item_count;
    }

    /// Any stage failed.
    fn on_extraction_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
