//! Pipeline stages for drawing extraction.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess ──▶ report
//! (path/URL) (base64)  (VLM)   (fences→JSON)    (text)
//! ```
//!
//! 1. [`input`]  — resolve the path or URL to a local file and pick the
//!    media type from its extension
//! 2. [`encode`] — read the bytes and base64-wrap them for the request body
//! 3. [`llm`]    — one vision call; the only stage with network I/O
//! 4. [`postprocess`] — cut the JSON payload out of the reply and parse it
//! 5. [`report`] — fixed-width bill-of-materials text for the terminal

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod report;
