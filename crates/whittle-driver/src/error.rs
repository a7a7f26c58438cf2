//! Error types for the document-control layer
//!
//! Driver failures are fatal to a reduction run: a navigation error, a stale
//! node handle, or a broken evaluate bridge means the oracle can no longer be
//! trusted, so these propagate to the top-level entry point instead of being
//! swallowed.

use crate::control::NodeRef;

/// Document-control driver errors
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Browser process failed to launch
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Opening a rendering context (tab) failed
    #[error("session open failed: {0}")]
    SessionOpen(String),

    /// Content load / navigation failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// In-page script evaluation failed
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Screenshot capture failed
    #[error("screenshot capture failed: {0}")]
    Screenshot(String),

    /// Screenshot bytes were not a decodable PNG
    #[error("screenshot decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A node handle no longer resolves to a live node
    #[error("stale node handle: {0}")]
    StaleNode(NodeRef),

    /// The evaluate bridge returned malformed JSON
    #[error("driver bridge error: {0}")]
    Bridge(#[from] serde_json::Error),

    /// A blocking driver task panicked or was cancelled
    #[error("driver task failed: {0}")]
    TaskJoin(String),

    /// Device emulation could not be applied
    #[error("device emulation failed: {0}")]
    Emulation(String),
}
