//! The document-control seam
//!
//! Defines the async trait every rendering backend implements:
//! - content get/set and serialization
//! - opaque node handles, child queries re-run live on every call
//! - detach/reattach with an explicit rollback token
//! - settle delays and full-page screenshots
//!
//! Node handles are only meaningful within the session that issued them;
//! they are invalidated by `set_content`.

use crate::error::DriverError;
use crate::raster::RasterImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque handle to a live node within one session's document
///
/// Not valid across sessions, and invalidated when the session's content is
/// replaced wholesale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeRef(pub u64);

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rollback token recorded at detach time
///
/// `next_sibling` is the node (element or text) the detached node sat
/// immediately before; `None` means it was the last child. Reattaching at
/// this point restores the exact document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachPoint {
    /// Parent the node was detached from
    pub parent: NodeRef,
    /// Sibling the node preceded, or `None` for last child
    pub next_sibling: Option<NodeRef>,
}

/// Which fixed settle delay to apply before a measurement
///
/// Rendering is nondeterministic without these: layout and animations need a
/// beat to quiesce before a screenshot means anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleProfile {
    /// Two frame-ticks plus one animation-frame wait (per-mutation checks)
    Standard,
    /// Extended delay so entrance animations finish (baseline capture)
    Baseline,
}

impl SettleProfile {
    /// Host-side delay before the in-page frame waits
    #[inline]
    #[must_use]
    pub fn host_delay(self) -> Duration {
        match self {
            Self::Standard => Duration::from_millis(32),
            Self::Baseline => Duration::from_millis(500),
        }
    }
}

/// Remote control over one live document in one emulated viewport
///
/// All mutation and measurement round-trips go through here. Implementations
/// must re-query live state on every call; nothing may be cached across
/// calls, because the tree shrinks underneath the traversals that use it.
#[async_trait::async_trait]
pub trait DocumentControl: Send + Sync {
    /// Replace the document with `html` and wait for load completion
    async fn set_content(&self, html: &str) -> Result<(), DriverError>;

    /// Serialize the current document (doctype plus root element)
    async fn content(&self) -> Result<String, DriverError>;

    /// Apply a fixed settle delay (host sleep, frame tick, animation frame)
    async fn settle(&self, profile: SettleProfile) -> Result<(), DriverError>;

    /// Capture a full-page screenshot
    async fn screenshot(&self) -> Result<RasterImage, DriverError>;

    /// Handle to the root element
    async fn root(&self) -> Result<NodeRef, DriverError>;

    /// Direct child elements, queried live at call time
    async fn child_elements(&self, node: NodeRef) -> Result<Vec<NodeRef>, DriverError>;

    /// Tag name of the node (as reported by the document, usually uppercase)
    async fn tag_name(&self, node: NodeRef) -> Result<String, DriverError>;

    /// Detach the node from the tree, returning its rollback token
    async fn detach(&self, node: NodeRef) -> Result<DetachPoint, DriverError>;

    /// Reinsert a detached node at its recorded position
    async fn reattach(&self, node: NodeRef, at: &DetachPoint) -> Result<(), DriverError>;

    /// Name/value attribute pairs in document order
    async fn attributes(&self, node: NodeRef) -> Result<Vec<(String, String)>, DriverError>;

    /// Single attribute value, `None` when absent
    async fn attribute(&self, node: NodeRef, name: &str)
        -> Result<Option<String>, DriverError>;

    /// Set an attribute verbatim
    async fn set_attribute(
        &self,
        node: NodeRef,
        name: &str,
        value: &str,
    ) -> Result<(), DriverError>;

    /// Remove an attribute
    async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), DriverError>;

    /// All nodes matching a CSS selector, in document order
    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, DriverError>;

    /// Text content of a node (empty string when none)
    async fn text_content(&self, node: NodeRef) -> Result<String, DriverError>;

    /// Append a marked `<style injected="true">` block to the document head
    async fn append_style(&self, css: &str) -> Result<NodeRef, DriverError>;

    /// Release the rendering context
    async fn close(&self) -> Result<(), DriverError>;
}
