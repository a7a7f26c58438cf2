//! In-process test doubles for the reduction pipeline
//!
//! Provides:
//! - [`FakeDom`]: a mutable arena-backed document that supports the same
//!   detach/reattach and attribute operations as a live page
//! - [`FakeControl`]: a [`DocumentControl`] backend over a `FakeDom`, with a
//!   pluggable [`RenderModel`] deciding what each document "looks like"
//! - render-model helpers that encode document state into tiny raster images
//!   so that any observable change shows up as a pixel difference
//!
//! No browser is involved; everything runs in-process and settle delays are
//! recorded but not slept.

pub mod dom;

pub use dom::{FakeDom, FakeNode, NodeKind};

use std::sync::{Arc, Mutex};

use whittle_driver::control::{
    DetachPoint, DocumentControl, NodeRef, SettleProfile,
};
use whittle_driver::error::DriverError;
use whittle_driver::raster::RasterImage;

/// Maps a document state to the image a renderer would produce for it
pub type RenderModel = Arc<dyn Fn(&FakeDom) -> RasterImage + Send + Sync>;

/// One-row raster whose pixels spell out `signature` byte by byte
///
/// Different strings of the same length produce differing pixels; different
/// lengths produce a size mismatch. Either way the comparison fails, so a
/// render model built on this maps "signature changed" to "not pristine".
pub fn image_of(signature: &str) -> RasterImage {
    let bytes = signature.as_bytes();
    let width = bytes.len().max(1) as u32;
    let mut data = Vec::with_capacity(width as usize * 4);
    if bytes.is_empty() {
        data.extend_from_slice(&[0, 0, 0, 255]);
    } else {
        for &b in bytes {
            data.extend_from_slice(&[b, b, b, 255]);
        }
    }
    RasterImage::new(width, 1, data)
}

/// Render model that images an arbitrary string signature of the document
pub fn signature_render(
    f: impl Fn(&FakeDom) -> String + Send + Sync + 'static,
) -> RenderModel {
    Arc::new(move |dom| image_of(&f(dom)))
}

/// Render model that never changes: every document state is pristine
pub fn constant_render() -> RenderModel {
    Arc::new(|_| image_of("constant"))
}

/// Render model that images the document's visible text under `predicate`
///
/// An element failing the predicate hides its whole subtree, so removing a
/// hidden branch is invisible while removing anything that contributes text
/// is not.
pub fn visible_text_render(
    predicate: impl Fn(&FakeDom, usize) -> bool + Send + Sync + 'static,
) -> RenderModel {
    signature_render(move |dom| dom.visible_text(&|d, id| predicate(d, id)))
}

/// [`DocumentControl`] backend over an in-process [`FakeDom`]
///
/// Node handles are arena indices; `set_content` reparses and invalidates
/// them, after which stale handles surface as [`DriverError::StaleNode`].
/// Every call is appended to an operation log for assertions on call order.
pub struct FakeControl {
    state: Mutex<FakeDom>,
    render: RenderModel,
    ops: Arc<Mutex<Vec<String>>>,
    screenshot_budget: Mutex<Option<usize>>,
}

impl FakeControl {
    pub fn new(html: &str, render: RenderModel) -> Self {
        Self {
            state: Mutex::new(FakeDom::parse(html)),
            render,
            ops: Arc::new(Mutex::new(Vec::new())),
            screenshot_budget: Mutex::new(None),
        }
    }

    /// Snapshot of the operation log
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Shared handle to the operation log, usable after the control is boxed
    pub fn ops_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.ops)
    }

    /// Make screenshot capture fail after `n` more successful captures
    pub fn fail_screenshots_after(&self, n: usize) {
        *self.screenshot_budget.lock().unwrap() = Some(n);
    }

    /// Run `f` against the current document state
    pub fn with_dom<T>(&self, f: impl FnOnce(&FakeDom) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    fn live(&self, dom: &FakeDom, node: NodeRef) -> Result<usize, DriverError> {
        let id = node.0 as usize;
        if dom.contains(id) {
            Ok(id)
        } else {
            Err(DriverError::StaleNode(node))
        }
    }
}

#[async_trait::async_trait]
impl DocumentControl for FakeControl {
    async fn set_content(&self, html: &str) -> Result<(), DriverError> {
        self.log("set_content".into());
        *self.state.lock().unwrap() = FakeDom::parse(html);
        Ok(())
    }

    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().serialize())
    }

    async fn settle(&self, profile: SettleProfile) -> Result<(), DriverError> {
        self.log(format!("settle {profile:?}"));
        Ok(())
    }

    async fn screenshot(&self) -> Result<RasterImage, DriverError> {
        self.log("screenshot".into());
        if let Some(left) = self.screenshot_budget.lock().unwrap().as_mut() {
            if *left == 0 {
                return Err(DriverError::Screenshot(
                    "injected capture failure".to_string(),
                ));
            }
            *left -= 1;
        }
        let dom = self.state.lock().unwrap();
        Ok((self.render)(&dom))
    }

    async fn root(&self) -> Result<NodeRef, DriverError> {
        Ok(NodeRef(self.state.lock().unwrap().root() as u64))
    }

    async fn child_elements(&self, node: NodeRef) -> Result<Vec<NodeRef>, DriverError> {
        let dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        Ok(dom
            .child_elements(id)
            .into_iter()
            .map(|child| NodeRef(child as u64))
            .collect())
    }

    async fn tag_name(&self, node: NodeRef) -> Result<String, DriverError> {
        let dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        dom.tag(id)
            .map(|tag| tag.to_ascii_uppercase())
            .ok_or(DriverError::StaleNode(node))
    }

    async fn detach(&self, node: NodeRef) -> Result<DetachPoint, DriverError> {
        let mut dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        self.log(format!("detach {node}"));
        let (parent, next) = dom
            .detach(id)
            .ok_or(DriverError::StaleNode(node))?;
        Ok(DetachPoint {
            parent: NodeRef(parent as u64),
            next_sibling: next.map(|n| NodeRef(n as u64)),
        })
    }

    async fn reattach(&self, node: NodeRef, at: &DetachPoint) -> Result<(), DriverError> {
        let mut dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        self.log(format!("reattach {node}"));
        dom.reattach(
            id,
            at.parent.0 as usize,
            at.next_sibling.map(|n| n.0 as usize),
        );
        Ok(())
    }

    async fn attributes(&self, node: NodeRef) -> Result<Vec<(String, String)>, DriverError> {
        let dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        Ok(dom.attributes(id))
    }

    async fn attribute(
        &self,
        node: NodeRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        Ok(dom.attribute(id, name))
    }

    async fn set_attribute(
        &self,
        node: NodeRef,
        name: &str,
        value: &str,
    ) -> Result<(), DriverError> {
        let mut dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        self.log(format!("set_attribute {node} {name}"));
        dom.set_attribute(id, name, value);
        Ok(())
    }

    async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), DriverError> {
        let mut dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        self.log(format!("remove_attribute {node} {name}"));
        dom.remove_attribute(id, name);
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, DriverError> {
        // Tag-name selectors cover everything the pipeline asks for.
        let dom = self.state.lock().unwrap();
        Ok(dom
            .elements_by_tag(selector)
            .into_iter()
            .map(|id| NodeRef(id as u64))
            .collect())
    }

    async fn text_content(&self, node: NodeRef) -> Result<String, DriverError> {
        let dom = self.state.lock().unwrap();
        let id = self.live(&dom, node)?;
        Ok(dom.text_content(id))
    }

    async fn append_style(&self, css: &str) -> Result<NodeRef, DriverError> {
        let mut dom = self.state.lock().unwrap();
        self.log("append_style".into());
        Ok(NodeRef(dom.append_style(css) as u64))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.log("close".into());
        Ok(())
    }
}
