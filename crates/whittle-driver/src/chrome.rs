//! Chrome/CDP implementation of [`DocumentControl`]
//!
//! One Chrome process per run; one tab per device session. Node handles live
//! in an in-page registry (`window.__whittle`) and every node operation is a
//! `Runtime.evaluate` round-trip that exchanges JSON strings, so the Rust
//! side never holds raw remote-object ids. Blocking driver calls are wrapped
//! in `spawn_blocking` to keep the runtime responsive.

use crate::control::{DetachPoint, DocumentControl, NodeRef, SettleProfile};
use crate::device::DeviceProfile;
use crate::error::DriverError;
use crate::raster::RasterImage;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Chrome flags that keep rendering deterministic across screenshots
const DETERMINISM_FLAGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-default-apps",
    "--disable-device-discovery-notifications",
    "--disable-renderer-backgrounding",
    "--disable-translate",
    "--disable-gpu",
    "--hide-scrollbars",
];

/// In-page node registry, injected after every content load
const BOOTSTRAP_SCRIPT: &str = r#"
(() => {
  const w = { seq: 1, nodes: new Map(), ids: new WeakMap() };
  w.id = (n) => {
    if (!n) return null;
    let id = w.ids.get(n);
    if (id === undefined) {
      id = w.seq++;
      w.ids.set(n, id);
      w.nodes.set(id, n);
    }
    return id;
  };
  w.get = (id) => w.nodes.get(id) || null;
  window.__whittle = w;
  return JSON.stringify("ok");
})()
"#;

/// Frame-tick wait evaluated after the host-side settle sleep
const SETTLE_SCRIPT: &str = r#"
new Promise((resolve) => {
  window.setTimeout(() => {
    window.requestAnimationFrame(() => resolve(JSON.stringify("ok")));
  }, 32);
})
"#;

/// One Chrome process shared by every session of a run
///
/// The underlying process is shut down exactly once; sessions (tabs) are
/// closed individually by their owners.
pub struct ChromeBrowser {
    browser: Arc<Mutex<Option<Browser>>>,
}

impl std::fmt::Debug for ChromeBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeBrowser").finish_non_exhaustive()
    }
}

impl ChromeBrowser {
    /// Launch the browser process
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let browser = tokio::task::spawn_blocking(move || {
            let args: Vec<&OsStr> = DETERMINISM_FLAGS.iter().map(OsStr::new).collect();
            let options = LaunchOptionsBuilder::default()
                .headless(headless)
                .idle_browser_timeout(Duration::from_secs(3600))
                .args(args)
                .build()
                .map_err(|e| DriverError::Launch(e.to_string()))?;
            Browser::new(options).map_err(|e| DriverError::Launch(e.to_string()))
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))??;

        Ok(Self {
            browser: Arc::new(Mutex::new(Some(browser))),
        })
    }

    /// Open one emulated-device rendering context
    pub async fn open(&self, profile: &DeviceProfile) -> Result<ChromeControl, DriverError> {
        let browser = Arc::clone(&self.browser);
        let device_name = profile.name;
        let profile = profile.clone();

        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>, DriverError> {
            let guard = browser
                .lock()
                .map_err(|_| DriverError::SessionOpen("browser lock poisoned".to_string()))?;
            let browser = guard
                .as_ref()
                .ok_or_else(|| DriverError::SessionOpen("browser already shut down".to_string()))?;
            let tab = browser
                .new_tab()
                .map_err(|e| DriverError::SessionOpen(e.to_string()))?;

            tab.call_method(Emulation::SetDeviceMetricsOverride {
                width: profile.viewport.width,
                height: profile.viewport.height,
                device_scale_factor: profile.viewport.device_scale_factor,
                mobile: profile.viewport.is_mobile,
                scale: None,
                screen_width: None,
                screen_height: None,
                position_x: None,
                position_y: None,
                dont_set_visible_size: None,
                screen_orientation: None,
                viewport: None,
                display_feature: None,
                device_posture: None,
            })
            .map_err(|e| DriverError::Emulation(e.to_string()))?;

            if profile.viewport.has_touch {
                tab.call_method(Emulation::SetTouchEmulationEnabled {
                    enabled: true,
                    max_touch_points: Some(1),
                })
                .map_err(|e| DriverError::Emulation(e.to_string()))?;
            }

            if let Some(user_agent) = profile.user_agent {
                tab.set_user_agent(user_agent, None, None)
                    .map_err(|e| DriverError::Emulation(e.to_string()))?;
            }

            Ok(tab)
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))??;

        tracing::debug!(device = device_name, "session opened");
        Ok(ChromeControl { tab })
    }

    /// Shut the browser process down
    ///
    /// Idempotent: later calls are no-ops. Dropping the handle also releases
    /// the process, so an early error path cannot leak it.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        let browser = Arc::clone(&self.browser);
        tokio::task::spawn_blocking(move || {
            let taken = browser.lock().ok().and_then(|mut guard| guard.take());
            drop(taken);
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))?;
        tracing::debug!("browser shut down");
        Ok(())
    }
}

/// Reply shape for the detach script
#[derive(Debug, Deserialize)]
struct DetachReply {
    parent: u64,
    next: Option<u64>,
}

/// [`DocumentControl`] over one Chrome tab
#[derive(Clone)]
pub struct ChromeControl {
    tab: Arc<Tab>,
}

impl std::fmt::Debug for ChromeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeControl").finish_non_exhaustive()
    }
}

impl ChromeControl {
    /// Evaluate a script whose completion value is a `JSON.stringify` string
    async fn eval_json<T: DeserializeOwned>(
        &self,
        expr: String,
        await_promise: bool,
    ) -> Result<T, DriverError> {
        let tab = Arc::clone(&self.tab);
        let value = tokio::task::spawn_blocking(move || {
            tab.evaluate(&expr, await_promise)
                .map(|object| object.value)
                .map_err(|e| DriverError::Evaluation(e.to_string()))
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))??;

        let encoded = value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                DriverError::Evaluation("script returned no JSON string".to_string())
            })?;
        Ok(serde_json::from_str(encoded)?)
    }

    /// Evaluate a node-scoped script; a JSON `null` reply means the handle is stale
    async fn eval_node<T: DeserializeOwned>(
        &self,
        node: NodeRef,
        expr: String,
    ) -> Result<T, DriverError> {
        let reply: Option<T> = self.eval_json(expr, false).await?;
        reply.ok_or(DriverError::StaleNode(node))
    }

    fn js_string(value: &str) -> Result<String, DriverError> {
        Ok(serde_json::to_string(value)?)
    }
}

#[async_trait::async_trait]
impl DocumentControl for ChromeControl {
    async fn set_content(&self, html: &str) -> Result<(), DriverError> {
        let encoded = Self::js_string(html)?;
        let script = format!(
            r#"
new Promise((resolve) => {{
  document.open();
  document.write({encoded});
  document.close();
  if (document.readyState === "complete") {{
    resolve(JSON.stringify("ok"));
  }} else {{
    window.addEventListener("load", () => resolve(JSON.stringify("ok")), {{ once: true }});
  }}
}})
"#
        );
        let _: String = self
            .eval_json(script, true)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        // The registry died with the previous document.
        let _: String = self.eval_json(BOOTSTRAP_SCRIPT.to_string(), false).await?;
        Ok(())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let script = r#"
(() => {
  const doctype = document.doctype
    ? "<!DOCTYPE " + document.doctype.name + ">"
    : "";
  return JSON.stringify(doctype + document.documentElement.outerHTML);
})()
"#;
        self.eval_json(script.to_string(), false).await
    }

    async fn settle(&self, profile: SettleProfile) -> Result<(), DriverError> {
        tokio::time::sleep(profile.host_delay()).await;
        let _: String = self.eval_json(SETTLE_SCRIPT.to_string(), true).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<RasterImage, DriverError> {
        // Full-page capture: clip to the document's scroll extent so removals
        // that change page height surface as a dimension mismatch.
        let dims_script = r#"
JSON.stringify([
  Math.max(document.documentElement.scrollWidth, document.documentElement.clientWidth),
  Math.max(document.documentElement.scrollHeight, document.documentElement.clientHeight),
])
"#;
        let (width, height): (f64, f64) =
            self.eval_json(dims_script.to_string(), false).await?;

        let tab = Arc::clone(&self.tab);
        let png = tokio::task::spawn_blocking(move || {
            tab.capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(Page::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                    scale: 1.0,
                }),
                true,
            )
            .map_err(|e| DriverError::Screenshot(e.to_string()))
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))??;

        RasterImage::from_png_bytes(&png)
    }

    async fn root(&self) -> Result<NodeRef, DriverError> {
        let script = "JSON.stringify(window.__whittle.id(document.documentElement))";
        let id: u64 = self.eval_json(script.to_string(), false).await?;
        Ok(NodeRef(id))
    }

    async fn child_elements(&self, node: NodeRef) -> Result<Vec<NodeRef>, DriverError> {
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  if (!node) return null;
  return Array.from(node.children).map((child) => window.__whittle.id(child));
}})())
"#,
            id = node.0
        );
        let ids: Vec<u64> = self.eval_node(node, script).await?;
        Ok(ids.into_iter().map(NodeRef).collect())
    }

    async fn tag_name(&self, node: NodeRef) -> Result<String, DriverError> {
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  return node ? node.tagName : null;
}})())
"#,
            id = node.0
        );
        self.eval_node(node, script).await
    }

    async fn detach(&self, node: NodeRef) -> Result<DetachPoint, DriverError> {
        let script = format!(
            r#"
JSON.stringify((() => {{
  const w = window.__whittle;
  const node = w.get({id});
  if (!node || !node.parentNode) return null;
  const parent = w.id(node.parentNode);
  const next = node.nextSibling ? w.id(node.nextSibling) : null;
  node.parentNode.removeChild(node);
  return {{ parent: parent, next: next }};
}})())
"#,
            id = node.0
        );
        let reply: DetachReply = self.eval_node(node, script).await?;
        Ok(DetachPoint {
            parent: NodeRef(reply.parent),
            next_sibling: reply.next.map(NodeRef),
        })
    }

    async fn reattach(&self, node: NodeRef, at: &DetachPoint) -> Result<(), DriverError> {
        let next = match at.next_sibling {
            Some(sibling) => format!("w.get({})", sibling.0),
            None => "null".to_string(),
        };
        let script = format!(
            r#"
JSON.stringify((() => {{
  const w = window.__whittle;
  const node = w.get({id});
  const parent = w.get({parent});
  if (!node || !parent) return null;
  const sibling = {next};
  if (sibling) {{
    parent.insertBefore(node, sibling);
  }} else {{
    parent.appendChild(node);
  }}
  return "ok";
}})())
"#,
            id = node.0,
            parent = at.parent.0,
        );
        let _: String = self.eval_node(node, script).await?;
        Ok(())
    }

    async fn attributes(&self, node: NodeRef) -> Result<Vec<(String, String)>, DriverError> {
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  if (!node) return null;
  return Array.from(node.attributes).map((a) => [a.name, a.value]);
}})())
"#,
            id = node.0
        );
        self.eval_node(node, script).await
    }

    async fn attribute(
        &self,
        node: NodeRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let encoded = Self::js_string(name)?;
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  if (!node) return null;
  return {{ value: node.getAttribute({encoded}) }};
}})())
"#,
            id = node.0
        );

        #[derive(Deserialize)]
        struct AttrReply {
            value: Option<String>,
        }
        let reply: AttrReply = self.eval_node(node, script).await?;
        Ok(reply.value)
    }

    async fn set_attribute(
        &self,
        node: NodeRef,
        name: &str,
        value: &str,
    ) -> Result<(), DriverError> {
        let name = Self::js_string(name)?;
        let value = Self::js_string(value)?;
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  if (!node) return null;
  node.setAttribute({name}, {value});
  return "ok";
}})())
"#,
            id = node.0
        );
        let _: String = self.eval_node(node, script).await?;
        Ok(())
    }

    async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), DriverError> {
        let name = Self::js_string(name)?;
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  if (!node) return null;
  node.removeAttribute({name});
  return "ok";
}})())
"#,
            id = node.0
        );
        let _: String = self.eval_node(node, script).await?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, DriverError> {
        let encoded = Self::js_string(selector)?;
        let script = format!(
            r#"
JSON.stringify(
  Array.from(document.querySelectorAll({encoded})).map((n) => window.__whittle.id(n))
)
"#
        );
        let ids: Vec<u64> = self.eval_json(script, false).await?;
        Ok(ids.into_iter().map(NodeRef).collect())
    }

    async fn text_content(&self, node: NodeRef) -> Result<String, DriverError> {
        let script = format!(
            r#"
JSON.stringify((() => {{
  const node = window.__whittle.get({id});
  return node ? (node.textContent || "") : null;
}})())
"#,
            id = node.0
        );
        self.eval_node(node, script).await
    }

    async fn append_style(&self, css: &str) -> Result<NodeRef, DriverError> {
        let encoded = Self::js_string(css)?;
        let script = format!(
            r#"
JSON.stringify((() => {{
  const style = document.createElement("style");
  style.setAttribute("injected", "true");
  style.textContent = {encoded};
  document.head.appendChild(style);
  return window.__whittle.id(style);
}})())
"#
        );
        let id: u64 = self.eval_json(script, false).await?;
        Ok(NodeRef(id))
    }

    async fn close(&self) -> Result<(), DriverError> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.close(true)
                .map(|_| ())
                .map_err(|e| DriverError::SessionOpen(e.to_string()))
        })
        .await
        .map_err(|e| DriverError::TaskJoin(e.to_string()))?
    }
}
