//! Syntactic compaction
//!
//! Serializes the document, compacts it with the HTML minifier collaborator
//! (whitespace collapse, comment stripping, optional-tag dropping, CSS
//! minification; parse errors degrade to best-effort output), and replaces
//! the live document with the result. Expected to still be pristine by
//! construction; the orchestrator re-validates unconditionally anyway.

use super::{Phase, PhaseCx, PhaseName};
use crate::error::WhittleError;

/// Syntactic compaction phase
#[derive(Debug, Default)]
pub struct HtmlMinifier;

#[async_trait::async_trait]
impl Phase for HtmlMinifier {
    fn name(&self) -> PhaseName {
        PhaseName::Html
    }

    async fn run(&self, cx: &mut PhaseCx<'_>) -> Result<(), WhittleError> {
        let source = cx.oracle.primary().content().await?;

        let cfg = minify_html::Cfg {
            keep_closing_tags: false,
            keep_comments: false,
            keep_html_and_head_opening_tags: false,
            minify_css: true,
            minify_js: false,
            ..minify_html::Cfg::default()
        };
        let compacted = minify_html::minify(source.as_bytes(), &cfg);
        let compacted =
            String::from_utf8(compacted).map_err(|e| WhittleError::Minify(e.to_string()))?;

        tracing::debug!(
            before = source.len(),
            after = compacted.len(),
            "document compacted"
        );

        // Replace through the session so the standard settle applies before
        // the orchestrator's exit check measures anything.
        cx.oracle.primary().set_content(&compacted).await?;
        Ok(())
    }
}
