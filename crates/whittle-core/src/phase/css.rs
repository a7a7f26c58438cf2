//! Stylesheet usage reduction
//!
//! Gathers every inline style block, detaches them all, hands the combined
//! buffer to the usage-reduction collaborator with the full current markup
//! as the corpus, and injects one marked style block with the result. The
//! swap is discarded when it does not shrink the markup. At most one
//! oracle-relevant mutation overall: rule-level minimality is the
//! collaborator's business, and the orchestrator's post-phase check is
//! what validates the swap.

use super::{Phase, PhaseCx, PhaseName};
use crate::error::WhittleError;
use whittle_purge::{reduce_stylesheet, PurgeOptions};

/// Stylesheet reduction phase
#[derive(Debug, Default)]
pub struct CssRemover;

#[async_trait::async_trait]
impl Phase for CssRemover {
    fn name(&self) -> PhaseName {
        PhaseName::Css
    }

    async fn run(&self, cx: &mut PhaseCx<'_>) -> Result<(), WhittleError> {
        let control = cx.control();

        // Corpus is the markup as it stands, style blocks included.
        let corpus = control.content().await?;

        let style_blocks = control.query_all("style").await?;
        if style_blocks.is_empty() {
            tracing::debug!("no style blocks to reduce");
            return Ok(());
        }

        let mut buffer = String::new();
        let mut detached = Vec::with_capacity(style_blocks.len());
        for block in style_blocks {
            buffer.push_str(&control.text_content(block).await?);
            buffer.push('\n');
            let at = control.detach(block).await?;
            detached.push((block, at));
        }

        let options = PurgeOptions {
            keyframes: true,
            font_face: true,
        };
        let reduced = reduce_stylesheet(&buffer, &corpus, &options);

        let injected = control.append_style(&reduced).await?;

        // The swap is only kept when it shrinks the markup. With every rule
        // in use, the marked wrapper alone would add bytes, so the original
        // blocks go back instead. Reverse order keeps adjacent blocks'
        // sibling anchors live when they are reinserted.
        let after = control.content().await?;
        if after.len() >= corpus.len() {
            control.detach(injected).await?;
            for (block, at) in detached.iter().rev() {
                control.reattach(*block, at).await?;
            }
            tracing::debug!(
                blocks = detached.len(),
                "stylesheet swap discarded, no shrink"
            );
            return Ok(());
        }

        tracing::debug!(
            blocks = detached.len(),
            before = buffer.len(),
            after = reduced.len(),
            "stylesheet reduced"
        );
        Ok(())
    }
}
