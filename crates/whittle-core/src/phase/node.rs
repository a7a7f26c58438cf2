//! Node pruning
//!
//! Pre-order depth-first traversal from the root. Each non-root node is
//! detached, the oracle consulted, and the node either committed (the whole
//! subtree is gone, no descent) or reinserted exactly where it was. Children
//! are re-queried live at every visit because earlier removals change the
//! candidate set at any level.
//!
//! Rollback metadata lives in an explicit side-table keyed by node handle,
//! populated only for the window between detach and commit/revert.

use super::{Phase, PhaseCx, PhaseName};
use crate::error::WhittleError;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use whittle_driver::{DetachPoint, NodeRef};

/// Subtree pruning phase
#[derive(Debug, Default)]
pub struct NodeRemover;

#[async_trait::async_trait]
impl Phase for NodeRemover {
    fn name(&self) -> PhaseName {
        PhaseName::Node
    }

    async fn run(&self, cx: &mut PhaseCx<'_>) -> Result<(), WhittleError> {
        let root = cx.control().root().await?;
        let mut saved = HashMap::new();
        visit(cx, root, true, &mut saved).await
    }
}

fn visit<'a>(
    cx: &'a mut PhaseCx<'_>,
    node: NodeRef,
    is_root: bool,
    saved: &'a mut HashMap<NodeRef, DetachPoint>,
) -> BoxFuture<'a, Result<(), WhittleError>> {
    async move {
        // The root document element is never removed.
        if !is_root {
            let tag = cx.control().tag_name(node).await?.to_ascii_lowercase();
            cx.stats.nodes_processed += 1;

            let point = cx.control().detach(node).await?;
            saved.insert(node, point);

            let description = format!("rm node <{tag}>");
            if cx.check(&description).await? {
                // Committed: the subtree is gone, descendants are never
                // individually tested.
                saved.remove(&node);
                cx.stats.nodes_removed += 1;
                tracing::debug!(%node, tag, "node removed");
                return Ok(());
            }

            // Rejected: reinsert before the saved next sibling, or as the
            // saved parent's last child. This exactly preserves sibling
            // order for everything that was not itself removed.
            saved.remove(&node);
            cx.control().reattach(node, &point).await?;
        }

        let children = cx.control().child_elements(node).await?;
        for child in children {
            visit(cx, child, false, saved).await?;
        }
        Ok(())
    }
    .boxed()
}
