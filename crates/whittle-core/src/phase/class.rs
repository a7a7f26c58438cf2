//! Class-token pruning
//!
//! Per node: tokenize the class attribute on whitespace and greedily test
//! each original token against the *live* candidate set. Once a token is
//! proven removable the set shrinks, and later candidates are tested against
//! the already-shrunken set. A node without a class attribute recurses
//! straight into its children.

use super::{Phase, PhaseCx, PhaseName};
use crate::error::WhittleError;
use futures::future::{BoxFuture, FutureExt};
use whittle_driver::NodeRef;

/// Class-token pruning phase
#[derive(Debug, Default)]
pub struct ClassRemover;

#[async_trait::async_trait]
impl Phase for ClassRemover {
    fn name(&self) -> PhaseName {
        PhaseName::Class
    }

    async fn run(&self, cx: &mut PhaseCx<'_>) -> Result<(), WhittleError> {
        let root = cx.control().root().await?;
        visit(cx, root).await
    }
}

fn visit<'a>(
    cx: &'a mut PhaseCx<'_>,
    node: NodeRef,
) -> BoxFuture<'a, Result<(), WhittleError>> {
    async move {
        if let Some(class_attribute) = cx.control().attribute(node, "class").await? {
            let candidates: Vec<String> = class_attribute
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let mut current = candidates.clone();

            for candidate in candidates {
                cx.stats.classes_processed += 1;

                let without: Vec<String> = current
                    .iter()
                    .filter(|token| **token != candidate)
                    .cloned()
                    .collect();
                cx.control()
                    .set_attribute(node, "class", &without.join(" "))
                    .await?;

                if cx.check(&format!("rm class {candidate}")).await? {
                    current = without;
                    cx.stats.classes_removed += 1;
                } else {
                    // Restore the full current token set, space-joined.
                    cx.control()
                        .set_attribute(node, "class", &current.join(" "))
                        .await?;
                }
            }
        }

        let children = cx.control().child_elements(node).await?;
        for child in children {
            visit(cx, child).await?;
        }
        Ok(())
    }
    .boxed()
}
