//! Attribute pruning
//!
//! Same pre-order traversal as node pruning, but per node the candidate set
//! is a one-time snapshot of its attributes: two attributes that only
//! jointly affect rendering will both be retained by this greedy independent
//! testing, which is inherent, not a defect.
//!
//! A fixed denylist of (tag, attribute) pairs is never tested; removing
//! intrinsic sizing attributes on `<svg>` is reliably rendering-significant.

use super::{Phase, PhaseCx, PhaseName};
use crate::error::WhittleError;
use futures::future::{BoxFuture, FutureExt};
use whittle_driver::NodeRef;

/// (tag, attribute) pairs excluded from removal attempts, compared
/// case-insensitively
const DENYLIST: &[(&str, &str)] = &[("svg", "width"), ("svg", "height")];

fn is_denied(tag: &str, attribute: &str) -> bool {
    DENYLIST.iter().any(|(denied_tag, denied_attr)| {
        tag.eq_ignore_ascii_case(denied_tag) && attribute.eq_ignore_ascii_case(denied_attr)
    })
}

/// Attribute pruning phase
#[derive(Debug, Default)]
pub struct AttributeRemover;

#[async_trait::async_trait]
impl Phase for AttributeRemover {
    fn name(&self) -> PhaseName {
        PhaseName::Attr
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
        let tag = cx.control().tag_name(node).await?;
        // Snapshot once, before testing anything on this node.
        let snapshot = cx.control().attributes(node).await?;

        for (name, value) in snapshot {
            if is_denied(&tag, &name) {
                tracing::debug!(%node, tag, attribute = name, "denylisted attribute");
                continue;
            }

            cx.stats.attributes_processed += 1;
            cx.control().remove_attribute(node, &name).await?;

            let description = format!("rm attr {name} on <{}>", tag.to_ascii_lowercase());
            if cx.check(&description).await? {
                cx.stats.attributes_removed += 1;
            } else {
                // Restore verbatim; an absent original value restores as "".
                cx.control().set_attribute(node, &name, &value).await?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_sizing_attributes_are_denied_case_insensitively() {
        assert!(is_denied("svg", "width"));
        assert!(is_denied("svg", "height"));
        assert!(is_denied("SVG", "WIDTH"));
        assert!(is_denied("Svg", "Height"));
    }

    #[test]
    fn other_pairs_are_not_denied() {
        assert!(!is_denied("svg", "viewBox"));
        assert!(!is_denied("img", "width"));
        assert!(!is_denied("div", "class"));
    }
}
