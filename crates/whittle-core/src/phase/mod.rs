//! Reduction phases
//!
//! Five mutation algorithms share one invocation contract: build the phase,
//! call [`Phase::run`] once against the primary session. Phases hold no
//! state across invocations; the primary's document control, the oracle,
//! and the run counters all arrive through [`PhaseCx`].
//!
//! The phase set is closed. The canonical pipeline order is fixed: node →
//! attr → class → css → html, regardless of how the enabled subset was
//! spelled on the command line.

mod attr;
mod class;
mod css;
mod html;
mod node;

pub use attr::AttributeRemover;
pub use class::ClassRemover;
pub use css::CssRemover;
pub use html::HtmlMinifier;
pub use node::NodeRemover;

use crate::error::WhittleError;
use crate::oracle::Oracle;
use crate::stats::RunStats;
use std::str::FromStr;
use whittle_driver::DocumentControl;

/// Names of the closed phase set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseName {
    /// Subtree pruning
    Node,
    /// Attribute pruning
    Attr,
    /// Class-token pruning
    Class,
    /// Stylesheet usage reduction
    Css,
    /// Syntactic compaction
    Html,
}

impl PhaseName {
    /// Fixed pipeline order
    pub const CANONICAL_ORDER: [PhaseName; 5] = [
        PhaseName::Node,
        PhaseName::Attr,
        PhaseName::Class,
        PhaseName::Css,
        PhaseName::Html,
    ];

    /// Lowercase name as spelled on the command line
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Attr => "attr",
            Self::Class => "class",
            Self::Css => "css",
            Self::Html => "html",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized phase name
///
/// Non-fatal at the CLI boundary: the caller warns and skips it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase \"{0}\"")]
pub struct UnknownPhase(pub String);

impl FromStr for PhaseName {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(Self::Node),
            "attr" => Ok(Self::Attr),
            "class" => Ok(Self::Class),
            "css" => Ok(Self::Css),
            "html" => Ok(Self::Html),
            _ => Err(UnknownPhase(s.to_string())),
        }
    }
}

/// Everything a phase may touch during one invocation
pub struct PhaseCx<'a> {
    /// Cross-device equivalence oracle
    pub oracle: &'a Oracle,
    /// Run counters
    pub stats: &'a mut RunStats,
}

impl PhaseCx<'_> {
    /// The primary session's document control
    #[inline]
    #[must_use]
    pub fn control(&self) -> &dyn DocumentControl {
        self.oracle.primary().control()
    }

    /// Ask the oracle whether the document is still pristine everywhere
    pub async fn check(&self, description: &str) -> Result<bool, WhittleError> {
        self.oracle.check(description).await
    }
}

/// The uniform phase contract
#[async_trait::async_trait]
pub trait Phase: Send + Sync {
    /// Which member of the closed set this is
    fn name(&self) -> PhaseName;

    /// Run the phase once against the primary session
    async fn run(&self, cx: &mut PhaseCx<'_>) -> Result<(), WhittleError>;
}

/// Construct the phase for a name
#[must_use]
pub fn build(name: PhaseName) -> Box<dyn Phase> {
    match name {
        PhaseName::Node => Box::new(NodeRemover),
        PhaseName::Attr => Box::new(AttributeRemover),
        PhaseName::Class => Box::new(ClassRemover),
        PhaseName::Css => Box::new(CssRemover),
        PhaseName::Html => Box::new(HtmlMinifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_parse_case_insensitively() {
        assert_eq!("node".parse::<PhaseName>().unwrap(), PhaseName::Node);
        assert_eq!("ATTR".parse::<PhaseName>().unwrap(), PhaseName::Attr);
        assert_eq!("Class".parse::<PhaseName>().unwrap(), PhaseName::Class);
        assert_eq!("css".parse::<PhaseName>().unwrap(), PhaseName::Css);
        assert_eq!("html".parse::<PhaseName>().unwrap(), PhaseName::Html);
    }

    #[test]
    fn unknown_phase_is_an_error_not_a_panic() {
        let err = "frobnicate".parse::<PhaseName>().unwrap_err();
        assert_eq!(err, UnknownPhase("frobnicate".to_string()));
    }

    #[test]
    fn canonical_order_is_node_attr_class_css_html() {
        let names: Vec<_> = PhaseName::CANONICAL_ORDER
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(names, ["node", "attr", "class", "css", "html"]);
    }

    #[test]
    fn build_returns_the_matching_phase() {
        for name in PhaseName::CANONICAL_ORDER {
            assert_eq!(build(name).name(), name);
        }
    }
}
