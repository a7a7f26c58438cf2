//! Whittle Core - the reduction engine
//!
//! Reduces an HTML/CSS document to a smaller form that still renders
//! pixel-identically, on a configured set of emulated devices, to the
//! original:
//! - one [`Session`] per device, each with an immutable baseline screenshot
//! - an [`Oracle`] that accepts a mutation only when every session still
//!   matches its own baseline
//! - five ordered phases (node, attr, class, css, html) that mutate the
//!   primary document, rolling back anything the oracle rejects
//! - a [`Reducer`] that wires sessions, phases, and resource cleanup together
//!
//! # Example
//!
//! ```rust,ignore
//! use whittle_core::{ReduceConfig, Reducer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reducer = Reducer::new(ReduceConfig::default());
//! let reduction = reducer.reduce("<html>...</html>").await?;
//!
//! println!("pristine: {}", reduction.pristine);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod error;
pub mod oracle;
pub mod phase;
pub mod reducer;
pub mod report;
pub mod session;
pub mod stats;

// Re-exports for convenience
pub use config::{ReduceConfig, DEFAULT_DEVICES, DEFAULT_PHASES};
pub use error::WhittleError;
pub use oracle::Oracle;
pub use phase::{Phase, PhaseCx, PhaseName, UnknownPhase};
pub use reducer::{run_and_close, run_reduction, Reducer, Reduction};
pub use report::{DiffOutcome, DiffReport, ReportSink};
pub use session::Session;
pub use stats::RunStats;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
