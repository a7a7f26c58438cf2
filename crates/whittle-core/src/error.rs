//! Error types for the reduction engine
//!
//! The split matters here: an oracle check that fails is *not* an error (it
//! is the normal signal to roll a mutation back), while a driver failure is
//! fatal and propagates to the entry point. Nothing in the engine retries.

use whittle_driver::DriverError;

/// Reduction engine errors
#[derive(Debug, thiserror::Error)]
pub enum WhittleError {
    /// Rendering driver failure (fatal)
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Configured device name not present in the registry
    #[error("unknown device \"{name}\" (known: {})", known.join(", "))]
    UnknownDevice {
        /// The unresolvable name
        name: String,
        /// Registry contents, for the error message
        known: Vec<&'static str>,
    },

    /// Configuration named no devices at all
    #[error("no devices configured; at least a primary device is required")]
    NoDevices,

    /// A session's baseline was captured twice
    #[error("baseline already captured for device \"{device}\"")]
    BaselineAlreadyCaptured {
        /// Offending session's device name
        device: String,
    },

    /// A pristine check ran before the baseline was captured
    #[error("baseline missing for device \"{device}\"")]
    BaselineMissing {
        /// Offending session's device name
        device: String,
    },

    /// HTML compaction produced non-UTF-8 output
    #[error("minified document is not valid UTF-8: {0}")]
    Minify(String),
}
