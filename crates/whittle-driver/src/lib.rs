//! Whittle Driver - document control for emulated rendering contexts
//!
//! Everything whittle knows about a live document goes through the
//! [`DocumentControl`] trait:
//! - content load/serialize round-trips
//! - opaque node handles with detach/reattach rollback tokens
//! - attribute access
//! - settle delays and full-page screenshots
//!
//! The production implementation drives a Chrome process over CDP
//! ([`chrome::ChromeBrowser`]); tests substitute their own control.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chrome;
pub mod control;
pub mod device;
pub mod error;
pub mod raster;

// Re-exports for convenience
pub use chrome::{ChromeBrowser, ChromeControl};
pub use control::{DetachPoint, DocumentControl, NodeRef, SettleProfile};
pub use device::{known_device_names, DeviceProfile, Viewport};
pub use error::DriverError;
pub use raster::{compare, PixelComparison, RasterImage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
