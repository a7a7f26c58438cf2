//! Run configuration
//!
//! Explicit structs with enumerated fields; no free-form option maps. The
//! first configured device is the primary session, the rest are auxiliary
//! validators.

use crate::phase::PhaseName;
use std::path::PathBuf;

/// Default device set: one desktop viewport plus two mobile profiles
pub const DEFAULT_DEVICES: &[&str] = &["Desktop", "Galaxy Note 3", "iPad Pro landscape"];

/// Default enabled phases
pub const DEFAULT_PHASES: &[PhaseName] = &[PhaseName::Node, PhaseName::Attr];

/// Configuration for one reduction run
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    /// Device names to validate against; index 0 is the primary
    pub devices: Vec<String>,
    /// Enabled phases (always executed in canonical order regardless of
    /// the order given here)
    pub phases: Vec<PhaseName>,
    /// Headless rendering (headed is useful for watching a run)
    pub headless: bool,
    /// Directory for diagnostic diff PNG dumps, when wanted
    pub dump_dir: Option<PathBuf>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            devices: DEFAULT_DEVICES.iter().map(|s| s.to_string()).collect(),
            phases: DEFAULT_PHASES.to_vec(),
            headless: true,
            dump_dir: None,
        }
    }
}

impl ReduceConfig {
    /// Override the device list
    #[inline]
    #[must_use]
    pub fn with_devices(mut self, devices: Vec<String>) -> Self {
        self.devices = devices;
        self
    }

    /// Override the enabled phases
    #[inline]
    #[must_use]
    pub fn with_phases(mut self, phases: Vec<PhaseName>) -> Self {
        self.phases = phases;
        self
    }
}
