//! Emulated device profiles
//!
//! A reduction run validates against a fixed set of named devices. Profiles
//! are immutable and resolved by name from a static registry; the registry
//! mirrors the common puppeteer device descriptors plus one non-standard
//! "Desktop" entry.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Emulated viewport geometry and input flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// CSS pixel width
    pub width: u32,
    /// CSS pixel height
    pub height: u32,
    /// Device scale factor (physical pixels per CSS pixel)
    pub device_scale_factor: f64,
    /// Mobile layout mode
    pub is_mobile: bool,
    /// Touch event emulation
    pub has_touch: bool,
}

/// One named emulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Registry name
    pub name: &'static str,
    /// Viewport descriptor
    pub viewport: Viewport,
    /// User-agent override, when the device implies one
    pub user_agent: Option<&'static str>,
}

impl DeviceProfile {
    /// Look a profile up by name
    #[inline]
    #[must_use]
    pub fn resolve(name: &str) -> Option<&'static DeviceProfile> {
        REGISTRY.get(name)
    }
}

const fn viewport(
    width: u32,
    height: u32,
    device_scale_factor: f64,
    is_mobile: bool,
    has_touch: bool,
) -> Viewport {
    Viewport {
        width,
        height,
        device_scale_factor,
        is_mobile,
        has_touch,
    }
}

const UA_GALAXY_NOTE_3: &str = "Mozilla/5.0 (Linux; U; Android 4.3; en-us; SM-N900T \
     Build/JSS15J) AppleWebKit/534.30 (KHTML, like Gecko) Version/4.0 Mobile Safari/534.30";
const UA_IPAD_PRO: &str = "Mozilla/5.0 (iPad; CPU OS 11_0 like Mac OS X) \
     AppleWebKit/604.1.34 (KHTML, like Gecko) Version/11.0 Mobile/15A5341f Safari/604.1";
const UA_IPHONE_X: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 11_0 like Mac OS X) \
     AppleWebKit/604.1.38 (KHTML, like Gecko) Version/11.0 Mobile/15A372 Safari/604.1";
const UA_PIXEL_2: &str = "Mozilla/5.0 (Linux; Android 8.0; Pixel 2 Build/OPD3.170816.012) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3765.0 Mobile Safari/537.36";

static REGISTRY: Lazy<HashMap<&'static str, DeviceProfile>> = Lazy::new(|| {
    let profiles = [
        // Non-standard entry: a plain desktop viewport at 2x scale.
        DeviceProfile {
            name: "Desktop",
            viewport: viewport(1200, 1024, 2.0, false, false),
            user_agent: None,
        },
        DeviceProfile {
            name: "Galaxy Note 3",
            viewport: viewport(360, 640, 3.0, true, true),
            user_agent: Some(UA_GALAXY_NOTE_3),
        },
        DeviceProfile {
            name: "iPad Pro",
            viewport: viewport(1024, 1366, 2.0, true, true),
            user_agent: Some(UA_IPAD_PRO),
        },
        DeviceProfile {
            name: "iPad Pro landscape",
            viewport: viewport(1366, 1024, 2.0, true, true),
            user_agent: Some(UA_IPAD_PRO),
        },
        DeviceProfile {
            name: "iPhone X",
            viewport: viewport(375, 812, 3.0, true, true),
            user_agent: Some(UA_IPHONE_X),
        },
        DeviceProfile {
            name: "Pixel 2",
            viewport: viewport(411, 731, 2.625, true, true),
            user_agent: Some(UA_PIXEL_2),
        },
    ];

    profiles.into_iter().map(|p| (p.name, p)).collect()
});

/// All registry names, sorted (for diagnostics on unknown-device errors)
#[must_use]
pub fn known_device_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_is_the_non_standard_entry() {
        let desktop = DeviceProfile::resolve("Desktop").unwrap();
        assert_eq!(desktop.viewport.width, 1200);
        assert_eq!(desktop.viewport.height, 1024);
        assert_eq!(desktop.viewport.device_scale_factor, 2.0);
        assert!(!desktop.viewport.is_mobile);
        assert!(!desktop.viewport.has_touch);
        assert!(desktop.user_agent.is_none());
    }

    #[test]
    fn default_device_set_resolves() {
        for name in ["Desktop", "Galaxy Note 3", "iPad Pro landscape"] {
            assert!(DeviceProfile::resolve(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn unknown_device_is_none() {
        assert!(DeviceProfile::resolve("Nokia 3310").is_none());
    }

    #[test]
    fn known_names_are_sorted_and_complete() {
        let names = known_device_names();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"Desktop"));
    }
}
