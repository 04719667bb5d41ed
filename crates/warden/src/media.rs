//! Untrusted-media blacklist.

use common::{DenyReason, DigsigConfig};
use std::collections::HashSet;

/// Where a file lives: filesystem type and, if known, the bus of the
/// backing device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub fs_type: String,
    pub bus: Option<String>,
}

impl Media {
    pub fn new(fs_type: impl Into<String>) -> Self {
        Self {
            fs_type: fs_type.into(),
            bus: None,
        }
    }

    pub fn on_bus(mut self, bus: impl Into<String>) -> Self {
        self.bus = Some(bus.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaBlacklist {
    fs_types: HashSet<String>,
    restrict_usb: bool,
}

impl MediaBlacklist {
    pub fn from_config(config: &DigsigConfig) -> Self {
        Self {
            fs_types: config
                .fs_blacklist
                .iter()
                .map(|fs| fs.to_ascii_lowercase())
                .collect(),
            restrict_usb: config.restrict_usb,
        }
    }

    pub fn check(&self, media: &Media) -> Result<(), DenyReason> {
        let fs_type = media.fs_type.to_ascii_lowercase();
        if self.fs_types.contains(&fs_type) {
            return Err(DenyReason::UntrustedMedia(fs_type));
        }
        if self.restrict_usb
            && media
                .bus
                .as_deref()
                .is_some_and(|bus| bus.eq_ignore_ascii_case("usb"))
        {
            return Err(DenyReason::UntrustedMedia("usb".into()));
        }
        Ok(())
    }
}
