//! Shared, versioned slot for the crop settings chosen in the editor.
//!
//! The editor writes, the controller reads once per run and embeds the value
//! into each [`PipelineRequest`](crate::PipelineRequest). Nothing in the
//! pipeline reads the slot directly.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::request::CropSettings;

#[derive(Debug, Default)]
struct Slot {
    settings: Option<CropSettings>,
    version: u64,
}

/// Cloneable handle to the shared crop settings.
#[derive(Debug, Clone, Default)]
pub struct CropSlot {
    inner: Arc<RwLock<Slot>>,
}

impl CropSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current settings, if any were stored.
    pub fn get(&self) -> Option<CropSettings> {
        self.inner.read().settings
    }

    /// Current settings together with the version they were stored at.
    pub fn snapshot(&self) -> (Option<CropSettings>, u64) {
        let slot = self.inner.read();
        (slot.settings, slot.version)
    }

    /// Store new settings and return the new version.
    pub fn set(&self, settings: CropSettings) -> u64 {
        let mut slot = self.inner.write();
        slot.settings = Some(settings);
        slot.version += 1;
        tracing::debug!(version = slot.version, ?settings, "crop settings updated");
        slot.version
    }

    /// Clear the settings and return the new version.
    pub fn clear(&self) -> u64 {
        let mut slot = self.inner.write();
        slot.settings = None;
        slot.version += 1;
        slot.version
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}
