//! Per-seat device reference counts

use crate::event::DeviceKind;
use bitflags::bitflags;
use log::warn;

bitflags! {
    /// Capability set advertised to seat bindings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

/// Counts attached physical devices per class
///
/// `increment` and `decrement` return the new capability set only on a
/// 0→1 or 1→0 transition, which is exactly when clients must be told.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeatCapabilityTracker {
    pointer: u32,
    keyboard: u32,
    touch: u32,
}

impl SeatCapabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, kind: DeviceKind) -> Option<SeatCapabilities> {
        let count = self.slot(kind)?;
        *count += 1;
        (*count == 1).then(|| self.capabilities())
    }

    pub fn decrement(&mut self, kind: DeviceKind) -> Option<SeatCapabilities> {
        let count = self.slot(kind)?;
        if *count == 0 {
            warn!("{:?} device released more often than attached", kind);
            return None;
        }
        *count -= 1;
        (*count == 0).then(|| self.capabilities())
    }

    pub fn count(&self, kind: DeviceKind) -> u32 {
        match kind {
            DeviceKind::Pointer => self.pointer,
            DeviceKind::Keyboard => self.keyboard,
            DeviceKind::Touch => self.touch,
            DeviceKind::TabletTool => 0,
        }
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        let mut caps = SeatCapabilities::empty();
        caps.set(SeatCapabilities::POINTER, self.pointer > 0);
        caps.set(SeatCapabilities::KEYBOARD, self.keyboard > 0);
        caps.set(SeatCapabilities::TOUCH, self.touch > 0);
        caps
    }

    /// Tablet tools are announced through the tablet extension, not here.
    fn slot(&mut self, kind: DeviceKind) -> Option<&mut u32> {
        match kind {
            DeviceKind::Pointer => Some(&mut self.pointer),
            DeviceKind::Keyboard => Some(&mut self.keyboard),
            DeviceKind::Touch => Some(&mut self.touch),
            DeviceKind::TabletTool => None,
        }
    }
}
