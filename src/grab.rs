//! Swappable grab slot
//!
//! Each device instance routes its events through exactly one grab. The
//! built-in default is always kept; a custom grab replaces whatever is active
//! and `end` falls back to the default. Grabs do not nest.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabState {
    Default,
    Custom,
}

/// Request a running grab handler leaves for the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrabRequest {
    End,
}

pub struct GrabStack<G: ?Sized> {
    default: Box<G>,
    custom: Option<Box<G>>,
}

impl<G: ?Sized> GrabStack<G> {
    pub fn new(default: Box<G>) -> Self {
        Self {
            default,
            custom: None,
        }
    }

    /// Installs `grab`, returning the custom grab it displaced.
    pub fn start(&mut self, grab: Box<G>) -> Option<Box<G>> {
        self.custom.replace(grab)
    }

    /// Restores the default grab.
    pub fn end(&mut self) -> Option<Box<G>> {
        self.custom.take()
    }

    pub fn active(&self) -> &G {
        self.custom.as_deref().unwrap_or(&*self.default)
    }

    pub fn active_mut(&mut self) -> &mut G {
        match self.custom.as_deref_mut() {
            Some(grab) => grab,
            None => &mut *self.default,
        }
    }

    pub fn state(&self) -> GrabState {
        if self.custom.is_some() {
            GrabState::Custom
        } else {
            GrabState::Default
        }
    }

    pub fn is_default(&self) -> bool {
        self.custom.is_none()
    }
}

impl<G: ?Sized> fmt::Debug for GrabStack<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrabStack")
            .field("state", &self.state())
            .finish()
    }
}
