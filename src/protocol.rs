//! Conversions between seat types and the generated `wayland-server` protocol
//! types, for hosts that deliver the outbox over a real display.

use crate::event::{Axis, ButtonState, KeyState, KeymapFormat, ProtocolErrorKind};
use crate::seat::SeatCapabilities;
use wayland_server::protocol::{wl_keyboard, wl_pointer, wl_seat};
use wayland_server::WEnum;

/// Value of `wl_display.error.invalid_object`. wayland-server 0.31 does not
/// generate `wl_display` (it lives inside wayland-backend), so the code is
/// spelled out here.
pub const DISPLAY_ERROR_INVALID_OBJECT: u32 = 0;

impl From<ButtonState> for wl_pointer::ButtonState {
    fn from(state: ButtonState) -> Self {
        match state {
            ButtonState::Released => wl_pointer::ButtonState::Released,
            ButtonState::Pressed => wl_pointer::ButtonState::Pressed,
        }
    }
}

impl From<Axis> for wl_pointer::Axis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::VerticalScroll => wl_pointer::Axis::VerticalScroll,
            Axis::HorizontalScroll => wl_pointer::Axis::HorizontalScroll,
        }
    }
}

impl From<KeyState> for wl_keyboard::KeyState {
    fn from(state: KeyState) -> Self {
        match state {
            KeyState::Released => wl_keyboard::KeyState::Released,
            KeyState::Pressed => wl_keyboard::KeyState::Pressed,
        }
    }
}

impl From<KeymapFormat> for wl_keyboard::KeymapFormat {
    fn from(format: KeymapFormat) -> Self {
        match format {
            KeymapFormat::NoKeymap => wl_keyboard::KeymapFormat::NoKeymap,
            KeymapFormat::XkbV1 => wl_keyboard::KeymapFormat::XkbV1,
        }
    }
}

impl From<SeatCapabilities> for wl_seat::Capability {
    fn from(caps: SeatCapabilities) -> Self {
        wl_seat::Capability::from_bits_truncate(caps.bits())
    }
}

/// Decodes a button state read off the wire. Unknown values yield `None`.
pub fn button_state(state: WEnum<wl_pointer::ButtonState>) -> Option<ButtonState> {
    match state.into_result().ok()? {
        wl_pointer::ButtonState::Released => Some(ButtonState::Released),
        wl_pointer::ButtonState::Pressed => Some(ButtonState::Pressed),
        _ => None,
    }
}

pub fn axis(axis: WEnum<wl_pointer::Axis>) -> Option<Axis> {
    match axis.into_result().ok()? {
        wl_pointer::Axis::VerticalScroll => Some(Axis::VerticalScroll),
        wl_pointer::Axis::HorizontalScroll => Some(Axis::HorizontalScroll),
        _ => None,
    }
}

pub fn key_state(state: WEnum<wl_keyboard::KeyState>) -> Option<KeyState> {
    match state.into_result().ok()? {
        wl_keyboard::KeyState::Released => Some(KeyState::Released),
        wl_keyboard::KeyState::Pressed => Some(KeyState::Pressed),
        _ => None,
    }
}

impl ProtocolErrorKind {
    /// Error code to post on the offending object.
    pub fn code(self) -> u32 {
        match self {
            ProtocolErrorKind::PointerRole => wl_pointer::Error::Role as u32,
            ProtocolErrorKind::InvalidObject => DISPLAY_ERROR_INVALID_OBJECT,
        }
    }
}
