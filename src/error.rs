//! Error types for seat operations
//!
//! Event notifiers never fail; device-layer sequencing faults are logged and
//! dropped. These errors cover host-facing setup calls.

use crate::event::DeviceKind;
use crate::object::{ObjectRef, TabletId, ToolId};

#[derive(Debug, thiserror::Error)]
pub enum SeatError {
    /// The seat has no device of this class attached.
    #[error("seat '{seat}' has no {capability:?} device")]
    MissingCapability { seat: String, capability: DeviceKind },

    #[error("unknown tablet {0}")]
    UnknownTablet(TabletId),

    #[error("unknown tablet tool {0}")]
    UnknownTool(ToolId),

    /// The keymap engine could not serve a request.
    #[error("keymap unavailable: {0}")]
    KeymapUnavailable(String),

    #[error("failed to compile keymap: {0}")]
    KeymapCompile(String),

    /// Lock state can only be forced when the device layer drives LEDs.
    #[error("seat '{0}' has no LED update hook")]
    LedUpdateUnavailable(String),

    #[error("server object ids exhausted")]
    ObjectIdsExhausted,

    #[error("object {0} is already bound")]
    DuplicateObject(ObjectRef),
}

pub type SeatResult<T> = std::result::Result<T, SeatError>;
