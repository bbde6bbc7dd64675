//! Input vocabulary and the outbox of client deliveries
//!
//! The seat does not write to sockets. Everything it would send is appended
//! to an [`Outbox`] in delivery order, and the host drains it after each
//! ingress call.

use crate::geometry::{Fixed, Point};
use crate::object::{ClientId, ObjectId, ObjectRef, SurfaceId, TabletId, ToolId};
use crate::seat::capabilities::SeatCapabilities;
use crate::seat::tablet::{TabletType, ToolCapability, ToolType};
use crate::serial::Serial;
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    VerticalScroll,
    HorizontalScroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    Down,
    Motion,
    Up,
}

/// Whether a key event should also drive the modifier engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateUpdate {
    Automatic,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeymapFormat {
    NoKeymap,
    XkbV1,
}

/// Device class, used in signals and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Pointer,
    Keyboard,
    Touch,
    TabletTool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatEvent {
    Capabilities(SeatCapabilities),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    Enter {
        serial: Serial,
        surface: SurfaceId,
        local: Point,
    },
    Leave {
        serial: Serial,
        surface: SurfaceId,
    },
    Motion {
        time: u32,
        local: Point,
    },
    Button {
        serial: Serial,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    Axis {
        time: u32,
        axis: Axis,
        value: Fixed,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardEvent {
    Keymap {
        format: KeymapFormat,
        keymap: Option<Arc<str>>,
    },
    Enter {
        serial: Serial,
        surface: SurfaceId,
        keys: Vec<u32>,
    },
    Leave {
        serial: Serial,
        surface: SurfaceId,
    },
    Key {
        serial: Serial,
        time: u32,
        key: u32,
        state: KeyState,
    },
    Modifiers {
        serial: Serial,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
    RepeatInfo {
        rate: i32,
        delay: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TouchEvent {
    Down {
        serial: Serial,
        time: u32,
        surface: SurfaceId,
        id: i32,
        local: Point,
    },
    Up {
        serial: Serial,
        time: u32,
        id: i32,
    },
    Motion {
        time: u32,
        id: i32,
        local: Point,
    },
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabletSeatEvent {
    TabletAdded { tablet: ObjectId },
    ToolAdded { tool: ObjectId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabletEvent {
    Name(String),
    Id { vid: u32, pid: u32 },
    Type(TabletType),
    Path(String),
    Done,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabletToolEvent {
    Type(ToolType),
    SerialId { hi: u32, lo: u32 },
    HardwareId { hi: u32, lo: u32 },
    Capability(ToolCapability),
    Done,
    Removed,
    ProximityIn {
        serial: Serial,
        tablet: ObjectId,
        surface: SurfaceId,
    },
    ProximityOut,
    Down { serial: Serial },
    Up,
    Motion { local: Point },
    Pressure(u32),
    Distance(u32),
    Tilt { x: i32, y: i32 },
    Button {
        serial: Serial,
        button: u32,
        state: ButtonState,
    },
    Frame { time: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Seat(SeatEvent),
    Pointer(PointerEvent),
    Keyboard(KeyboardEvent),
    Touch(TouchEvent),
    TabletSeat(TabletSeatEvent),
    Tablet(TabletEvent),
    TabletTool(TabletToolEvent),
}

macro_rules! event_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Event::$variant(event)
                }
            }
        )*
    };
}

event_from!(
    Seat(SeatEvent),
    Pointer(PointerEvent),
    Keyboard(KeyboardEvent),
    Touch(TouchEvent),
    TabletSeat(TabletSeatEvent),
    Tablet(TabletEvent),
    TabletTool(TabletToolEvent),
);

/// One message for one client object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: ObjectRef,
    pub event: Event,
}

/// Fatal protocol errors the seat raises on a client object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// `wl_pointer.error.role`
    PointerRole,
    /// `wl_display.error.invalid_object`
    InvalidObject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Deliver(Delivery),
    ProtocolError {
        object: ObjectRef,
        kind: ProtocolErrorKind,
        message: String,
    },
    /// The client ran the server out of object ids or memory
    NoMemory { client: ClientId },
}

/// Notifications for in-process observers (shell, clipboard, renderer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatSignal {
    FocusChanged {
        device: DeviceKind,
        surface: Option<SurfaceId>,
    },
    PointerMotion {
        position: Point,
    },
    CapabilitiesChanged(SeatCapabilities),
    Activated {
        surface: SurfaceId,
    },
    TabletAdded(TabletId),
    TabletRemoved(TabletId),
    ToolAdded(ToolId),
    ToolRemoved(ToolId),
    Destroyed,
}

#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outgoing>,
    signals: Vec<SeatSignal>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, target: ObjectRef, event: impl Into<Event>) {
        let event = event.into();
        trace!("-> {} {:?}", target, event);
        self.messages
            .push(Outgoing::Deliver(Delivery { target, event }));
    }

    pub fn protocol_error(
        &mut self,
        object: ObjectRef,
        kind: ProtocolErrorKind,
        message: impl Into<String>,
    ) {
        let message = message.into();
        log::warn!("protocol error on {}: {}", object, message);
        self.messages.push(Outgoing::ProtocolError {
            object,
            kind,
            message,
        });
    }

    pub fn no_memory(&mut self, client: ClientId) {
        log::error!("{} is out of object ids", client);
        self.messages.push(Outgoing::NoMemory { client });
    }

    pub fn signal(&mut self, signal: SeatSignal) {
        trace!("signal {:?}", signal);
        self.signals.push(signal);
    }

    pub fn messages(&self) -> &[Outgoing] {
        &self.messages
    }

    pub fn signals(&self) -> &[SeatSignal] {
        &self.signals
    }

    /// Deliveries only, skipping errors.
    pub fn deliveries(&self) -> impl Iterator<Item = &Delivery> {
        self.messages.iter().filter_map(|m| match m {
            Outgoing::Deliver(d) => Some(d),
            _ => None,
        })
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.messages)
    }

    pub fn drain_signals(&mut self) -> Vec<SeatSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.signals.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.signals.is_empty()
    }
}
