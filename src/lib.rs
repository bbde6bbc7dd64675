//! # Axiom Seat Library
//!
//! Input-focus routing and grab dispatch for one Wayland seat: which client
//! objects receive each pointer, keyboard, touch and tablet event, with
//! which serials, and in what order.
//!
//! ## Architecture
//!
//! - `seat`: the [`Seat`] and its pointer, keyboard, touch and tablet devices
//! - `notify`: device-layer entry points (`Seat::notify_*`)
//! - `focus` / `bucket`: per-device focus tracking and focused/unfocused
//!   binding partitions
//! - `grab`: the active-grab slot every device dispatches through
//! - `keymap`: modifier tracking over a pluggable keymap engine
//! - `scene`: the surface/view/output registry the seat routes against
//! - `event`: the outbox of client-bound events and in-process signals
//! - `config` / `replay`: TOML configuration and scripted replays
//!
//! ## Usage
//!
//! ```rust
//! use axiom_seat::{Seat, SeatConfig, SerialCounter, StackScene, Point};
//! use axiom_seat::geometry::Rect;
//! use axiom_seat::object::{ClientId, ObjectId, ObjectRef, OutputId, SurfaceId, ViewId};
//!
//! let mut scene = StackScene::new();
//! scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
//! scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 600));
//!
//! let mut seat = Seat::new("seat0", SerialCounter::new(), &SeatConfig::default());
//! seat.init_pointer(&scene);
//! seat.get_pointer(ObjectRef::new(ClientId(1), ObjectId(3))).unwrap();
//! seat.notify_motion_absolute(&scene, 0, Point::from_int(10, 10));
//!
//! for message in seat.drain() {
//!     println!("{:?}", message);
//! }
//! ```

pub mod bucket;
pub mod config;
pub mod error;
pub mod event;
pub mod focus;
pub mod geometry;
pub mod grab;
pub mod keymap;
pub mod listener;
pub mod notify;
pub mod object;
pub mod protocol;
pub mod replay;
pub mod scene;
pub mod seat;
pub mod serial;

// Re-export main types for easy access
pub use config::SeatConfig;
pub use error::{SeatError, SeatResult};
pub use event::{Outbox, Outgoing, SeatSignal};
pub use geometry::{Fixed, Point};
pub use scene::{Scene, StackScene};
pub use seat::{Seat, SeatHooks};
pub use serial::{Serial, SerialCounter};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for axiom-seat
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
