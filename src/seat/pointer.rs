//! Pointer device: state, grab interface and the built-in grab
//!
//! Grabs never touch [`PointerState`] directly. The seat lends them a
//! [`PointerHandle`] for the duration of one event, which carries the scene,
//! the outbox and a read-only view of the keyboard for modifier sync on
//! enter.

use super::keyboard::KeyboardState;
use crate::bucket::Partition;
use crate::event::{Axis, ButtonState, KeyboardEvent, Outbox, PointerEvent, SeatSignal};
use crate::focus::{FocusEmitter, FocusRouter, FocusTarget, PointerClass, RoutingContext};
use crate::geometry::{clamp_to_outputs, Fixed, Point, Rect};
use crate::grab::{GrabRequest, GrabStack};
use crate::listener::{DestroyListeners, ListenerToken, Subscriber, Watched};
use crate::object::{ClientId, ObjectRef, SurfaceId};
use crate::scene::{Pick, Scene};
use crate::serial::{Serial, SerialCounter};
use log::{debug, warn};

/// Role a surface takes when used as a pointer cursor
pub const CURSOR_ROLE: &str = "wl_pointer-cursor";

/// Cursor image surface and its hotspot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSprite {
    pub surface: SurfaceId,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
}

#[derive(Debug)]
pub struct PointerState {
    pub(crate) router: FocusRouter<PointerClass>,
    position: Point,
    button_count: u32,
    grab_button: u32,
    grab_time: u32,
    grab_position: Point,
    grab_serial: Serial,
    sprite: Option<CursorSprite>,
    sprite_listener: Option<ListenerToken>,
}

impl PointerState {
    pub fn new(position: Point) -> Self {
        let mut router = FocusRouter::new(Subscriber::PointerFocus);
        router.set_local(Some(Point::unfocused()));
        Self {
            router,
            position,
            button_count: 0,
            grab_button: 0,
            grab_time: 0,
            grab_position: position,
            grab_serial: Serial::default(),
            sprite: None,
            sprite_listener: None,
        }
    }

    pub fn router(&self) -> &FocusRouter<PointerClass> {
        &self.router
    }

    /// Global position in compositor space.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn button_count(&self) -> u32 {
        self.button_count
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.router.focus()
    }

    pub fn focus_serial(&self) -> Serial {
        self.router.focus_serial()
    }

    /// Position relative to the focused surface.
    pub fn local(&self) -> Point {
        self.router.local().unwrap_or_else(Point::unfocused)
    }

    pub fn grab_button(&self) -> u32 {
        self.grab_button
    }

    pub fn grab_time(&self) -> u32 {
        self.grab_time
    }

    pub fn grab_position(&self) -> Point {
        self.grab_position
    }

    pub fn grab_serial(&self) -> Serial {
        self.grab_serial
    }

    pub fn sprite(&self) -> Option<CursorSprite> {
        self.sprite
    }

    /// Where the cursor image's top-left corner sits.
    pub fn sprite_position(&self) -> Option<Point> {
        self.sprite.map(|sprite| {
            self.position.offset(
                Fixed::from_int(-sprite.hotspot_x),
                Fixed::from_int(-sprite.hotspot_y),
            )
        })
    }

    pub(crate) fn press(&mut self, time: u32, button: u32) {
        if self.button_count == 0 {
            self.grab_button = button;
            self.grab_time = time;
            self.grab_position = self.position;
        }
        self.button_count += 1;
    }

    /// Returns false on a release with no button down.
    pub(crate) fn release(&mut self) -> bool {
        match self.button_count.checked_sub(1) {
            Some(count) => {
                self.button_count = count;
                true
            }
            None => {
                warn!("pointer button released with no button down");
                false
            }
        }
    }

    pub(crate) fn set_grab_serial(&mut self, serial: Serial) {
        self.grab_serial = serial;
    }

    pub(crate) fn reset_buttons(&mut self) {
        self.button_count = 0;
    }

    pub(crate) fn map_sprite(&mut self, sprite: CursorSprite, listeners: &mut DestroyListeners) {
        if self.sprite.map(|s| s.surface) != Some(sprite.surface) {
            listeners.cancel_slot(&mut self.sprite_listener);
            self.sprite_listener = Some(listeners.subscribe(
                Watched::Surface(sprite.surface),
                Subscriber::PointerSprite,
            ));
        }
        self.sprite = Some(sprite);
    }

    pub(crate) fn unmap_sprite(&mut self, listeners: &mut DestroyListeners) {
        listeners.cancel_slot(&mut self.sprite_listener);
        if let Some(sprite) = self.sprite.take() {
            debug!("pointer cursor {} unmapped", sprite.surface);
        }
    }

    /// The sprite surface went away; its listener has already fired.
    pub(crate) fn sprite_destroyed(&mut self) {
        self.sprite_listener = None;
        self.sprite = None;
    }
}

/// Strategy receiving every pointer event
///
/// The built-in [`DefaultPointerGrab`] routes to the focused client. Custom
/// grabs (moves, resizes, popups, drags) replace it until they call
/// [`PointerHandle::end_grab`] or the seat ends them.
pub trait PointerGrab {
    /// Re-evaluates focus after the pointer moved or the scene changed.
    fn focus(&mut self, pointer: &mut PointerHandle<'_>);

    fn motion(&mut self, pointer: &mut PointerHandle<'_>, time: u32, position: Point);

    fn button(&mut self, pointer: &mut PointerHandle<'_>, time: u32, button: u32, state: ButtonState);

    fn axis(&mut self, pointer: &mut PointerHandle<'_>, time: u32, axis: Axis, value: Fixed);

    fn cancel(&mut self, pointer: &mut PointerHandle<'_>);
}

/// Access a pointer grab gets while handling one event
pub struct PointerHandle<'a> {
    state: &'a mut PointerState,
    scene: &'a dyn Scene,
    ctx: RoutingContext<'a>,
    keyboard: Option<&'a KeyboardState>,
    request: Option<GrabRequest>,
}

impl<'a> PointerHandle<'a> {
    pub(crate) fn new(
        state: &'a mut PointerState,
        scene: &'a dyn Scene,
        ctx: RoutingContext<'a>,
        keyboard: Option<&'a KeyboardState>,
    ) -> Self {
        Self {
            state,
            scene,
            ctx,
            keyboard,
            request: None,
        }
    }

    pub fn state(&self) -> &PointerState {
        self.state
    }

    pub fn scene(&self) -> &dyn Scene {
        self.scene
    }

    pub fn serials(&self) -> &SerialCounter {
        self.ctx.serials
    }

    pub fn outbox(&mut self) -> &mut Outbox {
        &mut *self.ctx.out
    }

    pub fn position(&self) -> Point {
        self.state.position
    }

    pub fn button_count(&self) -> u32 {
        self.state.button_count
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.state.focus()
    }

    /// Topmost view under the pointer.
    pub fn pick(&self) -> Option<Pick> {
        self.scene.pick(self.state.position)
    }

    /// Moves focus to a picked view, or clears it.
    pub fn set_focus(&mut self, pick: Option<Pick>) -> bool {
        let target = pick.map(|p| FocusTarget::from_pick(self.scene, &p));
        let local = pick.map_or_else(Point::unfocused, |p| p.local);
        self.set_focus_target(target, local)
    }

    pub fn set_focus_target(&mut self, target: Option<FocusTarget>, local: Point) -> bool {
        let local = if target.is_some() {
            local
        } else {
            Point::unfocused()
        };
        let mut emitter = PointerFocusEmitter {
            keyboard: self.keyboard,
            surface: target.map(|t| t.surface),
        };
        self.state
            .router
            .set_focus(target, Some(local), &mut self.ctx, &mut emitter)
    }

    /// Recomputes the focus-local position for a global point.
    pub fn update_local(&mut self, position: Point) {
        if let Some(view) = self.state.router.focus_view() {
            let local = self.scene.to_local(view, position);
            self.state.router.set_local(Some(local));
        }
    }

    /// Moves the pointer, clamped to the output layout, and returns where it
    /// landed. Focus is not re-evaluated; grabs call their own `focus` after.
    pub fn move_to(&mut self, position: Point) -> Point {
        let outputs: Vec<Rect> = self.scene.outputs().iter().map(|o| o.geometry).collect();
        let position = clamp_to_outputs(&outputs, self.state.position, position);
        self.state.position = position;
        self.ctx.out.signal(SeatSignal::PointerMotion { position });
        position
    }

    pub fn send_motion(&mut self, time: u32) {
        let local = self.state.local();
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(binding, PointerEvent::Motion { time, local });
        }
    }

    /// Sends a button event to the focused client. Returns the serial used,
    /// if anything was sent.
    pub fn send_button(&mut self, time: u32, button: u32, state: ButtonState) -> Option<Serial> {
        if !self.state.router.bucket().has_focused() {
            return None;
        }
        let serial = self.ctx.serials.next_serial();
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(
                binding,
                PointerEvent::Button {
                    serial,
                    time,
                    button,
                    state,
                },
            );
        }
        Some(serial)
    }

    pub fn send_axis(&mut self, time: u32, axis: Axis, value: Fixed) {
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx
                .out
                .send(binding, PointerEvent::Axis { time, axis, value });
        }
    }

    /// Asks the seat to restore the default grab once this event returns.
    pub fn end_grab(&mut self) {
        self.request = Some(GrabRequest::End);
    }

    pub(crate) fn take_request(&mut self) -> Option<GrabRequest> {
        self.request.take()
    }
}

/// Enter and leave traffic for pointer bindings
struct PointerFocusEmitter<'k> {
    keyboard: Option<&'k KeyboardState>,
    surface: Option<SurfaceId>,
}

impl FocusEmitter<PointerClass> for PointerFocusEmitter<'_> {
    fn leave(&mut self, out: &mut Outbox, binding: ObjectRef, serial: Serial, surface: SurfaceId) {
        out.send(binding, PointerEvent::Leave { serial, surface });
    }

    /// A client hovered without keyboard focus still needs current modifiers.
    fn before_enter(&mut self, out: &mut Outbox, client: ClientId, serial: Serial) {
        let Some(keyboard) = self.keyboard else {
            return;
        };
        if keyboard.focus_surface() == self.surface {
            return;
        }
        let masks = keyboard.masks();
        for binding in keyboard
            .router()
            .bucket()
            .client_partition(client, Partition::Unfocused)
        {
            out.send(
                binding,
                KeyboardEvent::Modifiers {
                    serial,
                    depressed: masks.depressed,
                    latched: masks.latched,
                    locked: masks.locked,
                    group: masks.group,
                },
            );
        }
    }

    fn enter(
        &mut self,
        out: &mut Outbox,
        binding: ObjectRef,
        serial: Serial,
        target: &FocusTarget,
        local: Point,
    ) {
        out.send(
            binding,
            PointerEvent::Enter {
                serial,
                surface: target.surface,
                local,
            },
        );
    }
}

/// Routes pointer events to whichever client is under the cursor
#[derive(Debug, Default)]
pub struct DefaultPointerGrab;

impl PointerGrab for DefaultPointerGrab {
    /// Focus stays frozen while any button is held.
    fn focus(&mut self, pointer: &mut PointerHandle<'_>) {
        if pointer.button_count() > 0 {
            return;
        }
        let pick = pointer.pick();
        pointer.set_focus(pick);
    }

    fn motion(&mut self, pointer: &mut PointerHandle<'_>, time: u32, position: Point) {
        pointer.update_local(position);
        pointer.move_to(position);
        self.focus(pointer);
        pointer.send_motion(time);
    }

    fn button(&mut self, pointer: &mut PointerHandle<'_>, time: u32, button: u32, state: ButtonState) {
        pointer.send_button(time, button, state);

        if pointer.button_count() == 0 && state == ButtonState::Released {
            let pick = pointer.pick();
            pointer.set_focus(pick);
        }
    }

    fn axis(&mut self, pointer: &mut PointerHandle<'_>, time: u32, axis: Axis, value: Fixed) {
        pointer.send_axis(time, axis, value);
    }

    fn cancel(&mut self, _pointer: &mut PointerHandle<'_>) {}
}

/// A seat's pointer: state plus its grab slot
pub struct Pointer {
    pub(crate) state: PointerState,
    pub(crate) grabs: GrabStack<dyn PointerGrab>,
}

impl Pointer {
    pub fn new(position: Point) -> Self {
        Self {
            state: PointerState::new(position),
            grabs: GrabStack::new(Box::new(DefaultPointerGrab)),
        }
    }

    pub fn state(&self) -> &PointerState {
        &self.state
    }

    pub fn grabs(&self) -> &GrabStack<dyn PointerGrab> {
        &self.grabs
    }
}

impl std::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pointer")
            .field("state", &self.state)
            .field("grabs", &self.grabs)
            .finish()
    }
}
