//! Touch device
//!
//! The first finger down picks the surface; every further finger of the same
//! session goes to it until all fingers are up again. Touch has no enter or
//! leave events, so focus changes are silent.

use crate::event::{Outbox, TouchEvent};
use crate::focus::{FocusRouter, FocusTarget, RoutingContext, SilentFocus, TouchClass};
use crate::geometry::Point;
use crate::grab::{GrabRequest, GrabStack};
use crate::listener::Subscriber;
use crate::object::ObjectRef;
use crate::scene::{Pick, Scene};
use crate::serial::{Serial, SerialCounter};

#[derive(Debug)]
pub struct TouchState {
    pub(crate) router: FocusRouter<TouchClass>,
    num_tp: u32,
    grab_touch_id: i32,
    grab_serial: Serial,
    grab_time: u32,
    grab_position: Point,
}

impl Default for TouchState {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchState {
    pub fn new() -> Self {
        Self {
            router: FocusRouter::new(Subscriber::TouchFocus),
            num_tp: 0,
            grab_touch_id: 0,
            grab_serial: Serial::default(),
            grab_time: 0,
            grab_position: Point::default(),
        }
    }

    pub fn router(&self) -> &FocusRouter<TouchClass> {
        &self.router
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.router.focus()
    }

    /// Fingers currently down.
    pub fn points(&self) -> u32 {
        self.num_tp
    }

    pub fn grab_touch_id(&self) -> i32 {
        self.grab_touch_id
    }

    pub fn grab_serial(&self) -> Serial {
        self.grab_serial
    }

    pub fn grab_time(&self) -> u32 {
        self.grab_time
    }

    pub fn grab_position(&self) -> Point {
        self.grab_position
    }

    pub(crate) fn add_point(&mut self) -> u32 {
        self.num_tp += 1;
        self.num_tp
    }

    /// Returns false when no point was down.
    pub(crate) fn remove_point(&mut self) -> bool {
        match self.num_tp.checked_sub(1) {
            Some(count) => {
                self.num_tp = count;
                true
            }
            None => false,
        }
    }

    pub(crate) fn reset_points(&mut self) {
        self.num_tp = 0;
    }

    pub(crate) fn set_grab_position(&mut self, position: Point) {
        self.grab_position = position;
    }

    pub(crate) fn start_session(&mut self, serial: Serial, id: i32, time: u32, position: Point) {
        self.grab_serial = serial;
        self.grab_touch_id = id;
        self.grab_time = time;
        self.grab_position = position;
    }
}

/// Strategy receiving every touch event
///
/// Positions are global; grabs convert them with
/// [`TouchHandle::local_position`].
pub trait TouchGrab {
    fn down(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32, position: Point);

    fn up(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32);

    fn motion(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32, position: Point);

    fn frame(&mut self, touch: &mut TouchHandle<'_>);

    fn cancel(&mut self, touch: &mut TouchHandle<'_>);
}

pub struct TouchHandle<'a> {
    state: &'a mut TouchState,
    scene: &'a dyn Scene,
    ctx: RoutingContext<'a>,
    request: Option<GrabRequest>,
}

impl<'a> TouchHandle<'a> {
    pub(crate) fn new(state: &'a mut TouchState, scene: &'a dyn Scene, ctx: RoutingContext<'a>) -> Self {
        Self {
            state,
            scene,
            ctx,
            request: None,
        }
    }

    pub fn state(&self) -> &TouchState {
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

    pub fn focus(&self) -> Option<FocusTarget> {
        self.state.focus()
    }

    /// Surfaces without a client resource cannot take touch focus.
    pub fn set_focus(&mut self, pick: Option<Pick>) -> bool {
        let target = pick
            .map(|p| FocusTarget::from_pick(self.scene, &p))
            .filter(|t| t.client.is_some());
        self.state
            .router
            .set_focus(target, None, &mut self.ctx, &mut SilentFocus)
    }

    /// `position` relative to the focused view.
    pub fn local_position(&self, position: Point) -> Option<Point> {
        let view = self.state.router.focus_view()?;
        Some(self.scene.to_local(view, position))
    }

    pub fn send_down(&mut self, time: u32, id: i32, position: Point) -> Option<Serial> {
        let (Some(focus), Some(local)) = (self.state.focus(), self.local_position(position)) else {
            return None;
        };
        if !self.state.router.bucket().has_focused() {
            return None;
        }
        let serial = self.ctx.serials.next_serial();
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(
                binding,
                TouchEvent::Down {
                    serial,
                    time,
                    surface: focus.surface,
                    id,
                    local,
                },
            );
        }
        Some(serial)
    }

    pub fn send_up(&mut self, time: u32, id: i32) -> Option<Serial> {
        if !self.state.router.bucket().has_focused() {
            return None;
        }
        let serial = self.ctx.serials.next_serial();
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(binding, TouchEvent::Up { serial, time, id });
        }
        Some(serial)
    }

    pub fn send_motion(&mut self, time: u32, id: i32, position: Point) {
        let Some(local) = self.local_position(position) else {
            return;
        };
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(binding, TouchEvent::Motion { time, id, local });
        }
    }

    pub fn send_frame(&mut self) {
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(binding, TouchEvent::Frame);
        }
    }

    pub fn end_grab(&mut self) {
        self.request = Some(GrabRequest::End);
    }

    pub(crate) fn take_request(&mut self) -> Option<GrabRequest> {
        self.request.take()
    }
}

#[derive(Debug, Default)]
pub struct DefaultTouchGrab;

impl TouchGrab for DefaultTouchGrab {
    fn down(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32, position: Point) {
        touch.send_down(time, id, position);
    }

    fn up(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32) {
        touch.send_up(time, id);
    }

    fn motion(&mut self, touch: &mut TouchHandle<'_>, time: u32, id: i32, position: Point) {
        touch.send_motion(time, id, position);
    }

    fn frame(&mut self, touch: &mut TouchHandle<'_>) {
        touch.send_frame();
    }

    fn cancel(&mut self, _touch: &mut TouchHandle<'_>) {}
}

pub struct Touch {
    pub(crate) state: TouchState,
    pub(crate) grabs: GrabStack<dyn TouchGrab>,
}

impl Default for Touch {
    fn default() -> Self {
        Self::new()
    }
}

impl Touch {
    pub fn new() -> Self {
        Self {
            state: TouchState::new(),
            grabs: GrabStack::new(Box::new(DefaultTouchGrab)),
        }
    }

    pub fn state(&self) -> &TouchState {
        &self.state
    }

    pub fn grabs(&self) -> &GrabStack<dyn TouchGrab> {
        &self.grabs
    }
}

impl std::fmt::Debug for Touch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Touch")
            .field("state", &self.state)
            .field("grabs", &self.grabs)
            .finish()
    }
}
