//! Integration tests for pointer focus and grab dispatch
//!
//! These tests drive a seat against a StackScene and inspect the drained
//! outbox, the same way a compositor host would.

use axiom_seat::event::{ButtonState, DeviceKind, Event, Outgoing, PointerEvent, SeatEvent};
use axiom_seat::geometry::{Fixed, Point, Rect};
use axiom_seat::object::{ClientId, ObjectId, ObjectRef, OutputId, SurfaceId, ViewId};
use axiom_seat::seat::{PointerGrab, PointerHandle, SeatCapabilities};
use axiom_seat::{Seat, SeatConfig, SeatSignal, SerialCounter, StackScene};
use std::cell::RefCell;
use std::rc::Rc;

const BTN_LEFT: u32 = 0x110;

fn desktop() -> StackScene {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 1080));
    scene.map_view(ViewId(2), SurfaceId(2), Some(ClientId(2)), Rect::new(800, 0, 1120, 1080));
    scene
}

fn seat() -> Seat {
    Seat::new("seat0", SerialCounter::new(), &SeatConfig::default())
}

fn pointer_binding(client: u32) -> ObjectRef {
    ObjectRef::new(ClientId(client), ObjectId(20))
}

fn deliveries(messages: &[Outgoing]) -> Vec<(ObjectRef, Event)> {
    messages
        .iter()
        .filter_map(|m| match m {
            Outgoing::Deliver(d) => Some((d.target, d.event.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn leave_precedes_enter_with_fresh_serials() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.get_pointer(pointer_binding(1)).unwrap();
    seat.get_pointer(pointer_binding(2)).unwrap();
    seat.drain();

    seat.notify_motion_absolute(&scene, 10, Point::from_int(900, 10));
    let events = deliveries(&seat.drain());

    let (leave_target, leave) = &events[0];
    let (enter_target, enter) = &events[1];
    assert_eq!(*leave_target, pointer_binding(1));
    assert_eq!(*enter_target, pointer_binding(2));

    let Event::Pointer(PointerEvent::Leave { serial: leave_serial, surface }) = leave else {
        panic!("expected leave, got {:?}", leave);
    };
    assert_eq!(*surface, SurfaceId(1));
    let Event::Pointer(PointerEvent::Enter {
        serial: enter_serial,
        surface,
        local,
    }) = enter
    else {
        panic!("expected enter, got {:?}", enter);
    };
    assert_eq!(*surface, SurfaceId(2));
    assert_eq!(*local, Point::from_int(100, 10));
    assert!(enter_serial.raw() > leave_serial.raw());

    assert!(matches!(
        &events[2],
        (target, Event::Pointer(PointerEvent::Motion { time: 10, .. })) if *target == pointer_binding(2)
    ));
}

#[test]
fn relative_motion_is_clamped_to_the_layout() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);

    seat.notify_motion(&scene, 1, Fixed::from_int(-5000), Fixed::from_int(50));
    let position = seat.pointer().unwrap().state().position();
    assert_eq!(position, Point::from_int(0, 150));

    let signals = seat.drain_signals();
    assert!(signals
        .iter()
        .any(|s| matches!(s, SeatSignal::PointerMotion { position: p } if *p == position)));
}

#[test]
fn axis_hook_can_swallow_scrolls() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.get_pointer(pointer_binding(1)).unwrap();
    seat.hooks_mut().axis = Some(Box::new(|_, _, value| value > Fixed::ZERO));
    seat.drain();

    seat.notify_axis(&scene, 1, axiom_seat::event::Axis::VerticalScroll, Fixed::from_int(10));
    seat.notify_axis(&scene, 2, axiom_seat::event::Axis::VerticalScroll, Fixed::ZERO);
    assert!(seat.drain().is_empty());

    seat.notify_axis(&scene, 3, axiom_seat::event::Axis::VerticalScroll, Fixed::from_int(-10));
    assert_eq!(deliveries(&seat.drain()).len(), 1);
}

#[test]
fn destroyed_client_receives_nothing_more() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.get_pointer(pointer_binding(1)).unwrap();
    seat.client_destroyed(ClientId(1));
    seat.drain();

    seat.notify_button(&scene, 1, BTN_LEFT, ButtonState::Pressed);
    seat.notify_motion_absolute(&scene, 2, Point::from_int(10, 10));
    assert!(deliveries(&seat.drain()).is_empty());
}

#[test]
fn capability_changes_reach_every_seat_binding() {
    let scene = desktop();
    let mut seat = seat();
    let a = ObjectRef::new(ClientId(1), ObjectId(1));
    let b = ObjectRef::new(ClientId(2), ObjectId(1));
    seat.bind_seat(a, 1).unwrap();
    seat.bind_seat(b, 5).unwrap();
    seat.drain();

    seat.init_pointer(&scene);
    seat.init_keyboard(None).unwrap();
    seat.release_pointer(&scene);

    let events = deliveries(&seat.drain());
    let caps_for = |target: ObjectRef| -> Vec<SeatCapabilities> {
        events
            .iter()
            .filter_map(|(t, e)| match e {
                Event::Seat(SeatEvent::Capabilities(caps)) if *t == target => Some(*caps),
                _ => None,
            })
            .collect()
    };
    let expected = vec![
        SeatCapabilities::POINTER,
        SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD,
        SeatCapabilities::KEYBOARD,
    ];
    assert_eq!(caps_for(a), expected);
    assert_eq!(caps_for(b), expected);
    assert_eq!(seat.device_count(DeviceKind::Pointer), 0);
}

#[test]
fn removed_output_moves_pointer_to_the_nearest_one() {
    let mut scene = desktop();
    scene.add_output(OutputId(2), Rect::new(1920, 0, 1280, 1024));
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.notify_motion_absolute(&scene, 1, Point::from_int(3000, 500));

    scene.remove_output(OutputId(2));
    seat.output_destroyed(&scene, OutputId(2));

    let position = seat.pointer().unwrap().state().position();
    assert_eq!(position.x.to_int(), 1919);
    assert_eq!(position.y, Fixed::from_int(500));
    assert_eq!(
        seat.pointer().unwrap().state().focus().map(|f| f.surface),
        Some(SurfaceId(2))
    );
}

/// Move grab: swallows motion and ends on the first button release.
struct MoveGrab {
    seen: Rc<RefCell<Vec<Point>>>,
    cancelled: Rc<RefCell<bool>>,
}

impl PointerGrab for MoveGrab {
    fn focus(&mut self, _pointer: &mut PointerHandle<'_>) {}

    fn motion(&mut self, pointer: &mut PointerHandle<'_>, _time: u32, position: Point) {
        let landed = pointer.move_to(position);
        self.seen.borrow_mut().push(landed);
    }

    fn button(&mut self, pointer: &mut PointerHandle<'_>, _time: u32, _button: u32, state: ButtonState) {
        if state == ButtonState::Released && pointer.button_count() == 0 {
            pointer.end_grab();
        }
    }

    fn axis(&mut self, _pointer: &mut PointerHandle<'_>, _time: u32, _axis: axiom_seat::event::Axis, _value: Fixed) {}

    fn cancel(&mut self, pointer: &mut PointerHandle<'_>) {
        *self.cancelled.borrow_mut() = true;
        pointer.end_grab();
    }
}

#[test]
fn custom_grab_owns_events_until_it_ends() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.get_pointer(pointer_binding(1)).unwrap();
    seat.get_pointer(pointer_binding(2)).unwrap();

    seat.notify_button(&scene, 1, BTN_LEFT, ButtonState::Pressed);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let cancelled = Rc::new(RefCell::new(false));
    seat.start_pointer_grab(
        &scene,
        Box::new(MoveGrab {
            seen: Rc::clone(&seen),
            cancelled: Rc::clone(&cancelled),
        }),
    )
    .unwrap();
    seat.drain();

    seat.notify_motion_absolute(&scene, 2, Point::from_int(1000, 200));
    assert!(deliveries(&seat.drain()).is_empty());
    assert_eq!(seen.borrow().as_slice(), &[Point::from_int(1000, 200)]);

    seat.notify_button(&scene, 3, BTN_LEFT, ButtonState::Released);
    assert!(seat.pointer().unwrap().grabs().is_default());
    // Ending the grab re-runs default focus at the new position
    assert_eq!(
        seat.pointer().unwrap().state().focus().map(|f| f.surface),
        Some(SurfaceId(2))
    );
    assert!(!*cancelled.borrow());
}

#[test]
fn keyboard_focus_out_cancels_pointer_grabs() {
    let scene = desktop();
    let mut seat = seat();
    seat.init_pointer(&scene);
    seat.init_keyboard(None).unwrap();
    let cancelled = Rc::new(RefCell::new(false));
    seat.start_pointer_grab(
        &scene,
        Box::new(MoveGrab {
            seen: Rc::new(RefCell::new(Vec::new())),
            cancelled: Rc::clone(&cancelled),
        }),
    )
    .unwrap();

    seat.notify_keyboard_focus_out(&scene);
    assert!(*cancelled.borrow());
    assert!(seat.pointer().unwrap().grabs().is_default());
}

#[test]
fn unfocused_local_coordinates_use_the_sentinel() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 640, 480));
    let mut seat = seat();
    seat.init_pointer(&scene);
    assert!(seat.pointer().unwrap().state().focus().is_none());
    assert_eq!(seat.pointer().unwrap().state().local(), Point::unfocused());

    seat.notify_pointer_focus(&scene, None, Point::default());
    assert!(seat.pointer().unwrap().state().focus().is_none());
}
