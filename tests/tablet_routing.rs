//! Integration tests for tablets and tablet tools

use axiom_seat::event::{Event, Outgoing, ProtocolErrorKind, TabletEvent, TabletSeatEvent, TabletToolEvent};
use axiom_seat::geometry::{Point, Rect};
use axiom_seat::object::{ClientId, ObjectId, ObjectRef, OutputId, SurfaceId, ViewId};
use axiom_seat::seat::{TabletDescription, TabletType, ToolCapabilities, ToolCapability, ToolDescription, ToolType};
use axiom_seat::{Seat, SeatConfig, SeatSignal, SerialCounter, StackScene};

fn seat() -> Seat {
    Seat::new("seat0", SerialCounter::new(), &SeatConfig::default())
}

fn tablet_seat_binding() -> ObjectRef {
    ObjectRef::new(ClientId(1), ObjectId(40))
}

fn intuos() -> TabletDescription {
    TabletDescription {
        name: "Wacom Intuos Pro M".to_string(),
        vid: 0x056a,
        pid: 0x0357,
        tablet_type: TabletType::External,
        path: "/dev/input/event7".to_string(),
        output: None,
    }
}

fn pen() -> ToolDescription {
    ToolDescription {
        serial: 0x1_0000_0002,
        hardware_id: 0x802,
        tool_type: ToolType::Pen,
        capabilities: ToolCapabilities::PRESSURE | ToolCapabilities::TILT,
    }
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

fn tool_events(messages: &[Outgoing]) -> Vec<TabletToolEvent> {
    deliveries(messages)
        .into_iter()
        .filter_map(|(_, e)| match e {
            Event::TabletTool(event) => Some(event),
            _ => None,
        })
        .collect()
}

#[test]
fn tablet_waits_for_an_output_before_announcing() {
    let mut scene = StackScene::new();
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();

    let id = seat.add_tablet(&scene, intuos());
    assert!(seat.tablets().tablets().is_empty());
    assert_eq!(seat.tablets().pending().count(), 1);
    assert!(seat.drain().is_empty());

    scene.add_output(OutputId(4), Rect::new(0, 0, 2560, 1440));
    seat.output_created(OutputId(4));
    assert_eq!(seat.tablets().tablet(id).and_then(|t| t.output()), Some(OutputId(4)));

    let events = deliveries(&seat.drain());
    let (target, added) = &events[0];
    assert_eq!(*target, tablet_seat_binding());
    let Event::TabletSeat(TabletSeatEvent::TabletAdded { tablet }) = added else {
        panic!("expected tablet_added, got {:?}", added);
    };
    let tablet = ObjectRef::new(ClientId(1), *tablet);
    let described: Vec<TabletEvent> = events[1..]
        .iter()
        .filter(|(t, _)| *t == tablet)
        .filter_map(|(_, e)| match e {
            Event::Tablet(event) => Some(event.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        described,
        vec![
            TabletEvent::Name("Wacom Intuos Pro M".to_string()),
            TabletEvent::Id { vid: 0x056a, pid: 0x0357 },
            TabletEvent::Type(TabletType::External),
            TabletEvent::Path("/dev/input/event7".to_string()),
            TabletEvent::Done,
        ]
    );
    assert!(seat
        .drain_signals()
        .contains(&SeatSignal::TabletAdded(id)));
}

#[test]
fn late_tablet_seat_binding_learns_existing_devices() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    let mut seat = seat();
    seat.add_tablet(&scene, intuos());
    seat.add_tool(pen());
    seat.drain();

    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let events = deliveries(&seat.drain());
    let seat_events: Vec<&Event> = events
        .iter()
        .filter(|(t, _)| *t == tablet_seat_binding())
        .map(|(_, e)| e)
        .collect();
    assert!(matches!(seat_events[0], Event::TabletSeat(TabletSeatEvent::TabletAdded { .. })));
    assert!(matches!(seat_events[1], Event::TabletSeat(TabletSeatEvent::ToolAdded { .. })));

    let announced: Vec<TabletToolEvent> = events
        .into_iter()
        .filter_map(|(_, e)| match e {
            Event::TabletTool(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        announced,
        vec![
            TabletToolEvent::Type(ToolType::Pen),
            TabletToolEvent::SerialId { hi: 1, lo: 2 },
            TabletToolEvent::HardwareId { hi: 0, lo: 0x802 },
            TabletToolEvent::Capability(ToolCapability::Tilt),
            TabletToolEvent::Capability(ToolCapability::Pressure),
            TabletToolEvent::Done,
        ]
    );

    assert!(seat.get_tablet_seat(tablet_seat_binding()).is_err());
}

#[test]
fn same_serial_and_type_reuses_the_tool() {
    let mut seat = seat();
    let first = seat.add_tool(pen());
    let again = seat.add_tool(pen());
    let eraser = seat.add_tool(ToolDescription {
        tool_type: ToolType::Eraser,
        ..pen()
    });
    assert_eq!(first, again);
    assert_ne!(first, eraser);
    assert_eq!(seat.tablets().tools().len(), 2);
}

#[test]
fn pen_stroke_enters_draws_and_leaves() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(100, 100, 800, 600));
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let tablet = seat.add_tablet(&scene, intuos());
    let tool = seat.add_tool(pen());
    seat.drain();

    seat.notify_tablet_tool_proximity_in(&scene, 10, tool, tablet);
    seat.notify_tablet_tool_motion(&scene, 10, tool, Point::from_int(150, 160));
    seat.notify_tablet_tool_frame(&scene, 10, tool);
    let events = tool_events(&seat.drain());
    assert!(matches!(
        events[0],
        TabletToolEvent::ProximityIn { surface, .. } if surface == SurfaceId(1)
    ));
    assert_eq!(events[1], TabletToolEvent::Frame { time: 10 });
    assert_eq!(
        events[2],
        TabletToolEvent::Motion {
            local: Point::from_int(50, 60)
        }
    );
    assert_eq!(events[3], TabletToolEvent::Frame { time: 10 });

    seat.notify_tablet_tool_down(&scene, 11, tool);
    seat.notify_tablet_tool_pressure(&scene, 11, tool, 4000);
    seat.notify_tablet_tool_frame(&scene, 11, tool);
    let events = tool_events(&seat.drain());
    assert!(matches!(events[0], TabletToolEvent::Down { .. }));
    assert_eq!(events[1], TabletToolEvent::Pressure(4000));
    assert_eq!(seat.idle_inhibitors(), 1);

    // Leaving the surface with the tip down lifts it first
    seat.notify_tablet_tool_motion(&scene, 12, tool, Point::from_int(1500, 900));
    let events = tool_events(&seat.drain());
    assert_eq!(
        &events[..3],
        &[
            TabletToolEvent::Up,
            TabletToolEvent::ProximityOut,
            TabletToolEvent::Frame { time: 12 },
        ]
    );
    assert!(seat.tool(tool).unwrap().state().focus().is_none());

    seat.notify_tablet_tool_up(&scene, 13, tool);
    assert_eq!(seat.idle_inhibitors(), 0);
}

#[test]
fn client_without_a_tablet_handle_hears_nothing_from_the_tool() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 600));
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let tablet = seat.add_tablet(&scene, intuos());
    let tool = seat.add_tool(pen());

    let tablet_object = deliveries(&seat.drain())
        .into_iter()
        .find_map(|(_, e)| match e {
            Event::TabletSeat(TabletSeatEvent::TabletAdded { tablet }) => Some(tablet),
            _ => None,
        })
        .map(|id| ObjectRef::new(ClientId(1), id))
        .unwrap();
    seat.binding_destroyed(tablet_object);

    seat.notify_tablet_tool_proximity_in(&scene, 1, tool, tablet);
    seat.notify_tablet_tool_motion(&scene, 1, tool, Point::from_int(10, 10));
    seat.notify_tablet_tool_down(&scene, 2, tool);
    seat.notify_tablet_tool_frame(&scene, 2, tool);
    seat.notify_tablet_tool_proximity_out(&scene, 3, tool);

    assert!(tool_events(&seat.drain()).is_empty());
}

#[test]
fn tool_cursor_follows_the_focus_serial() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 600));
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let tablet = seat.add_tablet(&scene, intuos());
    let tool = seat.add_tool(pen());
    seat.notify_tablet_tool_proximity_in(&scene, 1, tool, tablet);
    seat.notify_tablet_tool_motion(&scene, 1, tool, Point::from_int(10, 10));
    let serial = seat.tool(tool).unwrap().state().focus_serial();
    let tool_object = ObjectRef::new(ClientId(1), ObjectId(77));
    seat.drain();

    seat.set_tool_cursor(&mut scene, tool, tool_object, serial, Some(SurfaceId(9)), 2, 3)
        .unwrap();
    let sprite = seat.tool(tool).unwrap().state().sprite().unwrap();
    assert_eq!(sprite.surface, SurfaceId(9));
    assert_eq!((sprite.hotspot_x, sprite.hotspot_y), (2, 3));

    // Another client cannot move the sprite
    let stranger = ObjectRef::new(ClientId(2), ObjectId(77));
    seat.set_tool_cursor(&mut scene, tool, stranger, serial, None, 0, 0)
        .unwrap();
    assert!(seat.tool(tool).unwrap().state().sprite().is_some());

    // A pointer cursor role on the same surface is a conflict
    scene.map_view(ViewId(2), SurfaceId(2), Some(ClientId(1)), Rect::new(900, 0, 100, 100));
    seat.init_pointer(&scene);
    seat.set_tool_cursor(&mut scene, tool, tool_object, serial, Some(SurfaceId(2)), 0, 0)
        .unwrap();
    seat.notify_pointer_focus(&scene, Some(OutputId(1)), Point::from_int(10, 10));
    let pointer_serial = seat.pointer().unwrap().state().focus_serial();
    seat.set_cursor(
        &mut scene,
        ObjectRef::new(ClientId(1), ObjectId(78)),
        pointer_serial,
        Some(SurfaceId(2)),
        0,
        0,
    );
    assert!(seat.drain().iter().any(|m| matches!(
        m,
        Outgoing::ProtocolError {
            kind: ProtocolErrorKind::PointerRole,
            ..
        }
    )));

    seat.notify_tablet_tool_proximity_out(&scene, 2, tool);
    assert!(seat.tool(tool).unwrap().state().sprite().is_none());
}

#[test]
fn removed_tablet_is_announced_and_forgotten() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let tablet = seat.add_tablet(&scene, intuos());
    seat.drain();

    seat.remove_tablet(tablet).unwrap();
    let events = deliveries(&seat.drain());
    assert!(matches!(events.as_slice(), [(_, Event::Tablet(TabletEvent::Removed))]));
    assert!(seat.remove_tablet(tablet).is_err());
    assert!(seat.tablets().tablet(tablet).is_none());
}

#[test]
fn removed_tool_leaves_proximity_first() {
    let mut scene = StackScene::new();
    scene.add_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 600));
    let mut seat = seat();
    seat.get_tablet_seat(tablet_seat_binding()).unwrap();
    let tablet = seat.add_tablet(&scene, intuos());
    let tool = seat.add_tool(pen());
    seat.notify_tablet_tool_proximity_in(&scene, 1, tool, tablet);
    seat.notify_tablet_tool_motion(&scene, 1, tool, Point::from_int(10, 10));
    seat.drain();

    seat.remove_tool(&scene, tool).unwrap();
    let events = tool_events(&seat.drain());
    assert_eq!(events[0], TabletToolEvent::ProximityOut);
    assert_eq!(events.last(), Some(&TabletToolEvent::Removed));
    assert!(seat.tool(tool).is_none());
    assert!(seat.drain_signals().contains(&SeatSignal::ToolRemoved(tool)));
}
