//! Scripted replay of device events against a headless scene
//!
//! A replay script is TOML: `[[output]]` and `[[view]]` tables build a
//! [`StackScene`], and `[[step]]` tables (tagged by `kind`) drive the seat.
//! After every step the outbox and signals are collected so the traffic a
//! sequence of events produces can be inspected or diffed.
//!
//! ```toml
//! [[output]]
//! id = 1
//! width = 1920
//! height = 1080
//!
//! [[view]]
//! id = 1
//! surface = 1
//! client = 1
//! x = 100
//! y = 100
//! width = 640
//! height = 480
//!
//! [[step]]
//! kind = "init_pointer"
//!
//! [[step]]
//! kind = "get_pointer"
//! client = 1
//! object = 3
//!
//! [[step]]
//! kind = "motion_absolute"
//! time = 10
//! x = 200.0
//! y = 150.0
//! ```

use crate::config::SeatConfig;
use crate::event::{Axis, ButtonState, KeyState, Outgoing, SeatSignal, StateUpdate, TouchPhase};
use crate::geometry::{Fixed, Point, Rect};
use crate::object::{ClientId, ObjectId, ObjectRef, OutputId, SurfaceId, TabletId, ToolId, ViewId};
use crate::scene::StackScene;
use crate::seat::{Seat, TabletDescription, ToolCapability, ToolDescription, ToolType};
use crate::serial::{Serial, SerialCounter};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSpec {
    pub id: u32,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewSpec {
    pub id: u32,
    pub surface: u32,
    /// Absent for surfaces without a client resource
    pub client: Option<u32>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

fn automatic() -> StateUpdate {
    StateUpdate::Automatic
}

fn default_version() -> u32 {
    crate::seat::SEAT_VERSION
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    InitPointer,
    ReleasePointer,
    InitKeyboard,
    ReleaseKeyboard,
    InitTouch,
    ReleaseTouch,
    BindSeat {
        client: u32,
        object: u32,
        #[serde(default = "default_version")]
        version: u32,
    },
    GetPointer {
        client: u32,
        object: u32,
    },
    GetKeyboard {
        client: u32,
        object: u32,
        #[serde(default = "default_version")]
        version: u32,
    },
    GetTouch {
        client: u32,
        object: u32,
    },
    GetTabletSeat {
        client: u32,
        object: u32,
    },
    DestroyObject {
        client: u32,
        object: u32,
    },
    DestroyClient {
        client: u32,
    },
    Motion {
        time: u32,
        dx: f64,
        dy: f64,
    },
    MotionAbsolute {
        time: u32,
        x: f64,
        y: f64,
    },
    Button {
        time: u32,
        button: u32,
        state: ButtonState,
    },
    Axis {
        time: u32,
        axis: Axis,
        value: f64,
    },
    PointerFocus {
        output: Option<u32>,
        x: f64,
        y: f64,
    },
    SetCursor {
        client: u32,
        object: u32,
        serial: u32,
        surface: Option<u32>,
        #[serde(default)]
        hotspot_x: i32,
        #[serde(default)]
        hotspot_y: i32,
    },
    Key {
        time: u32,
        key: u32,
        state: KeyState,
        #[serde(default = "automatic")]
        update: StateUpdate,
    },
    KeyboardFocusIn {
        #[serde(default)]
        keys: Vec<u32>,
        #[serde(default = "automatic")]
        update: StateUpdate,
    },
    KeyboardFocusOut,
    Activate {
        surface: u32,
    },
    Touch {
        time: u32,
        id: i32,
        x: f64,
        y: f64,
        phase: TouchPhase,
    },
    TouchFrame,
    AddOutput(OutputSpec),
    RemoveOutput {
        id: u32,
    },
    MapView(ViewSpec),
    UnmapView {
        id: u32,
    },
    DestroySurface {
        surface: u32,
    },
    Repick,
    AddTablet(TabletDescription),
    RemoveTablet {
        tablet: u32,
    },
    AddTool {
        serial: u64,
        #[serde(default)]
        hardware_id: u64,
        tool_type: ToolType,
        #[serde(default)]
        capabilities: Vec<ToolCapability>,
    },
    RemoveTool {
        tool: u32,
    },
    ToolProximityIn {
        time: u32,
        tool: u32,
        tablet: u32,
    },
    ToolProximityOut {
        time: u32,
        tool: u32,
    },
    ToolMotion {
        time: u32,
        tool: u32,
        x: f64,
        y: f64,
    },
    ToolDown {
        time: u32,
        tool: u32,
    },
    ToolUp {
        time: u32,
        tool: u32,
    },
    ToolPressure {
        time: u32,
        tool: u32,
        pressure: u32,
    },
    ToolButton {
        time: u32,
        tool: u32,
        button: u32,
        state: ButtonState,
    },
    ToolFrame {
        time: u32,
        tool: u32,
    },
}

/// A parsed replay script
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default, rename = "output")]
    pub outputs: Vec<OutputSpec>,
    #[serde(default, rename = "view")]
    pub views: Vec<ViewSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse replay script: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid replay script")
    }
}

/// Traffic produced by one step
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub index: usize,
    pub messages: Vec<Outgoing>,
    pub signals: Vec<SeatSignal>,
}

/// A seat plus the scene it routes against
pub struct Replay {
    pub scene: StackScene,
    pub seat: Seat,
}

impl Replay {
    pub fn new(script: &Script, config: &SeatConfig) -> Self {
        let mut scene = StackScene::new();
        for output in &script.outputs {
            scene.add_output(OutputId(output.id), output_rect(output));
        }
        for view in &script.views {
            map_view(&mut scene, view);
        }
        let seat = Seat::new(config.seat.name.clone(), SerialCounter::new(), config);
        Self { scene, seat }
    }

    /// Runs every step in order. A failing step aborts the replay.
    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<StepOutput>> {
        info!("▶️ Replaying {} steps on seat '{}'", steps.len(), self.seat.name());
        let mut outputs = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            debug!("step {}: {:?}", index, step);
            self.apply(step)
                .with_context(|| format!("step {} ({:?}) failed", index, step))?;
            outputs.push(StepOutput {
                index,
                messages: self.seat.drain(),
                signals: self.seat.drain_signals(),
            });
        }
        Ok(outputs)
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        let scene = &mut self.scene;
        let seat = &mut self.seat;
        match step {
            Step::InitPointer => seat.init_pointer(scene),
            Step::ReleasePointer => seat.release_pointer(scene),
            Step::InitKeyboard => seat.init_keyboard(None)?,
            Step::ReleaseKeyboard => seat.release_keyboard(scene),
            Step::InitTouch => seat.init_touch(),
            Step::ReleaseTouch => seat.release_touch(scene),
            Step::BindSeat {
                client,
                object,
                version,
            } => seat.bind_seat(object_ref(*client, *object), *version)?,
            Step::GetPointer { client, object } => seat.get_pointer(object_ref(*client, *object))?,
            Step::GetKeyboard {
                client,
                object,
                version,
            } => seat.get_keyboard(object_ref(*client, *object), *version)?,
            Step::GetTouch { client, object } => seat.get_touch(object_ref(*client, *object))?,
            Step::GetTabletSeat { client, object } => {
                seat.get_tablet_seat(object_ref(*client, *object))?
            }
            Step::DestroyObject { client, object } => {
                seat.binding_destroyed(object_ref(*client, *object));
            }
            Step::DestroyClient { client } => seat.client_destroyed(ClientId(*client)),
            Step::Motion { time, dx, dy } => {
                seat.notify_motion(scene, *time, Fixed::from_f64(*dx), Fixed::from_f64(*dy))
            }
            Step::MotionAbsolute { time, x, y } => {
                seat.notify_motion_absolute(scene, *time, Point::from_f64(*x, *y))
            }
            Step::Button {
                time,
                button,
                state,
            } => seat.notify_button(scene, *time, *button, *state),
            Step::Axis { time, axis, value } => {
                seat.notify_axis(scene, *time, *axis, Fixed::from_f64(*value))
            }
            Step::PointerFocus { output, x, y } => {
                seat.notify_pointer_focus(scene, output.map(OutputId), Point::from_f64(*x, *y))
            }
            Step::SetCursor {
                client,
                object,
                serial,
                surface,
                hotspot_x,
                hotspot_y,
            } => seat.set_cursor(
                scene,
                object_ref(*client, *object),
                Serial::new(*serial),
                surface.map(SurfaceId),
                *hotspot_x,
                *hotspot_y,
            ),
            Step::Key {
                time,
                key,
                state,
                update,
            } => seat.notify_key(scene, *time, *key, *state, *update),
            Step::KeyboardFocusIn { keys, update } => {
                seat.notify_keyboard_focus_in(scene, keys, *update)
            }
            Step::KeyboardFocusOut => seat.notify_keyboard_focus_out(scene),
            Step::Activate { surface } => seat.activate(scene, SurfaceId(*surface)),
            Step::Touch {
                time,
                id,
                x,
                y,
                phase,
            } => seat.notify_touch(scene, *time, *id, Point::from_f64(*x, *y), *phase),
            Step::TouchFrame => seat.notify_touch_frame(scene),
            Step::AddOutput(output) => {
                scene.add_output(OutputId(output.id), output_rect(output));
                seat.output_created(OutputId(output.id));
            }
            Step::RemoveOutput { id } => {
                scene.remove_output(OutputId(*id));
                seat.output_destroyed(scene, OutputId(*id));
            }
            Step::MapView(view) => {
                map_view(scene, view);
                seat.repick(scene);
            }
            Step::UnmapView { id } => {
                scene.unmap_view(ViewId(*id));
                seat.view_destroyed(scene, ViewId(*id));
                seat.repick(scene);
            }
            Step::DestroySurface { surface } => {
                let surface = SurfaceId(*surface);
                for view in scene.destroy_surface(surface) {
                    seat.view_destroyed(scene, view);
                }
                seat.surface_destroyed(scene, surface);
                seat.repick(scene);
            }
            Step::Repick => seat.repick(scene),
            Step::AddTablet(description) => {
                seat.add_tablet(scene, description.clone());
            }
            Step::RemoveTablet { tablet } => seat.remove_tablet(TabletId(*tablet))?,
            Step::AddTool {
                serial,
                hardware_id,
                tool_type,
                capabilities,
            } => {
                seat.add_tool(ToolDescription {
                    serial: *serial,
                    hardware_id: *hardware_id,
                    tool_type: *tool_type,
                    capabilities: capabilities.iter().copied().collect(),
                });
            }
            Step::RemoveTool { tool } => seat.remove_tool(scene, ToolId(*tool))?,
            Step::ToolProximityIn { time, tool, tablet } => {
                seat.notify_tablet_tool_proximity_in(scene, *time, ToolId(*tool), TabletId(*tablet))
            }
            Step::ToolProximityOut { time, tool } => {
                seat.notify_tablet_tool_proximity_out(scene, *time, ToolId(*tool))
            }
            Step::ToolMotion { time, tool, x, y } => {
                seat.notify_tablet_tool_motion(scene, *time, ToolId(*tool), Point::from_f64(*x, *y))
            }
            Step::ToolDown { time, tool } => seat.notify_tablet_tool_down(scene, *time, ToolId(*tool)),
            Step::ToolUp { time, tool } => seat.notify_tablet_tool_up(scene, *time, ToolId(*tool)),
            Step::ToolPressure {
                time,
                tool,
                pressure,
            } => seat.notify_tablet_tool_pressure(scene, *time, ToolId(*tool), *pressure),
            Step::ToolButton {
                time,
                tool,
                button,
                state,
            } => seat.notify_tablet_tool_button(scene, *time, ToolId(*tool), *button, *state),
            Step::ToolFrame { time, tool } => {
                seat.notify_tablet_tool_frame(scene, *time, ToolId(*tool))
            }
        }
        Ok(())
    }
}

fn object_ref(client: u32, object: u32) -> ObjectRef {
    ObjectRef::new(ClientId(client), ObjectId(object))
}

fn output_rect(output: &OutputSpec) -> Rect {
    Rect::new(output.x, output.y, output.width, output.height)
}

fn map_view(scene: &mut StackScene, view: &ViewSpec) {
    scene.map_view(
        ViewId(view.id),
        SurfaceId(view.surface),
        view.client.map(ClientId),
        Rect::new(view.x, view.y, view.width, view.height),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, PointerEvent};

    const SCRIPT: &str = r#"
[[output]]
id = 1
width = 1000
height = 800

[[view]]
id = 1
surface = 1
client = 1
x = 100
y = 100
width = 200
height = 200

[[step]]
kind = "init_pointer"

[[step]]
kind = "bind_seat"
client = 1
object = 1

[[step]]
kind = "get_pointer"
client = 1
object = 2

[[step]]
kind = "motion_absolute"
time = 5
x = 150.0
y = 120.0

[[step]]
kind = "button"
time = 6
button = 272
state = "pressed"
"#;

    #[test]
    fn script_drives_the_seat() {
        let script = Script::from_toml_str(SCRIPT).unwrap();
        assert_eq!(script.steps.len(), 5);

        let mut replay = Replay::new(&script, &SeatConfig::default());
        let outputs = replay.run(&script.steps).unwrap();

        let motion = &outputs[3].messages;
        assert!(motion.iter().any(|m| matches!(
            m,
            Outgoing::Deliver(d) if matches!(
                d.event,
                Event::Pointer(PointerEvent::Motion { local, .. }) if local == Point::from_int(50, 20)
            )
        )));
        assert!(outputs[4]
            .messages
            .iter()
            .any(|m| matches!(m, Outgoing::Deliver(d) if matches!(d.event, Event::Pointer(PointerEvent::Button { .. })))));
    }

    #[test]
    fn failing_step_names_its_index() {
        let script = Script::from_toml_str(
            r#"
[[step]]
kind = "get_keyboard"
client = 1
object = 2
"#,
        )
        .unwrap();
        let mut replay = Replay::new(&script, &SeatConfig::default());
        let err = replay.run(&script.steps).unwrap_err();
        assert!(err.to_string().starts_with("step 0"));
    }

    #[test]
    fn unknown_step_kind_is_rejected() {
        assert!(Script::from_toml_str("[[step]]\nkind = \"teleport\"\n").is_err());
    }
}
