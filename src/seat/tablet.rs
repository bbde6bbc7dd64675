//! Tablets and tablet tools
//!
//! A tablet is only announced once it is bound to an output, since tool
//! coordinates mean nothing without one. Tablets discovered before any
//! output exists wait in a FIFO and are bound when the next output appears.
//! Tools outlive proximity sessions and are deduplicated by serial and type.

use super::pointer::CursorSprite;
use crate::event::{
    ButtonState, Outbox, SeatSignal, TabletEvent, TabletSeatEvent, TabletToolEvent,
};
use crate::focus::{FocusEmitter, FocusRouter, FocusTarget, RoutingContext, TabletToolClass};
use crate::geometry::Point;
use crate::grab::{GrabRequest, GrabStack};
use crate::listener::{DestroyListeners, ListenerToken, Subscriber, Watched};
use crate::object::{ObjectIdAllocator, ObjectRef, OutputId, SurfaceId, TabletId, ToolId};
use crate::scene::{Pick, Scene};
use crate::serial::{Serial, SerialCounter};
use bitflags::bitflags;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Role a surface takes when used as a tool cursor
pub const TOOL_CURSOR_ROLE: &str = "zwp_tablet_tool-cursor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabletType {
    External,
    Internal,
    Display,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Pen,
    Eraser,
    Brush,
    Pencil,
    Airbrush,
    Finger,
    Mouse,
    Lens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    Tilt,
    Pressure,
    Distance,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ToolCapabilities: u32 {
        const TILT = 1 << 0;
        const PRESSURE = 1 << 1;
        const DISTANCE = 1 << 2;
    }
}

impl From<ToolCapability> for ToolCapabilities {
    fn from(capability: ToolCapability) -> Self {
        match capability {
            ToolCapability::Tilt => ToolCapabilities::TILT,
            ToolCapability::Pressure => ToolCapabilities::PRESSURE,
            ToolCapability::Distance => ToolCapabilities::DISTANCE,
        }
    }
}

impl FromIterator<ToolCapability> for ToolCapabilities {
    fn from_iter<I: IntoIterator<Item = ToolCapability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ToolCapabilities::empty(), |caps, c| caps | c.into())
    }
}

impl ToolCapabilities {
    /// Individual capabilities, lowest bit first.
    pub fn capabilities(self) -> impl Iterator<Item = ToolCapability> {
        [
            ToolCapability::Tilt,
            ToolCapability::Pressure,
            ToolCapability::Distance,
        ]
        .into_iter()
        .filter(move |c| self.contains((*c).into()))
    }
}

/// How the device layer describes a tablet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletDescription {
    pub name: String,
    #[serde(default)]
    pub vid: u32,
    #[serde(default)]
    pub pid: u32,
    #[serde(default = "default_tablet_type")]
    pub tablet_type: TabletType,
    #[serde(default)]
    pub path: String,
    /// Output the tablet is mapped to, if the device layer knows
    #[serde(default)]
    pub output: Option<OutputId>,
}

fn default_tablet_type() -> TabletType {
    TabletType::External
}

/// How the device layer describes a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescription {
    pub serial: u64,
    pub hardware_id: u64,
    pub tool_type: ToolType,
    pub capabilities: ToolCapabilities,
}

#[derive(Debug, Clone)]
pub struct Tablet {
    id: TabletId,
    description: TabletDescription,
    output: Option<OutputId>,
    bindings: Vec<ObjectRef>,
}

impl Tablet {
    fn new(id: TabletId, description: TabletDescription) -> Self {
        Self {
            id,
            description,
            output: None,
            bindings: Vec::new(),
        }
    }

    pub fn id(&self) -> TabletId {
        self.id
    }

    pub fn description(&self) -> &TabletDescription {
        &self.description
    }

    pub fn output(&self) -> Option<OutputId> {
        self.output
    }

    pub fn bindings(&self) -> &[ObjectRef] {
        &self.bindings
    }

    /// The client's handle to this tablet, if it has one.
    pub fn binding_for(&self, client: crate::object::ClientId) -> Option<ObjectRef> {
        self.bindings.iter().copied().find(|b| b.client == client)
    }

    fn announce(&mut self, seat_binding: ObjectRef, ids: &mut ObjectIdAllocator, out: &mut Outbox) {
        let Some(id) = ids.allocate() else {
            out.no_memory(seat_binding.client);
            return;
        };
        let binding = ObjectRef::new(seat_binding.client, id);
        self.bindings.push(binding);

        let d = &self.description;
        out.send(seat_binding, TabletSeatEvent::TabletAdded { tablet: id });
        out.send(binding, TabletEvent::Name(d.name.clone()));
        out.send(binding, TabletEvent::Id { vid: d.vid, pid: d.pid });
        out.send(binding, TabletEvent::Type(d.tablet_type));
        out.send(binding, TabletEvent::Path(d.path.clone()));
        out.send(binding, TabletEvent::Done);
    }
}

#[derive(Debug)]
pub struct TabletToolState {
    pub(crate) router: FocusRouter<TabletToolClass>,
    id: ToolId,
    description: ToolDescription,
    current_tablet: Option<TabletId>,
    tip_down: bool,
    button_count: u32,
    position: Point,
    grab_serial: Serial,
    grab_position: Point,
    sprite: Option<CursorSprite>,
    sprite_listener: Option<ListenerToken>,
}

impl TabletToolState {
    fn new(id: ToolId, description: ToolDescription) -> Self {
        Self {
            router: FocusRouter::new(Subscriber::ToolFocus(id)),
            id,
            description,
            current_tablet: None,
            tip_down: false,
            button_count: 0,
            position: Point::default(),
            grab_serial: Serial::default(),
            grab_position: Point::default(),
            sprite: None,
            sprite_listener: None,
        }
    }

    pub fn id(&self) -> ToolId {
        self.id
    }

    pub fn description(&self) -> &ToolDescription {
        &self.description
    }

    pub fn router(&self) -> &FocusRouter<TabletToolClass> {
        &self.router
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.router.focus()
    }

    pub fn focus_serial(&self) -> Serial {
        self.router.focus_serial()
    }

    pub fn current_tablet(&self) -> Option<TabletId> {
        self.current_tablet
    }

    pub fn tip_down(&self) -> bool {
        self.tip_down
    }

    pub fn button_count(&self) -> u32 {
        self.button_count
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn grab_serial(&self) -> Serial {
        self.grab_serial
    }

    pub fn grab_position(&self) -> Point {
        self.grab_position
    }

    pub fn sprite(&self) -> Option<CursorSprite> {
        self.sprite
    }

    pub(crate) fn set_tip(&mut self, down: bool) {
        self.tip_down = down;
        if down {
            self.grab_position = self.position;
        }
    }

    pub(crate) fn set_grab_serial(&mut self, serial: Serial) {
        self.grab_serial = serial;
    }

    /// Returns the count after the change, or `None` on a release with no
    /// button down.
    pub(crate) fn update_buttons(&mut self, state: ButtonState) -> Option<u32> {
        match state {
            ButtonState::Pressed => self.button_count += 1,
            ButtonState::Released => match self.button_count.checked_sub(1) {
                Some(count) => self.button_count = count,
                None => {
                    warn!("tool {} button released with no button down", self.id);
                    return None;
                }
            },
        }
        Some(self.button_count)
    }

    pub(crate) fn map_sprite(&mut self, sprite: CursorSprite, listeners: &mut DestroyListeners) {
        self.unmap_sprite(listeners);
        self.sprite_listener = Some(listeners.subscribe(
            Watched::Surface(sprite.surface),
            Subscriber::ToolSprite(self.id),
        ));
        self.sprite = Some(sprite);
    }

    pub(crate) fn unmap_sprite(&mut self, listeners: &mut DestroyListeners) {
        listeners.cancel_slot(&mut self.sprite_listener);
        self.sprite = None;
    }

    pub(crate) fn sprite_destroyed(&mut self) {
        self.sprite_listener = None;
        self.sprite = None;
    }
}

/// Strategy receiving every event of one tablet tool
pub trait TabletToolGrab {
    fn proximity_in(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, tablet: TabletId);

    fn proximity_out(&mut self, tool: &mut TabletToolHandle<'_>, time: u32);

    fn motion(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, position: Point);

    fn down(&mut self, tool: &mut TabletToolHandle<'_>, time: u32);

    fn up(&mut self, tool: &mut TabletToolHandle<'_>, time: u32);

    fn pressure(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, pressure: u32);

    fn distance(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, distance: u32);

    fn tilt(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, x: i32, y: i32);

    fn button(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, button: u32, state: ButtonState);

    fn frame(&mut self, tool: &mut TabletToolHandle<'_>, time: u32);

    fn cancel(&mut self, tool: &mut TabletToolHandle<'_>);
}

pub struct TabletToolHandle<'a> {
    state: &'a mut TabletToolState,
    scene: &'a dyn Scene,
    ctx: RoutingContext<'a>,
    tablets: &'a [Tablet],
    request: Option<GrabRequest>,
}

impl<'a> TabletToolHandle<'a> {
    pub(crate) fn new(
        state: &'a mut TabletToolState,
        scene: &'a dyn Scene,
        ctx: RoutingContext<'a>,
        tablets: &'a [Tablet],
    ) -> Self {
        Self {
            state,
            scene,
            ctx,
            tablets,
            request: None,
        }
    }

    pub fn state(&self) -> &TabletToolState {
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

    pub fn current_tablet(&self) -> Option<&Tablet> {
        let id = self.state.current_tablet?;
        self.tablets.iter().find(|t| t.id == id)
    }

    pub fn set_current_tablet(&mut self, tablet: TabletId) {
        self.state.current_tablet = Some(tablet);
    }

    pub fn pick(&self) -> Option<Pick> {
        self.scene.pick(self.state.position)
    }

    pub fn set_focus(&mut self, pick: Option<Pick>, time: u32) -> bool {
        let target = pick.map(|p| FocusTarget::from_pick(self.scene, &p));
        let tablet_id = self.state.current_tablet;
        let tablet = tablet_id.and_then(|id| self.tablets.iter().find(|t| t.id == id));
        let mut emitter = ToolFocusEmitter {
            tip_down: self.state.tip_down,
            time,
            tablet,
        };
        self.state
            .router
            .set_focus(target, None, &mut self.ctx, &mut emitter)
    }

    /// Moves the tool, clamped to its tablet's output.
    pub fn move_to(&mut self, position: Point) -> Point {
        let output = self
            .current_tablet()
            .and_then(|t| t.output)
            .and_then(|id| self.scene.output(id));
        let position = match output {
            Some(output) => output.geometry.clamp(position),
            None => position,
        };
        self.state.position = position;
        position
    }

    pub fn unmap_sprite(&mut self) {
        self.state.unmap_sprite(self.ctx.listeners);
    }

    /// Focused bindings whose client can see the current tablet. The rest
    /// never got proximity_in.
    fn in_proximity(&self) -> Vec<ObjectRef> {
        let tablet = self.current_tablet();
        self.state
            .router
            .focused()
            .filter(|b| tablet.map_or(true, |t| t.binding_for(b.client).is_some()))
            .collect()
    }

    fn send(&mut self, event: TabletToolEvent) {
        for binding in self.in_proximity() {
            self.ctx.out.send(binding, event.clone());
        }
    }

    pub fn send_motion(&mut self, local: Point) {
        self.send(TabletToolEvent::Motion { local });
    }

    pub fn send_down(&mut self) {
        let serial = self.state.grab_serial;
        self.send(TabletToolEvent::Down { serial });
    }

    pub fn send_up(&mut self) {
        self.send(TabletToolEvent::Up);
    }

    pub fn send_pressure(&mut self, pressure: u32) {
        self.send(TabletToolEvent::Pressure(pressure));
    }

    pub fn send_distance(&mut self, distance: u32) {
        self.send(TabletToolEvent::Distance(distance));
    }

    pub fn send_tilt(&mut self, x: i32, y: i32) {
        self.send(TabletToolEvent::Tilt { x, y });
    }

    pub fn send_button(&mut self, button: u32, state: ButtonState) {
        let serial = self.state.grab_serial;
        self.send(TabletToolEvent::Button {
            serial,
            button,
            state,
        });
    }

    pub fn send_frame(&mut self, time: u32) {
        self.send(TabletToolEvent::Frame { time });
    }

    pub fn end_grab(&mut self) {
        self.request = Some(GrabRequest::End);
    }

    pub(crate) fn take_request(&mut self) -> Option<GrabRequest> {
        self.request.take()
    }
}

/// Proximity traffic for tool bindings
struct ToolFocusEmitter<'t> {
    tip_down: bool,
    time: u32,
    tablet: Option<&'t Tablet>,
}

impl FocusEmitter<TabletToolClass> for ToolFocusEmitter<'_> {
    fn leave(&mut self, out: &mut Outbox, binding: ObjectRef, _serial: Serial, _surface: SurfaceId) {
        if self.tablet.is_some_and(|t| t.binding_for(binding.client).is_none()) {
            return;
        }
        if self.tip_down {
            out.send(binding, TabletToolEvent::Up);
        }
        out.send(binding, TabletToolEvent::ProximityOut);
        out.send(binding, TabletToolEvent::Frame { time: self.time });
    }

    fn enter(
        &mut self,
        out: &mut Outbox,
        binding: ObjectRef,
        serial: Serial,
        target: &FocusTarget,
        _local: Point,
    ) {
        let Some(tablet) = self.tablet.and_then(|t| t.binding_for(binding.client)) else {
            debug!("{} has no handle to the tool's tablet", binding.client);
            return;
        };
        out.send(
            binding,
            TabletToolEvent::ProximityIn {
                serial,
                tablet: tablet.id,
                surface: target.surface,
            },
        );
        if self.tip_down {
            out.send(binding, TabletToolEvent::Down { serial });
        }
        out.send(binding, TabletToolEvent::Frame { time: self.time });
    }
}

/// Routes tool events to the surface under the tool
#[derive(Debug, Default)]
pub struct DefaultTabletToolGrab;

impl TabletToolGrab for DefaultTabletToolGrab {
    fn proximity_in(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32, tablet: TabletId) {
        tool.set_current_tablet(tablet);
    }

    fn proximity_out(&mut self, tool: &mut TabletToolHandle<'_>, time: u32) {
        tool.set_focus(None, time);
        tool.unmap_sprite();
    }

    /// No button freeze: every motion re-picks.
    fn motion(&mut self, tool: &mut TabletToolHandle<'_>, time: u32, position: Point) {
        tool.move_to(position);
        let pick = tool.pick();
        if pick.map(|p| p.view) != tool.state().router.focus_view() {
            tool.set_focus(pick, time);
        }
        if let Some(pick) = pick {
            tool.send_motion(pick.local);
        }
    }

    fn down(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32) {
        tool.send_down();
    }

    fn up(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32) {
        tool.send_up();
    }

    fn pressure(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32, pressure: u32) {
        tool.send_pressure(pressure);
    }

    fn distance(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32, distance: u32) {
        tool.send_distance(distance);
    }

    fn tilt(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32, x: i32, y: i32) {
        tool.send_tilt(x, y);
    }

    fn button(&mut self, tool: &mut TabletToolHandle<'_>, _time: u32, button: u32, state: ButtonState) {
        tool.send_button(button, state);
    }

    fn frame(&mut self, tool: &mut TabletToolHandle<'_>, time: u32) {
        tool.send_frame(time);
    }

    fn cancel(&mut self, _tool: &mut TabletToolHandle<'_>) {}
}

pub struct TabletTool {
    pub(crate) state: TabletToolState,
    pub(crate) grabs: GrabStack<dyn TabletToolGrab>,
}

impl TabletTool {
    fn new(id: ToolId, description: ToolDescription) -> Self {
        Self {
            state: TabletToolState::new(id, description),
            grabs: GrabStack::new(Box::new(DefaultTabletToolGrab)),
        }
    }

    pub fn state(&self) -> &TabletToolState {
        &self.state
    }

    pub fn grabs(&self) -> &GrabStack<dyn TabletToolGrab> {
        &self.grabs
    }

    fn announce(&mut self, seat_binding: ObjectRef, ids: &mut ObjectIdAllocator, out: &mut Outbox) {
        let Some(id) = ids.allocate() else {
            out.no_memory(seat_binding.client);
            return;
        };
        let binding = ObjectRef::new(seat_binding.client, id);
        self.state.router.add_binding(binding);

        let d = self.state.description;
        out.send(seat_binding, TabletSeatEvent::ToolAdded { tool: id });
        out.send(binding, TabletToolEvent::Type(d.tool_type));
        out.send(
            binding,
            TabletToolEvent::SerialId {
                hi: (d.serial >> 32) as u32,
                lo: d.serial as u32,
            },
        );
        out.send(
            binding,
            TabletToolEvent::HardwareId {
                hi: (d.hardware_id >> 32) as u32,
                lo: d.hardware_id as u32,
            },
        );
        for capability in d.capabilities.capabilities() {
            out.send(binding, TabletToolEvent::Capability(capability));
        }
        out.send(binding, TabletToolEvent::Done);
    }
}

impl std::fmt::Debug for TabletTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabletTool")
            .field("state", &self.state)
            .field("grabs", &self.grabs)
            .finish()
    }
}

/// Tablets, tools and tablet-seat bindings of one seat
#[derive(Debug, Default)]
pub struct TabletCoordinator {
    next_tablet: u32,
    next_tool: u32,
    tablets: Vec<Tablet>,
    pending: VecDeque<Tablet>,
    tools: Vec<TabletTool>,
    seat_bindings: Vec<ObjectRef>,
}

impl TabletCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tablets bound to an output and visible to clients.
    pub fn tablets(&self) -> &[Tablet] {
        &self.tablets
    }

    pub fn tablet(&self, id: TabletId) -> Option<&Tablet> {
        self.tablets.iter().find(|t| t.id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Tablet> {
        self.pending.iter()
    }

    pub fn tools(&self) -> &[TabletTool] {
        &self.tools
    }

    pub fn tool(&self, id: ToolId) -> Option<&TabletTool> {
        self.tools.iter().find(|t| t.state.id == id)
    }

    pub fn seat_bindings(&self) -> &[ObjectRef] {
        &self.seat_bindings
    }

    pub(crate) fn split_tool_mut(&mut self, id: ToolId) -> Option<(&mut TabletTool, &[Tablet])> {
        let tool = self.tools.iter_mut().find(|t| t.state.id == id)?;
        Some((tool, &self.tablets))
    }

    /// Registers a tablet and binds it to an output right away if one is
    /// available, otherwise queues it.
    pub fn add_tablet(
        &mut self,
        scene: &dyn Scene,
        description: TabletDescription,
        ids: &mut ObjectIdAllocator,
        out: &mut Outbox,
    ) -> TabletId {
        self.next_tablet += 1;
        let id = TabletId(self.next_tablet);
        let tablet = Tablet::new(id, description);

        let output = tablet
            .description
            .output
            .and_then(|o| scene.output(o))
            .or_else(|| scene.outputs().into_iter().next());

        match output {
            Some(output) => self.bind(tablet, output.id, ids, out),
            None => {
                info!("🖊️ tablet '{}' waits for an output", tablet.description.name);
                self.pending.push_back(tablet);
            }
        }
        id
    }

    /// Binds every queued tablet to a newly created output, oldest first.
    pub fn output_created(&mut self, output: OutputId, ids: &mut ObjectIdAllocator, out: &mut Outbox) {
        while let Some(tablet) = self.pending.pop_front() {
            self.bind(tablet, output, ids, out);
        }
    }

    fn bind(&mut self, mut tablet: Tablet, output: OutputId, ids: &mut ObjectIdAllocator, out: &mut Outbox) {
        tablet.output = Some(output);
        info!(
            "🖊️ tablet '{}' ({:04x}:{:04x}) bound to {}",
            tablet.description.name, tablet.description.vid, tablet.description.pid, output
        );
        for seat_binding in self.seat_bindings.clone() {
            tablet.announce(seat_binding, ids, out);
        }
        out.signal(SeatSignal::TabletAdded(tablet.id));
        self.tablets.push(tablet);
    }

    pub fn remove_tablet(&mut self, id: TabletId, out: &mut Outbox) -> bool {
        if let Some(index) = self.pending.iter().position(|t| t.id == id) {
            self.pending.remove(index);
            return true;
        }
        let Some(index) = self.tablets.iter().position(|t| t.id == id) else {
            return false;
        };
        let tablet = self.tablets.remove(index);
        for binding in &tablet.bindings {
            out.send(*binding, TabletEvent::Removed);
        }
        for tool in &mut self.tools {
            if tool.state.current_tablet == Some(id) {
                tool.state.current_tablet = None;
            }
        }
        out.signal(SeatSignal::TabletRemoved(id));
        true
    }

    /// Returns the existing tool with the same serial and type, or
    /// registers and announces a new one.
    pub fn add_tool(
        &mut self,
        description: ToolDescription,
        ids: &mut ObjectIdAllocator,
        out: &mut Outbox,
    ) -> ToolId {
        if let Some(existing) = self.tools.iter().find(|t| {
            t.state.description.serial == description.serial
                && t.state.description.tool_type == description.tool_type
        }) {
            return existing.state.id;
        }

        self.next_tool += 1;
        let id = ToolId(self.next_tool);
        let mut tool = TabletTool::new(id, description);
        for seat_binding in self.seat_bindings.clone() {
            tool.announce(seat_binding, ids, out);
        }
        debug!("tool {} added ({:?})", id, description.tool_type);
        out.signal(SeatSignal::ToolAdded(id));
        self.tools.push(tool);
        id
    }

    pub(crate) fn take_tool(&mut self, id: ToolId) -> Option<TabletTool> {
        let index = self.tools.iter().position(|t| t.state.id == id)?;
        Some(self.tools.remove(index))
    }

    /// A client bound the tablet extension: tell it about everything known.
    pub fn bind_tablet_seat(&mut self, binding: ObjectRef, ids: &mut ObjectIdAllocator, out: &mut Outbox) {
        self.seat_bindings.push(binding);
        for tablet in &mut self.tablets {
            tablet.announce(binding, ids, out);
        }
        for tool in &mut self.tools {
            tool.announce(binding, ids, out);
        }
    }

    /// Drops one client object, whichever list it sits in.
    pub fn remove_binding(&mut self, object: ObjectRef) -> bool {
        let before = self.seat_bindings.len();
        self.seat_bindings.retain(|b| *b != object);
        let mut removed = before != self.seat_bindings.len();
        for tablet in &mut self.tablets {
            let before = tablet.bindings.len();
            tablet.bindings.retain(|b| *b != object);
            removed |= before != tablet.bindings.len();
        }
        for tool in &mut self.tools {
            removed |= tool.state.router.remove_binding(object).is_some();
        }
        removed
    }

    pub fn remove_client(&mut self, client: crate::object::ClientId) {
        self.seat_bindings.retain(|b| b.client != client);
        for tablet in &mut self.tablets {
            tablet.bindings.retain(|b| b.client != client);
        }
        for tool in &mut self.tools {
            tool.state.router.remove_client(client);
        }
    }

    pub(crate) fn tools_mut(&mut self) -> impl Iterator<Item = &mut TabletTool> {
        self.tools.iter_mut()
    }

    /// Announces removal of everything to clients and forgets it.
    pub(crate) fn teardown(&mut self, listeners: &mut DestroyListeners, out: &mut Outbox) {
        for mut tool in std::mem::take(&mut self.tools) {
            tool.state.unmap_sprite(listeners);
            tool.state.router.forget_listeners(listeners);
            for binding in tool.state.router.bucket().iter() {
                out.send(binding, TabletToolEvent::Removed);
            }
            out.signal(SeatSignal::ToolRemoved(tool.state.id));
        }
        for tablet in std::mem::take(&mut self.tablets) {
            for binding in &tablet.bindings {
                out.send(*binding, TabletEvent::Removed);
            }
            out.signal(SeatSignal::TabletRemoved(tablet.id));
        }
        self.pending.clear();
        self.seat_bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Outgoing};
    use crate::geometry::Rect;
    use crate::object::{ClientId, ObjectId};
    use crate::scene::StackScene;

    fn description(name: &str) -> TabletDescription {
        TabletDescription {
            name: name.to_string(),
            vid: 0x056a,
            pid: 0x0357,
            tablet_type: TabletType::External,
            path: "/dev/input/event7".to_string(),
            output: None,
        }
    }

    fn pen(serial: u64) -> ToolDescription {
        ToolDescription {
            serial,
            hardware_id: 0x802,
            tool_type: ToolType::Pen,
            capabilities: ToolCapabilities::PRESSURE | ToolCapabilities::TILT,
        }
    }

    #[test]
    fn tablets_wait_for_an_output() {
        let mut scene = StackScene::new();
        let mut coordinator = TabletCoordinator::new();
        let mut ids = ObjectIdAllocator::new();
        let mut out = Outbox::new();

        let first = coordinator.add_tablet(&scene, description("a"), &mut ids, &mut out);
        let second = coordinator.add_tablet(&scene, description("b"), &mut ids, &mut out);
        assert!(coordinator.tablets().is_empty());
        assert_eq!(coordinator.pending().count(), 2);

        scene.add_output(OutputId(4), Rect::new(0, 0, 100, 100));
        coordinator.output_created(OutputId(4), &mut ids, &mut out);
        let bound: Vec<_> = coordinator.tablets().iter().map(|t| t.id()).collect();
        assert_eq!(bound, vec![first, second]);
        assert!(coordinator
            .tablets()
            .iter()
            .all(|t| t.output() == Some(OutputId(4))));
    }

    #[test]
    fn tools_are_deduplicated_by_serial_and_type() {
        let mut coordinator = TabletCoordinator::new();
        let mut ids = ObjectIdAllocator::new();
        let mut out = Outbox::new();

        let a = coordinator.add_tool(pen(7), &mut ids, &mut out);
        let b = coordinator.add_tool(pen(7), &mut ids, &mut out);
        let mut eraser = pen(7);
        eraser.tool_type = ToolType::Eraser;
        let c = coordinator.add_tool(eraser, &mut ids, &mut out);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(coordinator.tools().len(), 2);
    }

    #[test]
    fn tablet_seat_binding_announces_known_tools() {
        let mut coordinator = TabletCoordinator::new();
        let mut ids = ObjectIdAllocator::new();
        let mut out = Outbox::new();
        coordinator.add_tool(pen(0x1_0000_0002), &mut ids, &mut out);

        let seat_binding = ObjectRef::new(ClientId(1), ObjectId(30));
        coordinator.bind_tablet_seat(seat_binding, &mut ids, &mut out);

        let events: Vec<Event> = out.deliveries().map(|d| d.event.clone()).collect();
        assert_eq!(
            events[0],
            Event::TabletSeat(TabletSeatEvent::ToolAdded {
                tool: ObjectId(crate::object::SERVER_ID_START)
            })
        );
        assert!(events.contains(&Event::TabletTool(TabletToolEvent::SerialId { hi: 1, lo: 2 })));
        let caps: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::TabletTool(TabletToolEvent::Capability(c)) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(caps, vec![ToolCapability::Tilt, ToolCapability::Pressure]);
        assert_eq!(events.last(), Some(&Event::TabletTool(TabletToolEvent::Done)));
    }

    #[test]
    fn exhausted_ids_refuse_the_client() {
        let mut coordinator = TabletCoordinator::new();
        let mut ids = ObjectIdAllocator::with_range(5, 4);
        let mut out = Outbox::new();
        coordinator.add_tool(pen(1), &mut ids, &mut out);

        coordinator.bind_tablet_seat(ObjectRef::new(ClientId(2), ObjectId(1)), &mut ids, &mut out);
        assert_eq!(out.messages(), &[Outgoing::NoMemory { client: ClientId(2) }]);
        assert!(coordinator.tools()[0].state().router().bucket().is_empty());
    }
}
