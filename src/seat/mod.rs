//! The seat: one logical set of input devices presented to clients
//!
//! A [`Seat`] owns at most one pointer, keyboard and touch device plus the
//! tablets and tools discovered on it. Hosts feed it decoded device events
//! through the `notify_*` entry points, relay client requests through the
//! binding calls below, and drain the [`Outbox`] afterwards.

pub mod capabilities;
pub mod keyboard;
pub mod pointer;
pub mod tablet;
pub mod touch;

pub use capabilities::{SeatCapabilities, SeatCapabilityTracker};
pub use keyboard::{DefaultKeyboardGrab, Keyboard, KeyboardGrab, KeyboardHandle, KeyboardState};
pub use pointer::{CursorSprite, DefaultPointerGrab, Pointer, PointerGrab, PointerHandle, PointerState};
pub use tablet::{
    DefaultTabletToolGrab, Tablet, TabletCoordinator, TabletDescription, TabletTool, TabletToolGrab,
    TabletToolHandle, TabletToolState, TabletType, ToolCapabilities, ToolCapability, ToolDescription,
    ToolType,
};
pub use touch::{DefaultTouchGrab, Touch, TouchGrab, TouchHandle, TouchState};

use crate::bucket::Partition;
use crate::config::SeatConfig;
use crate::error::{SeatError, SeatResult};
use crate::event::{
    Axis, ButtonState, DeviceKind, KeyState, KeyboardEvent, Outbox, Outgoing, PointerEvent,
    ProtocolErrorKind, SeatEvent, SeatSignal, TabletToolEvent, TouchPhase,
};
use crate::focus::RoutingContext;
use crate::geometry::{Fixed, Point};
use crate::grab::GrabRequest;
use crate::keymap::{
    Keymap, KeymapInfo, KeymapNames, KeyboardLocks, KeyboardModifiers, Leds,
};
use crate::listener::{DestroyListeners, Subscriber, Watched};
use crate::object::{ClientId, ObjectIdAllocator, ObjectRef, OutputId, SurfaceId, TabletId, ToolId, ViewId};
use crate::scene::Scene;
use crate::serial::{Serial, SerialCounter};
use log::{debug, info, warn};
use std::fmt;
use std::rc::Rc;

/// Highest `wl_seat` version this seat speaks
pub const SEAT_VERSION: u32 = 4;

const SEAT_NAME_SINCE_VERSION: u32 = 2;
const REPEAT_INFO_SINCE_VERSION: u32 = 4;

pub type LedHook = Box<dyn FnMut(Leds)>;
/// `(time, key, state)`
pub type KeyHook = Box<dyn FnMut(u32, u32, KeyState)>;
/// Called with a single modifier flag per transition.
pub type ModifierHook = Box<dyn FnMut(KeyboardModifiers, KeyState)>;
/// `(time, button, state)`
pub type ButtonHook = Box<dyn FnMut(u32, u32, ButtonState)>;
/// Returns true when the binding consumed the scroll.
pub type AxisHook = Box<dyn FnMut(u32, Axis, Fixed) -> bool>;
/// `(time, id, position, phase)`
pub type TouchHook = Box<dyn FnMut(u32, i32, Point, TouchPhase)>;
/// `(tool, button, state)`
pub type TabletToolHook = Box<dyn FnMut(ToolId, u32, ButtonState)>;

/// Compositor bindings and device-layer callbacks
///
/// Hooks run synchronously once the seat has finished the transition that
/// triggered them. They get no access to the seat itself.
#[derive(Default)]
pub struct SeatHooks {
    /// Offered by device layers that can drive keyboard LEDs
    pub led_update: Option<LedHook>,
    pub key: Option<KeyHook>,
    pub modifier: Option<ModifierHook>,
    pub button: Option<ButtonHook>,
    pub axis: Option<AxisHook>,
    pub touch: Option<TouchHook>,
    pub tablet_tool: Option<TabletToolHook>,
}

impl fmt::Debug for SeatHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeatHooks")
            .field("led_update", &self.led_update.is_some())
            .field("key", &self.key.is_some())
            .field("modifier", &self.modifier.is_some())
            .field("button", &self.button.is_some())
            .field("axis", &self.axis.is_some())
            .field("touch", &self.touch.is_some())
            .field("tablet_tool", &self.tablet_tool.is_some())
            .finish()
    }
}

/// A client's `wl_seat` object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatBinding {
    pub object: ObjectRef,
    pub version: u32,
}

pub struct Seat {
    name: String,
    pub(crate) serials: SerialCounter,
    pub(crate) out: Outbox,
    pub(crate) listeners: DestroyListeners,
    pub(crate) ids: ObjectIdAllocator,
    pub(crate) hooks: SeatHooks,
    caps: SeatCapabilityTracker,
    bindings: Vec<SeatBinding>,
    pub(crate) pointer: Option<Pointer>,
    pub(crate) keyboard: Option<Keyboard>,
    pub(crate) touch: Option<Touch>,
    pub(crate) tablets: TabletCoordinator,
    pointer_start: Point,
    repeat_rate: i32,
    repeat_delay: i32,
    use_keymap_engine: bool,
    keymap_names: KeymapNames,
    global_keymap: Option<Rc<KeymapInfo>>,
    pub(crate) modifier_state: KeyboardModifiers,
    idle_inhibit: u32,
}

impl Seat {
    pub fn new(name: impl Into<String>, serials: SerialCounter, config: &SeatConfig) -> Self {
        let name = name.into();
        info!("💺 Creating seat '{}'", name);
        Self {
            name,
            serials,
            out: Outbox::new(),
            listeners: DestroyListeners::new(),
            ids: ObjectIdAllocator::new(),
            hooks: SeatHooks::default(),
            caps: SeatCapabilityTracker::new(),
            bindings: Vec::new(),
            pointer: None,
            keyboard: None,
            touch: None,
            tablets: TabletCoordinator::new(),
            pointer_start: Point::from_f64(config.pointer.initial_x, config.pointer.initial_y),
            repeat_rate: config.keyboard.repeat_rate,
            repeat_delay: config.keyboard.repeat_delay,
            use_keymap_engine: config.keyboard.use_keymap_engine,
            keymap_names: config.keyboard.xkb.clone(),
            global_keymap: None,
            modifier_state: KeyboardModifiers::empty(),
            idle_inhibit: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serials(&self) -> &SerialCounter {
        &self.serials
    }

    pub fn hooks_mut(&mut self) -> &mut SeatHooks {
        &mut self.hooks
    }

    pub fn set_hooks(&mut self, hooks: SeatHooks) {
        self.hooks = hooks;
    }

    pub fn outbox(&self) -> &Outbox {
        &self.out
    }

    /// Client traffic produced since the last drain, in delivery order.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        self.out.drain()
    }

    pub fn drain_signals(&mut self) -> Vec<SeatSignal> {
        self.out.drain_signals()
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        self.caps.capabilities()
    }

    pub fn device_count(&self, kind: DeviceKind) -> u32 {
        self.caps.count(kind)
    }

    pub(crate) fn has_device(&self, kind: DeviceKind) -> bool {
        self.caps.count(kind) > 0
    }

    /// The pointer, while at least one pointer device is attached.
    pub fn pointer(&self) -> Option<&Pointer> {
        self.pointer.as_ref().filter(|_| self.has_device(DeviceKind::Pointer))
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        self.keyboard.as_ref().filter(|_| self.has_device(DeviceKind::Keyboard))
    }

    pub fn touch(&self) -> Option<&Touch> {
        self.touch.as_ref().filter(|_| self.has_device(DeviceKind::Touch))
    }

    pub fn tablets(&self) -> &TabletCoordinator {
        &self.tablets
    }

    pub fn tool(&self, id: ToolId) -> Option<&TabletTool> {
        self.tablets.tool(id)
    }

    pub fn bindings(&self) -> &[SeatBinding] {
        &self.bindings
    }

    /// Reduced modifier set for compositor bindings.
    pub fn modifier_state(&self) -> KeyboardModifiers {
        self.modifier_state
    }

    /// Outstanding idle inhibitors from held keys, buttons and touches.
    pub fn idle_inhibitors(&self) -> u32 {
        self.idle_inhibit
    }

    pub(crate) fn idle_inhibit(&mut self) {
        self.idle_inhibit = self.idle_inhibit.saturating_add(1);
    }

    pub(crate) fn idle_release(&mut self) {
        self.idle_inhibit = self.idle_inhibit.saturating_sub(1);
    }

    fn missing(&self, capability: DeviceKind) -> SeatError {
        SeatError::MissingCapability {
            seat: self.name.clone(),
            capability,
        }
    }

    // Client bindings

    /// A client bound the seat global.
    pub fn bind_seat(&mut self, object: ObjectRef, version: u32) -> SeatResult<()> {
        if self.bindings.iter().any(|b| b.object == object) {
            return Err(SeatError::DuplicateObject(object));
        }
        let version = version.min(SEAT_VERSION);
        self.bindings.push(SeatBinding { object, version });

        self.out
            .send(object, SeatEvent::Capabilities(self.caps.capabilities()));
        if version >= SEAT_NAME_SINCE_VERSION {
            self.out.send(object, SeatEvent::Name(self.name.clone()));
        }
        debug!("{} bound seat '{}' (v{})", object, self.name, version);
        Ok(())
    }

    /// Creates a pointer object. Works for as long as the seat ever had a
    /// pointer, so clients racing a capability change are not refused.
    pub fn get_pointer(&mut self, object: ObjectRef) -> SeatResult<()> {
        let Some(pointer) = self.pointer.as_mut() else {
            return Err(self.missing(DeviceKind::Pointer));
        };
        let router = &mut pointer.state.router;
        if router.bucket().contains(object) {
            return Err(SeatError::DuplicateObject(object));
        }
        if router.add_binding(object) == Partition::Focused {
            if let Some(focus) = router.focus() {
                let local = pointer.state.local();
                self.out.send(
                    object,
                    PointerEvent::Enter {
                        serial: pointer.state.focus_serial(),
                        surface: focus.surface,
                        local,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn get_keyboard(&mut self, object: ObjectRef, version: u32) -> SeatResult<()> {
        let pointer_client = self
            .pointer
            .as_ref()
            .filter(|_| self.has_device(DeviceKind::Pointer))
            .and_then(|p| p.state.router.focus_client());
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Err(self.missing(DeviceKind::Keyboard));
        };
        let state = &mut keyboard.state;
        if state.router.bucket().contains(object) {
            return Err(SeatError::DuplicateObject(object));
        }
        let partition = state.router.add_binding(object);

        if version >= REPEAT_INFO_SINCE_VERSION {
            let (rate, delay) = state.repeat_info();
            self.out.send(object, KeyboardEvent::RepeatInfo { rate, delay });
        }
        self.out.send(object, state.keymap_event());

        let keyboard_client = state.router.focus_client();
        if keyboard_client == Some(object.client) || pointer_client == Some(object.client) {
            self.out
                .send(object, state.modifiers_event(state.focus_serial()));
        }

        if partition == Partition::Focused {
            if let Some(surface) = state.focus_surface() {
                self.out.send(
                    object,
                    KeyboardEvent::Enter {
                        serial: state.focus_serial(),
                        surface,
                        keys: state.keys().to_vec(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn get_touch(&mut self, object: ObjectRef) -> SeatResult<()> {
        let Some(touch) = self.touch.as_mut() else {
            return Err(self.missing(DeviceKind::Touch));
        };
        if touch.state.router.bucket().contains(object) {
            return Err(SeatError::DuplicateObject(object));
        }
        touch.state.router.add_binding(object);
        Ok(())
    }

    /// A client bound the tablet extension for this seat.
    pub fn get_tablet_seat(&mut self, object: ObjectRef) -> SeatResult<()> {
        if self.tablets.seat_bindings().contains(&object) {
            return Err(SeatError::DuplicateObject(object));
        }
        self.tablets
            .bind_tablet_seat(object, &mut self.ids, &mut self.out);
        Ok(())
    }

    /// A client destroyed one of its seat, device or tablet objects.
    pub fn binding_destroyed(&mut self, object: ObjectRef) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.object != object);
        let mut removed = before != self.bindings.len();

        if let Some(pointer) = self.pointer.as_mut() {
            removed |= pointer.state.router.remove_binding(object).is_some();
        }
        if let Some(keyboard) = self.keyboard.as_mut() {
            removed |= keyboard.state.router.remove_binding(object).is_some();
        }
        if let Some(touch) = self.touch.as_mut() {
            removed |= touch.state.router.remove_binding(object).is_some();
        }
        removed |= self.tablets.remove_binding(object);
        removed
    }

    /// Drops every object of a disconnected client.
    pub fn client_destroyed(&mut self, client: ClientId) {
        self.bindings.retain(|b| b.object.client != client);
        if let Some(pointer) = self.pointer.as_mut() {
            pointer.state.router.remove_client(client);
        }
        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.state.router.remove_client(client);
        }
        if let Some(touch) = self.touch.as_mut() {
            touch.state.router.remove_client(client);
        }
        self.tablets.remove_client(client);
        debug!("{} left seat '{}'", client, self.name);
    }

    // Destroy notifications from the scene

    pub fn view_destroyed(&mut self, scene: &dyn Scene, view: ViewId) {
        self.watched_destroyed(scene, Watched::View(view));
    }

    pub fn surface_destroyed(&mut self, scene: &dyn Scene, surface: SurfaceId) {
        self.watched_destroyed(scene, Watched::Surface(surface));
    }

    fn watched_destroyed(&mut self, scene: &dyn Scene, watched: Watched) {
        for (_, subscriber) in self.listeners.fire(watched) {
            debug!("{:?} destroyed under {:?}", watched, subscriber);
            match subscriber {
                Subscriber::PointerFocus => {
                    self.dispatch_pointer(scene, |_, pointer| {
                        pointer.set_focus(None);
                    });
                }
                Subscriber::PointerSprite => {
                    if let Some(pointer) = self.pointer.as_mut() {
                        pointer.state.sprite_destroyed();
                    }
                }
                Subscriber::KeyboardFocus => {
                    self.dispatch_keyboard(scene, |_, keyboard| {
                        keyboard.set_focus(None);
                    });
                }
                Subscriber::SavedKeyboardFocus => {
                    if let Some(keyboard) = self.keyboard.as_mut() {
                        keyboard.state.saved_focus_destroyed();
                    }
                }
                Subscriber::TouchFocus => {
                    self.dispatch_touch(scene, |_, touch| {
                        touch.set_focus(None);
                    });
                }
                Subscriber::ToolFocus(id) => {
                    self.dispatch_tool(id, scene, |_, tool| {
                        tool.set_focus(None, 0);
                    });
                }
                Subscriber::ToolSprite(id) => {
                    if let Some((tool, _)) = self.tablets.split_tool_mut(id) {
                        tool.state.sprite_destroyed();
                    }
                }
            }
        }
    }

    // Outputs

    /// Binds tablets that were waiting for an output.
    pub fn output_created(&mut self, output: OutputId) {
        debug!("seat '{}' sees new output {}", self.name, output);
        self.tablets
            .output_created(output, &mut self.ids, &mut self.out);
    }

    /// Moves the pointer onto the closest remaining output if it sat on the
    /// one that went away. `scene` must no longer list the removed output.
    pub fn output_destroyed(&mut self, scene: &dyn Scene, output: OutputId) {
        let Some(pointer) = self.pointer.as_ref() else {
            return;
        };
        let position = pointer.state.position();
        let outputs = scene.outputs();
        if outputs.iter().any(|o| o.geometry.contains_point(position)) {
            return;
        }
        let Some(closest) = outputs
            .iter()
            .min_by_key(|o| o.geometry.distance_sq(position))
        else {
            return;
        };
        let target = closest.geometry.clamp(position);
        info!(
            "🖥️ output {} removed, moving pointer to {}",
            output, closest.id
        );
        self.dispatch_pointer(scene, |grab, pointer| {
            pointer.move_to(target);
            grab.focus(pointer);
        });
    }

    // Devices

    pub fn init_pointer(&mut self, scene: &dyn Scene) {
        if self.pointer.is_none() {
            info!("🖱️ Seat '{}' gains a pointer", self.name);
            self.pointer = Some(Pointer::new(self.pointer_start));
        }
        let changed = self.caps.increment(DeviceKind::Pointer);
        self.broadcast_capabilities(changed);
        if changed.is_some() {
            self.dispatch_pointer(scene, |grab, pointer| grab.focus(pointer));
        }
    }

    /// Detaches one pointer device. The last one clears focus, cancels the
    /// grab, unmaps the cursor and resets the button count; the position is
    /// kept for the next pointer.
    pub fn release_pointer(&mut self, scene: &dyn Scene) {
        if !self.has_device(DeviceKind::Pointer) {
            warn!("seat '{}' released a pointer it does not have", self.name);
            return;
        }
        if self.caps.count(DeviceKind::Pointer) == 1 {
            self.cancel_pointer_grab(scene);
            self.dispatch_pointer(scene, |_, pointer| {
                pointer.set_focus(None);
            });
            if let Some(pointer) = self.pointer.as_mut() {
                pointer.state.unmap_sprite(&mut self.listeners);
                pointer.state.reset_buttons();
            }
        }
        let changed = self.caps.decrement(DeviceKind::Pointer);
        self.broadcast_capabilities(changed);
    }

    /// Attaches a keyboard. `keymap` only matters for the first keyboard of
    /// the seat; without one the seat-wide keymap is compiled from the
    /// configured names.
    pub fn init_keyboard(&mut self, keymap: Option<Rc<dyn Keymap>>) -> SeatResult<()> {
        if self.keyboard.is_none() {
            let info = if self.use_keymap_engine {
                Some(match keymap {
                    Some(keymap) => Rc::new(KeymapInfo::new(keymap)?),
                    None => self.global_keymap()?,
                })
            } else {
                None
            };
            let state = KeyboardState::new(info, self.repeat_rate, self.repeat_delay)?;
            info!("⌨️ Seat '{}' gains a keyboard", self.name);
            self.keyboard = Some(Keyboard::new(state));
        }
        let changed = self.caps.increment(DeviceKind::Keyboard);
        self.broadcast_capabilities(changed);
        Ok(())
    }

    pub fn release_keyboard(&mut self, scene: &dyn Scene) {
        if !self.has_device(DeviceKind::Keyboard) {
            warn!("seat '{}' released a keyboard it does not have", self.name);
            return;
        }
        if self.caps.count(DeviceKind::Keyboard) == 1 {
            self.dispatch_keyboard(scene, |_, keyboard| {
                keyboard.set_focus(None);
            });
            self.cancel_keyboard_grab(scene);
            if let Some(keyboard) = self.keyboard.as_mut() {
                keyboard.state.reset_modifiers();
            }
            self.modifier_state = KeyboardModifiers::empty();
        }
        let changed = self.caps.decrement(DeviceKind::Keyboard);
        self.broadcast_capabilities(changed);
    }

    pub fn init_touch(&mut self) {
        if self.touch.is_none() {
            info!("👆 Seat '{}' gains a touch screen", self.name);
            self.touch = Some(Touch::new());
        }
        let changed = self.caps.increment(DeviceKind::Touch);
        self.broadcast_capabilities(changed);
    }

    pub fn release_touch(&mut self, scene: &dyn Scene) {
        if !self.has_device(DeviceKind::Touch) {
            warn!("seat '{}' released a touch device it does not have", self.name);
            return;
        }
        if self.caps.count(DeviceKind::Touch) == 1 {
            self.dispatch_touch(scene, |_, touch| {
                touch.set_focus(None);
            });
            self.cancel_touch_grab(scene);
            if let Some(touch) = self.touch.as_mut() {
                touch.state.reset_points();
            }
        }
        let changed = self.caps.decrement(DeviceKind::Touch);
        self.broadcast_capabilities(changed);
    }

    fn broadcast_capabilities(&mut self, changed: Option<SeatCapabilities>) {
        let Some(caps) = changed else {
            return;
        };
        debug!("seat '{}' capabilities now {:?}", self.name, caps);
        for binding in &self.bindings {
            self.out
                .send(binding.object, SeatEvent::Capabilities(caps));
        }
        self.out.signal(SeatSignal::CapabilitiesChanged(caps));
    }

    fn global_keymap(&mut self) -> SeatResult<Rc<KeymapInfo>> {
        if let Some(info) = &self.global_keymap {
            return Ok(Rc::clone(info));
        }
        let info = Rc::new(KeymapInfo::new(default_keymap(&self.keymap_names)?)?);
        self.global_keymap = Some(Rc::clone(&info));
        Ok(info)
    }

    // Keyboard control for the shell and device layer

    /// Queues a keymap swap. It applies immediately when no key is held,
    /// otherwise once the last key is released.
    pub fn update_keymap(&mut self, scene: &dyn Scene, keymap: Rc<dyn Keymap>) -> SeatResult<()> {
        if !self.has_device(DeviceKind::Keyboard) {
            return Err(self.missing(DeviceKind::Keyboard));
        }
        if !self.use_keymap_engine {
            warn!("seat '{}' runs without a keymap engine, ignoring new keymap", self.name);
            return Ok(());
        }
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Err(self.missing(DeviceKind::Keyboard));
        };
        keyboard.state.set_pending_keymap(keymap);
        if keyboard.state.keys().is_empty() {
            self.apply_pending_keymap(scene);
        }
        Ok(())
    }

    pub(crate) fn apply_pending_keymap(&mut self, scene: &dyn Scene) {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        let Some(keymap) = keyboard.state.take_pending_keymap() else {
            return;
        };
        let info = match KeymapInfo::new(keymap) {
            Ok(info) => Rc::new(info),
            Err(err) => {
                warn!("keeping current keymap: {}", err);
                return;
            }
        };
        let carried = match keyboard.state.replace_keymap(Rc::clone(&info)) {
            Ok(carried) => carried,
            Err(err) => {
                warn!("keeping current keymap: {}", err);
                return;
            }
        };
        info!("⌨️ Seat '{}' switched keymap", self.name);

        let bindings: Vec<ObjectRef> = keyboard.state.router.bucket().iter().collect();
        let keymap_event = keyboard.state.keymap_event();
        for binding in &bindings {
            self.out.send(*binding, keymap_event.clone());
        }

        let serial = self.serials.next_serial();
        self.notify_modifiers(scene, serial);

        if carried.latched == 0 && carried.locked == 0 {
            return;
        }
        let Some(keyboard) = self.keyboard.as_ref() else {
            return;
        };
        let event = keyboard.state.modifiers_event(self.serials.current());
        for binding in &bindings {
            self.out.send(*binding, event.clone());
        }
    }

    /// Moves keyboard focus without activation side effects.
    pub fn set_keyboard_focus(&mut self, scene: &dyn Scene, surface: Option<SurfaceId>) -> bool {
        self.dispatch_keyboard(scene, |_, keyboard| keyboard.set_focus(surface))
            .unwrap_or(false)
    }

    /// Gives `surface` keyboard focus and tells observers it was activated.
    pub fn activate(&mut self, scene: &dyn Scene, surface: SurfaceId) {
        if self.has_device(DeviceKind::Keyboard) {
            self.set_keyboard_focus(scene, Some(surface));
        }
        self.out.signal(SeatSignal::Activated { surface });
    }

    /// Forces num and caps lock on or off.
    pub fn keyboard_set_locks(
        &mut self,
        scene: &dyn Scene,
        mask: KeyboardLocks,
        value: KeyboardLocks,
    ) -> SeatResult<()> {
        if !self.has_device(DeviceKind::Keyboard) {
            return Err(self.missing(DeviceKind::Keyboard));
        }
        if self.hooks.led_update.is_none() {
            return Err(SeatError::LedUpdateUnavailable(self.name.clone()));
        }
        let modifiers = self
            .keyboard
            .as_mut()
            .and_then(|k| k.state.modifiers_mut())
            .ok_or_else(|| SeatError::KeymapUnavailable("no keymap engine".into()))?;
        modifiers.set_locks(mask, value);

        let serial = self.serials.next_serial();
        self.notify_modifiers(scene, serial);
        Ok(())
    }

    // Cursors

    /// `wl_pointer.set_cursor` from the client owning `object`.
    pub fn set_cursor(
        &mut self,
        scene: &mut dyn Scene,
        object: ObjectRef,
        serial: Serial,
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) {
        let Some(pointer) = self.pointer.as_mut() else {
            return;
        };
        let state = &mut pointer.state;
        let Some(focus) = state.focus() else {
            return;
        };
        if focus.client != Some(object.client) {
            debug!("{} set a cursor without pointer focus", object.client);
            return;
        }
        if !state.focus_serial().accepts(serial) {
            debug!("{} set a cursor with stale serial {}", object.client, serial);
            return;
        }

        let Some(surface) = surface else {
            state.unmap_sprite(&mut self.listeners);
            return;
        };
        let sprite = CursorSprite {
            surface,
            hotspot_x,
            hotspot_y,
        };
        if state.sprite() == Some(sprite) {
            return;
        }
        if state.sprite().map(|s| s.surface) != Some(surface) {
            if let Err(conflict) = scene.assign_role(surface, pointer::CURSOR_ROLE) {
                self.out.protocol_error(
                    object,
                    ProtocolErrorKind::PointerRole,
                    format!("{} already has the {} role", conflict.surface, conflict.existing),
                );
                return;
            }
        }
        state.map_sprite(sprite, &mut self.listeners);
    }

    /// `zwp_tablet_tool.set_cursor` from the client owning `object`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_tool_cursor(
        &mut self,
        scene: &mut dyn Scene,
        tool: ToolId,
        object: ObjectRef,
        serial: Serial,
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) -> SeatResult<()> {
        let Some((tool, _)) = self.tablets.split_tool_mut(tool) else {
            return Err(SeatError::UnknownTool(tool));
        };
        let state = &mut tool.state;
        let Some(focus) = state.focus() else {
            return Ok(());
        };
        if focus.client != Some(object.client) || !state.focus_serial().accepts(serial) {
            debug!("{} tool cursor request ignored", object.client);
            return Ok(());
        }

        if let Some(surface) = surface {
            if let Err(conflict) = scene.assign_role(surface, tablet::TOOL_CURSOR_ROLE) {
                self.out.protocol_error(
                    object,
                    ProtocolErrorKind::InvalidObject,
                    format!("{} already has the {} role", conflict.surface, conflict.existing),
                );
                return Ok(());
            }
        }

        state.unmap_sprite(&mut self.listeners);
        if let Some(surface) = surface {
            state.map_sprite(
                CursorSprite {
                    surface,
                    hotspot_x,
                    hotspot_y,
                },
                &mut self.listeners,
            );
        }
        Ok(())
    }

    // Tablets

    pub fn add_tablet(&mut self, scene: &dyn Scene, description: TabletDescription) -> TabletId {
        self.tablets
            .add_tablet(scene, description, &mut self.ids, &mut self.out)
    }

    pub fn remove_tablet(&mut self, id: TabletId) -> SeatResult<()> {
        if self.tablets.remove_tablet(id, &mut self.out) {
            info!("🖊️ Tablet {} removed from seat '{}'", id, self.name);
            Ok(())
        } else {
            Err(SeatError::UnknownTablet(id))
        }
    }

    pub fn add_tool(&mut self, description: ToolDescription) -> ToolId {
        self.tablets
            .add_tool(description, &mut self.ids, &mut self.out)
    }

    /// Explicit tool removal. The device layer never calls this on its own;
    /// tools otherwise live until the seat goes away.
    pub fn remove_tool(&mut self, scene: &dyn Scene, id: ToolId) -> SeatResult<()> {
        self.dispatch_tool(id, scene, |_, tool| {
            tool.set_focus(None, 0);
        })
        .ok_or(SeatError::UnknownTool(id))?;

        let mut tool = self.tablets.take_tool(id).ok_or(SeatError::UnknownTool(id))?;
        tool.state.unmap_sprite(&mut self.listeners);
        tool.state.router.forget_listeners(&mut self.listeners);
        for binding in tool.state.router.bucket().iter() {
            self.out.send(binding, TabletToolEvent::Removed);
        }
        self.out.signal(SeatSignal::ToolRemoved(id));
        debug!("tool {} removed", id);
        Ok(())
    }

    // Grabs

    /// Installs a pointer grab and lets it assert its focus right away.
    pub fn start_pointer_grab(&mut self, scene: &dyn Scene, grab: Box<dyn PointerGrab>) -> SeatResult<()> {
        let Some(pointer) = self.pointer.as_mut() else {
            return Err(self.missing(DeviceKind::Pointer));
        };
        pointer.grabs.start(grab);
        self.dispatch_pointer(scene, |grab, pointer| grab.focus(pointer));
        Ok(())
    }

    /// Restores the default pointer grab and re-evaluates focus.
    pub fn end_pointer_grab(&mut self, scene: &dyn Scene) {
        let Some(pointer) = self.pointer.as_mut() else {
            return;
        };
        pointer.grabs.end();
        self.dispatch_pointer(scene, |grab, pointer| grab.focus(pointer));
    }

    pub fn start_keyboard_grab(&mut self, grab: Box<dyn KeyboardGrab>) -> SeatResult<()> {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Err(self.missing(DeviceKind::Keyboard));
        };
        keyboard.grabs.start(grab);
        Ok(())
    }

    pub fn end_keyboard_grab(&mut self) {
        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.grabs.end();
        }
    }

    pub fn start_touch_grab(&mut self, grab: Box<dyn TouchGrab>) -> SeatResult<()> {
        let Some(touch) = self.touch.as_mut() else {
            return Err(self.missing(DeviceKind::Touch));
        };
        touch.grabs.start(grab);
        Ok(())
    }

    pub fn end_touch_grab(&mut self) {
        if let Some(touch) = self.touch.as_mut() {
            touch.grabs.end();
        }
    }

    pub fn start_tool_grab(&mut self, tool: ToolId, grab: Box<dyn TabletToolGrab>) -> SeatResult<()> {
        let (tool, _) = self
            .tablets
            .split_tool_mut(tool)
            .ok_or(SeatError::UnknownTool(tool))?;
        tool.grabs.start(grab);
        Ok(())
    }

    pub fn end_tool_grab(&mut self, tool: ToolId) {
        if let Some((tool, _)) = self.tablets.split_tool_mut(tool) {
            tool.grabs.end();
        }
    }

    /// Lets the active grab clean up, then restores the default grab.
    pub(crate) fn cancel_pointer_grab(&mut self, scene: &dyn Scene) {
        self.dispatch_pointer(scene, |grab, pointer| grab.cancel(pointer));
        if self.pointer.as_ref().is_some_and(|p| !p.grabs.is_default()) {
            self.end_pointer_grab(scene);
        }
    }

    pub(crate) fn cancel_keyboard_grab(&mut self, scene: &dyn Scene) {
        self.dispatch_keyboard(scene, |grab, keyboard| grab.cancel(keyboard));
        self.end_keyboard_grab();
    }

    pub(crate) fn cancel_touch_grab(&mut self, scene: &dyn Scene) {
        self.dispatch_touch(scene, |grab, touch| grab.cancel(touch));
        self.end_touch_grab();
    }

    // Dispatch

    /// Lends the active pointer grab a handle for one event and applies any
    /// end request it left behind.
    pub(crate) fn dispatch_pointer<R>(
        &mut self,
        scene: &dyn Scene,
        f: impl FnOnce(&mut dyn PointerGrab, &mut PointerHandle<'_>) -> R,
    ) -> Option<R> {
        let has_keyboard = self.has_device(DeviceKind::Keyboard);
        let Seat {
            serials,
            out,
            listeners,
            pointer,
            keyboard,
            ..
        } = self;
        let Pointer { state, grabs } = pointer.as_mut()?;
        let keyboard = keyboard
            .as_ref()
            .filter(|_| has_keyboard)
            .map(|k| &k.state);

        let ctx = RoutingContext::new(&*serials, out, listeners);
        let mut handle = PointerHandle::new(state, scene, ctx, keyboard);
        let result = f(grabs.active_mut(), &mut handle);
        if handle.take_request() == Some(GrabRequest::End) {
            grabs.end();
            grabs.active_mut().focus(&mut handle);
        }
        Some(result)
    }

    pub(crate) fn dispatch_keyboard<R>(
        &mut self,
        scene: &dyn Scene,
        f: impl FnOnce(&mut dyn KeyboardGrab, &mut KeyboardHandle<'_>) -> R,
    ) -> Option<R> {
        let pointer_focus = self
            .pointer()
            .and_then(|p| p.state.focus());
        let Seat {
            serials,
            out,
            listeners,
            keyboard,
            ..
        } = self;
        let Keyboard { state, grabs } = keyboard.as_mut()?;

        let ctx = RoutingContext::new(&*serials, out, listeners);
        let mut handle = KeyboardHandle::new(state, scene, ctx, pointer_focus);
        let result = f(grabs.active_mut(), &mut handle);
        if handle.take_request() == Some(GrabRequest::End) {
            grabs.end();
        }
        Some(result)
    }

    pub(crate) fn dispatch_touch<R>(
        &mut self,
        scene: &dyn Scene,
        f: impl FnOnce(&mut dyn TouchGrab, &mut TouchHandle<'_>) -> R,
    ) -> Option<R> {
        let Seat {
            serials,
            out,
            listeners,
            touch,
            ..
        } = self;
        let Touch { state, grabs } = touch.as_mut()?;

        let ctx = RoutingContext::new(&*serials, out, listeners);
        let mut handle = TouchHandle::new(state, scene, ctx);
        let result = f(grabs.active_mut(), &mut handle);
        if handle.take_request() == Some(GrabRequest::End) {
            grabs.end();
        }
        Some(result)
    }

    pub(crate) fn dispatch_tool<R>(
        &mut self,
        id: ToolId,
        scene: &dyn Scene,
        f: impl FnOnce(&mut dyn TabletToolGrab, &mut TabletToolHandle<'_>) -> R,
    ) -> Option<R> {
        let Seat {
            serials,
            out,
            listeners,
            tablets,
            ..
        } = self;
        let (tool, tablet_list) = tablets.split_tool_mut(id)?;
        let TabletTool { state, grabs } = tool;

        let ctx = RoutingContext::new(&*serials, out, listeners);
        let mut handle = TabletToolHandle::new(state, scene, ctx, tablet_list);
        let result = f(grabs.active_mut(), &mut handle);
        if handle.take_request() == Some(GrabRequest::End) {
            grabs.end();
        }
        Some(result)
    }

    // Teardown

    /// Announces removal of every tablet and tool, drops all device state
    /// and client bindings, and emits [`SeatSignal::Destroyed`].
    pub fn destroy(&mut self) {
        info!("💺 Destroying seat '{}'", self.name);
        if let Some(mut pointer) = self.pointer.take() {
            pointer.state.unmap_sprite(&mut self.listeners);
            pointer.state.router.forget_listeners(&mut self.listeners);
        }
        if let Some(mut keyboard) = self.keyboard.take() {
            keyboard.state.forget_saved_focus(&mut self.listeners);
            keyboard.state.router.forget_listeners(&mut self.listeners);
        }
        if let Some(mut touch) = self.touch.take() {
            touch.state.router.forget_listeners(&mut self.listeners);
        }
        self.tablets.teardown(&mut self.listeners, &mut self.out);
        self.bindings.clear();
        self.caps = SeatCapabilityTracker::new();
        self.out.signal(SeatSignal::Destroyed);
    }
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seat")
            .field("name", &self.name)
            .field("capabilities", &self.caps.capabilities())
            .field("bindings", &self.bindings.len())
            .field("pointer", &self.pointer)
            .field("keyboard", &self.keyboard)
            .field("touch", &self.touch)
            .field("tablets", &self.tablets)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Compiles the configured names with libxkbcommon, falling back to the
/// built-in table when the XKB data cannot be compiled.
#[cfg(feature = "xkbcommon")]
fn default_keymap(names: &KeymapNames) -> SeatResult<Rc<dyn Keymap>> {
    match crate::keymap::xkb::XkbKeymap::from_names(names) {
        Ok(keymap) => Ok(Rc::new(keymap)),
        Err(e) => {
            warn!("{}, using the built-in modifier table", e);
            Ok(Rc::new(crate::keymap::BasicKeymap::new(names.clone())))
        }
    }
}

#[cfg(not(feature = "xkbcommon"))]
fn default_keymap(names: &KeymapNames) -> SeatResult<Rc<dyn Keymap>> {
    Ok(Rc::new(crate::keymap::BasicKeymap::new(names.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Outgoing};
    use crate::geometry::Rect;
    use crate::object::ObjectId;
    use crate::scene::StackScene;

    fn seat() -> Seat {
        Seat::new("seat0", SerialCounter::new(), &SeatConfig::default())
    }

    fn scene() -> StackScene {
        let mut scene = StackScene::new();
        scene.add_output(OutputId(1), Rect::new(0, 0, 800, 600));
        scene.map_view(ViewId(1), SurfaceId(1), Some(ClientId(1)), Rect::new(0, 0, 800, 600));
        scene
    }

    fn object(client: u32, id: u32) -> ObjectRef {
        ObjectRef::new(ClientId(client), ObjectId(id))
    }

    #[test]
    fn bind_sends_capabilities_then_name() {
        let mut seat = seat();
        seat.init_touch();
        seat.bind_seat(object(1, 1), 7).unwrap();

        let events: Vec<Event> = seat.outbox().deliveries().map(|d| d.event.clone()).collect();
        assert_eq!(
            events,
            vec![
                Event::Seat(SeatEvent::Capabilities(SeatCapabilities::TOUCH)),
                Event::Seat(SeatEvent::Name("seat0".into())),
            ]
        );
        assert_eq!(seat.bindings()[0].version, SEAT_VERSION);
        assert!(matches!(
            seat.bind_seat(object(1, 1), 4),
            Err(SeatError::DuplicateObject(_))
        ));
    }

    #[test]
    fn second_pointer_does_not_rebroadcast() {
        let scene = scene();
        let mut seat = seat();
        seat.bind_seat(object(1, 1), 1).unwrap();
        seat.drain();

        seat.init_pointer(&scene);
        seat.init_pointer(&scene);
        assert_eq!(seat.device_count(DeviceKind::Pointer), 2);
        let broadcasts = seat
            .drain()
            .into_iter()
            .filter(|m| matches!(m, Outgoing::Deliver(d) if matches!(d.event, Event::Seat(_))))
            .count();
        assert_eq!(broadcasts, 1);
    }

    #[test]
    fn missing_devices_are_reported() {
        let mut seat = seat();
        let err = seat.get_pointer(object(1, 2)).unwrap_err();
        assert!(matches!(
            err,
            SeatError::MissingCapability {
                capability: DeviceKind::Pointer,
                ..
            }
        ));
    }

    #[test]
    fn released_pointer_keeps_its_position() {
        let scene = scene();
        let mut seat = seat();
        seat.init_pointer(&scene);
        seat.get_pointer(object(1, 2)).unwrap();
        assert!(seat.pointer().unwrap().state().focus().is_some());

        seat.release_pointer(&scene);
        assert!(seat.pointer().is_none());
        assert!(seat.capabilities().is_empty());

        seat.init_pointer(&scene);
        let pointer = seat.pointer().unwrap().state();
        assert_eq!(pointer.position(), Point::from_int(100, 100));
        assert_eq!(pointer.focus().map(|f| f.surface), Some(SurfaceId(1)));
    }

    #[test]
    fn destroyed_focus_surface_clears_pointer_focus() {
        let mut scene = scene();
        let mut seat = seat();
        seat.init_pointer(&scene);
        assert!(seat.pointer().unwrap().state().focus().is_some());

        scene.destroy_surface(SurfaceId(1));
        seat.surface_destroyed(&scene, SurfaceId(1));
        let pointer = seat.pointer().unwrap().state();
        assert!(pointer.focus().is_none());
        assert_eq!(pointer.local(), Point::unfocused());
    }

    #[test]
    fn cursor_role_conflict_is_a_protocol_error() {
        let mut scene = scene();
        let mut seat = seat();
        seat.init_pointer(&scene);
        let binding = object(1, 2);
        seat.get_pointer(binding).unwrap();
        let serial = seat.pointer().unwrap().state().focus_serial();
        scene.assign_role(SurfaceId(9), "xdg_toplevel").unwrap();
        seat.drain();

        seat.set_cursor(&mut scene, binding, serial, Some(SurfaceId(9)), 0, 0);
        assert!(matches!(
            seat.drain().as_slice(),
            [Outgoing::ProtocolError {
                kind: ProtocolErrorKind::PointerRole,
                ..
            }]
        ));
        assert!(seat.pointer().unwrap().state().sprite().is_none());
    }

    #[test]
    fn stale_cursor_serial_is_ignored() {
        let mut scene = scene();
        let mut seat = seat();
        seat.init_pointer(&scene);
        let binding = object(1, 2);
        seat.get_pointer(binding).unwrap();
        let focus_serial = seat.pointer().unwrap().state().focus_serial();
        let future = Serial::new(focus_serial.raw().wrapping_add(1));

        seat.set_cursor(&mut scene, binding, future, Some(SurfaceId(5)), 1, 1);
        assert!(seat.pointer().unwrap().state().sprite().is_none());

        seat.set_cursor(&mut scene, binding, focus_serial, Some(SurfaceId(5)), 1, 1);
        assert_eq!(
            seat.pointer().unwrap().state().sprite().map(|s| s.surface),
            Some(SurfaceId(5))
        );
    }

    #[test]
    fn set_locks_requires_an_led_hook() {
        let scene = scene();
        let mut seat = seat();
        seat.init_keyboard(None).unwrap();
        assert!(matches!(
            seat.keyboard_set_locks(&scene, KeyboardLocks::NUM_LOCK, KeyboardLocks::NUM_LOCK),
            Err(SeatError::LedUpdateUnavailable(_))
        ));

        let leds = Rc::new(std::cell::Cell::new(Leds::empty()));
        let sink = Rc::clone(&leds);
        seat.hooks_mut().led_update = Some(Box::new(move |l| sink.set(l)));
        seat.keyboard_set_locks(&scene, KeyboardLocks::NUM_LOCK, KeyboardLocks::NUM_LOCK)
            .unwrap();
        assert_eq!(leds.get(), Leds::NUM_LOCK);
    }
}
