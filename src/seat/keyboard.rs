//! Keyboard device: pressed keys, modifier engine, grabs
//!
//! Modifier state is optional. Without a keymap the keyboard still routes
//! keys but announces `no_keymap` and never sends modifier updates.

use crate::bucket::Partition;
use crate::error::SeatError;
use crate::event::{KeyState, KeyboardEvent, KeymapFormat, Outbox};
use crate::focus::{FocusEmitter, FocusRouter, FocusTarget, KeyboardClass, RoutingContext};
use crate::geometry::Point;
use crate::grab::{GrabRequest, GrabStack};
use crate::keymap::{Keymap, KeymapInfo, ModifierMasks, ModifierState};
use crate::listener::{DestroyListeners, ListenerToken, Subscriber, Watched};
use crate::object::{ObjectRef, SurfaceId};
use crate::scene::Scene;
use crate::serial::{Serial, SerialCounter};
use log::{debug, warn};
use std::rc::Rc;

#[derive(Debug)]
pub struct KeyboardState {
    pub(crate) router: FocusRouter<KeyboardClass>,
    keys: Vec<u32>,
    modifiers: Option<ModifierState>,
    pending_keymap: Option<Rc<dyn Keymap>>,
    grab_key: u32,
    grab_time: u32,
    grab_serial: Serial,
    saved_focus: Option<SurfaceId>,
    saved_listener: Option<ListenerToken>,
    repeat_rate: i32,
    repeat_delay: i32,
}

impl KeyboardState {
    pub fn new(keymap: Option<Rc<KeymapInfo>>, repeat_rate: i32, repeat_delay: i32) -> Result<Self, SeatError> {
        let modifiers = keymap.map(ModifierState::new).transpose()?;
        Ok(Self {
            router: FocusRouter::new(Subscriber::KeyboardFocus),
            keys: Vec::new(),
            modifiers,
            pending_keymap: None,
            grab_key: 0,
            grab_time: 0,
            grab_serial: Serial::default(),
            saved_focus: None,
            saved_listener: None,
            repeat_rate,
            repeat_delay,
        })
    }

    pub fn router(&self) -> &FocusRouter<KeyboardClass> {
        &self.router
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.router.focus()
    }

    pub fn focus_surface(&self) -> Option<SurfaceId> {
        self.router.focus_surface()
    }

    pub fn focus_serial(&self) -> Serial {
        self.router.focus_serial()
    }

    /// Currently pressed keys, in press order.
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    pub fn modifiers(&self) -> Option<&ModifierState> {
        self.modifiers.as_ref()
    }

    pub(crate) fn modifiers_mut(&mut self) -> Option<&mut ModifierState> {
        self.modifiers.as_mut()
    }

    /// Committed masks; all zero without a keymap.
    pub fn masks(&self) -> ModifierMasks {
        self.modifiers
            .as_ref()
            .map(ModifierState::masks)
            .unwrap_or_default()
    }

    pub fn keymap(&self) -> Option<&Rc<KeymapInfo>> {
        self.modifiers.as_ref().map(ModifierState::info)
    }

    pub fn has_pending_keymap(&self) -> bool {
        self.pending_keymap.is_some()
    }

    pub fn grab_key(&self) -> u32 {
        self.grab_key
    }

    pub fn grab_time(&self) -> u32 {
        self.grab_time
    }

    pub fn grab_serial(&self) -> Serial {
        self.grab_serial
    }

    pub fn saved_focus(&self) -> Option<SurfaceId> {
        self.saved_focus
    }

    pub fn repeat_info(&self) -> (i32, i32) {
        (self.repeat_rate, self.repeat_delay)
    }

    /// Records a press. Returns false for a key that is already down.
    pub(crate) fn press(&mut self, key: u32) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub(crate) fn release(&mut self, key: u32) {
        self.keys.retain(|k| *k != key);
    }

    pub(crate) fn set_keys(&mut self, keys: &[u32]) {
        self.keys = keys.to_vec();
    }

    pub(crate) fn record_grab(&mut self, serial: Serial, time: u32, key: u32) {
        self.grab_serial = serial;
        self.grab_time = time;
        self.grab_key = key;
    }

    pub(crate) fn set_pending_keymap(&mut self, keymap: Rc<dyn Keymap>) {
        self.pending_keymap = Some(keymap);
    }

    pub(crate) fn take_pending_keymap(&mut self) -> Option<Rc<dyn Keymap>> {
        self.pending_keymap.take()
    }

    /// Installs a new keymap, carrying latched and locked modifiers over.
    /// Returns the carried masks.
    pub(crate) fn replace_keymap(&mut self, info: Rc<KeymapInfo>) -> Result<ModifierMasks, SeatError> {
        match self.modifiers.as_mut() {
            Some(modifiers) => modifiers.replace_keymap(info),
            None => {
                self.modifiers = Some(ModifierState::new(info)?);
                Ok(ModifierMasks::default())
            }
        }
    }

    pub(crate) fn reset_modifiers(&mut self) {
        if let Some(modifiers) = self.modifiers.as_mut() {
            if let Err(err) = modifiers.reset() {
                warn!("keeping modifier state: {}", err);
            }
        }
    }

    pub(crate) fn save_focus(&mut self, listeners: &mut DestroyListeners) {
        self.forget_saved_focus(listeners);
        if let Some(surface) = self.router.focus_surface() {
            self.saved_focus = Some(surface);
            self.saved_listener = Some(
                listeners.subscribe(Watched::Surface(surface), Subscriber::SavedKeyboardFocus),
            );
        }
    }

    pub(crate) fn take_saved_focus(&mut self, listeners: &mut DestroyListeners) -> Option<SurfaceId> {
        listeners.cancel_slot(&mut self.saved_listener);
        self.saved_focus.take()
    }

    pub(crate) fn forget_saved_focus(&mut self, listeners: &mut DestroyListeners) {
        listeners.cancel_slot(&mut self.saved_listener);
        self.saved_focus = None;
    }

    /// The saved surface was destroyed; its listener already fired.
    pub(crate) fn saved_focus_destroyed(&mut self) {
        self.saved_listener = None;
        self.saved_focus = None;
    }

    /// Keymap announcement for a new or refreshed binding.
    pub fn keymap_event(&self) -> KeyboardEvent {
        match self.keymap() {
            Some(info) => KeyboardEvent::Keymap {
                format: KeymapFormat::XkbV1,
                keymap: Some(info.blob()),
            },
            None => KeyboardEvent::Keymap {
                format: KeymapFormat::NoKeymap,
                keymap: None,
            },
        }
    }

    pub fn modifiers_event(&self, serial: Serial) -> KeyboardEvent {
        modifiers_event(serial, self.masks())
    }
}

pub(crate) fn modifiers_event(serial: Serial, masks: ModifierMasks) -> KeyboardEvent {
    KeyboardEvent::Modifiers {
        serial,
        depressed: masks.depressed,
        latched: masks.latched,
        locked: masks.locked,
        group: masks.group,
    }
}

/// Strategy receiving every keyboard event
pub trait KeyboardGrab {
    fn key(&mut self, keyboard: &mut KeyboardHandle<'_>, time: u32, key: u32, state: KeyState);

    fn modifiers(&mut self, keyboard: &mut KeyboardHandle<'_>, serial: Serial, masks: ModifierMasks);

    fn cancel(&mut self, keyboard: &mut KeyboardHandle<'_>);
}

pub struct KeyboardHandle<'a> {
    state: &'a mut KeyboardState,
    scene: &'a dyn Scene,
    ctx: RoutingContext<'a>,
    pointer_focus: Option<FocusTarget>,
    request: Option<GrabRequest>,
}

impl<'a> KeyboardHandle<'a> {
    pub(crate) fn new(
        state: &'a mut KeyboardState,
        scene: &'a dyn Scene,
        ctx: RoutingContext<'a>,
        pointer_focus: Option<FocusTarget>,
    ) -> Self {
        Self {
            state,
            scene,
            ctx,
            pointer_focus,
            request: None,
        }
    }

    pub fn state(&self) -> &KeyboardState {
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

    /// Where the pointer is focused, if the seat has one.
    pub fn pointer_focus(&self) -> Option<FocusTarget> {
        self.pointer_focus
    }

    pub fn set_focus(&mut self, surface: Option<SurfaceId>) -> bool {
        let target = surface.map(|s| FocusTarget::surface(self.scene, s));
        let mut emitter = KeyboardFocusEmitter {
            keys: self.state.keys.clone(),
            masks: self.state.masks(),
        };
        self.state
            .router
            .set_focus(target, None, &mut self.ctx, &mut emitter)
    }

    pub fn send_key(&mut self, time: u32, key: u32, state: KeyState) -> Option<Serial> {
        if !self.state.router.bucket().has_focused() {
            return None;
        }
        let serial = self.ctx.serials.next_serial();
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(
                binding,
                KeyboardEvent::Key {
                    serial,
                    time,
                    key,
                    state,
                },
            );
        }
        Some(serial)
    }

    pub fn send_modifiers(&mut self, serial: Serial, masks: ModifierMasks) {
        let focused: Vec<ObjectRef> = self.state.router.focused().collect();
        for binding in focused {
            self.ctx.out.send(binding, modifiers_event(serial, masks));
        }
    }

    pub fn end_grab(&mut self) {
        self.request = Some(GrabRequest::End);
    }

    pub(crate) fn take_request(&mut self) -> Option<GrabRequest> {
        self.request.take()
    }
}

/// Modifiers then enter for each binding of the focused client
struct KeyboardFocusEmitter {
    keys: Vec<u32>,
    masks: ModifierMasks,
}

impl FocusEmitter<KeyboardClass> for KeyboardFocusEmitter {
    fn leave(&mut self, out: &mut Outbox, binding: ObjectRef, serial: Serial, surface: SurfaceId) {
        out.send(binding, KeyboardEvent::Leave { serial, surface });
    }

    fn enter(
        &mut self,
        out: &mut Outbox,
        binding: ObjectRef,
        serial: Serial,
        target: &FocusTarget,
        _local: Point,
    ) {
        out.send(binding, modifiers_event(serial, self.masks));
        out.send(
            binding,
            KeyboardEvent::Enter {
                serial,
                surface: target.surface,
                keys: self.keys.clone(),
            },
        );
    }
}

#[derive(Debug, Default)]
pub struct DefaultKeyboardGrab;

impl KeyboardGrab for DefaultKeyboardGrab {
    fn key(&mut self, keyboard: &mut KeyboardHandle<'_>, time: u32, key: u32, state: KeyState) {
        keyboard.send_key(time, key, state);
    }

    /// Also keeps a pointer-hovered client without keyboard focus in sync.
    fn modifiers(&mut self, keyboard: &mut KeyboardHandle<'_>, serial: Serial, masks: ModifierMasks) {
        keyboard.send_modifiers(serial, masks);

        let Some(pointer) = keyboard.pointer_focus() else {
            return;
        };
        let Some(client) = pointer.client else {
            return;
        };
        if Some(pointer.surface) == keyboard.state.focus_surface() {
            return;
        }
        let hovered: Vec<ObjectRef> = keyboard
            .state
            .router
            .bucket()
            .client_partition(client, Partition::Unfocused)
            .collect();
        debug!("syncing modifiers to pointer client {}", client);
        for binding in hovered {
            keyboard.ctx.out.send(binding, modifiers_event(serial, masks));
        }
    }

    fn cancel(&mut self, _keyboard: &mut KeyboardHandle<'_>) {}
}

pub struct Keyboard {
    pub(crate) state: KeyboardState,
    pub(crate) grabs: GrabStack<dyn KeyboardGrab>,
}

impl Keyboard {
    pub fn new(state: KeyboardState) -> Self {
        Self {
            state,
            grabs: GrabStack::new(Box::new(DefaultKeyboardGrab)),
        }
    }

    pub fn state(&self) -> &KeyboardState {
        &self.state
    }

    pub fn grabs(&self) -> &GrabStack<dyn KeyboardGrab> {
        &self.grabs
    }
}

impl std::fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard")
            .field("state", &self.state)
            .field("grabs", &self.grabs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::geometry::Rect;
    use crate::keymap::BasicKeymap;
    use crate::object::{ClientId, ObjectId, ViewId};
    use crate::scene::StackScene;

    fn state() -> KeyboardState {
        let info = KeymapInfo::new(Rc::new(BasicKeymap::default())).unwrap();
        KeyboardState::new(Some(Rc::new(info)), 40, 400).unwrap()
    }

    #[test]
    fn repeated_press_is_rejected() {
        let mut keyboard = state();
        assert!(keyboard.press(30));
        assert!(!keyboard.press(30));
        keyboard.release(30);
        assert!(keyboard.keys().is_empty());
    }

    #[test]
    fn enter_is_preceded_by_modifiers() {
        let mut scene = StackScene::new();
        scene.map_view(ViewId(1), SurfaceId(8), Some(ClientId(1)), Rect::new(0, 0, 10, 10));
        let serials = SerialCounter::new();
        let mut out = Outbox::new();
        let mut listeners = DestroyListeners::new();
        let mut keyboard = state();
        keyboard.router.add_binding(ObjectRef::new(ClientId(1), ObjectId(3)));
        keyboard.press(30);

        let ctx = RoutingContext::new(&serials, &mut out, &mut listeners);
        let mut handle = KeyboardHandle::new(&mut keyboard, &scene, ctx, None);
        assert!(handle.set_focus(Some(SurfaceId(8))));

        let events: Vec<Event> = out.deliveries().map(|d| d.event.clone()).collect();
        assert!(matches!(events[0], Event::Keyboard(KeyboardEvent::Modifiers { .. })));
        assert!(matches!(
            &events[1],
            Event::Keyboard(KeyboardEvent::Enter { keys, .. }) if keys == &vec![30]
        ));
    }

    #[test]
    fn keymap_event_without_keymap() {
        let keyboard = KeyboardState::new(None, 40, 400).unwrap();
        assert_eq!(
            keyboard.keymap_event(),
            KeyboardEvent::Keymap {
                format: KeymapFormat::NoKeymap,
                keymap: None
            }
        );
        assert_eq!(keyboard.masks(), ModifierMasks::default());
    }
}
