//! Device-layer entry points
//!
//! Each `notify_*` call takes one decoded input event, updates seat state,
//! runs compositor hooks and hands the event to the active grab. They never
//! fail: events for devices the seat does not have, or that arrive out of
//! sequence, are logged and dropped.

use crate::event::{Axis, ButtonState, DeviceKind, KeyState, StateUpdate, TouchPhase};
use crate::geometry::{Fixed, Point};
use crate::keymap::{KeyDirection, KeyboardModifiers};
use crate::object::{OutputId, TabletId, ToolId};
use crate::scene::Scene;
use crate::seat::Seat;
use crate::serial::Serial;
use log::{debug, trace, warn};

/// evdev code reported to tool bindings when the tip touches the surface
pub const BTN_TOUCH: u32 = 0x14a;

impl Seat {
    fn require(&self, kind: DeviceKind, what: &str) -> bool {
        if self.has_device(kind) {
            return true;
        }
        warn!("seat '{}' got {} without a {:?} device", self.name(), what, kind);
        false
    }

    // Pointer

    /// Relative motion from the device layer.
    pub fn notify_motion(&mut self, scene: &dyn Scene, time: u32, dx: Fixed, dy: Fixed) {
        if !self.require(DeviceKind::Pointer, "relative motion") {
            return;
        }
        self.dispatch_pointer(scene, |grab, pointer| {
            let target = pointer.position().offset(dx, dy);
            grab.motion(pointer, time, target);
        });
    }

    pub fn notify_motion_absolute(&mut self, scene: &dyn Scene, time: u32, position: Point) {
        if !self.require(DeviceKind::Pointer, "absolute motion") {
            return;
        }
        self.dispatch_pointer(scene, |grab, pointer| grab.motion(pointer, time, position));
    }

    pub fn notify_button(&mut self, scene: &dyn Scene, time: u32, button: u32, state: ButtonState) {
        if !self.require(DeviceKind::Pointer, "a button") {
            return;
        }
        match state {
            ButtonState::Pressed => {
                self.idle_inhibit();
                if let Some(pointer) = self.pointer.as_mut() {
                    pointer.state.press(time, button);
                }
            }
            ButtonState::Released => {
                self.idle_release();
                if let Some(pointer) = self.pointer.as_mut() {
                    pointer.state.release();
                }
            }
        }

        if let Some(hook) = self.hooks.button.as_mut() {
            hook(time, button, state);
        }
        self.dispatch_pointer(scene, |grab, pointer| grab.button(pointer, time, button, state));

        let serial = self.serials.current();
        if let Some(pointer) = self.pointer.as_mut() {
            if pointer.state.button_count() == 1 {
                pointer.state.set_grab_serial(serial);
            }
        }
    }

    /// Zero scrolls are dropped. An axis hook returning true swallows the
    /// event.
    pub fn notify_axis(&mut self, scene: &dyn Scene, time: u32, axis: Axis, value: Fixed) {
        if !self.require(DeviceKind::Pointer, "an axis event") {
            return;
        }
        if value == Fixed::ZERO {
            return;
        }
        if let Some(hook) = self.hooks.axis.as_mut() {
            if hook(time, axis, value) {
                trace!("axis {:?} consumed by a binding", axis);
                return;
            }
        }
        self.dispatch_pointer(scene, |grab, pointer| grab.axis(pointer, time, axis, value));
    }

    /// The pointer entered an output at `position`, or left all outputs.
    pub fn notify_pointer_focus(&mut self, scene: &dyn Scene, output: Option<OutputId>, position: Point) {
        if !self.require(DeviceKind::Pointer, "pointer focus") {
            return;
        }
        match output {
            Some(output) => {
                debug!("pointer entered {} at {:?}", output, position);
                self.dispatch_pointer(scene, |grab, pointer| {
                    pointer.move_to(position);
                    grab.focus(pointer);
                });
            }
            None => {
                self.dispatch_pointer(scene, |_, pointer| {
                    pointer.set_focus(None);
                });
            }
        }
    }

    /// Re-evaluates pointer focus after the scene changed under it.
    pub fn repick(&mut self, scene: &dyn Scene) {
        if !self.has_device(DeviceKind::Pointer) {
            return;
        }
        self.dispatch_pointer(scene, |grab, pointer| grab.focus(pointer));
    }

    // Keyboard

    pub fn notify_key(
        &mut self,
        scene: &dyn Scene,
        time: u32,
        key: u32,
        state: KeyState,
        update: StateUpdate,
    ) {
        if !self.require(DeviceKind::Keyboard, "a key") {
            return;
        }
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        match state {
            KeyState::Pressed => {
                if !keyboard.state.press(key) {
                    trace!("ignoring repeat of key {}", key);
                    return;
                }
                self.idle_inhibit();
            }
            KeyState::Released => {
                keyboard.state.release(key);
                self.idle_release();
            }
        }

        let default_grab = self.keyboard.as_ref().is_some_and(|k| k.grabs.is_default());
        if default_grab {
            if let Some(hook) = self.hooks.key.as_mut() {
                hook(time, key, state);
            }
        }
        self.dispatch_keyboard(scene, |grab, keyboard| grab.key(keyboard, time, key, state));

        let keymap_due = self
            .keyboard
            .as_ref()
            .is_some_and(|k| k.state.has_pending_keymap() && k.state.keys().is_empty());
        if keymap_due {
            self.apply_pending_keymap(scene);
        }

        let serial = self.serials.current();
        if update == StateUpdate::Automatic {
            self.update_modifier_state(scene, serial, key, state);
        }
        if state == KeyState::Pressed {
            if let Some(keyboard) = self.keyboard.as_mut() {
                keyboard.state.record_grab(serial, time, key);
            }
        }
    }

    fn update_modifier_state(&mut self, scene: &dyn Scene, serial: Serial, key: u32, state: KeyState) {
        let Some(modifiers) = self.keyboard.as_mut().and_then(|k| k.state.modifiers_mut()) else {
            return;
        };
        let direction = match state {
            KeyState::Pressed => KeyDirection::Down,
            KeyState::Released => KeyDirection::Up,
        };
        modifiers.update_key(key, direction);
        self.notify_modifiers(scene, serial);
    }

    /// Commits the engine's modifier state. Modifier hooks run once per
    /// distinguished modifier, pressed ones before the commit and released
    /// ones after it. The LED hook runs when any LED changed; the grab hears
    /// about it only if the masks moved.
    pub fn notify_modifiers(&mut self, scene: &dyn Scene, serial: Serial) {
        let Some(modifiers) = self.keyboard.as_ref().and_then(|k| k.state.modifiers()) else {
            warn!("seat '{}' has no keymap engine for modifiers", self.name());
            return;
        };
        let update = modifiers.pending();

        if let Some(hook) = self.hooks.modifier.as_mut() {
            for modifier in update.pressed.iter() {
                hook(modifier, KeyState::Pressed);
            }
        }

        if let Some(modifiers) = self.keyboard.as_mut().and_then(|k| k.state.modifiers_mut()) {
            modifiers.commit(&update);
        }
        self.modifier_state = update.modifiers;

        if let Some(hook) = self.hooks.modifier.as_mut() {
            for modifier in update.released.iter() {
                hook(modifier, KeyState::Released);
            }
        }

        if update.leds_changed {
            if let Some(hook) = self.hooks.led_update.as_mut() {
                hook(update.leds);
            }
        }

        if update.changed {
            let masks = update.masks;
            self.dispatch_keyboard(scene, |grab, keyboard| grab.modifiers(keyboard, serial, masks));
        }
    }

    /// The seat regained keyboard input with `keys` already held.
    pub fn notify_keyboard_focus_in(&mut self, scene: &dyn Scene, keys: &[u32], update: StateUpdate) {
        if !self.require(DeviceKind::Keyboard, "keyboard focus in") {
            return;
        }
        let serial = self.serials.next_serial();
        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.state.set_keys(keys);
        }
        for &key in keys {
            self.idle_inhibit();
            if update == StateUpdate::Automatic {
                self.update_modifier_state(scene, serial, key, KeyState::Pressed);
            }
        }

        let saved = match self.keyboard.as_mut() {
            Some(keyboard) => keyboard.state.take_saved_focus(&mut self.listeners),
            None => None,
        };
        if let Some(surface) = saved {
            self.dispatch_keyboard(scene, |_, keyboard| keyboard.set_focus(Some(surface)));
        }
    }

    /// The seat lost keyboard input (VT switch, host window unfocused).
    /// Held keys are released, focus is remembered for the next focus in,
    /// and both keyboard and pointer grabs are cancelled.
    pub fn notify_keyboard_focus_out(&mut self, scene: &dyn Scene) {
        if !self.require(DeviceKind::Keyboard, "keyboard focus out") {
            return;
        }
        let serial = self.serials.next_serial();
        let keys = self
            .keyboard
            .as_ref()
            .map(|k| k.state.keys().to_vec())
            .unwrap_or_default();
        for key in keys {
            self.idle_release();
            self.update_modifier_state(scene, serial, key, KeyState::Released);
        }
        self.modifier_state = KeyboardModifiers::empty();

        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.state.set_keys(&[]);
            keyboard.state.save_focus(&mut self.listeners);
        }
        self.dispatch_keyboard(scene, |_, keyboard| keyboard.set_focus(None));
        self.cancel_keyboard_grab(scene);
        if self.has_device(DeviceKind::Pointer) {
            self.cancel_pointer_grab(scene);
        }
    }

    // Touch

    pub fn notify_touch(&mut self, scene: &dyn Scene, time: u32, id: i32, position: Point, phase: TouchPhase) {
        if !self.require(DeviceKind::Touch, "a touch event") {
            return;
        }
        let Some(touch) = self.touch.as_mut() else {
            return;
        };
        if id == touch.state.grab_touch_id() && phase != TouchPhase::Up {
            touch.state.set_grab_position(position);
        }

        match phase {
            TouchPhase::Down => self.touch_down(scene, time, id, position),
            TouchPhase::Motion => {
                if touch.state.focus().is_none() {
                    return;
                }
                self.dispatch_touch(scene, |grab, touch| grab.motion(touch, time, id, position));
            }
            TouchPhase::Up => {
                if touch.state.points() == 0 {
                    warn!("unmatched touch up for point {}", id);
                    return;
                }
                self.idle_release();
                if let Some(touch) = self.touch.as_mut() {
                    touch.state.remove_point();
                }
                self.dispatch_touch(scene, |grab, touch| grab.up(touch, time, id));
                if self.touch.as_ref().is_some_and(|t| t.state.points() == 0) {
                    self.dispatch_touch(scene, |_, touch| {
                        touch.set_focus(None);
                    });
                }
            }
        }
    }

    /// The first finger of a session picks the surface; later fingers
    /// follow it.
    fn touch_down(&mut self, scene: &dyn Scene, time: u32, id: i32, position: Point) {
        self.idle_inhibit();
        let Some(touch) = self.touch.as_mut() else {
            return;
        };
        let points = touch.state.add_point();
        if points == 1 {
            let pick = scene.pick(position);
            self.dispatch_touch(scene, |_, touch| {
                touch.set_focus(pick);
            });
        } else if touch.state.focus().is_none() {
            warn!("touch down with {} points but no focused surface", points);
            return;
        }

        if let Some(hook) = self.hooks.touch.as_mut() {
            hook(time, id, position, TouchPhase::Down);
        }
        self.dispatch_touch(scene, |grab, touch| grab.down(touch, time, id, position));

        if points == 1 {
            let serial = self.serials.current();
            if let Some(touch) = self.touch.as_mut() {
                touch.state.start_session(serial, id, time, position);
            }
        }
    }

    /// End of one set of touch updates.
    pub fn notify_touch_frame(&mut self, scene: &dyn Scene) {
        if !self.require(DeviceKind::Touch, "a touch frame") {
            return;
        }
        self.dispatch_touch(scene, |grab, touch| grab.frame(touch));
    }

    // Tablet tools

    fn tool_event<F>(&mut self, scene: &dyn Scene, tool: ToolId, f: F)
    where
        F: FnOnce(&mut dyn crate::seat::TabletToolGrab, &mut crate::seat::TabletToolHandle<'_>),
    {
        if self.dispatch_tool(tool, scene, f).is_none() {
            warn!("event for unknown tool {}", tool);
        }
    }

    pub fn notify_tablet_tool_proximity_in(&mut self, scene: &dyn Scene, time: u32, tool: ToolId, tablet: TabletId) {
        if self.tablets.tablet(tablet).is_none() {
            warn!("tool {} entered proximity of unknown tablet {}", tool, tablet);
            return;
        }
        self.tool_event(scene, tool, |grab, handle| grab.proximity_in(handle, time, tablet));
    }

    pub fn notify_tablet_tool_proximity_out(&mut self, scene: &dyn Scene, time: u32, tool: ToolId) {
        self.tool_event(scene, tool, |grab, handle| grab.proximity_out(handle, time));
    }

    pub fn notify_tablet_tool_motion(&mut self, scene: &dyn Scene, time: u32, tool: ToolId, position: Point) {
        self.tool_event(scene, tool, |grab, handle| grab.motion(handle, time, position));
    }

    pub fn notify_tablet_tool_pressure(&mut self, scene: &dyn Scene, time: u32, tool: ToolId, pressure: u32) {
        self.tool_event(scene, tool, |grab, handle| grab.pressure(handle, time, pressure));
    }

    pub fn notify_tablet_tool_distance(&mut self, scene: &dyn Scene, time: u32, tool: ToolId, distance: u32) {
        self.tool_event(scene, tool, |grab, handle| grab.distance(handle, time, distance));
    }

    pub fn notify_tablet_tool_tilt(&mut self, scene: &dyn Scene, time: u32, tool: ToolId, x: i32, y: i32) {
        self.tool_event(scene, tool, |grab, handle| grab.tilt(handle, time, x, y));
    }

    pub fn notify_tablet_tool_frame(&mut self, scene: &dyn Scene, time: u32, tool: ToolId) {
        self.tool_event(scene, tool, |grab, handle| grab.frame(handle, time));
    }

    /// Buttons hold off idle from the first press until the last release.
    pub fn notify_tablet_tool_button(
        &mut self,
        scene: &dyn Scene,
        time: u32,
        tool: ToolId,
        button: u32,
        state: ButtonState,
    ) {
        let serial = self.serials.next_serial();
        let Some((handle, _)) = self.tablets.split_tool_mut(tool) else {
            warn!("button on unknown tool {}", tool);
            return;
        };
        let Some(count) = handle.state.update_buttons(state) else {
            return;
        };
        handle.state.set_grab_serial(serial);
        match (state, count) {
            (ButtonState::Pressed, 1) => self.idle_inhibit(),
            (ButtonState::Released, 0) => self.idle_release(),
            _ => {}
        }

        if let Some(hook) = self.hooks.tablet_tool.as_mut() {
            hook(tool, button, state);
        }
        self.tool_event(scene, tool, |grab, handle| grab.button(handle, time, button, state));
    }

    pub fn notify_tablet_tool_down(&mut self, scene: &dyn Scene, time: u32, tool: ToolId) {
        let serial = self.serials.current();
        let Some((handle, _)) = self.tablets.split_tool_mut(tool) else {
            warn!("tip down on unknown tool {}", tool);
            return;
        };
        handle.state.set_tip(true);
        handle.state.set_grab_serial(serial);
        self.idle_inhibit();

        if let Some(hook) = self.hooks.tablet_tool.as_mut() {
            hook(tool, BTN_TOUCH, ButtonState::Pressed);
        }
        self.tool_event(scene, tool, |grab, handle| grab.down(handle, time));
    }

    pub fn notify_tablet_tool_up(&mut self, scene: &dyn Scene, time: u32, tool: ToolId) {
        let Some((handle, _)) = self.tablets.split_tool_mut(tool) else {
            warn!("tip up on unknown tool {}", tool);
            return;
        };
        handle.state.set_tip(false);
        self.idle_release();
        self.tool_event(scene, tool, |grab, handle| grab.up(handle, time));
    }
}
