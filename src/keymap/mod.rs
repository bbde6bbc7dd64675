//! Keymap engine seam
//!
//! The seat only needs a handful of things from a keymap compiler: fresh
//! state objects, key transitions, serialized modifier masks, modifier and
//! LED indices, and a text form to hand to clients. [`Keymap`] and
//! [`KeymapState`] capture exactly that. [`BasicKeymap`] is a built-in evdev
//! modifier table used when no XKB data is available; the default
//! `xkbcommon` feature adds a libxkbcommon engine.

pub mod modifiers;
#[cfg(feature = "xkbcommon")]
pub mod xkb;

use crate::error::SeatError;
use crate::event::KeyState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub use modifiers::{KeyboardLocks, KeyboardModifiers, Leds, ModifierMasks, ModifierState, ModifierUpdate};

pub const MOD_NAME_SHIFT: &str = "Shift";
pub const MOD_NAME_CAPS: &str = "Lock";
pub const MOD_NAME_CTRL: &str = "Control";
pub const MOD_NAME_ALT: &str = "Mod1";
pub const MOD_NAME_NUM: &str = "Mod2";
pub const MOD_NAME_MOD3: &str = "Mod3";
pub const MOD_NAME_LOGO: &str = "Mod4";
pub const MOD_NAME_MOD5: &str = "Mod5";

pub const LED_NAME_CAPS: &str = "Caps Lock";
pub const LED_NAME_NUM: &str = "Num Lock";
pub const LED_NAME_SCROLL: &str = "Scroll Lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Up,
    Down,
}

impl From<KeyState> for KeyDirection {
    fn from(state: KeyState) -> Self {
        match state {
            KeyState::Pressed => KeyDirection::Down,
            KeyState::Released => KeyDirection::Up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModComponent {
    Depressed,
    Latched,
    Locked,
}

/// A compiled keymap
pub trait Keymap: fmt::Debug {
    fn new_state(&self) -> Option<Box<dyn KeymapState>>;

    fn mod_index(&self, name: &str) -> Option<u32>;

    fn led_index(&self, name: &str) -> Option<u32>;

    /// Text form sent to clients.
    fn as_string(&self) -> Option<String>;
}

/// Live modifier/layout state for one keyboard
pub trait KeymapState: fmt::Debug {
    /// `keycode` is an evdev code; engines apply their own offset.
    fn update_key(&mut self, keycode: u32, direction: KeyDirection);

    fn serialize_mods(&self, component: ModComponent) -> u32;

    fn serialize_layout(&self) -> u32;

    fn led_index_is_active(&self, index: u32) -> bool;

    fn update_mask(&mut self, depressed: u32, latched: u32, locked: u32, group: u32);
}

/// RMLVO names a keymap is compiled from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapNames {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
}

impl Default for KeymapNames {
    fn default() -> Self {
        Self {
            rules: "evdev".to_string(),
            model: "pc105".to_string(),
            layout: "us".to_string(),
            variant: String::new(),
            options: None,
        }
    }
}

/// A keymap plus the indices and text blob the seat keeps at hand
#[derive(Debug)]
pub struct KeymapInfo {
    keymap: Rc<dyn Keymap>,
    blob: Arc<str>,
    pub shift_mod: Option<u32>,
    pub caps_mod: Option<u32>,
    pub ctrl_mod: Option<u32>,
    pub alt_mod: Option<u32>,
    pub mod2_mod: Option<u32>,
    pub mod3_mod: Option<u32>,
    pub super_mod: Option<u32>,
    pub mod5_mod: Option<u32>,
    pub num_led: Option<u32>,
    pub caps_led: Option<u32>,
    pub scroll_led: Option<u32>,
}

impl KeymapInfo {
    pub fn new(keymap: Rc<dyn Keymap>) -> Result<Self, SeatError> {
        let blob = keymap
            .as_string()
            .ok_or_else(|| SeatError::KeymapUnavailable("keymap has no text form".into()))?;

        Ok(Self {
            shift_mod: keymap.mod_index(MOD_NAME_SHIFT),
            caps_mod: keymap.mod_index(MOD_NAME_CAPS),
            ctrl_mod: keymap.mod_index(MOD_NAME_CTRL),
            alt_mod: keymap.mod_index(MOD_NAME_ALT),
            mod2_mod: keymap.mod_index(MOD_NAME_NUM),
            mod3_mod: keymap.mod_index(MOD_NAME_MOD3),
            super_mod: keymap.mod_index(MOD_NAME_LOGO),
            mod5_mod: keymap.mod_index(MOD_NAME_MOD5),
            num_led: keymap.led_index(LED_NAME_NUM),
            caps_led: keymap.led_index(LED_NAME_CAPS),
            scroll_led: keymap.led_index(LED_NAME_SCROLL),
            blob: Arc::from(blob),
            keymap,
        })
    }

    pub fn keymap(&self) -> &Rc<dyn Keymap> {
        &self.keymap
    }

    /// Text form of the keymap, as sent to clients.
    pub fn blob(&self) -> Arc<str> {
        Arc::clone(&self.blob)
    }

    pub fn new_state(&self) -> Result<Box<dyn KeymapState>, SeatError> {
        self.keymap
            .new_state()
            .ok_or_else(|| SeatError::KeymapUnavailable("failed to create keymap state".into()))
    }
}

/// Bit for a modifier index, zero when the keymap lacks it.
pub fn mod_mask(index: Option<u32>) -> u32 {
    match index {
        Some(i) if i < 32 => 1 << i,
        _ => 0,
    }
}

const SHIFT: u32 = 1 << 0;
const LOCK: u32 = 1 << 1;
const CONTROL: u32 = 1 << 2;
const MOD1: u32 = 1 << 3;
const MOD2: u32 = 1 << 4;
const MOD3: u32 = 1 << 5;
const MOD4: u32 = 1 << 6;

const KEY_LEFTCTRL: u32 = 29;
const KEY_LEFTSHIFT: u32 = 42;
const KEY_RIGHTSHIFT: u32 = 54;
const KEY_LEFTALT: u32 = 56;
const KEY_CAPSLOCK: u32 = 58;
const KEY_NUMLOCK: u32 = 69;
const KEY_SCROLLLOCK: u32 = 70;
const KEY_RIGHTCTRL: u32 = 97;
const KEY_RIGHTALT: u32 = 100;
const KEY_LEFTMETA: u32 = 125;
const KEY_RIGHTMETA: u32 = 126;

/// Built-in keymap covering the evdev modifier and lock keys
///
/// It knows nothing about symbols; clients receive an include-style keymap
/// naming the configured layout and compile it themselves.
#[derive(Debug, Clone)]
pub struct BasicKeymap {
    names: KeymapNames,
}

impl BasicKeymap {
    pub fn new(names: KeymapNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &KeymapNames {
        &self.names
    }
}

impl Default for BasicKeymap {
    fn default() -> Self {
        Self::new(KeymapNames::default())
    }
}

impl Keymap for BasicKeymap {
    fn new_state(&self) -> Option<Box<dyn KeymapState>> {
        Some(Box::new(BasicState::default()))
    }

    fn mod_index(&self, name: &str) -> Option<u32> {
        [
            MOD_NAME_SHIFT,
            MOD_NAME_CAPS,
            MOD_NAME_CTRL,
            MOD_NAME_ALT,
            MOD_NAME_NUM,
            MOD_NAME_MOD3,
            MOD_NAME_LOGO,
            MOD_NAME_MOD5,
        ]
        .iter()
        .position(|n| *n == name)
        .map(|i| i as u32)
    }

    fn led_index(&self, name: &str) -> Option<u32> {
        [LED_NAME_CAPS, LED_NAME_NUM, LED_NAME_SCROLL]
            .iter()
            .position(|n| *n == name)
            .map(|i| i as u32)
    }

    fn as_string(&self) -> Option<String> {
        let mut symbols = format!("pc+{}", self.names.layout);
        if !self.names.variant.is_empty() {
            symbols.push_str(&format!("({})", self.names.variant));
        }
        Some(format!(
            "xkb_keymap {{\n\
             \txkb_keycodes {{ include \"{}\" }};\n\
             \txkb_types {{ include \"complete\" }};\n\
             \txkb_compat {{ include \"complete\" }};\n\
             \txkb_symbols {{ include \"{}\" }};\n\
             }};\n",
            self.names.rules, symbols
        ))
    }
}

#[derive(Debug, Default)]
struct BasicState {
    pressed: BTreeSet<u32>,
    depressed: u32,
    latched: u32,
    locked: u32,
    group: u32,
}

impl BasicState {
    fn modifier_of(keycode: u32) -> u32 {
        match keycode {
            KEY_LEFTSHIFT | KEY_RIGHTSHIFT => SHIFT,
            KEY_LEFTCTRL | KEY_RIGHTCTRL => CONTROL,
            KEY_LEFTALT | KEY_RIGHTALT => MOD1,
            KEY_LEFTMETA | KEY_RIGHTMETA => MOD4,
            _ => 0,
        }
    }

    fn lock_of(keycode: u32) -> u32 {
        match keycode {
            KEY_CAPSLOCK => LOCK,
            KEY_NUMLOCK => MOD2,
            KEY_SCROLLLOCK => MOD3,
            _ => 0,
        }
    }

    fn pressed_mods(&self) -> u32 {
        self.pressed
            .iter()
            .fold(0, |mods, key| mods | Self::modifier_of(*key))
    }
}

impl KeymapState for BasicState {
    fn update_key(&mut self, keycode: u32, direction: KeyDirection) {
        match direction {
            KeyDirection::Down => {
                if self.pressed.insert(keycode) {
                    self.locked ^= Self::lock_of(keycode);
                }
            }
            KeyDirection::Up => {
                self.pressed.remove(&keycode);
            }
        }
    }

    fn serialize_mods(&self, component: ModComponent) -> u32 {
        match component {
            ModComponent::Depressed => self.depressed | self.pressed_mods(),
            ModComponent::Latched => self.latched,
            ModComponent::Locked => self.locked,
        }
    }

    fn serialize_layout(&self) -> u32 {
        self.group
    }

    fn led_index_is_active(&self, index: u32) -> bool {
        match index {
            0 => self.locked & LOCK != 0,
            1 => self.locked & MOD2 != 0,
            2 => self.locked & MOD3 != 0,
            _ => false,
        }
    }

    fn update_mask(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.depressed = depressed;
        self.latched = latched;
        self.locked = locked;
        self.group = group;
    }
}
