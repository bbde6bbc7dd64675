//! libxkbcommon keymap engine

use super::{KeyDirection, Keymap, KeymapNames, KeymapState, ModComponent};
use crate::error::SeatError;
use log::warn;
use std::fmt;
use xkbcommon::xkb;

/// evdev to XKB keycode offset
const EVDEV_OFFSET: u32 = 8;

pub struct XkbKeymap {
    keymap: xkb::Keymap,
}

impl XkbKeymap {
    pub fn from_names(names: &KeymapNames) -> Result<Self, SeatError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        xkb::Keymap::new_from_names(
            &context,
            &names.rules,
            &names.model,
            &names.layout,
            &names.variant,
            names.options.clone(),
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .map(|keymap| Self { keymap })
        .ok_or_else(|| {
            SeatError::KeymapCompile(format!(
                "rules={} model={} layout={} variant={}",
                names.rules, names.model, names.layout, names.variant
            ))
        })
    }

    pub fn from_string(text: String) -> Result<Self, SeatError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        xkb::Keymap::new_from_string(
            &context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .map(|keymap| Self { keymap })
        .ok_or_else(|| SeatError::KeymapCompile("keymap text rejected".into()))
    }
}

impl fmt::Debug for XkbKeymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XkbKeymap")
            .field("mods", &self.keymap.num_mods())
            .field("leds", &self.keymap.num_leds())
            .finish()
    }
}

impl Keymap for XkbKeymap {
    fn new_state(&self) -> Option<Box<dyn KeymapState>> {
        Some(Box::new(XkbState {
            state: xkb::State::new(&self.keymap),
        }))
    }

    fn mod_index(&self, name: &str) -> Option<u32> {
        let index = self.keymap.mod_get_index(name);
        (index != xkb::MOD_INVALID).then_some(index)
    }

    fn led_index(&self, name: &str) -> Option<u32> {
        let index = self.keymap.led_get_index(name);
        (index != xkb::LED_INVALID).then_some(index)
    }

    fn as_string(&self) -> Option<String> {
        let text = self.keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1);
        (!text.is_empty()).then_some(text)
    }
}

struct XkbState {
    state: xkb::State,
}

impl fmt::Debug for XkbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XkbState").finish_non_exhaustive()
    }
}

impl KeymapState for XkbState {
    fn update_key(&mut self, keycode: u32, direction: KeyDirection) {
        let direction = match direction {
            KeyDirection::Down => xkb::KeyDirection::Down,
            KeyDirection::Up => xkb::KeyDirection::Up,
        };
        let Some(keycode) = keycode.checked_add(EVDEV_OFFSET) else {
            warn!("evdev keycode {} has no XKB equivalent", keycode);
            return;
        };
        self.state.update_key(xkb::Keycode::new(keycode), direction);
    }

    fn serialize_mods(&self, component: ModComponent) -> u32 {
        let component = match component {
            ModComponent::Depressed => xkb::STATE_MODS_DEPRESSED,
            ModComponent::Latched => xkb::STATE_MODS_LATCHED,
            ModComponent::Locked => xkb::STATE_MODS_LOCKED,
        };
        self.state.serialize_mods(component)
    }

    fn serialize_layout(&self) -> u32 {
        self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE)
    }

    fn led_index_is_active(&self, index: u32) -> bool {
        self.state.led_index_is_active(index)
    }

    fn update_mask(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.state
            .update_mask(depressed, latched, locked, 0, 0, group);
    }
}
