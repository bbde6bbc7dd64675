//! Keyboard modifier and LED tracking on top of a keymap engine

use super::{mod_mask, KeyDirection, KeymapInfo, KeymapState, ModComponent};
use crate::error::SeatError;
use bitflags::bitflags;
use log::debug;
use std::rc::Rc;

bitflags! {
    /// Reduced modifier set used for compositor bindings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyboardModifiers: u32 {
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SUPER = 1 << 2;
        const SHIFT = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Leds: u32 {
        const NUM_LOCK = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const SCROLL_LOCK = 1 << 2;
    }
}

bitflags! {
    /// Locks a device layer may force on or off
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyboardLocks: u32 {
        const NUM_LOCK = 1 << 0;
        const CAPS_LOCK = 1 << 1;
    }
}

/// Serialized modifier state as clients see it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierMasks {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

/// Outcome of comparing the engine against the last committed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierUpdate {
    pub masks: ModifierMasks,
    pub changed: bool,
    pub modifiers: KeyboardModifiers,
    /// Distinguished modifiers whose depressed bit went down
    pub pressed: KeyboardModifiers,
    /// Distinguished modifiers that came up
    pub released: KeyboardModifiers,
    pub leds: Leds,
    pub leds_changed: bool,
}

#[derive(Debug)]
pub struct ModifierState {
    info: Rc<KeymapInfo>,
    state: Box<dyn KeymapState>,
    masks: ModifierMasks,
    modifiers: KeyboardModifiers,
    leds: Leds,
}

impl ModifierState {
    pub fn new(info: Rc<KeymapInfo>) -> Result<Self, SeatError> {
        let state = info.new_state()?;
        Ok(Self {
            info,
            state,
            masks: ModifierMasks::default(),
            modifiers: KeyboardModifiers::empty(),
            leds: Leds::empty(),
        })
    }

    pub fn info(&self) -> &Rc<KeymapInfo> {
        &self.info
    }

    /// Last committed masks.
    pub fn masks(&self) -> ModifierMasks {
        self.masks
    }

    pub fn modifiers(&self) -> KeyboardModifiers {
        self.modifiers
    }

    pub fn leds(&self) -> Leds {
        self.leds
    }

    /// Feeds a key transition to the engine. Returns whether the serialized
    /// masks now differ from the committed snapshot.
    pub fn update_key(&mut self, key: u32, direction: KeyDirection) -> bool {
        self.state.update_key(key, direction);
        self.serialize() != self.masks
    }

    pub fn serialize(&self) -> ModifierMasks {
        ModifierMasks {
            depressed: self.state.serialize_mods(ModComponent::Depressed),
            latched: self.state.serialize_mods(ModComponent::Latched),
            locked: self.state.serialize_mods(ModComponent::Locked),
            group: self.state.serialize_layout(),
        }
    }

    /// Computes what a notify would change, without committing it.
    pub fn pending(&self) -> ModifierUpdate {
        let masks = self.serialize();
        let modifiers = self.reduce(masks.depressed | masks.latched);
        let leds = self.current_leds();
        let now_down = self.reduce(masks.depressed);
        let was_down = self.reduce(self.masks.depressed);

        ModifierUpdate {
            masks,
            changed: masks != self.masks,
            modifiers,
            pressed: now_down & !was_down,
            released: was_down & !now_down,
            leds,
            leds_changed: leds != self.leds,
        }
    }

    pub fn commit(&mut self, update: &ModifierUpdate) {
        self.masks = update.masks;
        self.modifiers = update.modifiers;
        self.leds = update.leds;
    }

    fn reduce(&self, mods: u32) -> KeyboardModifiers {
        let info = &self.info;
        let mut out = KeyboardModifiers::empty();
        if mods & mod_mask(info.ctrl_mod) != 0 {
            out |= KeyboardModifiers::CTRL;
        }
        if mods & mod_mask(info.alt_mod) != 0 {
            out |= KeyboardModifiers::ALT;
        }
        if mods & mod_mask(info.super_mod) != 0 {
            out |= KeyboardModifiers::SUPER;
        }
        if mods & mod_mask(info.shift_mod) != 0 {
            out |= KeyboardModifiers::SHIFT;
        }
        out
    }

    fn current_leds(&self) -> Leds {
        let active = |index: Option<u32>| index.is_some_and(|i| self.state.led_index_is_active(i));
        let mut leds = Leds::empty();
        if active(self.info.num_led) {
            leds |= Leds::NUM_LOCK;
        }
        if active(self.info.caps_led) {
            leds |= Leds::CAPS_LOCK;
        }
        if active(self.info.scroll_led) {
            leds |= Leds::SCROLL_LOCK;
        }
        leds
    }

    /// Fresh engine state with every mask and LED cleared.
    pub fn reset(&mut self) -> Result<(), SeatError> {
        self.state = self.info.new_state()?;
        self.masks = ModifierMasks::default();
        self.modifiers = KeyboardModifiers::empty();
        self.leds = Leds::empty();
        Ok(())
    }

    /// Swaps in a new keymap. Latched and locked modifiers carry over;
    /// depressed ones are dropped.
    pub fn replace_keymap(&mut self, info: Rc<KeymapInfo>) -> Result<ModifierMasks, SeatError> {
        let mut state = info.new_state()?;
        let latched = self.state.serialize_mods(ModComponent::Latched);
        let locked = self.state.serialize_mods(ModComponent::Locked);
        state.update_mask(0, latched, locked, 0);

        debug!("keymap replaced, carrying latched={:#x} locked={:#x}", latched, locked);
        self.info = info;
        self.state = state;
        Ok(ModifierMasks {
            depressed: 0,
            latched,
            locked,
            group: 0,
        })
    }

    /// Forces num/caps lock bits selected by `mask` to `value`.
    pub fn set_locks(&mut self, mask: KeyboardLocks, value: KeyboardLocks) {
        let mut mods_locked = self.state.serialize_mods(ModComponent::Locked);
        let num = mod_mask(self.info.mod2_mod);
        let caps = mod_mask(self.info.caps_mod);

        if mask.contains(KeyboardLocks::NUM_LOCK) {
            if value.contains(KeyboardLocks::NUM_LOCK) {
                mods_locked |= num;
            } else {
                mods_locked &= !num;
            }
        }
        if mask.contains(KeyboardLocks::CAPS_LOCK) {
            if value.contains(KeyboardLocks::CAPS_LOCK) {
                mods_locked |= caps;
            } else {
                mods_locked &= !caps;
            }
        }

        let depressed = self.state.serialize_mods(ModComponent::Depressed);
        let latched = self.state.serialize_mods(ModComponent::Latched);
        let group = self.state.serialize_layout();
        self.state.update_mask(depressed, latched, mods_locked, group);
    }
}
