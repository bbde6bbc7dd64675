//! Destroy-notification registry
//!
//! Focus targets and cursor sprites are weak references. Whoever holds one
//! subscribes to its destruction and keeps the returned token; the token is
//! cancelled before re-subscribing elsewhere so a target never fires twice
//! into the same holder.

use crate::object::{SurfaceId, ToolId, ViewId};
use log::trace;
use std::collections::HashMap;

/// Something whose destruction can be watched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Watched {
    View(ViewId),
    Surface(SurfaceId),
}

/// Holder of a weak reference that must be cleared on destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscriber {
    PointerFocus,
    PointerSprite,
    KeyboardFocus,
    SavedKeyboardFocus,
    TouchFocus,
    ToolFocus(ToolId),
    ToolSprite(ToolId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

#[derive(Debug, Default)]
pub struct DestroyListeners {
    next: u64,
    by_token: HashMap<ListenerToken, (Watched, Subscriber)>,
    by_target: HashMap<Watched, Vec<ListenerToken>>,
}

impl DestroyListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, watched: Watched, subscriber: Subscriber) -> ListenerToken {
        self.next += 1;
        let token = ListenerToken(self.next);
        self.by_token.insert(token, (watched, subscriber));
        self.by_target.entry(watched).or_default().push(token);
        trace!("{:?} watches {:?}", subscriber, watched);
        token
    }

    /// Returns false if the token already fired or was cancelled.
    pub fn cancel(&mut self, token: ListenerToken) -> bool {
        let Some((watched, _)) = self.by_token.remove(&token) else {
            return false;
        };
        if let Some(tokens) = self.by_target.get_mut(&watched) {
            tokens.retain(|t| *t != token);
            if tokens.is_empty() {
                self.by_target.remove(&watched);
            }
        }
        true
    }

    /// Cancels the token in `slot`, if any, leaving `None` behind.
    pub fn cancel_slot(&mut self, slot: &mut Option<ListenerToken>) {
        if let Some(token) = slot.take() {
            self.cancel(token);
        }
    }

    /// Consumes every listener on `watched`, in subscription order.
    pub fn fire(&mut self, watched: Watched) -> Vec<(ListenerToken, Subscriber)> {
        let tokens = self.by_target.remove(&watched).unwrap_or_default();
        tokens
            .into_iter()
            .filter_map(|token| {
                self.by_token
                    .remove(&token)
                    .map(|(_, subscriber)| (token, subscriber))
            })
            .collect()
    }

    pub fn is_watching(&self, token: ListenerToken) -> bool {
        self.by_token.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
