//! Identifiers for clients, surfaces, outputs and protocol objects

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A connected client
    ClientId,
    "client"
);
id_type!(
    /// A surface, the thing clients attach buffers to and receive focus on
    SurfaceId,
    "surface"
);
id_type!(
    /// One on-screen instance of a surface
    ViewId,
    "view"
);
id_type!(OutputId, "output");
id_type!(
    /// Protocol object id, unique within one client
    ObjectId,
    "object"
);
id_type!(TabletId, "tablet");
id_type!(ToolId, "tool");

/// A protocol object as addressed by the server: owning client plus id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub client: ClientId,
    pub id: ObjectId,
}

impl ObjectRef {
    pub const fn new(client: ClientId, id: ObjectId) -> Self {
        Self { client, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.client)
    }
}

/// First id of the server-allocated range.
pub const SERVER_ID_START: u32 = 0xff00_0000;

/// Hands out ids for objects the server creates on a client's behalf
#[derive(Debug, Clone)]
pub struct ObjectIdAllocator {
    next: u32,
    end: u32,
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIdAllocator {
    pub fn new() -> Self {
        Self::with_range(SERVER_ID_START, u32::MAX)
    }

    /// Allocator over the inclusive id range `start..=end`.
    pub fn with_range(start: u32, end: u32) -> Self {
        Self { next: start, end }
    }

    /// Next free id, or `None` once the range is used up.
    pub fn allocate(&mut self) -> Option<ObjectId> {
        if self.next > self.end || self.next == 0 {
            return None;
        }
        let id = ObjectId(self.next);
        self.next = self.next.wrapping_add(1);
        Some(id)
    }

    pub fn remaining(&self) -> u64 {
        if self.next == 0 || self.next > self.end {
            0
        } else {
            u64::from(self.end - self.next) + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_stops_at_end_of_range() {
        let mut ids = ObjectIdAllocator::with_range(u32::MAX - 1, u32::MAX);
        assert_eq!(ids.allocate(), Some(ObjectId(u32::MAX - 1)));
        assert_eq!(ids.allocate(), Some(ObjectId(u32::MAX)));
        assert_eq!(ids.allocate(), None);
        assert_eq!(ids.remaining(), 0);
    }

    #[test]
    fn display_names() {
        let object = ObjectRef::new(ClientId(3), ObjectId(12));
        assert_eq!(object.to_string(), "object#12@client#3");
    }
}
