use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! serial_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

serial_id!(DocumentId, "doc");
serial_id!(EntityId, "entity");
serial_id!(SearchId, "search");
serial_id!(NodeId, "node");
serial_id!(EdgeId, "edge");

/// Monotonic serial number source for one kind of identifier.
#[derive(Clone, Debug, Default)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Ensures ids handed out afterwards never collide with `max`.
    pub fn advance_past(&mut self, max: u32) {
        if self.next <= max {
            self.next = max.saturating_add(1);
        }
    }
}

/// Per-store id allocator. Each open project owns one, so independent
/// projects and tests never share counters.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    documents: IdCounter,
    entities: IdCounter,
    searches: IdCounter,
}

impl IdAllocator {
    pub fn next_document(&mut self) -> DocumentId {
        DocumentId(self.documents.allocate())
    }

    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.entities.allocate())
    }

    pub fn next_search(&mut self) -> SearchId {
        SearchId(self.searches.allocate())
    }

    pub fn reserve_document(&mut self, id: DocumentId) {
        self.documents.advance_past(id.0);
    }

    pub fn reserve_entity(&mut self, id: EntityId) {
        self.entities.advance_past(id.0);
    }

    pub fn reserve_search(&mut self, id: SearchId) {
        self.searches.advance_past(id.0);
    }
}
