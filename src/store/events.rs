use std::sync::mpsc::{self, Receiver, Sender};

use crate::model::{DocumentId, EntityId, SearchId};

/// Change notification emitted by every store mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    DocumentAdded(DocumentId),
    /// Visibility, notes or highlights changed.
    DocumentModified(DocumentId),
    DocumentRemoved(DocumentId),
    EntityAdded(EntityId),
    /// Strength changed.
    EntityModified(EntityId),
    EntityRemoved(EntityId),
    EntityDocumentLinked { entity: EntityId, document: DocumentId },
    EntityDocumentUnlinked { entity: EntityId, document: DocumentId },
    EntitySearchLinked { entity: EntityId, search: SearchId },
    EntitySearchUnlinked { entity: EntityId, search: SearchId },
    SearchAdded(SearchId),
    SearchRemoved(SearchId),
}

/// Ordered queue of pending events plus the external subscriber list.
///
/// Events accumulate until the owner drains them; draining forwards a copy to
/// every live subscriber so views observe the same order the core does.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pending: Vec<StoreEvent>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: StoreEvent) {
        self.pending.push(event);
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn drain(&mut self) -> Vec<StoreEvent> {
        let events = std::mem::take(&mut self.pending);
        if !events.is_empty() && !self.subscribers.is_empty() {
            self.subscribers.retain(|subscriber| {
                events
                    .iter()
                    .all(|event| subscriber.send(event.clone()).is_ok())
            });
        }
        events
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
