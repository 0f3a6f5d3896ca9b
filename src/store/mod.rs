//! In-memory registry of documents, entities, searches and their links.
//!
//! Every mutation queues a [`StoreEvent`]. The owner drains the queue with
//! [`EntityStore::take_events`] and fans the events out to the graph
//! maintainer; views can [`EntityStore::subscribe`] for copies.

mod energy;
mod events;

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::Receiver;

use tracing::{debug, trace};

use crate::error::{CoreError, Result};
use crate::model::{
    Document, DocumentId, Entity, EntityId, Highlight, IdAllocator, Ranking, Search, SearchId,
    StrengthChange, entity_key,
};

pub use energy::Redistribution;
pub use events::StoreEvent;
use events::EventQueue;

#[derive(Debug)]
pub struct EntityStore {
    ids: IdAllocator,
    documents: BTreeMap<DocumentId, Document>,
    entities: BTreeMap<EntityId, Entity>,
    entity_index: HashMap<String, EntityId>,
    searches: BTreeMap<SearchId, Search>,
    events: EventQueue,
    default_strength: f64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl EntityStore {
    pub fn new(default_strength: f64) -> Self {
        Self {
            ids: IdAllocator::default(),
            documents: BTreeMap::new(),
            entities: BTreeMap::new(),
            entity_index: HashMap::new(),
            searches: BTreeMap::new(),
            events: EventQueue::default(),
            default_strength: default_strength.max(0.0),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain()
    }

    pub fn has_pending_events(&self) -> bool {
        self.events.pending_len() > 0
    }

    // Documents

    /// Adds a hidden document. The ranker decides when it becomes visible.
    pub fn add_document(&mut self, name: impl Into<String>, content: impl Into<String>) -> DocumentId {
        let id = self.ids.next_document();
        let document = Document::new(id, name.into(), content.into());
        debug!(doc = %id, name = %document.name, "document added");
        self.documents.insert(id, document);
        self.events.push(StoreEvent::DocumentAdded(id));
        id
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn visible_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values().filter(|document| document.visible)
    }

    /// Returns whether the flag changed. Only a change emits an event.
    pub fn set_document_visible(&mut self, id: DocumentId, visible: bool) -> Result<bool> {
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(CoreError::UnknownDocument(id))?;
        if document.visible == visible {
            return Ok(false);
        }
        document.visible = visible;
        if visible {
            document.recency = 0;
        }
        trace!(doc = %id, visible, "document visibility changed");
        self.events.push(StoreEvent::DocumentModified(id));
        Ok(true)
    }

    pub(crate) fn set_document_ranking(&mut self, id: DocumentId, ranking: Ranking) {
        if let Some(document) = self.documents.get_mut(&id) {
            document.ranking = ranking;
        }
    }

    /// Ages every visible document by one query cycle.
    pub fn age_visible_documents(&mut self) {
        for document in self.documents.values_mut().filter(|document| document.visible) {
            document.recency = document.recency.saturating_add(1);
        }
    }

    /// Sum of the strengths of the document's linked entities.
    pub fn total_entity_strength(&self, id: DocumentId) -> f64 {
        self.documents
            .get(&id)
            .map(|document| {
                document
                    .entities
                    .iter()
                    .filter_map(|entity| self.entities.get(entity))
                    .map(Entity::strength)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Recomputes and caches [`Self::total_entity_strength`].
    pub fn refresh_total_strength(&mut self, id: DocumentId) -> f64 {
        let total = self.total_entity_strength(id);
        if let Some(document) = self.documents.get_mut(&id) {
            document.total_strength = total;
        }
        total
    }

    pub fn set_document_notes(&mut self, id: DocumentId, notes: impl Into<String>) -> Result<()> {
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(CoreError::UnknownDocument(id))?;
        document.notes = notes.into();
        self.events.push(StoreEvent::DocumentModified(id));
        Ok(())
    }

    /// Records a highlight and returns the highlighted text.
    pub fn add_highlight(&mut self, id: DocumentId, start: usize, end: usize) -> Result<String> {
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(CoreError::UnknownDocument(id))?;
        let content = document.content();
        if start >= end || content.get(start..end).is_none() {
            return Err(CoreError::InvalidHighlight {
                document: id,
                start,
                end,
                len: content.len(),
            });
        }
        let text = content[start..end].to_owned();

        let highlight = Highlight { start, end };
        if !document.highlights.contains(&highlight) {
            document.highlights.push(highlight);
            document.highlights.sort_by_key(|highlight| (highlight.start, highlight.end));
        }
        self.events.push(StoreEvent::DocumentModified(id));
        Ok(text)
    }

    /// Unlinks every entity first so dependent edges are cleaned up, then
    /// drops the document.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<Document> {
        let linked = self
            .documents
            .get(&id)
            .ok_or(CoreError::UnknownDocument(id))?
            .entities
            .iter()
            .copied()
            .collect::<Vec<_>>();
        for entity in linked {
            self.unlink_document(entity, id)?;
        }

        let document = self
            .documents
            .remove(&id)
            .ok_or(CoreError::UnknownDocument(id))?;
        debug!(doc = %id, "document removed");
        self.events.push(StoreEvent::DocumentRemoved(id));
        Ok(document)
    }

    // Entities

    /// Get-or-create by case-insensitive name. An existing entity is returned
    /// unchanged apart from picking up the soft-data flag.
    pub fn add_entity(&mut self, name: &str, soft_data: bool) -> EntityId {
        let key = entity_key(name);
        if let Some(&id) = self.entity_index.get(&key) {
            if soft_data && let Some(entity) = self.entities.get_mut(&id) {
                entity.soft_data = true;
            }
            return id;
        }

        let id = self.ids.next_entity();
        let entity = Entity::new(id, name.trim().to_owned(), self.default_strength, soft_data);
        debug!(entity = %id, name = %entity.name(), soft_data, "entity added");
        self.entity_index.insert(key, id);
        self.entities.insert(id, entity);
        self.events.push(StoreEvent::EntityAdded(id));
        id
    }

    pub fn get_or_create_entity(&mut self, name: &str) -> EntityId {
        self.add_entity(name, false)
    }

    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.entity_index.get(&entity_key(name)).copied()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Sum of all entity strengths: the quasi-conserved system energy.
    pub fn total_strength(&self) -> f64 {
        self.entities.values().map(Entity::strength).sum()
    }

    /// Returns `true` when a new link was created. Repeated calls are no-ops.
    pub fn link_document(&mut self, entity: EntityId, document: DocumentId) -> Result<bool> {
        if !self.documents.contains_key(&document) {
            return Err(CoreError::UnknownDocument(document));
        }
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(CoreError::UnknownEntity(entity))?;
        if !target.documents.insert(document) {
            return Ok(false);
        }
        if let Some(doc) = self.documents.get_mut(&document) {
            doc.entities.insert(entity);
        }
        self.events
            .push(StoreEvent::EntityDocumentLinked { entity, document });
        Ok(true)
    }

    pub fn unlink_document(&mut self, entity: EntityId, document: DocumentId) -> Result<bool> {
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(CoreError::UnknownEntity(entity))?;
        if !target.documents.remove(&document) {
            return Ok(false);
        }
        if let Some(doc) = self.documents.get_mut(&document) {
            doc.entities.remove(&entity);
        }
        self.events
            .push(StoreEvent::EntityDocumentUnlinked { entity, document });
        Ok(true)
    }

    pub fn link_search(&mut self, entity: EntityId, search: SearchId) -> Result<bool> {
        if !self.searches.contains_key(&search) {
            return Err(CoreError::UnknownSearch(search));
        }
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(CoreError::UnknownEntity(entity))?;
        if !target.searches.insert(search) {
            return Ok(false);
        }
        self.events
            .push(StoreEvent::EntitySearchLinked { entity, search });
        Ok(true)
    }

    pub fn unlink_search(&mut self, entity: EntityId, search: SearchId) -> Result<bool> {
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(CoreError::UnknownEntity(entity))?;
        if !target.searches.remove(&search) {
            return Ok(false);
        }
        self.events
            .push(StoreEvent::EntitySearchUnlinked { entity, search });
        Ok(true)
    }

    /// Sets an entity's strength.
    ///
    /// With [`StrengthChange::Conserving`] an increase is taken evenly from
    /// every other entity so the system total stays put; a decrease is applied
    /// on its own and the total drops. [`StrengthChange::Absolute`] never
    /// redistributes.
    pub fn set_entity_strength(
        &mut self,
        id: EntityId,
        value: f64,
        change: StrengthChange,
    ) -> Result<Redistribution> {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CoreError::UnknownEntity(id))?;
        let delta = value - entity.strength;
        entity.strength = value;
        self.events.push(StoreEvent::EntityModified(id));

        // TODO: decide with product whether a decrease should hand the freed
        // strength back to the other entities.
        if change == StrengthChange::Absolute || delta <= 0.0 {
            return Ok(Redistribution {
                requested: delta.max(0.0),
                ..Redistribution::default()
            });
        }

        let outcome = energy::redistribute(&mut self.entities, id, delta);
        for touched in &outcome.touched {
            self.events.push(StoreEvent::EntityModified(*touched));
        }
        Ok(outcome)
    }

    pub fn increase_entity_strength(&mut self, id: EntityId, amount: f64) -> Result<Redistribution> {
        let current = self
            .entities
            .get(&id)
            .ok_or(CoreError::UnknownEntity(id))?
            .strength;
        self.set_entity_strength(id, current + amount.max(0.0), StrengthChange::Conserving)
    }

    /// Unlinks the entity everywhere, then drops it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let entity = self.entities.get(&id).ok_or(CoreError::UnknownEntity(id))?;
        let documents = entity.documents.iter().copied().collect::<Vec<_>>();
        let searches = entity.searches.iter().copied().collect::<Vec<_>>();

        for document in documents {
            self.unlink_document(id, document)?;
        }
        for search in searches {
            self.unlink_search(id, search)?;
        }

        let entity = self.entities.remove(&id).ok_or(CoreError::UnknownEntity(id))?;
        self.entity_index.remove(entity.key());
        debug!(entity = %id, name = %entity.name(), "entity removed");
        self.events.push(StoreEvent::EntityRemoved(id));
        Ok(entity)
    }

    // Searches

    /// Adds a search anchored to the (soft) entity named by the query.
    pub fn add_search(&mut self, query: &str, hue: f32) -> Result<SearchId> {
        let entity = self.add_entity(query, true);
        let id = self.ids.next_search();
        self.searches.insert(
            id,
            Search {
                id,
                query: query.trim().to_owned(),
                hue: hue.rem_euclid(360.0),
                result_count: 0,
                entity,
            },
        );
        debug!(search = %id, query, "search added");
        self.events.push(StoreEvent::SearchAdded(id));
        self.link_search(entity, id)?;
        Ok(id)
    }

    pub fn search(&self, id: SearchId) -> Option<&Search> {
        self.searches.get(&id)
    }

    pub fn searches(&self) -> impl Iterator<Item = &Search> {
        self.searches.values()
    }

    pub fn search_count(&self) -> usize {
        self.searches.len()
    }

    pub fn set_search_result_count(&mut self, id: SearchId, count: usize) -> Result<()> {
        let search = self
            .searches
            .get_mut(&id)
            .ok_or(CoreError::UnknownSearch(id))?;
        search.result_count = count;
        Ok(())
    }

    pub fn remove_search(&mut self, id: SearchId) -> Result<Search> {
        let entity = self
            .searches
            .get(&id)
            .ok_or(CoreError::UnknownSearch(id))?
            .entity;
        if self.entities.contains_key(&entity) {
            self.unlink_search(entity, id)?;
        }
        let search = self
            .searches
            .remove(&id)
            .ok_or(CoreError::UnknownSearch(id))?;
        debug!(search = %id, "search removed");
        self.events.push(StoreEvent::SearchRemoved(id));
        Ok(search)
    }

    // Restore support. These bypass id allocation and reserve the given ids.

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore_document(
        &mut self,
        id: DocumentId,
        name: String,
        content: String,
        notes: String,
        highlights: Vec<Highlight>,
        visible: bool,
        ranking: Ranking,
        recency: u32,
    ) {
        self.ids.reserve_document(id);
        let mut document = Document::new(id, name, content);
        document.notes = notes;
        document.highlights = highlights;
        document.visible = visible;
        document.ranking = ranking;
        document.recency = recency;
        self.documents.insert(id, document);
        self.events.push(StoreEvent::DocumentAdded(id));
    }

    pub(crate) fn restore_entity(&mut self, id: EntityId, name: String, strength: f64, soft_data: bool) {
        self.ids.reserve_entity(id);
        let entity = Entity::new(id, name, strength.max(0.0), soft_data);
        self.entity_index.insert(entity.key().to_owned(), id);
        self.entities.insert(id, entity);
        self.events.push(StoreEvent::EntityAdded(id));
    }

    pub(crate) fn restore_search(
        &mut self,
        id: SearchId,
        query: String,
        hue: f32,
        result_count: usize,
        entity: EntityId,
    ) {
        self.ids.reserve_search(id);
        self.searches.insert(
            id,
            Search {
                id,
                query,
                hue,
                result_count,
                entity,
            },
        );
        self.events.push(StoreEvent::SearchAdded(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_docs(texts: &[&str]) -> (EntityStore, Vec<DocumentId>) {
        let mut store = EntityStore::new(1.0);
        let ids = texts
            .iter()
            .enumerate()
            .map(|(index, text)| store.add_document(format!("doc{index}"), *text))
            .collect();
        store.take_events();
        (store, ids)
    }

    #[test]
    fn entity_lookup_is_case_insensitive() {
        let mut store = EntityStore::default();
        let first = store.add_entity("Alpha", false);
        let second = store.get_or_create_entity("  alpha ");
        assert_eq!(first, second);
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.take_events(), vec![StoreEvent::EntityAdded(first)]);
    }

    #[test]
    fn linking_is_idempotent() {
        let (mut store, docs) = store_with_docs(&["alpha"]);
        let entity = store.add_entity("alpha", false);
        store.take_events();

        assert!(store.link_document(entity, docs[0]).unwrap());
        assert!(!store.link_document(entity, docs[0]).unwrap());
        assert_eq!(store.take_events().len(), 1);
        assert!(store.document(docs[0]).unwrap().entities().contains(&entity));
    }

    #[test]
    fn removing_an_entity_unlinks_before_removal() {
        let (mut store, docs) = store_with_docs(&["alpha", "alpha beta"]);
        let entity = store.add_entity("alpha", false);
        store.link_document(entity, docs[0]).unwrap();
        store.link_document(entity, docs[1]).unwrap();
        store.take_events();

        store.remove_entity(entity).unwrap();
        let events = store.take_events();
        assert_eq!(
            events,
            vec![
                StoreEvent::EntityDocumentUnlinked { entity, document: docs[0] },
                StoreEvent::EntityDocumentUnlinked { entity, document: docs[1] },
                StoreEvent::EntityRemoved(entity),
            ]
        );
        assert!(store.document(docs[1]).unwrap().entities().is_empty());
        assert!(store.find_entity("alpha").is_none());
    }

    #[test]
    fn increase_is_conserved_and_decrease_is_not() {
        let mut store = EntityStore::new(2.0);
        let ids = (0..5)
            .map(|index| store.add_entity(&format!("e{index}"), false))
            .collect::<Vec<_>>();
        assert!((store.total_strength() - 10.0).abs() < 1e-9);

        store
            .set_entity_strength(ids[0], 4.0, StrengthChange::Conserving)
            .unwrap();
        assert!((store.total_strength() - 10.0).abs() < 1e-9);
        assert!((store.entity(ids[1]).unwrap().strength() - 1.5).abs() < 1e-9);

        store
            .set_entity_strength(ids[0], 1.0, StrengthChange::Conserving)
            .unwrap();
        assert!((store.total_strength() - 7.0).abs() < 1e-9);
        assert!((store.entity(ids[1]).unwrap().strength() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn visibility_events_only_fire_on_change() {
        let (mut store, docs) = store_with_docs(&["text"]);
        assert!(store.set_document_visible(docs[0], true).unwrap());
        assert!(!store.set_document_visible(docs[0], true).unwrap());
        assert_eq!(store.take_events(), vec![StoreEvent::DocumentModified(docs[0])]);
    }

    #[test]
    fn highlight_rejects_ranges_outside_the_text() {
        let (mut store, docs) = store_with_docs(&["hello world"]);
        assert_eq!(store.add_highlight(docs[0], 6, 11).unwrap(), "world");
        let error = store.add_highlight(docs[0], 6, 40).unwrap_err();
        assert_eq!(error.kind(), crate::error::ErrorKind::PreconditionViolated);
    }

    #[test]
    fn searches_are_anchored_to_a_soft_entity() {
        let mut store = EntityStore::default();
        let search = store.add_search("Beta", 120.0).unwrap();
        let entity = store.search(search).unwrap().entity;
        assert!(store.entity(entity).unwrap().soft_data);
        assert!(store.entity(entity).unwrap().searches().contains(&search));

        store.remove_search(search).unwrap();
        assert!(store.entity(entity).unwrap().searches().is_empty());
    }
}
