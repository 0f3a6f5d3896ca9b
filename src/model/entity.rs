use std::collections::BTreeSet;

use super::{DocumentId, EntityId, SearchId};

/// How a strength change came about. Only the conservation policy differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrengthChange {
    /// Redistributes an increase across the other entities.
    Conserving,
    /// Sets the value outright; an explicit injection point.
    Absolute,
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    name: String,
    key: String,
    pub(crate) strength: f64,
    pub soft_data: bool,
    pub(crate) documents: BTreeSet<DocumentId>,
    pub(crate) searches: BTreeSet<SearchId>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, name: String, strength: f64, soft_data: bool) -> Self {
        let key = entity_key(&name);
        Self {
            id,
            name,
            key,
            strength,
            soft_data,
            documents: BTreeSet::new(),
            searches: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased identity key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn documents(&self) -> &BTreeSet<DocumentId> {
        &self.documents
    }

    pub fn searches(&self) -> &BTreeSet<SearchId> {
        &self.searches
    }
}

pub fn entity_key(name: &str) -> String {
    name.trim().to_lowercase()
}
