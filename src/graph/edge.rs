use std::collections::BTreeMap;

use crate::model::{EdgeId, EntityId, NodeId};

/// Unordered node pair; `(a, b)` and `(b, a)` normalise to the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePair(NodeId, NodeId);

impl NodePair {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn first(self) -> NodeId {
        self.0
    }

    pub fn second(self) -> NodeId {
        self.1
    }
}

/// A derived link carrying every entity its two endpoints share.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id: EdgeId,
    pair: NodePair,
    entities: BTreeMap<EntityId, f64>,
    strength: f64,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, pair: NodePair) -> Self {
        Self {
            id,
            pair,
            entities: BTreeMap::new(),
            strength: 0.0,
        }
    }

    pub fn pair(&self) -> NodePair {
        self.pair
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.pair.0 == node || self.pair.1 == node
    }

    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.pair.0 == node {
            Some(self.pair.1)
        } else if self.pair.1 == node {
            Some(self.pair.0)
        } else {
            None
        }
    }

    /// Sum of the carried entities' strengths.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn carries(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub(crate) fn insert_entity(&mut self, entity: EntityId, strength: f64) -> bool {
        let inserted = self.entities.insert(entity, strength).is_none();
        self.recompute();
        inserted
    }

    pub(crate) fn remove_entity(&mut self, entity: EntityId) -> bool {
        let removed = self.entities.remove(&entity).is_some();
        self.recompute();
        removed
    }

    pub(crate) fn update_entity(&mut self, entity: EntityId, strength: f64) -> bool {
        match self.entities.get_mut(&entity) {
            Some(current) => {
                *current = strength;
                self.recompute();
                true
            }
            None => false,
        }
    }

    fn recompute(&mut self) {
        self.strength = self.entities.values().sum();
    }
}
