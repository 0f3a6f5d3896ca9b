//! Node/edge projection of the entity store, shared with the layout worker.
//!
//! Structural mutations and user moves mark the layout dirty through the
//! graph's [`LayoutSignal`]; moves committed by the layout itself do not.

mod edge;
mod maintainer;
mod node;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use eframe::egui::{Rect, Vec2, pos2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::CanvasConfig;
use crate::error::{CoreError, Result};
use crate::layout::LayoutSignal;
use crate::model::{EdgeId, EntityId, IdCounter, NodeId, Ranking};

pub use edge::{Edge, NodePair};
pub use maintainer::StructureMaintainer;
pub(crate) use node::body_at;
pub use node::{HIGHLIGHT_GENERIC, HIGHLIGHT_NONE, Node, NodeKind};

/// Receives repaint requests for nodes. Implemented by views.
///
/// Callbacks run while the graph lock is held, so implementations must not
/// lock the graph themselves.
pub trait RenderFeedback: Send + Sync {
    fn node_moved(&self, _node: NodeId, _position: Vec2) {}
    fn node_changed(&self, _node: NodeId) {}
    fn structure_changed(&self) {}
}

pub type SharedGraph = Arc<Mutex<Graph>>;

/// Locks the graph, recovering from a poisoned lock. Node state is plain
/// positions and flags, so a panicked writer cannot leave it unusable.
pub fn lock_graph(graph: &SharedGraph) -> MutexGuard<'_, Graph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    by_kind: HashMap<NodeKind, NodeId>,
    edges: BTreeMap<EdgeId, Edge>,
    by_pair: HashMap<NodePair, EdgeId>,
    incident: HashMap<NodeId, BTreeSet<EdgeId>>,
    selected: Option<NodeId>,
    bounds: Rect,
    closed_size: Vec2,
    open_size: Vec2,
    open_weight: f32,
    node_ids: IdCounter,
    edge_ids: IdCounter,
    rng: StdRng,
    signal: Arc<LayoutSignal>,
    feedback: Option<Arc<dyn RenderFeedback>>,
}

impl Graph {
    pub fn new(canvas: &CanvasConfig, open_weight: f32) -> Self {
        let rng = match canvas.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            nodes: BTreeMap::new(),
            by_kind: HashMap::new(),
            edges: BTreeMap::new(),
            by_pair: HashMap::new(),
            incident: HashMap::new(),
            selected: None,
            bounds: Rect::from_min_size(pos2(0.0, 0.0), vec2(canvas.width, canvas.height)),
            closed_size: vec2(canvas.closed_size[0], canvas.closed_size[1]),
            open_size: vec2(canvas.open_size[0], canvas.open_size[1]),
            open_weight: open_weight.max(1.0),
            node_ids: IdCounter::default(),
            edge_ids: IdCounter::default(),
            rng,
            signal: Arc::new(LayoutSignal::default()),
            feedback: None,
        }
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn signal(&self) -> Arc<LayoutSignal> {
        Arc::clone(&self.signal)
    }

    pub fn set_feedback(&mut self, feedback: Option<Arc<dyn RenderFeedback>>) {
        self.feedback = feedback;
    }

    fn touch(&self) {
        self.signal.mark_dirty();
    }

    fn structure_changed(&self) {
        self.touch();
        if let Some(feedback) = &self.feedback {
            feedback.structure_changed();
        }
    }

    fn node_changed(&self, id: NodeId) {
        if let Some(feedback) = &self.feedback {
            feedback.node_changed(id);
        }
    }

    // Canvas

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds != bounds {
            self.bounds = bounds;
            self.touch();
        }
    }

    /// Keeps a node body of `size` centred at `center` fully inside the canvas.
    pub fn clamp_to_frame(&self, center: Vec2, size: Vec2) -> Vec2 {
        let half = size * 0.5;
        let min = self.bounds.min;
        let max = self.bounds.max;
        let clamp_axis = |value: f32, low: f32, high: f32| {
            if low > high {
                (low + high) * 0.5
            } else {
                value.clamp(low, high)
            }
        };
        vec2(
            clamp_axis(center.x, min.x + half.x, max.x - half.x),
            clamp_axis(center.y, min.y + half.y, max.y - half.y),
        )
    }

    // Nodes

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_for(&self, kind: NodeKind) -> Option<NodeId> {
        self.by_kind.get(&kind).copied()
    }

    /// Creates the node for `kind` at a random spot on the canvas, or returns
    /// the existing one.
    pub fn add_node(&mut self, kind: NodeKind, label: impl Into<String>) -> NodeId {
        if let Some(existing) = self.node_for(kind) {
            return existing;
        }

        let id = NodeId(self.node_ids.allocate());
        let half = self.closed_size * 0.5;
        let min = self.bounds.min;
        let max = self.bounds.max;
        let x = if max.x - half.x > min.x + half.x {
            self.rng.gen_range((min.x + half.x)..(max.x - half.x))
        } else {
            self.bounds.center().x
        };
        let y = if max.y - half.y > min.y + half.y {
            self.rng.gen_range((min.y + half.y)..(max.y - half.y))
        } else {
            self.bounds.center().y
        };
        let position = vec2(x.round(), y.round());

        let node = Node::new(
            id,
            kind,
            label.into(),
            position,
            self.closed_size,
            self.open_size,
        );
        trace!(node = %id, ?kind, "node added");
        self.nodes.insert(id, node);
        self.by_kind.insert(kind, id);
        self.incident.insert(id, BTreeSet::new());
        self.structure_changed();
        id
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.by_kind.remove(&node.kind);
        let touching = self.incident.remove(&id).unwrap_or_default();
        for edge in touching {
            self.drop_edge(edge);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        trace!(node = %id, "node removed");
        self.structure_changed();
        Some(node)
    }

    /// Moves a node on the user's behalf. Marks the layout dirty.
    pub fn move_node(&mut self, id: NodeId, position: Vec2) -> Result<()> {
        let size = self.nodes.get(&id).ok_or(CoreError::UnknownNode(id))?.size();
        let position = self.clamp_to_frame(position, size);
        self.commit_move(id, position);
        self.touch();
        Ok(())
    }

    /// Applies a move computed by the layout and notifies views.
    pub(crate) fn commit_move(&mut self, id: NodeId, position: Vec2) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.previous_position = node.position;
        node.position = position;
        if let Some(feedback) = &self.feedback {
            feedback.node_moved(id, position);
        }
    }

    pub(crate) fn set_velocity(&mut self, id: NodeId, velocity: Vec2) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.velocity = velocity;
        }
    }

    pub fn pin_node(&mut self, id: NodeId, pinned: bool) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(CoreError::UnknownNode(id))?;
        node.pinned = pinned;
        node.velocity = Vec2::ZERO;
        self.node_changed(id);
        self.touch();
        Ok(())
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn set_selected(&mut self, id: Option<NodeId>) -> Result<()> {
        if let Some(id) = id
            && !self.nodes.contains_key(&id)
        {
            return Err(CoreError::UnknownNode(id));
        }
        if self.selected == id {
            return Ok(());
        }
        let previous = self.selected;
        self.selected = id;
        for changed in previous.into_iter().chain(id) {
            self.node_changed(changed);
        }
        self.touch();
        Ok(())
    }

    /// Opens or closes a node. Open nodes are larger, heavier, and take part
    /// in collision avoidance.
    pub fn set_open(&mut self, id: NodeId, open: bool) -> Result<()> {
        let open_weight = self.open_weight;
        let node = self.nodes.get_mut(&id).ok_or(CoreError::UnknownNode(id))?;
        if node.open == open {
            return Ok(());
        }
        node.open = open;
        node.weight = if open { open_weight } else { 1.0 };
        let size = node.size();
        let position = node.position;
        let clamped = self.clamp_to_frame(position, size);
        if clamped != position {
            self.commit_move(id, clamped);
        }
        self.node_changed(id);
        self.touch();
        Ok(())
    }

    pub fn set_highlight(&mut self, id: NodeId, code: u16) {
        if let Some(node) = self.nodes.get_mut(&id)
            && node.highlight != code
        {
            node.highlight = code;
            self.node_changed(id);
        }
    }

    /// Mirrors the document's ranking onto its node. Purely visual.
    pub fn set_ranking(&mut self, id: NodeId, ranking: Ranking, recency: u32) {
        if let Some(node) = self.nodes.get_mut(&id)
            && (node.ranking != ranking || node.recency != recency)
        {
            node.ranking = ranking;
            node.recency = recency;
            self.node_changed(id);
        }
    }

    pub(crate) fn restore_node_state(
        &mut self,
        id: NodeId,
        position: Vec2,
        open: bool,
        pinned: bool,
    ) {
        let open_weight = self.open_weight;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            node.previous_position = position;
            node.open = open;
            node.pinned = pinned;
            node.weight = if open { open_weight } else { 1.0 };
        }
        self.touch();
    }

    // Edges

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.by_pair
            .get(&NodePair::new(a, b))
            .and_then(|id| self.edges.get(id))
    }

    pub fn incident_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.incident
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.incident.get(&node).map_or(0, BTreeSet::len)
    }

    /// Adds `entity` to the edge between `a` and `b`, creating the edge if
    /// the pair has none. At most one edge ever exists per pair.
    pub fn add_edge_entity(
        &mut self,
        a: NodeId,
        b: NodeId,
        entity: EntityId,
        strength: f64,
    ) -> Result<EdgeId> {
        if a == b {
            return Err(CoreError::SelfLink(a.to_string()));
        }
        for node in [a, b] {
            if !self.nodes.contains_key(&node) {
                return Err(CoreError::UnknownNode(node));
            }
        }

        let pair = NodePair::new(a, b);
        let (id, created) = match self.by_pair.get(&pair) {
            Some(id) => (*id, false),
            None => {
                let id = EdgeId(self.edge_ids.allocate());
                self.edges.insert(id, Edge::new(id, pair));
                self.by_pair.insert(pair, id);
                for node in [a, b] {
                    self.incident.entry(node).or_default().insert(id);
                }
                (id, true)
            }
        };

        let changed = self
            .edges
            .get_mut(&id)
            .is_some_and(|edge| edge.insert_entity(entity, strength));
        if created {
            trace!(edge = %id, %a, %b, "edge added");
            self.structure_changed();
        } else if changed {
            self.touch();
        }
        Ok(id)
    }

    /// Removes `entity` from one edge, deleting the edge once it carries
    /// nothing. Returns whether the edge was deleted.
    pub fn remove_edge_entity(&mut self, id: EdgeId, entity: EntityId) -> bool {
        let Some(edge) = self.edges.get_mut(&id) else {
            return false;
        };
        if !edge.remove_entity(entity) {
            return false;
        }
        if edge.entity_count() == 0 {
            self.drop_edge(id);
            self.structure_changed();
            true
        } else {
            self.touch();
            false
        }
    }

    /// Strips `entity` from every edge touching `node`.
    pub fn remove_entity_at_node(&mut self, node: NodeId, entity: EntityId) {
        let carrying = self
            .incident_edges(node)
            .filter(|edge| edge.carries(entity))
            .map(|edge| edge.id)
            .collect::<Vec<_>>();
        for id in carrying {
            self.remove_edge_entity(id, entity);
        }
    }

    /// Strips `entity` from every edge in the graph.
    pub fn remove_entity_everywhere(&mut self, entity: EntityId) {
        let carrying = self
            .edges
            .values()
            .filter(|edge| edge.carries(entity))
            .map(|edge| edge.id)
            .collect::<Vec<_>>();
        for id in carrying {
            self.remove_edge_entity(id, entity);
        }
    }

    pub fn update_entity_strength(&mut self, entity: EntityId, strength: f64) {
        let mut changed = false;
        for edge in self.edges.values_mut() {
            changed |= edge.update_entity(entity, strength);
        }
        if changed {
            self.touch();
        }
    }

    fn drop_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.remove(&id) else {
            return;
        };
        self.by_pair.remove(&edge.pair());
        for node in [edge.pair().first(), edge.pair().second()] {
            if let Some(incident) = self.incident.get_mut(&node) {
                incident.remove(&id);
            }
        }
        trace!(edge = %id, "edge removed");
    }
}
