use std::collections::HashSet;

use starspire::Graph;
use starspire::model::{EdgeId, NodeId};
use starspire::store::EntityStore;

/// Nodes and edges adjacent to the selection.
#[derive(Default)]
pub(super) struct Neighborhood {
    pub nodes: HashSet<NodeId>,
    pub edges: HashSet<EdgeId>,
}

impl Neighborhood {
    pub(super) fn of(graph: &Graph, selected: NodeId) -> Self {
        let mut neighborhood = Self::default();
        neighborhood.nodes.insert(selected);
        for edge in graph.incident_edges(selected) {
            neighborhood.edges.insert(edge.id);
            if let Some(other) = edge.other(selected) {
                neighborhood.nodes.insert(other);
            }
        }
        neighborhood
    }

    pub(super) fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A neighbour of the selected node as listed in the details panel.
pub(super) struct RelatedEntry {
    pub node: NodeId,
    pub label: String,
    pub strength: f64,
    pub shared: Vec<String>,
}

/// Neighbours of `selected`, strongest connection first, with the names of
/// the entities each edge carries.
pub(super) fn related_entries(
    graph: &Graph,
    store: &EntityStore,
    selected: NodeId,
) -> Vec<RelatedEntry> {
    let mut related = graph
        .incident_edges(selected)
        .filter_map(|edge| {
            let other = edge.other(selected)?;
            let node = graph.node(other)?;
            let mut shared = edge
                .entities()
                .filter_map(|entity| store.entity(entity).map(|entity| entity.name().to_owned()))
                .collect::<Vec<_>>();
            shared.sort();
            Some(RelatedEntry {
                node: other,
                label: node.label.clone(),
                strength: edge.strength(),
                shared,
            })
        })
        .collect::<Vec<_>>();

    related.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then_with(|| a.label.cmp(&b.label))
    });
    related
}
