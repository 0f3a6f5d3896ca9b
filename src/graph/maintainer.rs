use tracing::{debug, warn};

use super::{Graph, NodeKind};
use crate::model::{DocumentId, EntityId, NodeId, SearchId};
use crate::store::{EntityStore, StoreEvent};

/// Keeps nodes and edges in step with the entity store.
///
/// Events are applied after the fact, so the store may already have moved on
/// (a linked document may be gone by the time its link event arrives). Every
/// handler re-checks the store's current state and only uses event payloads
/// for removals.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructureMaintainer;

impl StructureMaintainer {
    pub fn apply(&self, store: &EntityStore, graph: &mut Graph, event: &StoreEvent) {
        match *event {
            StoreEvent::DocumentAdded(id) | StoreEvent::DocumentModified(id) => {
                self.sync_document(store, graph, id);
            }
            StoreEvent::DocumentRemoved(id) => {
                if let Some(node) = graph.node_for(NodeKind::Document(id)) {
                    graph.remove_node(node);
                }
            }
            StoreEvent::EntityAdded(_) => {}
            StoreEvent::EntityModified(entity) => {
                if let Some(current) = store.entity(entity) {
                    graph.update_entity_strength(entity, current.strength());
                }
            }
            StoreEvent::EntityRemoved(entity) => graph.remove_entity_everywhere(entity),
            StoreEvent::EntityDocumentLinked { entity, document } => {
                let linked = store
                    .document(document)
                    .is_some_and(|doc| doc.entities().contains(&entity));
                if linked && let Some(node) = graph.node_for(NodeKind::Document(document)) {
                    self.connect_entity(store, graph, node, entity);
                }
            }
            StoreEvent::EntityDocumentUnlinked { entity, document } => {
                if let Some(node) = graph.node_for(NodeKind::Document(document)) {
                    graph.remove_entity_at_node(node, entity);
                }
            }
            StoreEvent::EntitySearchLinked { entity, search } => {
                let linked = store
                    .entity(entity)
                    .is_some_and(|current| current.searches().contains(&search));
                if linked {
                    let node = self.ensure_search_node(store, graph, search);
                    if let Some(node) = node {
                        self.connect_entity(store, graph, node, entity);
                    }
                }
            }
            StoreEvent::EntitySearchUnlinked { entity, search } => {
                if let Some(node) = graph.node_for(NodeKind::Search(search)) {
                    graph.remove_entity_at_node(node, entity);
                }
            }
            StoreEvent::SearchAdded(search) => {
                self.ensure_search_node(store, graph, search);
            }
            StoreEvent::SearchRemoved(search) => {
                if let Some(node) = graph.node_for(NodeKind::Search(search)) {
                    graph.remove_node(node);
                }
            }
        }
    }

    /// Creates or removes a document's node to match its visibility, and
    /// mirrors its ranking.
    pub fn sync_document(&self, store: &EntityStore, graph: &mut Graph, id: DocumentId) {
        let kind = NodeKind::Document(id);
        let Some(document) = store.document(id) else {
            if let Some(node) = graph.node_for(kind) {
                graph.remove_node(node);
            }
            return;
        };

        match (document.is_visible(), graph.node_for(kind)) {
            (true, Some(node)) => {
                graph.set_ranking(node, document.ranking(), document.recency());
            }
            (true, None) => {
                let node = graph.add_node(kind, document.name.clone());
                graph.set_ranking(node, document.ranking(), document.recency());
                for entity in document.entities().iter().copied().collect::<Vec<_>>() {
                    self.connect_entity(store, graph, node, entity);
                }
                debug!(doc = %id, node = %node, degree = graph.degree(node), "document shown");
            }
            (false, Some(node)) => {
                graph.remove_node(node);
                debug!(doc = %id, "document hidden");
            }
            (false, None) => {}
        }
    }

    /// Adds `entity` to the edge between `node` and every other node whose
    /// document or search shares it. Search nodes only connect to documents.
    pub fn connect_entity(
        &self,
        store: &EntityStore,
        graph: &mut Graph,
        node: NodeId,
        entity: EntityId,
    ) {
        let Some(current) = store.entity(entity) else {
            return;
        };
        let Some(kind) = graph.node(node).map(|node| node.kind) else {
            return;
        };
        let strength = current.strength();

        let mut partners = current
            .documents()
            .iter()
            .filter_map(|document| graph.node_for(NodeKind::Document(*document)))
            .collect::<Vec<_>>();
        if let NodeKind::Document(_) = kind {
            partners.extend(
                current
                    .searches()
                    .iter()
                    .filter_map(|search| graph.node_for(NodeKind::Search(*search))),
            );
        }

        for partner in partners {
            if partner == node {
                continue;
            }
            if let Err(err) = graph.add_edge_entity(node, partner, entity, strength) {
                warn!(%node, %partner, %entity, "failed to link nodes: {err}");
            }
        }
    }

    fn ensure_search_node(
        &self,
        store: &EntityStore,
        graph: &mut Graph,
        id: SearchId,
    ) -> Option<NodeId> {
        let search = store.search(id)?;
        Some(graph.add_node(NodeKind::Search(id), search.query.clone()))
    }

    /// Mirrors rank, quartile and recency onto every document node.
    pub fn refresh_rankings(&self, store: &EntityStore, graph: &mut Graph) {
        for document in store.visible_documents() {
            if let Some(node) = graph.node_for(NodeKind::Document(document.id)) {
                graph.set_ranking(node, document.ranking(), document.recency());
            }
        }
    }

    /// Brings the whole graph in line with the store: drops stale nodes, adds
    /// missing ones, and reconnects every edge.
    pub fn rebuild(&self, store: &EntityStore, graph: &mut Graph) {
        let stale = graph
            .nodes()
            .filter(|node| match node.kind {
                NodeKind::Document(id) => !store.document(id).is_some_and(|doc| doc.is_visible()),
                NodeKind::Search(id) => store.search(id).is_none(),
            })
            .map(|node| node.id)
            .collect::<Vec<_>>();
        for node in stale {
            graph.remove_node(node);
        }

        for search in store.searches().map(|search| search.id).collect::<Vec<_>>() {
            self.ensure_search_node(store, graph, search);
        }
        for document in store
            .visible_documents()
            .map(|document| document.id)
            .collect::<Vec<_>>()
        {
            self.sync_document(store, graph, document);
        }

        let nodes = graph
            .nodes()
            .map(|node| (node.id, node.kind))
            .collect::<Vec<_>>();
        for (node, kind) in nodes {
            let entities = match kind {
                NodeKind::Document(id) => store
                    .document(id)
                    .map(|doc| doc.entities().iter().copied().collect::<Vec<_>>())
                    .unwrap_or_default(),
                NodeKind::Search(id) => store
                    .search(id)
                    .map(|search| vec![search.entity])
                    .unwrap_or_default(),
            };
            for entity in entities {
                self.connect_entity(store, graph, node, entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;

    fn setup() -> (EntityStore, Graph, StructureMaintainer) {
        let graph = Graph::new(
            &CanvasConfig {
                seed: Some(3),
                ..CanvasConfig::default()
            },
            4.0,
        );
        (EntityStore::new(1.0), graph, StructureMaintainer)
    }

    fn pump(store: &mut EntityStore, graph: &mut Graph, maintainer: &StructureMaintainer) {
        for event in store.take_events() {
            maintainer.apply(store, graph, &event);
        }
    }

    #[test]
    fn shared_entity_forms_a_triangle() {
        let (mut store, mut graph, maintainer) = setup();
        let docs = (0..3)
            .map(|index| store.add_document(format!("d{index}"), "alpha"))
            .collect::<Vec<_>>();
        for doc in &docs {
            store.set_document_visible(*doc, true).unwrap();
        }
        let alpha = store.add_entity("alpha", false);
        for doc in &docs {
            store.link_document(alpha, *doc).unwrap();
        }
        pump(&mut store, &mut graph, &maintainer);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.edges().all(|edge| edge.strength() == 1.0));
    }

    #[test]
    fn hidden_documents_have_no_node() {
        let (mut store, mut graph, maintainer) = setup();
        let a = store.add_document("a", "beta");
        let b = store.add_document("b", "beta");
        let beta = store.add_entity("beta", false);
        store.link_document(beta, a).unwrap();
        store.link_document(beta, b).unwrap();
        store.set_document_visible(a, true).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);

        // Showing the second document connects it to the first.
        store.set_document_visible(b, true).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edge_count(), 1);

        store.set_document_visible(a, false).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn removing_the_only_entity_removes_the_edge() {
        let (mut store, mut graph, maintainer) = setup();
        let a = store.add_document("a", "gamma");
        let b = store.add_document("b", "gamma");
        for doc in [a, b] {
            store.set_document_visible(doc, true).unwrap();
        }
        let gamma = store.add_entity("gamma", false);
        let delta = store.add_entity("delta", false);
        for doc in [a, b] {
            store.link_document(gamma, doc).unwrap();
            store.link_document(delta, doc).unwrap();
        }
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges().next().unwrap().strength(), 2.0);

        store.remove_entity(gamma).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edges().next().unwrap().strength(), 1.0);

        store.unlink_document(delta, a).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn searches_connect_to_documents_only() {
        let (mut store, mut graph, maintainer) = setup();
        let a = store.add_document("a", "omega");
        store.set_document_visible(a, true).unwrap();
        let first = store.add_search("omega", 0.0).unwrap();
        let entity = store.search(first).unwrap().entity;
        store.link_document(entity, a).unwrap();
        let second = store.add_search("Omega", 90.0).unwrap();
        pump(&mut store, &mut graph, &maintainer);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let doc_node = graph.node_for(NodeKind::Document(a)).unwrap();
        assert_eq!(graph.degree(doc_node), 2);

        store.remove_search(second).unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn strength_changes_reach_edges() {
        let (mut store, mut graph, maintainer) = setup();
        let a = store.add_document("a", "kappa");
        let b = store.add_document("b", "kappa");
        for doc in [a, b] {
            store.set_document_visible(doc, true).unwrap();
        }
        let kappa = store.add_entity("kappa", false);
        for doc in [a, b] {
            store.link_document(kappa, doc).unwrap();
        }
        pump(&mut store, &mut graph, &maintainer);

        store
            .set_entity_strength(kappa, 3.0, crate::model::StrengthChange::Absolute)
            .unwrap();
        pump(&mut store, &mut graph, &maintainer);
        assert_eq!(graph.edges().next().unwrap().strength(), 3.0);
    }

    #[test]
    fn rebuild_matches_incremental_state() {
        let (mut store, mut graph, maintainer) = setup();
        let a = store.add_document("a", "theta");
        let b = store.add_document("b", "theta");
        for doc in [a, b] {
            store.set_document_visible(doc, true).unwrap();
        }
        let theta = store.add_entity("theta", false);
        for doc in [a, b] {
            store.link_document(theta, doc).unwrap();
        }
        store.take_events();

        maintainer.rebuild(&store, &mut graph);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
