//! Cross-cutting operations over one open project.
//!
//! A [`Workspace`] owns the store, the shared graph and its layout worker.
//! Every structural operation runs under a [`LayoutPause`] guard: the worker
//! is stopped, the store is mutated, the resulting events are replayed into
//! the graph, and the worker restarts when the guard drops.
//!
//! [`LayoutPause`]: crate::layout::LayoutPause

pub mod extraction;
pub mod terms;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use eframe::egui::{Rect, Vec2, vec2};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{CoreError, Result};
use crate::graph::{
    Graph, HIGHLIGHT_NONE, NodeKind, RenderFeedback, SharedGraph, StructureMaintainer, lock_graph,
};
use crate::layout::{LayoutEngine, LayoutPhase};
use crate::model::{
    DocumentId, EntityId, NodeId, SearchId, StrengthChange, entity_key, hue_for_ordinal,
};
use crate::rank::{Ranker, RetrievalMode};
use crate::snapshot::{
    DocumentRecord, EntityRecord, NodeRecord, ProjectSnapshot, SNAPSHOT_VERSION, SearchRecord,
};
use crate::store::{EntityStore, Redistribution, StoreEvent};

use extraction::{
    CapitalizedPhraseExtractor, EntityExtractor, ExtractionBatch, ExtractionRequest,
    spawn_extraction,
};
use terms::TermParser;

/// What a retrieval-driven operation changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Entities created or strengthened by the operation.
    pub entities: Vec<EntityId>,
    /// Hidden documents brought back into view.
    pub admitted: Vec<DocumentId>,
    /// Visible documents pruned afterwards.
    pub pruned: Vec<DocumentId>,
}

/// A recorded highlight whose extraction is still running.
pub struct PendingHighlight {
    pub document: DocumentId,
    pub phrase: String,
    receiver: Receiver<ExtractionBatch>,
}

impl PendingHighlight {
    /// Delivers the extraction batch once the worker is done.
    pub fn receiver(&self) -> &Receiver<ExtractionBatch> {
        &self.receiver
    }
}

pub struct Workspace {
    store: EntityStore,
    graph: SharedGraph,
    layout: LayoutEngine,
    ranker: Ranker,
    maintainer: StructureMaintainer,
    config: EngineConfig,
    extractor: Arc<dyn EntityExtractor>,
    parser: TermParser,
    searches_created: usize,
}

impl Workspace {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_extractor(config, Arc::new(CapitalizedPhraseExtractor::default()))
    }

    pub fn with_extractor(config: EngineConfig, extractor: Arc<dyn EntityExtractor>) -> Self {
        let graph = Graph::new(&config.canvas, config.layout.open_weight).into_shared();
        let layout = LayoutEngine::new(Arc::clone(&graph), config.layout.clone());
        Self {
            store: EntityStore::new(config.strength.default_entity_strength),
            graph,
            layout,
            ranker: Ranker::new(config.ranking.clone()),
            maintainer: StructureMaintainer,
            config,
            extractor,
            parser: TermParser::default(),
            searches_created: 0,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn parser(&self) -> &TermParser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut TermParser {
        &mut self.parser
    }

    pub fn extractor(&self) -> Arc<dyn EntityExtractor> {
        Arc::clone(&self.extractor)
    }

    /// Receives a copy of every store event once the workspace has applied it.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn set_render_feedback(&self, feedback: Option<Arc<dyn RenderFeedback>>) {
        lock_graph(&self.graph).set_feedback(feedback);
    }

    /// Replays pending store events into the graph. Returns how many events
    /// were applied.
    pub fn sync(&mut self) -> usize {
        let events = self.store.take_events();
        let mut graph = lock_graph(&self.graph);
        for event in &events {
            self.maintainer.apply(&self.store, &mut graph, event);
        }
        self.maintainer.refresh_rankings(&self.store, &mut graph);
        events.len()
    }

    // Documents

    /// Adds documents and runs a full rerank so the strongest become visible.
    pub fn import_documents<I, N, C>(&mut self, documents: I) -> Result<Vec<DocumentId>>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let _pause = self.layout.pause();
        let ids = documents
            .into_iter()
            .map(|(name, content)| self.store.add_document(name, content))
            .collect::<Vec<_>>();
        let outcome = self.ranker.rerank(&mut self.store)?;
        self.sync();
        info!(
            imported = ids.len(),
            visible = self.store.visible_documents().count(),
            shown = outcome.shown.len(),
            "documents imported"
        );
        Ok(ids)
    }

    pub fn remove_document(&mut self, id: DocumentId) -> Result<()> {
        let _pause = self.layout.pause();
        self.store.remove_document(id)?;
        self.sync();
        Ok(())
    }

    pub fn set_document_notes(&mut self, id: DocumentId, notes: &str) -> Result<()> {
        self.store.set_document_notes(id, notes)?;
        self.sync();
        Ok(())
    }

    /// Full rerank: ranks every document and enforces the visible budget.
    pub fn rerank(&mut self) -> Result<()> {
        let _pause = self.layout.pause();
        self.ranker.rerank(&mut self.store)?;
        self.sync();
        Ok(())
    }

    // Entities

    /// Creates (or finds) an entity and links it to every document that
    /// mentions it, then pulls matching hidden documents into view.
    pub fn add_entity(&mut self, name: &str, soft_data: bool) -> Result<EntityId> {
        let _pause = self.layout.pause();
        let id = self.store.add_entity(name, soft_data);
        self.link_mentions(id)?;
        self.query_cycle(&[name.to_owned()], RetrievalMode::Regular)?;
        self.sync();
        Ok(id)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<()> {
        let _pause = self.layout.pause();
        self.store.remove_entity(id)?;
        self.ranker.quick_quartile(&mut self.store);
        self.sync();
        Ok(())
    }

    pub fn set_entity_strength(
        &mut self,
        id: EntityId,
        value: f64,
        change: StrengthChange,
    ) -> Result<Redistribution> {
        let _pause = self.layout.pause();
        let outcome = self.store.set_entity_strength(id, value, change)?;
        self.after_strength_change(&outcome)?;
        Ok(outcome)
    }

    pub fn increase_entity_strength(&mut self, id: EntityId, amount: f64) -> Result<Redistribution> {
        let _pause = self.layout.pause();
        let outcome = self.store.increase_entity_strength(id, amount)?;
        self.after_strength_change(&outcome)?;
        Ok(outcome)
    }

    fn after_strength_change(&mut self, outcome: &Redistribution) -> Result<()> {
        if outcome.leftover > 0.0 {
            debug!(
                leftover = outcome.leftover,
                "strength redistribution ran out of headroom"
            );
        }
        self.ranker.quick_quartile(&mut self.store);
        let protected = self.protected_documents();
        self.ranker.prune(&mut self.store, &protected)?;
        self.sync();
        Ok(())
    }

    /// Links `entity` to every document whose text mentions its name.
    fn link_mentions(&mut self, entity: EntityId) -> Result<usize> {
        let Some(key) = self.store.entity(entity).map(|entity| entity.key().to_owned()) else {
            return Err(CoreError::UnknownEntity(entity));
        };
        if key.is_empty() {
            return Ok(0);
        }
        let mentioning = self
            .store
            .documents()
            .filter(|document| document.mentions(&key))
            .map(|document| document.id)
            .collect::<Vec<_>>();
        let mut linked = 0;
        for document in mentioning {
            if self.store.link_document(entity, document)? {
                linked += 1;
            }
        }
        Ok(linked)
    }

    /// Creates or strengthens the entity for `name`. A new entity starts at
    /// the default strength; an existing one gains `boost`.
    fn reinforce(&mut self, name: &str, soft_data: bool, boost: f64) -> Result<EntityId> {
        let existing = self.store.find_entity(name);
        let id = self.store.add_entity(name, soft_data);
        if existing.is_some() && boost > 0.0 {
            let outcome = self.store.increase_entity_strength(id, boost)?;
            if outcome.leftover > 0.0 {
                debug!(entity = %id, leftover = outcome.leftover, "boost exceeded headroom");
            }
        }
        Ok(id)
    }

    /// Ages visible documents, retrieves hidden ones matching `terms`, then
    /// re-quartiles and prunes.
    fn query_cycle(&mut self, terms: &[String], mode: RetrievalMode) -> Result<QueryOutcome> {
        self.store.age_visible_documents();
        let admitted = self.ranker.retrieve(&mut self.store, terms, mode)?;
        self.ranker.quick_quartile(&mut self.store);
        let protected = self.protected_documents();
        let pruned = self.ranker.prune(&mut self.store, &protected)?;
        debug!(
            ?mode,
            terms = terms.len(),
            admitted = admitted.len(),
            pruned = pruned.len(),
            "query cycle"
        );
        Ok(QueryOutcome {
            entities: Vec::new(),
            admitted,
            pruned,
        })
    }

    /// Documents whose nodes are open or selected are never pruned.
    fn protected_documents(&self) -> HashSet<DocumentId> {
        let graph = lock_graph(&self.graph);
        let selected = graph.selected();
        graph
            .nodes()
            .filter(|node| node.is_open() || Some(node.id) == selected)
            .filter_map(|node| node.kind.document())
            .collect()
    }

    // Query operations

    /// Records a highlight on `document` and starts extracting names from the
    /// highlighted text on a worker thread. Hand the arriving batch to
    /// [`Self::apply_highlight_extraction`] to strengthen and retrieve.
    pub fn highlight(&mut self, document: DocumentId, start: usize, end: usize) -> Result<PendingHighlight> {
        let phrase = self.store.add_highlight(document, start, end)?;
        self.sync();
        let receiver = spawn_extraction(
            self.extractor(),
            vec![ExtractionRequest {
                document,
                text: phrase.clone(),
            }],
        );
        debug!(doc = %document, phrase = %phrase, "highlight recorded");
        Ok(PendingHighlight {
            document,
            phrase,
            receiver,
        })
    }

    /// Treats a highlight as evidence once its extraction is done: the
    /// phrase becomes a soft entity, names found inside it are strengthened,
    /// and matching documents are retrieved.
    pub fn apply_highlight_extraction(
        &mut self,
        pending: &PendingHighlight,
        batch: ExtractionBatch,
    ) -> Result<QueryOutcome> {
        let document = pending.document;
        if self.store.document(document).is_none() {
            return Err(CoreError::UnknownDocument(document));
        }
        let _pause = self.layout.pause();
        let boost = self.config.strength.highlight_boost;

        // The phrase itself is user-made soft data; extracted names are not.
        let mut candidates = Vec::new();
        if !self.parser.content_terms(&pending.phrase).is_empty() {
            candidates.push((pending.phrase.trim().to_owned(), true));
        }
        let extracted = batch
            .results
            .into_iter()
            .filter(|result| result.document == document)
            .flat_map(|result| result.entities);
        for name in extracted {
            if !self.parser.is_stop_word(&name)
                && !candidates
                    .iter()
                    .any(|(known, _)| entity_key(known) == entity_key(&name))
            {
                candidates.push((name, false));
            }
        }

        let mut entities = Vec::new();
        for (name, soft_data) in &candidates {
            let id = self.reinforce(name, *soft_data, boost)?;
            self.link_mentions(id)?;
            entities.push(id);
        }
        let names = candidates
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();

        let mut outcome = self.query_cycle(&names, RetrievalMode::Regular)?;
        outcome.entities = entities;
        self.sync();
        debug!(doc = %document, entities = outcome.entities.len(), "highlight applied");
        Ok(outcome)
    }

    /// Runs a search: anchors a soft entity to the query, links it to every
    /// mentioning document, retrieves in search mode and paints matching
    /// nodes with the search's highlight code.
    pub fn search(&mut self, query: &str) -> Result<SearchId> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::EmptyQuery);
        }

        let _pause = self.layout.pause();
        let boost = self.config.strength.search_boost;
        let existing = self.store.find_entity(query);
        let hue = hue_for_ordinal(self.searches_created);
        self.searches_created += 1;

        let id = self.store.add_search(query, hue)?;
        let entity = self
            .store
            .search(id)
            .map(|search| search.entity)
            .ok_or(CoreError::UnknownSearch(id))?;
        if existing.is_some() && boost > 0.0 {
            self.store.increase_entity_strength(entity, boost)?;
        }
        self.link_mentions(entity)?;
        self.query_cycle(&[query.to_owned()], RetrievalMode::Search)?;

        let matches = self
            .store
            .entity(entity)
            .map(|entity| entity.documents().clone())
            .unwrap_or_default();
        self.store.set_search_result_count(id, matches.len())?;
        self.sync();
        self.paint_search(id, &matches);

        info!(search = %id, query, results = matches.len(), "search run");
        Ok(id)
    }

    fn paint_search(&self, search: SearchId, matches: &BTreeSet<DocumentId>) {
        let Some(code) = self.store.search(search).map(|search| search.highlight_code()) else {
            return;
        };
        let mut graph = lock_graph(&self.graph);
        for document in matches {
            if let Some(node) = graph.node_for(NodeKind::Document(*document)) {
                graph.set_highlight(node, code);
            }
        }
    }

    pub fn remove_search(&mut self, id: SearchId) -> Result<()> {
        let _pause = self.layout.pause();
        let code = self
            .store
            .search(id)
            .map(|search| search.highlight_code())
            .ok_or(CoreError::UnknownSearch(id))?;
        self.store.remove_search(id)?;
        self.sync();

        let mut graph = lock_graph(&self.graph);
        let painted = graph
            .nodes()
            .filter(|node| node.highlight() == code)
            .map(|node| node.id)
            .collect::<Vec<_>>();
        for node in painted {
            graph.set_highlight(node, HIGHLIGHT_NONE);
        }
        Ok(())
    }

    /// Declares two documents related. Entities they share are strengthened;
    /// with nothing shared, their most frequent common term becomes a new
    /// soft entity linking both.
    pub fn link_documents(&mut self, a: DocumentId, b: DocumentId) -> Result<QueryOutcome> {
        if a == b {
            return Err(CoreError::SelfLink(a.to_string()));
        }
        let left = self.store.document(a).ok_or(CoreError::UnknownDocument(a))?;
        let right = self.store.document(b).ok_or(CoreError::UnknownDocument(b))?;
        let shared = left
            .entities()
            .intersection(right.entities())
            .copied()
            .collect::<Vec<_>>();
        let common_term = if shared.is_empty() {
            self.parser
                .most_frequent_common_term(left.content(), right.content())
        } else {
            None
        };

        let _pause = self.layout.pause();
        let boost = self.config.strength.link_boost;
        let mut entities = Vec::new();
        if shared.is_empty() {
            let Some(term) = common_term else {
                debug!(%a, %b, "documents share nothing to link on");
                return Ok(QueryOutcome::default());
            };
            let id = self.store.add_entity(&term, true);
            self.store.link_document(id, a)?;
            self.store.link_document(id, b)?;
            entities.push(id);
        } else {
            for entity in shared {
                self.store.increase_entity_strength(entity, boost)?;
                entities.push(entity);
            }
        }

        let names = entities
            .iter()
            .filter_map(|id| self.store.entity(*id))
            .map(|entity| entity.name().to_owned())
            .collect::<Vec<_>>();
        let mut outcome = self.query_cycle(&names, RetrievalMode::Regular)?;
        outcome.entities = entities;
        self.sync();
        Ok(outcome)
    }

    // Background extraction

    /// Starts extraction over every document on a worker thread. Feed the
    /// batch back through [`Self::apply_extraction`].
    pub fn extract_all(&self) -> Receiver<ExtractionBatch> {
        let requests = self
            .store
            .documents()
            .map(|document| ExtractionRequest {
                document: document.id,
                text: document.content().to_owned(),
            })
            .collect();
        spawn_extraction(self.extractor(), requests)
    }

    /// Applies a finished extraction batch: every accepted name becomes an
    /// entity linked to all documents mentioning it, followed by a rerank.
    pub fn apply_extraction(&mut self, batch: ExtractionBatch) -> Result<Vec<EntityId>> {
        let _pause = self.layout.pause();
        let mut created = Vec::new();
        let mut seen = HashSet::new();
        for result in batch.results {
            if self.store.document(result.document).is_none() {
                debug!(doc = %result.document, "extraction result for a removed document");
                continue;
            }
            for name in result.entities {
                if self.parser.is_stop_word(&name) || !seen.insert(entity_key(&name)) {
                    continue;
                }
                let id = self.store.get_or_create_entity(&name);
                self.link_mentions(id)?;
                created.push(id);
            }
        }
        self.ranker.rerank(&mut self.store)?;
        self.sync();
        info!(entities = created.len(), "extraction applied");
        Ok(created)
    }

    // Node controller surface

    pub fn node_for_document(&self, document: DocumentId) -> Option<NodeId> {
        lock_graph(&self.graph).node_for(NodeKind::Document(document))
    }

    pub fn node_for_search(&self, search: SearchId) -> Option<NodeId> {
        lock_graph(&self.graph).node_for(NodeKind::Search(search))
    }

    pub fn move_node(&self, node: NodeId, position: Vec2) -> Result<()> {
        lock_graph(&self.graph).move_node(node, position)
    }

    pub fn pin_node(&self, node: NodeId, pinned: bool) -> Result<()> {
        lock_graph(&self.graph).pin_node(node, pinned)
    }

    pub fn set_selected(&self, node: Option<NodeId>) -> Result<()> {
        lock_graph(&self.graph).set_selected(node)
    }

    pub fn set_open(&self, node: NodeId, open: bool) -> Result<()> {
        lock_graph(&self.graph).set_open(node, open)
    }

    pub fn set_canvas_bounds(&self, bounds: Rect) {
        lock_graph(&self.graph).set_bounds(bounds);
    }

    // Layout control

    pub fn start_layout(&self) -> Result<()> {
        self.layout.start()
    }

    pub fn stop_layout(&self) {
        self.layout.stop();
    }

    pub fn set_layout_paused(&self, paused: bool) {
        self.layout.set_paused(paused);
    }

    pub fn layout_phase(&self) -> LayoutPhase {
        self.layout.phase()
    }

    // Persistence

    pub fn snapshot(&self) -> ProjectSnapshot {
        let documents = self
            .store
            .documents()
            .map(|document| DocumentRecord {
                id: document.id,
                name: document.name.clone(),
                content: document.content().to_owned(),
                notes: document.notes.clone(),
                highlights: document.highlights().to_vec(),
                visible: document.is_visible(),
                ranking: document.ranking(),
                recency: document.recency(),
            })
            .collect();
        let entities = self
            .store
            .entities()
            .map(|entity| EntityRecord {
                id: entity.id,
                name: entity.name().to_owned(),
                strength: entity.strength(),
                soft_data: entity.soft_data,
                documents: entity.documents().iter().copied().collect(),
                searches: entity.searches().iter().copied().collect(),
            })
            .collect();
        let searches = self
            .store
            .searches()
            .map(|search| SearchRecord {
                id: search.id,
                query: search.query.clone(),
                hue: search.hue,
                result_count: search.result_count,
                entity: search.entity,
            })
            .collect();
        let nodes = lock_graph(&self.graph)
            .nodes()
            .map(|node| NodeRecord {
                kind: node.kind,
                position: [node.position().x, node.position().y],
                open: node.is_open(),
                pinned: node.is_pinned(),
                highlight: node.highlight(),
            })
            .collect();

        ProjectSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            documents,
            entities,
            searches,
            nodes,
        }
    }

    /// Rebuilds a workspace from a snapshot. Id counters are advanced past
    /// every loaded id, so later additions never collide. The layout is left
    /// stopped.
    pub fn restore(snapshot: ProjectSnapshot, extractor: Arc<dyn EntityExtractor>) -> Result<Self> {
        let mut workspace = Self::with_extractor(snapshot.config, extractor);
        let store = &mut workspace.store;

        for record in snapshot.documents {
            store.restore_document(
                record.id,
                record.name,
                record.content,
                record.notes,
                record.highlights,
                record.visible,
                record.ranking,
                record.recency,
            );
        }
        let mut links = Vec::new();
        for record in snapshot.entities {
            store.restore_entity(record.id, record.name, record.strength, record.soft_data);
            links.push((record.id, record.documents, record.searches));
        }
        for record in &snapshot.searches {
            store.restore_search(
                record.id,
                record.query.clone(),
                record.hue,
                record.result_count,
                record.entity,
            );
        }
        for (entity, documents, searches) in links {
            for document in documents {
                store.link_document(entity, document)?;
            }
            for search in searches {
                store.link_search(entity, search)?;
            }
        }
        workspace.searches_created = snapshot.searches.len();
        workspace.sync();

        {
            let mut graph = lock_graph(&workspace.graph);
            for record in snapshot.nodes {
                if let Some(node) = graph.node_for(record.kind) {
                    let position = vec2(record.position[0], record.position[1]);
                    graph.restore_node_state(node, position, record.open, record.pinned);
                    graph.set_highlight(node, record.highlight);
                }
            }
        }
        info!(
            documents = workspace.store.document_count(),
            entities = workspace.store.entity_count(),
            searches = workspace.store.search_count(),
            "workspace restored"
        );
        Ok(workspace)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.layout.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        let mut config = EngineConfig::default();
        config.canvas.seed = Some(1);
        Workspace::with_extractor(config, Arc::new(|_: &str| Vec::<String>::new()))
    }

    fn highlight_now(
        workspace: &mut Workspace,
        document: DocumentId,
        start: usize,
        end: usize,
    ) -> QueryOutcome {
        let pending = workspace.highlight(document, start, end).unwrap();
        let batch = pending
            .receiver()
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        workspace.apply_highlight_extraction(&pending, batch).unwrap()
    }

    #[test]
    fn highlight_creates_a_soft_entity_and_links_mentions() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([
                ("a", "The convoy reached Kherson at dawn."),
                ("b", "Reports from Kherson mention a convoy."),
                ("c", "Nothing relevant."),
            ])
            .unwrap();

        let outcome = highlight_now(&mut workspace, docs[0], 19, 26);
        let entity = workspace.store().entity(outcome.entities[0]).unwrap();
        assert_eq!(entity.name(), "Kherson");
        assert!(entity.soft_data);
        assert_eq!(entity.documents().len(), 2);
        assert_eq!(workspace.store().document(docs[0]).unwrap().highlights().len(), 1);
    }

    #[test]
    fn repeated_highlights_strengthen_the_entity() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([("a", "Kherson"), ("b", "other text")])
            .unwrap();
        workspace.add_entity("other", false).unwrap();
        let first = highlight_now(&mut workspace, docs[0], 0, 7).entities[0];
        let before = workspace.store().entity(first).unwrap().strength();
        highlight_now(&mut workspace, docs[0], 0, 7);
        assert!(workspace.store().entity(first).unwrap().strength() > before);
    }

    #[test]
    fn highlight_extraction_runs_off_the_calling_thread() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let recorder = Arc::clone(&seen);
        let mut config = EngineConfig::default();
        config.canvas.seed = Some(1);
        let mut workspace = Workspace::with_extractor(
            config,
            Arc::new(move |_: &str| {
                *recorder.lock().unwrap() = Some(std::thread::current().id());
                vec!["Odesa".to_owned()]
            }),
        );
        let docs = workspace
            .import_documents([("a", "Ships left Odesa at night."), ("b", "Odesa port")])
            .unwrap();

        let pending = workspace.highlight(docs[0], 11, 16).unwrap();
        assert_eq!(workspace.store().document(docs[0]).unwrap().highlights().len(), 1);
        let batch = pending
            .receiver()
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        let extractor_thread = *seen.lock().unwrap();
        assert!(extractor_thread.is_some());
        assert_ne!(extractor_thread, Some(std::thread::current().id()));

        let outcome = workspace.apply_highlight_extraction(&pending, batch).unwrap();
        assert_eq!(outcome.entities.len(), 1);
        let odesa = workspace.store().entity(outcome.entities[0]).unwrap();
        assert_eq!(odesa.documents().len(), 2);
    }

    #[test]
    fn highlights_on_removed_documents_are_not_applied() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([("a", "Kherson"), ("b", "Kherson again")])
            .unwrap();
        let pending = workspace.highlight(docs[0], 0, 7).unwrap();
        let batch = pending
            .receiver()
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        workspace.remove_document(docs[0]).unwrap();
        assert!(matches!(
            workspace.apply_highlight_extraction(&pending, batch),
            Err(CoreError::UnknownDocument(_))
        ));
        assert!(workspace.store().find_entity("Kherson").is_none());
    }

    #[test]
    fn search_paints_matching_nodes() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([("a", "harbor crane"), ("b", "harbor lights"), ("c", "forest")])
            .unwrap();
        let search = workspace.search("harbor").unwrap();
        let code = workspace.store().search(search).unwrap().highlight_code();
        assert_eq!(workspace.store().search(search).unwrap().result_count, 2);

        let graph = lock_graph(workspace.graph());
        let painted = graph.node(graph.node_for(NodeKind::Document(docs[0])).unwrap()).unwrap();
        assert_eq!(painted.highlight(), code);
        let search_node = graph.node_for(NodeKind::Search(search)).unwrap();
        assert_eq!(graph.degree(search_node), 2);
    }

    #[test]
    fn empty_searches_are_rejected() {
        let mut workspace = workspace();
        assert!(matches!(workspace.search("   "), Err(CoreError::EmptyQuery)));
    }

    #[test]
    fn linking_unrelated_documents_uses_their_common_term() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([
                ("a", "The tanker Meridian left port."),
                ("b", "Insurers flagged the tanker twice."),
            ])
            .unwrap();
        let outcome = workspace.link_documents(docs[0], docs[1]).unwrap();
        let entity = workspace.store().entity(outcome.entities[0]).unwrap();
        assert_eq!(entity.key(), "tanker");

        let a = workspace.node_for_document(docs[0]).unwrap();
        let b = workspace.node_for_document(docs[1]).unwrap();
        assert!(lock_graph(workspace.graph()).edge_between(a, b).is_some());
        assert!(workspace.link_documents(docs[0], docs[0]).is_err());
    }

    #[test]
    fn linking_documents_strengthens_shared_entities() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([("a", "cargo manifest"), ("b", "cargo hold"), ("c", "filler")])
            .unwrap();
        let cargo = workspace.add_entity("cargo", false).unwrap();
        workspace.add_entity("filler", false).unwrap();

        workspace.link_documents(docs[0], docs[1]).unwrap();
        assert_eq!(workspace.store().entity(cargo).unwrap().strength(), 1.5);
        assert!((workspace.store().total_strength() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn extraction_batches_link_entities() {
        let mut workspace = Workspace::with_extractor(
            EngineConfig::default(),
            Arc::new(CapitalizedPhraseExtractor::default()),
        );
        workspace
            .import_documents([
                ("a", "Maria Lopez called."),
                ("b", "They met Maria Lopez later."),
            ])
            .unwrap();
        let batch = workspace
            .extract_all()
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        let created = workspace.apply_extraction(batch).unwrap();
        assert_eq!(created.len(), 1);
        let entity = workspace.store().entity(created[0]).unwrap();
        assert_eq!(entity.documents().len(), 2);
        assert_eq!(lock_graph(workspace.graph()).edge_count(), 1);
    }

    #[test]
    fn snapshot_restore_preserves_state_and_ids() {
        let mut workspace = workspace();
        let docs = workspace
            .import_documents([("a", "delta river"), ("b", "delta plain")])
            .unwrap();
        workspace.add_entity("delta", false).unwrap();
        workspace.search("river").unwrap();
        let node = workspace.node_for_document(docs[0]).unwrap();
        workspace.move_node(node, vec2(200.0, 300.0)).unwrap();
        workspace.pin_node(node, true).unwrap();

        let json = workspace.snapshot().to_json().unwrap();
        let snapshot = ProjectSnapshot::from_json(&json).unwrap();
        let mut restored =
            Workspace::restore(snapshot, Arc::new(|_: &str| Vec::<String>::new())).unwrap();

        assert_eq!(restored.store().document_count(), 2);
        assert_eq!(restored.store().search_count(), 1);
        let node = restored.node_for_document(docs[0]).unwrap();
        {
            let graph = lock_graph(restored.graph());
            let restored_node = graph.node(node).unwrap();
            assert_eq!(restored_node.position(), vec2(200.0, 300.0));
            assert!(restored_node.is_pinned());
            assert_eq!(graph.edge_count(), lock_graph(workspace.graph()).edge_count());
        }

        let fresh = restored
            .import_documents([("c", "new arrival")])
            .unwrap();
        assert!(fresh[0] > docs[1]);
    }
}
