use std::collections::HashSet;
use std::sync::Arc;

use starspire::graph::NodeKind;
use starspire::model::StrengthChange;
use starspire::{EngineConfig, Workspace, lock_graph};

fn workspace() -> Workspace {
    workspace_with(EngineConfig::default())
}

fn workspace_with(mut config: EngineConfig) -> Workspace {
    config.canvas.seed = Some(42);
    Workspace::with_extractor(config, Arc::new(|_: &str| Vec::<String>::new()))
}

#[test]
fn shared_entity_connects_every_pair_of_mentioning_documents() {
    let mut workspace = workspace();
    let docs = workspace
        .import_documents([
            ("one", "alpha team reported in"),
            ("two", "the alpha signal faded"),
            ("three", "no sign of alpha today"),
            ("four", "unrelated weather notes"),
        ])
        .unwrap();
    workspace.add_entity("alpha", false).unwrap();

    let graph = lock_graph(workspace.graph());
    assert_eq!(graph.edge_count(), 3);
    for edge in graph.edges() {
        assert_eq!(edge.entity_count(), 1);
        assert!((edge.strength() - 1.0).abs() < 1e-9);
    }
    let lonely = graph.node_for(NodeKind::Document(docs[3])).unwrap();
    assert_eq!(graph.degree(lonely), 0);
}

#[test]
fn conserving_increase_is_taken_evenly_from_the_others() {
    let mut workspace = workspace();
    workspace
        .import_documents([("doc", "placeholder text")])
        .unwrap();
    let ids = ["e1", "e2", "e3", "e4", "e5"]
        .into_iter()
        .map(|name| workspace.add_entity(name, false).unwrap())
        .collect::<Vec<_>>();
    for id in &ids {
        workspace
            .set_entity_strength(*id, 2.0, StrengthChange::Absolute)
            .unwrap();
    }
    assert!((workspace.store().total_strength() - 10.0).abs() < 1e-9);

    let outcome = workspace
        .set_entity_strength(ids[0], 4.0, StrengthChange::Conserving)
        .unwrap();
    assert!(outcome.is_conserving());
    assert!((workspace.store().entity(ids[0]).unwrap().strength() - 4.0).abs() < 1e-9);
    for id in &ids[1..] {
        assert!((workspace.store().entity(*id).unwrap().strength() - 1.5).abs() < 1e-9);
    }
    assert!((workspace.store().total_strength() - 10.0).abs() < 1e-9);
}

#[test]
fn repeated_increases_keep_the_total_when_others_can_pay() {
    let mut workspace = workspace();
    workspace
        .import_documents([("doc", "placeholder text")])
        .unwrap();
    let ids = ["north", "south", "east", "west", "centre"]
        .into_iter()
        .map(|name| workspace.add_entity(name, false).unwrap())
        .collect::<Vec<_>>();
    for id in &ids {
        workspace
            .set_entity_strength(*id, 2.0, StrengthChange::Absolute)
            .unwrap();
    }

    let amounts = [0.5, 1.25, 0.1, 2.0, 0.75, 3.0, 0.3, 1.0, 4.0, 0.05, 2.5, 6.0];
    let mut conserving_calls = 0;
    for (step, amount) in amounts.into_iter().enumerate() {
        let target = ids[(step * 3) % ids.len()];
        let before = workspace.store().total_strength();
        let outcome = workspace.increase_entity_strength(target, amount).unwrap();
        let after = workspace.store().total_strength();
        if outcome.is_conserving() {
            conserving_calls += 1;
            assert!((after - before).abs() < 1e-9, "step {step}: {before} -> {after}");
        } else {
            assert!((after - before - outcome.leftover).abs() < 1e-9);
        }
        assert!(workspace.store().entities().all(|entity| entity.strength() >= 0.0));
    }
    assert!(conserving_calls >= amounts.len() / 2);
}

#[test]
fn strength_changes_flow_into_edge_weights() {
    let mut workspace = workspace();
    let docs = workspace
        .import_documents([("a", "harbor crane"), ("b", "harbor lights")])
        .unwrap();
    let harbor = workspace.add_entity("harbor", false).unwrap();
    workspace
        .set_entity_strength(harbor, 3.0, StrengthChange::Absolute)
        .unwrap();

    let a = workspace.node_for_document(docs[0]).unwrap();
    let b = workspace.node_for_document(docs[1]).unwrap();
    let graph = lock_graph(workspace.graph());
    let edge = graph.edge_between(a, b).unwrap();
    assert!((edge.strength() - 3.0).abs() < 1e-9);
}

#[test]
fn rerank_keeps_the_visible_budget() {
    let mut config = EngineConfig::default();
    config.ranking.documents_visible = 25;
    let mut workspace = workspace_with(config);
    let documents = (0..30)
        .map(|index| {
            let body = if index % 3 == 0 {
                format!("report {index} about the courier")
            } else {
                format!("report {index} about the weather")
            };
            (format!("doc-{index}"), body)
        })
        .collect::<Vec<_>>();
    workspace.import_documents(documents).unwrap();
    assert_eq!(workspace.store().visible_documents().count(), 25);

    workspace.add_entity("courier", false).unwrap();
    workspace.rerank().unwrap();
    assert!(workspace.store().visible_documents().count() <= 25);
    assert_eq!(
        lock_graph(workspace.graph()).node_count(),
        workspace.store().visible_documents().count()
    );
}

#[test]
fn stronger_documents_never_rank_below_weaker_ones() {
    let mut workspace = workspace();
    workspace
        .import_documents([
            ("weak", "nothing much"),
            ("strong", "courier courier vessel"),
            ("middle", "vessel sighted"),
        ])
        .unwrap();
    let courier = workspace.add_entity("courier", false).unwrap();
    workspace.add_entity("vessel", false).unwrap();
    workspace.increase_entity_strength(courier, 1.0).unwrap();
    workspace.rerank().unwrap();

    let mut documents = workspace
        .store()
        .documents()
        .map(|document| (document.ranking().rank, document.total_strength()))
        .collect::<Vec<_>>();
    documents.sort_by_key(|(rank, _)| *rank);
    for pair in documents.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
    let ranks = documents.iter().map(|(rank, _)| *rank).collect::<HashSet<_>>();
    assert_eq!(ranks.len(), 3);
}

#[test]
fn removing_an_entity_leaves_no_edge_behind() {
    let mut workspace = workspace();
    workspace
        .import_documents([
            ("a", "delta bravo"),
            ("b", "delta bravo"),
            ("c", "delta"),
        ])
        .unwrap();
    let delta = workspace.add_entity("delta", false).unwrap();
    let bravo = workspace.add_entity("bravo", false).unwrap();
    {
        let graph = lock_graph(workspace.graph());
        assert_eq!(graph.edge_count(), 3);
        let pairs = graph.edges().map(|edge| edge.pair()).collect::<HashSet<_>>();
        assert_eq!(pairs.len(), graph.edge_count());
    }

    workspace.remove_entity(delta).unwrap();
    {
        let graph = lock_graph(workspace.graph());
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edges().all(|edge| edge.carries(bravo) && !edge.carries(delta)));
    }

    workspace.remove_entity(bravo).unwrap();
    assert_eq!(lock_graph(workspace.graph()).edge_count(), 0);
}

#[test]
fn removing_a_document_drops_its_node_and_edges() {
    let mut workspace = workspace();
    let docs = workspace
        .import_documents([("a", "signal"), ("b", "signal"), ("c", "signal")])
        .unwrap();
    workspace.add_entity("signal", false).unwrap();
    let node = workspace.node_for_document(docs[0]).unwrap();
    workspace.set_selected(Some(node)).unwrap();

    workspace.remove_document(docs[0]).unwrap();
    assert!(workspace.node_for_document(docs[0]).is_none());
    let graph = lock_graph(workspace.graph());
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.selected(), None);
}

#[test]
fn search_nodes_link_only_to_documents() {
    let mut workspace = workspace();
    workspace
        .import_documents([("a", "tanker route"), ("b", "tanker crew")])
        .unwrap();
    let first = workspace.search("tanker").unwrap();
    let second = workspace.search("tanker").unwrap();

    let graph = lock_graph(workspace.graph());
    let first = graph.node_for(NodeKind::Search(first)).unwrap();
    let second = graph.node_for(NodeKind::Search(second)).unwrap();
    assert!(graph.edge_between(first, second).is_none());
    assert_eq!(graph.degree(first), 2);
    assert_eq!(graph.degree(second), 2);
}

#[test]
fn removing_a_search_clears_its_paint() {
    let mut workspace = workspace();
    let docs = workspace
        .import_documents([("a", "harbor crane"), ("b", "quiet field")])
        .unwrap();
    let search = workspace.search("harbor").unwrap();
    workspace.remove_search(search).unwrap();

    assert!(workspace.node_for_search(search).is_none());
    let node = workspace.node_for_document(docs[0]).unwrap();
    assert_eq!(lock_graph(workspace.graph()).node(node).unwrap().highlight(), 0);
}
