use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui::vec2;
use starspire::{EngineConfig, LayoutPhase, Workspace, lock_graph};

fn fast_workspace() -> Workspace {
    let mut config = EngineConfig::default();
    config.canvas.seed = Some(9);
    config.layout.max_iterations = 300;
    config.layout.min_iteration_ms = 0;
    config.layout.max_iteration_ms = 2;
    config.layout.initial_sleep_ms = 0;
    Workspace::with_extractor(config, Arc::new(|_: &str| Vec::<String>::new()))
}

fn populated() -> Workspace {
    let mut workspace = fast_workspace();
    workspace
        .import_documents([
            ("a", "convoy Kherson"),
            ("b", "convoy bridge"),
            ("c", "bridge Kherson"),
            ("d", "bridge"),
            ("e", "weather"),
        ])
        .unwrap();
    workspace.add_entity("convoy", false).unwrap();
    workspace.add_entity("bridge", false).unwrap();
    workspace.add_entity("Kherson", false).unwrap();
    workspace
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn settled(workspace: &Workspace) -> bool {
    workspace.layout_phase() == LayoutPhase::Idle && workspace.layout().stats().runs > 0
}

#[test]
fn layout_settles_within_the_frame() {
    let workspace = populated();
    workspace.start_layout().unwrap();
    assert!(wait_for(|| settled(&workspace)));

    let stats = workspace.layout().stats();
    assert!(stats.iterations <= 300 * stats.runs);

    let graph = lock_graph(workspace.graph());
    let frame = graph.bounds();
    for node in graph.nodes() {
        let body = node.body();
        assert!(frame.contains(body.min) && frame.contains(body.max), "{body:?} outside {frame:?}");
    }
    drop(graph);
    workspace.stop_layout();
}

#[test]
fn pinned_nodes_stay_where_they_were_put() {
    let mut workspace = populated();
    let document = workspace.store().documents().next().unwrap().id;
    let node = workspace.node_for_document(document).unwrap();
    workspace.move_node(node, vec2(400.0, 300.0)).unwrap();
    workspace.pin_node(node, true).unwrap();

    workspace.start_layout().unwrap();
    assert!(wait_for(|| settled(&workspace)));
    // Structural edits restart the worker; the pin must survive those too.
    workspace.add_entity("weather", false).unwrap();
    assert!(wait_for(|| settled(&workspace)));

    let position = lock_graph(workspace.graph()).node(node).unwrap().position();
    assert_eq!(position, vec2(400.0, 300.0));
    workspace.stop_layout();
}

#[test]
fn stopping_an_idle_worker_returns_promptly() {
    let workspace = populated();
    workspace.start_layout().unwrap();
    assert!(wait_for(|| settled(&workspace)));

    let stopping = Instant::now();
    workspace.stop_layout();
    assert!(stopping.elapsed() < Duration::from_secs(1));
    assert!(!workspace.layout().is_running());
    assert_eq!(workspace.layout_phase(), LayoutPhase::Stopped);
}

#[test]
fn paused_layout_leaves_positions_alone() {
    let workspace = populated();
    workspace.set_layout_paused(true);
    let before = lock_graph(workspace.graph())
        .nodes()
        .map(|node| node.position())
        .collect::<Vec<_>>();

    workspace.start_layout().unwrap();
    thread::sleep(Duration::from_millis(100));
    let after = lock_graph(workspace.graph())
        .nodes()
        .map(|node| node.position())
        .collect::<Vec<_>>();
    assert_eq!(before, after);
    assert_eq!(workspace.layout().stats().iterations, 0);

    workspace.set_layout_paused(false);
    assert!(wait_for(|| workspace.layout().stats().iterations > 0));
    workspace.stop_layout();
}
