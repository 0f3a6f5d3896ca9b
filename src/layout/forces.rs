use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

use super::collision::resolve_collisions;
use crate::config::LayoutConfig;
use crate::graph::{Graph, body_at};
use crate::model::NodeId;

const GOLDEN_ANGLE: f32 = 2.399_963;
const COINCIDENT_DISTANCE_SQ: f32 = 0.01;
const DIVIDER_SHRINK: f32 = 0.5;

/// Adaptive cooling state for one run of the layout.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CoolingState {
    divider: f32,
}

impl CoolingState {
    pub(crate) fn new(config: &LayoutConfig) -> Self {
        Self {
            divider: config.cooling_divider.max(1.0),
        }
    }

    pub(crate) fn divider(&self) -> f32 {
        self.divider
    }

    fn factor(&self, config: &LayoutConfig, iteration: u32) -> f32 {
        if !config.cooling || iteration <= config.cooling_start_delay {
            return 1.0;
        }
        let elapsed = (iteration - config.cooling_start_delay) as f32;
        (1.0 - elapsed / self.divider).max(config.cooling_factor_minimum)
    }

    fn settle(&mut self, config: &LayoutConfig, movement: f32) {
        if config.cooling && movement < config.convergence_threshold {
            self.divider = (self.divider * DIVIDER_SHRINK).max(1.0);
        }
    }
}

/// Result of one iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Largest velocity component of any moving node.
    pub max_velocity: f32,
    /// Total absolute pixel movement over all nodes.
    pub system_movement: f32,
    pub moving_nodes: usize,
}

impl StepReport {
    pub fn is_stable(&self, config: &LayoutConfig) -> bool {
        self.moving_nodes == 0
            || self.max_velocity < config.velocity_threshold
            || self.system_movement < config.convergence_stop_threshold
    }
}

struct Body {
    id: NodeId,
    position: Vec2,
    size: Vec2,
    weight: f32,
    open: bool,
    selected: bool,
    movable: bool,
    links: Vec<(usize, f32)>,
}

fn snapshot(graph: &Graph) -> Vec<Body> {
    let selected = graph.selected();
    let mut bodies = graph
        .nodes()
        .map(|node| {
            let is_selected = Some(node.id) == selected;
            Body {
                id: node.id,
                position: node.position(),
                size: node.size(),
                weight: node.weight().max(f32::EPSILON),
                open: node.is_open(),
                selected: is_selected,
                movable: !node.is_pinned() && !is_selected,
                links: Vec::new(),
            }
        })
        .collect::<Vec<_>>();

    let index = bodies
        .iter()
        .enumerate()
        .map(|(index, body)| (body.id, index))
        .collect::<HashMap<_, _>>();
    for edge in graph.edges() {
        let pair = edge.pair();
        if let (Some(&a), Some(&b)) = (index.get(&pair.first()), index.get(&pair.second())) {
            let strength = edge.strength() as f32;
            bodies[a].links.push((b, strength));
            bodies[b].links.push((a, strength));
        }
    }
    bodies
}

fn fallback_direction(index: usize, other: usize) -> Vec2 {
    let angle = (index as f32 * 0.618_034 + other as f32) * GOLDEN_ANGLE;
    vec2(angle.cos(), angle.sin())
}

fn velocity_for(bodies: &[Body], index: usize, config: &LayoutConfig) -> Vec2 {
    let body = &bodies[index];
    let mut velocity = Vec2::ZERO;

    let attraction_scale = 10.0 * (body.links.len() as f32 + config.spacing);
    for &(other, strength) in &body.links {
        let delta = body.position - bodies[other].position;
        velocity -= delta / attraction_scale * strength;
    }

    let diameter = (config.node_radius * 2.0).max(1.0);
    let repulsion = config.node_radius * config.spacing;
    for (other_index, other) in bodies.iter().enumerate() {
        if other_index == index {
            continue;
        }
        let mut delta = body.position - other.position;
        let mut distance_sq = delta.length_sq();
        if distance_sq < COINCIDENT_DISTANCE_SQ {
            delta = fallback_direction(index, other_index) * diameter;
            distance_sq = diameter * diameter;
        }
        velocity += delta / distance_sq * repulsion;
    }

    velocity
}

/// Runs one layout iteration against `graph`: forces, friction, cooling,
/// clamping, collision avoidance and frame clamping. Pinned and selected
/// nodes neither move nor have their velocity touched; pinned open nodes
/// still act as obstacles, the selected node does not.
pub(crate) fn step(
    graph: &mut Graph,
    config: &LayoutConfig,
    iteration: u32,
    cooling: &mut CoolingState,
) -> StepReport {
    let mut bodies = snapshot(graph);
    let mut report = StepReport::default();
    if bodies.is_empty() {
        return report;
    }

    let cooling_factor = cooling.factor(config, iteration);
    let limit = config.max_dist_per_move.max(0.0);
    let velocities = (0..bodies.len())
        .map(|index| {
            if !bodies[index].movable {
                return Vec2::ZERO;
            }
            let mut velocity = velocity_for(&bodies, index, config) / bodies[index].weight;
            velocity *= cooling_factor;
            velocity.x = velocity.x.clamp(-limit, limit);
            velocity.y = velocity.y.clamp(-limit, limit);
            velocity
        })
        .collect::<Vec<_>>();

    for index in 0..bodies.len() {
        if !bodies[index].movable {
            continue;
        }
        let velocity = velocities[index];
        let previous = bodies[index].position;
        let mut position = previous + velocity;
        position = vec2(position.x.round(), position.y.round());

        if bodies[index].open {
            let obstacles = bodies
                .iter()
                .enumerate()
                .filter(|(other, body)| *other != index && body.open && !body.selected)
                .map(|(_, body)| body_at(body.position, body.size))
                .collect::<Vec<_>>();
            position = resolve_collisions(position, bodies[index].size, obstacles);
        }
        position = graph.clamp_to_frame(position, bodies[index].size);

        let id = bodies[index].id;
        graph.set_velocity(id, velocity);
        if position != previous {
            graph.commit_move(id, position);
        }
        bodies[index].position = position;

        let moved = position - previous;
        report.system_movement += moved.x.abs() + moved.y.abs();
        report.max_velocity = report.max_velocity.max(velocity.x.abs().max(velocity.y.abs()));
        report.moving_nodes += 1;
    }

    cooling.settle(config, report.system_movement);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::graph::NodeKind;
    use crate::model::{DocumentId, EntityId};

    fn graph_with(count: u32) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new(
            &CanvasConfig {
                seed: Some(11),
                ..CanvasConfig::default()
            },
            4.0,
        );
        let nodes = (0..count)
            .map(|index| graph.add_node(NodeKind::Document(DocumentId(index)), "n"))
            .collect::<Vec<_>>();
        (graph, nodes)
    }

    fn run(graph: &mut Graph, config: &LayoutConfig) -> Option<u32> {
        let mut cooling = CoolingState::new(config);
        (0..config.max_iterations).find(|&iteration| {
            let report = step(graph, config, iteration, &mut cooling);
            report.max_velocity < 1.0
        })
    }

    #[test]
    fn coincident_nodes_are_pushed_apart() {
        let (mut graph, nodes) = graph_with(2);
        graph.move_node(nodes[0], vec2(800.0, 500.0)).unwrap();
        graph.move_node(nodes[1], vec2(800.0, 500.0)).unwrap();

        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        step(&mut graph, &config, 0, &mut cooling);

        let a = graph.node(nodes[0]).unwrap().position();
        let b = graph.node(nodes[1]).unwrap().position();
        assert_ne!(a, b);
    }

    #[test]
    fn connected_graph_converges_within_the_iteration_cap() {
        let (mut graph, nodes) = graph_with(8);
        for pair in nodes.windows(2) {
            graph.add_edge_entity(pair[0], pair[1], EntityId(0), 1.0).unwrap();
        }
        let config = LayoutConfig::default();
        assert!(run(&mut graph, &config).is_some());
    }

    #[test]
    fn pinned_and_selected_nodes_do_not_move() {
        let (mut graph, nodes) = graph_with(5);
        for &node in &nodes[1..] {
            graph.add_edge_entity(nodes[0], node, EntityId(0), 5.0).unwrap();
        }
        graph.pin_node(nodes[0], true).unwrap();
        graph.set_selected(Some(nodes[1])).unwrap();
        let pinned = graph.node(nodes[0]).unwrap().position();
        let selected = graph.node(nodes[1]).unwrap().position();

        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        for iteration in 0..50 {
            step(&mut graph, &config, iteration, &mut cooling);
            assert_eq!(graph.node(nodes[0]).unwrap().position(), pinned);
            assert_eq!(graph.node(nodes[1]).unwrap().position(), selected);
        }
    }

    #[test]
    fn cooling_damps_after_the_start_delay() {
        let config = LayoutConfig::default();
        let cooling = CoolingState::new(&config);
        assert_eq!(cooling.factor(&config, 10), 1.0);
        assert!(cooling.factor(&config, 250) < 1.0);
        assert_eq!(cooling.factor(&config, 10_000), config.cooling_factor_minimum);
    }

    #[test]
    fn slow_systems_shrink_the_divider() {
        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        cooling.settle(&config, config.convergence_threshold + 1.0);
        assert_eq!(cooling.divider(), config.cooling_divider);
        cooling.settle(&config, 0.0);
        assert_eq!(cooling.divider(), config.cooling_divider * 0.5);
    }

    #[test]
    fn pinned_open_nodes_push_free_ones_away() {
        let (mut graph, nodes) = graph_with(2);
        graph.move_node(nodes[0], vec2(800.0, 500.0)).unwrap();
        graph.move_node(nodes[1], vec2(850.0, 520.0)).unwrap();
        graph.set_open(nodes[0], true).unwrap();
        graph.set_open(nodes[1], true).unwrap();
        graph.pin_node(nodes[0], true).unwrap();
        let pinned = graph.node(nodes[0]).unwrap().position();

        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        for iteration in 0..5 {
            step(&mut graph, &config, iteration, &mut cooling);
        }

        let a = graph.node(nodes[0]).unwrap().body();
        let b = graph.node(nodes[1]).unwrap().body();
        let overlap = a.intersect(b);
        assert!(overlap.width() <= 0.0 || overlap.height() <= 0.0, "{a:?} overlaps {b:?}");
        assert_eq!(graph.node(nodes[0]).unwrap().position(), pinned);
    }

    #[test]
    fn the_selected_open_node_is_not_an_obstacle() {
        let (mut graph, nodes) = graph_with(2);
        graph.move_node(nodes[0], vec2(800.0, 500.0)).unwrap();
        graph.move_node(nodes[1], vec2(850.0, 520.0)).unwrap();
        graph.set_open(nodes[0], true).unwrap();
        graph.set_open(nodes[1], true).unwrap();
        graph.set_selected(Some(nodes[0])).unwrap();

        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        step(&mut graph, &config, 0, &mut cooling);

        // Only repulsion acts on the free node, a few pixels at most.
        let moved = graph.node(nodes[1]).unwrap().position() - vec2(850.0, 520.0);
        assert!(moved.length() < config.max_dist_per_move * 2.0);
        let overlap = graph.node(nodes[0]).unwrap().body().intersect(graph.node(nodes[1]).unwrap().body());
        assert!(overlap.width() > 0.0 && overlap.height() > 0.0);
    }

    #[test]
    fn small_system_movement_ends_the_run() {
        let config = LayoutConfig::default();
        assert!(config.convergence_stop_threshold < config.convergence_threshold);
        let report = |system_movement| StepReport {
            max_velocity: 3.0,
            system_movement,
            moving_nodes: 10,
        };

        // Between the two thresholds the divider shrinks but the run goes on.
        let cooling_down = report(20.0);
        assert!(!cooling_down.is_stable(&config));
        assert!(report(config.convergence_stop_threshold - 1.0).is_stable(&config));

        let eager = LayoutConfig {
            convergence_stop_threshold: 40.0,
            ..LayoutConfig::default()
        };
        assert!(cooling_down.is_stable(&eager));
    }

    #[test]
    fn nodes_stay_inside_the_canvas() {
        let (mut graph, nodes) = graph_with(12);
        let config = LayoutConfig::default();
        let mut cooling = CoolingState::new(&config);
        for iteration in 0..100 {
            step(&mut graph, &config, iteration, &mut cooling);
        }
        for node in nodes {
            assert!(graph.bounds().contains_rect(graph.node(node).unwrap().body()));
        }
    }
}
