use std::collections::HashMap;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, vec2};
use starspire::graph::{HIGHLIGHT_GENERIC, HIGHLIGHT_NONE, NodeKind};
use starspire::lock_graph;
use starspire::model::{EdgeId, NodeId};

use crate::util::{excerpt, short_label};

use super::super::ViewModel;
use super::super::highlight::Neighborhood;
use super::super::render_utils::{
    GENERIC_HIGHLIGHT, SELECTED_COLOR, blend_color, dim_color, draw_background, edge_visible,
    edge_width, hue_color, outline, quartile_color, world_to_screen,
};

/// Copy of the drawable graph state, taken under one short lock so the
/// layout worker is never held up by painting.
pub(in crate::app) struct Scene {
    pub frame: Rect,
    pub nodes: Vec<NodeSprite>,
    pub edges: Vec<EdgeSprite>,
    pub selected: Option<NodeId>,
    pub neighborhood: Option<Neighborhood>,
}

pub(in crate::app) struct NodeSprite {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub body: Rect,
    pub open: bool,
    pub pinned: bool,
    pub highlight: u16,
    pub quartile: u8,
}

pub(in crate::app) struct EdgeSprite {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
    pub strength: f64,
}

impl NodeSprite {
    pub(in crate::app) fn screen_body(&self, rect: Rect, pan: egui::Vec2, zoom: f32) -> Rect {
        Rect::from_min_max(
            world_to_screen(rect, pan, zoom, self.body.min.to_vec2()),
            world_to_screen(rect, pan, zoom, self.body.max.to_vec2()),
        )
    }
}

impl ViewModel {
    pub(in crate::app) fn capture_scene(&self) -> Scene {
        let graph = lock_graph(self.workspace.graph());
        let mut nodes = graph
            .nodes()
            .map(|node| NodeSprite {
                id: node.id,
                kind: node.kind,
                label: node.label.clone(),
                body: node.body(),
                open: node.is_open(),
                pinned: node.is_pinned(),
                highlight: node.highlight(),
                quartile: node.ranking().quartile,
            })
            .collect::<Vec<_>>();
        // Open nodes paint over closed ones.
        nodes.sort_by_key(|node| node.open);

        let edges = graph
            .edges()
            .map(|edge| EdgeSprite {
                id: edge.id,
                a: edge.pair().first(),
                b: edge.pair().second(),
                strength: edge.strength(),
            })
            .collect();

        let selected = graph.selected();
        Scene {
            frame: graph.bounds(),
            nodes,
            edges,
            selected,
            neighborhood: selected.map(|id| Neighborhood::of(&graph, id)),
        }
    }

    fn highlight_color(&self, code: u16) -> Option<Color32> {
        match code {
            HIGHLIGHT_NONE => None,
            HIGHLIGHT_GENERIC => Some(GENERIC_HIGHLIGHT),
            code => self
                .workspace
                .store()
                .searches()
                .find(|search| search.highlight_code() == code)
                .map(|search| hue_color(search.hue)),
        }
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_graph_navigation(ui, rect, &response);

        let scene = self.capture_scene();
        let pan = self.pan;
        let zoom = self.zoom;
        draw_background(&painter, rect, scene.frame, pan, zoom);

        let centers = scene
            .nodes
            .iter()
            .map(|node| {
                (
                    node.id,
                    world_to_screen(rect, pan, zoom, node.body.center().to_vec2()),
                )
            })
            .collect::<HashMap<NodeId, Pos2>>();
        let focus = scene
            .neighborhood
            .as_ref()
            .filter(|neighborhood| !neighborhood.is_empty());

        let mut visible_edges = 0usize;
        for edge in &scene.edges {
            let (Some(&start), Some(&end)) = (centers.get(&edge.a), centers.get(&edge.b)) else {
                continue;
            };
            if !edge_visible(rect, start, end, 3.0) {
                continue;
            }
            let color = match focus {
                Some(neighborhood) if neighborhood.edges.contains(&edge.id) => {
                    Color32::from_rgb(241, 146, 94)
                }
                Some(_) => Color32::from_rgba_unmultiplied(80, 90, 104, 90),
                None => Color32::from_rgba_unmultiplied(120, 128, 140, 170),
            };
            painter.line_segment(
                [start, end],
                Stroke::new(edge_width(edge.strength, zoom), color),
            );
            visible_edges += 1;
        }
        self.visible_edge_count = visible_edges;

        let hovered = self.hovered_node(ui, rect, &scene);
        let mut visible_nodes = 0usize;
        for node in &scene.nodes {
            let body = node.screen_body(rect, pan, zoom);
            if !body.expand(4.0).intersects(rect) {
                continue;
            }
            visible_nodes += 1;

            let is_selected = scene.selected == Some(node.id);
            let is_hovered = hovered == Some(node.id);
            let in_focus = focus.is_none_or(|neighborhood| neighborhood.nodes.contains(&node.id));

            let base = match node.kind {
                NodeKind::Document(_) => quartile_color(node.quartile),
                NodeKind::Search(search) => self
                    .workspace
                    .store()
                    .search(search)
                    .map(|search| hue_color(search.hue))
                    .unwrap_or(GENERIC_HIGHLIGHT),
            };
            let fill = if is_selected {
                blend_color(base, SELECTED_COLOR, 0.7)
            } else if is_hovered {
                blend_color(base, Color32::WHITE, 0.25)
            } else if in_focus {
                base
            } else {
                dim_color(base, 0.45)
            };
            let ring = self.highlight_color(node.highlight);

            if node.open {
                self.draw_open_node(&painter, node, body, fill, ring, is_selected);
            } else {
                let center = body.center();
                let radius = (body.width() * 0.5).max(2.5);
                painter.circle_filled(center, radius, fill);
                if let Some(ring) = ring {
                    painter.circle_stroke(center, radius + 3.0, Stroke::new(2.5, ring));
                }
                let border = if is_selected { 2.2 } else { 1.0 };
                painter.circle_stroke(
                    center,
                    radius,
                    Stroke::new(border, Color32::from_rgba_unmultiplied(15, 15, 15, 190)),
                );
                if is_selected || is_hovered || ring.is_some() || zoom > 0.7 {
                    painter.text(
                        center + vec2(radius + 5.0, 0.0),
                        Align2::LEFT_CENTER,
                        short_label(&node.label, 32),
                        FontId::proportional(12.0),
                        Color32::from_gray(if in_focus { 238 } else { 150 }),
                    );
                }
            }

            if node.pinned {
                painter.circle_filled(body.right_top(), 3.5, Color32::from_gray(220));
            }
        }
        self.visible_node_count = visible_nodes;

        if let Some(id) = hovered
            && let Some(node) = scene.nodes.iter().find(|node| node.id == id)
        {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                self.hover_summary(node),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        self.handle_node_drag(&response, rect, hovered, &scene);
        if response.double_clicked_by(egui::PointerButton::Primary) {
            if let Some(id) = hovered
                && let Some(node) = scene.nodes.iter().find(|node| node.id == id)
            {
                let result = self.workspace.set_open(id, !node.open);
                self.report("toggle node", result);
            }
        } else if response.clicked_by(egui::PointerButton::Primary) {
            self.select(hovered);
        }
    }

    fn draw_open_node(
        &self,
        painter: &egui::Painter,
        node: &NodeSprite,
        body: Rect,
        fill: Color32,
        ring: Option<Color32>,
        is_selected: bool,
    ) {
        painter.rect_filled(body, 4.0, dim_color(fill, 0.35));
        let header = Rect::from_min_size(body.min, vec2(body.width(), 20.0_f32.min(body.height())));
        painter.rect_filled(header, 4.0, fill);
        if let Some(ring) = ring {
            outline(painter, body.expand(3.0), Stroke::new(2.5, ring));
        }
        let border = if is_selected { SELECTED_COLOR } else { Color32::from_gray(30) };
        outline(painter, body, Stroke::new(1.2, border));

        let width_chars = ((body.width() / 7.0) as usize).max(8);
        painter.text(
            header.left_center() + vec2(6.0, 0.0),
            Align2::LEFT_CENTER,
            short_label(&node.label, width_chars),
            FontId::proportional(12.0),
            Color32::from_gray(20),
        );

        let Some(document) = node
            .kind
            .document()
            .and_then(|id| self.workspace.store().document(id))
        else {
            return;
        };
        let line_height = 14.0;
        let max_lines = ((body.height() - 26.0) / line_height).max(0.0) as usize;
        for (index, line) in excerpt(document.content(), max_lines, width_chars)
            .into_iter()
            .enumerate()
        {
            painter.text(
                body.left_top() + vec2(6.0, 26.0 + index as f32 * line_height),
                Align2::LEFT_TOP,
                line,
                FontId::proportional(11.0),
                Color32::from_gray(215),
            );
        }
    }

    fn hover_summary(&self, node: &NodeSprite) -> String {
        match node.kind {
            NodeKind::Document(id) => match self.workspace.store().document(id) {
                Some(document) => format!(
                    "{}  |  rank {}  |  quartile {}  |  {} entities",
                    document.name,
                    document.ranking().rank + 1,
                    document.ranking().quartile + 1,
                    document.entities().len()
                ),
                None => node.label.clone(),
            },
            NodeKind::Search(id) => match self.workspace.store().search(id) {
                Some(search) => format!(
                    "search \"{}\"  |  {} results",
                    search.query, search.result_count
                ),
                None => node.label.clone(),
            },
        }
    }
}
