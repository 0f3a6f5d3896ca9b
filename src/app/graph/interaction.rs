use eframe::egui::{self, Rect, Ui};
use starspire::model::NodeId;

use super::super::render_utils::screen_to_world;
use super::super::{Drag, ViewModel};
use super::view::Scene;

impl ViewModel {
    /// Wheel zoom anchored at the pointer; secondary or middle drags pan.
    pub(in crate::app) fn handle_graph_navigation(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
        if !response.hovered() {
            return;
        }

        let (scroll, pointer) =
            ui.input(|input| (input.raw_scroll_delta.y, input.pointer.hover_pos()));
        if scroll == 0.0 {
            return;
        }
        let anchor = pointer.map_or(egui::Vec2::ZERO, |pointer| pointer - rect.center());
        self.zoom_at(anchor, (scroll * 0.002).exp());
    }

    /// Topmost node under the pointer. Closed nodes are hit as circles.
    pub(in crate::app) fn hovered_node(&self, ui: &Ui, rect: Rect, scene: &Scene) -> Option<NodeId> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }
        scene
            .nodes
            .iter()
            .rev()
            .find(|node| {
                let body = node.screen_body(rect, self.pan, self.zoom);
                if node.open {
                    body.contains(pointer)
                } else {
                    body.center().distance(pointer) <= (body.width() * 0.5).max(4.0)
                }
            })
            .map(|node| node.id)
    }

    /// Primary-button drags move the grabbed node; the layout treats the
    /// new position as a user edit and resettles around it.
    pub(in crate::app) fn handle_node_drag(
        &mut self,
        response: &egui::Response,
        rect: Rect,
        hovered: Option<NodeId>,
        scene: &Scene,
    ) {
        let pointer_world = response
            .interact_pointer_pos()
            .map(|pointer| screen_to_world(rect, self.pan, self.zoom, pointer));

        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(id) = hovered
            && let Some(node) = scene.nodes.iter().find(|node| node.id == id)
            && let Some(world) = pointer_world
        {
            self.dragging = Some(Drag {
                node: id,
                grab_offset: node.body.center().to_vec2() - world,
            });
        }

        if let Some(drag) = self.dragging
            && response.dragged_by(egui::PointerButton::Primary)
            && let Some(world) = pointer_world
        {
            let result = self.workspace.move_node(drag.node, world + drag.grab_offset);
            if self.report("move node", result).is_none() {
                self.dragging = None;
            }
        }

        if response.drag_stopped() {
            self.dragging = None;
        }
    }
}
