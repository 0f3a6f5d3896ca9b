use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;

use eframe::egui::{self, Align, Color32, Context, Layout, RichText, Vec2};
use starspire::model::NodeId;
use starspire::{CoreError, LayoutPhase, Workspace, lock_graph};
use tracing::{info, warn};

use crate::corpus::Source;

use super::super::{Status, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(workspace: Workspace, project_path: String) -> Self {
        let frame = lock_graph(workspace.graph()).bounds();
        let zoom = 0.6;
        Self {
            workspace,
            extraction_rx: None,
            pending_highlights: Vec::new(),
            pan: -frame.center().to_vec2() * zoom,
            zoom,
            search: String::new(),
            entity_name: String::new(),
            entity_soft: false,
            entity_filter: String::new(),
            highlight_phrase: String::new(),
            notes_draft: None,
            link_source: None,
            dragging: None,
            project_path,
            status: None,
            visible_node_count: 0,
            visible_edge_count: 0,
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, source: &Source) {
        self.poll_extraction();
        self.poll_highlights();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("StarSpire");
                    ui.separator();
                    ui.label(source.describe());
                    let store = self.workspace.store();
                    ui.label(format!(
                        "documents: {} / {}",
                        store.visible_documents().count(),
                        store.document_count()
                    ));
                    ui.label(format!("entities: {}", store.entity_count()));
                    ui.label(format!("searches: {}", store.search_count()));
                    ui.label(format!("layout: {}", phase_label(self.workspace.layout_phase())));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!(
                            "in view: {} nodes, {} edges",
                            self.visible_node_count, self.visible_edge_count
                        ));
                        if let Some(status) = &self.status {
                            let color = if status.is_error {
                                Color32::from_rgb(235, 110, 100)
                            } else {
                                Color32::from_gray(200)
                            };
                            ui.label(RichText::new(status.text.as_str()).color(color));
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));

        if self.extraction_rx.is_some()
            || !self.pending_highlights.is_empty()
            || self.workspace.layout_phase() == LayoutPhase::Running
        {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn poll_extraction(&mut self) {
        let Some(rx) = self.extraction_rx.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(batch) => {
                let documents = batch.results.len();
                let result = self.workspace.apply_extraction(batch);
                if let Some(created) = self.report("apply extraction", result) {
                    self.note(format!(
                        "extracted {} entities from {documents} documents",
                        created.len()
                    ));
                }
            }
            Err(TryRecvError::Empty) => self.extraction_rx = Some(rx),
            Err(TryRecvError::Disconnected) => {
                self.fail_with("extraction worker disconnected".to_owned());
            }
        }
    }

    fn poll_highlights(&mut self) {
        let mut still_pending = Vec::new();
        for pending in std::mem::take(&mut self.pending_highlights) {
            match pending.receiver().try_recv() {
                Ok(batch) => {
                    let result = self.workspace.apply_highlight_extraction(&pending, batch);
                    if let Some(outcome) = self.report("highlight", result) {
                        self.note(format!(
                            "highlight: {} entities, {} documents added, {} pruned",
                            outcome.entities.len(),
                            outcome.admitted.len(),
                            outcome.pruned.len()
                        ));
                    }
                }
                Err(TryRecvError::Empty) => still_pending.push(pending),
                Err(TryRecvError::Disconnected) => {
                    self.fail_with("highlight extraction worker disconnected".to_owned());
                }
            }
        }
        self.pending_highlights = still_pending;
    }

    pub(in crate::app) fn start_extraction(&mut self) {
        if self.extraction_rx.is_none() {
            self.extraction_rx = Some(self.workspace.extract_all());
            self.note("extracting entities...");
        }
    }

    pub(in crate::app) fn save_project(&mut self) {
        let path = PathBuf::from(self.project_path.trim());
        match self.workspace.snapshot().save(&path) {
            Ok(()) => {
                info!(path = %path.display(), "project saved");
                self.note(format!("saved {}", path.display()));
            }
            Err(error) => self.fail("save project", &error),
        }
    }

    pub(in crate::app) fn selected_node(&self) -> Option<NodeId> {
        lock_graph(self.workspace.graph()).selected()
    }

    pub(in crate::app) fn select(&mut self, node: Option<NodeId>) {
        if self.selected_node() == node {
            return;
        }
        let result = self.workspace.set_selected(node);
        if self.report("select node", result).is_some() {
            self.notes_draft = None;
            self.highlight_phrase.clear();
        }
    }

    pub(in crate::app) fn focus_node(&mut self, node: NodeId) {
        let center = lock_graph(self.workspace.graph())
            .node(node)
            .map(|node| node.position());
        if let Some(center) = center {
            self.pan = -center * self.zoom;
        }
        self.select(Some(node));
    }

    /// Logs and surfaces a failed operation; passes the value through on success.
    pub(in crate::app) fn report<T>(
        &mut self,
        action: &str,
        result: starspire::Result<T>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.fail(action, &error);
                None
            }
        }
    }

    pub(in crate::app) fn note(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    fn fail(&mut self, action: &str, error: &CoreError) {
        warn!(%error, action, "operation failed");
        self.fail_with(format!("{action}: {error}"));
    }

    fn fail_with(&mut self, text: String) {
        self.status = Some(Status {
            text,
            is_error: true,
        });
    }

    pub(in crate::app) fn reset_view(&mut self) {
        let frame = lock_graph(self.workspace.graph()).bounds();
        self.zoom = 0.6;
        self.pan = -frame.center().to_vec2() * self.zoom;
    }

    /// Zooms by `factor` keeping the world point under `anchor` (an offset
    /// from the canvas centre) fixed on screen.
    pub(in crate::app) fn zoom_at(&mut self, anchor: Vec2, factor: f32) {
        let zoom = (self.zoom * factor).clamp(0.1, 5.0);
        let world = (anchor - self.pan) / self.zoom;
        self.pan = anchor - world * zoom;
        self.zoom = zoom;
    }
}

pub(in crate::app) fn phase_label(phase: LayoutPhase) -> &'static str {
    match phase {
        LayoutPhase::Stopped => "stopped",
        LayoutPhase::Running => "running",
        LayoutPhase::Idle => "settled",
    }
}
