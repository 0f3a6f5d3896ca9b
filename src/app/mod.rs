use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use eframe::egui::{self, Context, Vec2};
use starspire::controller::extraction::ExtractionBatch;
use starspire::graph::RenderFeedback;
use starspire::model::{DocumentId, NodeId};
use starspire::{EngineConfig, PendingHighlight, Workspace};
use tracing::{error, warn};

use crate::corpus::{Source, open_workspace};

mod graph;
mod highlight;
mod render_utils;
mod ui;

pub struct StarSpireApp {
    source: Source,
    config: EngineConfig,
    ctx: Context,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Workspace, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    workspace: Workspace,
    extraction_rx: Option<Receiver<ExtractionBatch>>,
    pending_highlights: Vec<PendingHighlight>,
    pan: Vec2,
    zoom: f32,
    search: String,
    entity_name: String,
    entity_soft: bool,
    entity_filter: String,
    highlight_phrase: String,
    notes_draft: Option<(DocumentId, String)>,
    link_source: Option<DocumentId>,
    dragging: Option<Drag>,
    project_path: String,
    status: Option<Status>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

#[derive(Clone, Copy)]
struct Drag {
    node: NodeId,
    grab_offset: Vec2,
}

struct Status {
    text: String,
    is_error: bool,
}

/// Wakes the UI whenever the layout worker or a structural edit changes
/// what is on screen.
struct RepaintFeedback {
    ctx: Context,
}

impl RenderFeedback for RepaintFeedback {
    fn node_moved(&self, _node: NodeId, _position: Vec2) {
        self.ctx.request_repaint();
    }

    fn node_changed(&self, _node: NodeId) {
        self.ctx.request_repaint();
    }

    fn structure_changed(&self) {
        self.ctx.request_repaint();
    }
}

impl StarSpireApp {
    pub fn new(cc: &eframe::CreationContext<'_>, source: Source, config: EngineConfig) -> Self {
        let ctx = cc.egui_ctx.clone();
        let state = Self::start_load(&ctx, source.clone(), config.clone());
        Self {
            source,
            config,
            ctx,
            state,
        }
    }

    fn spawn_load(
        ctx: &Context,
        source: Source,
        config: EngineConfig,
    ) -> Receiver<Result<Workspace, String>> {
        let (tx, rx) = mpsc::channel();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let result = open_workspace(&source, config).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
            ctx.request_repaint();
        });

        rx
    }

    fn start_load(ctx: &Context, source: Source, config: EngineConfig) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(ctx, source, config),
        }
    }

    fn ready(&self, workspace: Workspace) -> AppState {
        workspace.set_render_feedback(Some(Arc::new(RepaintFeedback {
            ctx: self.ctx.clone(),
        })));
        if let Err(error) = workspace.start_layout() {
            warn!(%error, "layout worker did not start");
        }
        let project_path = match &self.source {
            Source::Project(path) => path.display().to_string(),
            _ => "starspire-project.json".to_owned(),
        };
        AppState::Ready(Box::new(ViewModel::new(workspace, project_path)))
    }
}

impl eframe::App for StarSpireApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;
        let mut retry = false;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(result);
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading {}...", self.source.describe()));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open workspace");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
            }
            AppState::Ready(model) => model.show(ctx, &self.source),
        }

        if retry {
            self.state = Self::start_load(&self.ctx, self.source.clone(), self.config.clone());
        }

        if let Some(result) = transition {
            self.state = match result {
                Ok(workspace) => self.ready(workspace),
                Err(message) => {
                    error!(%message, "workspace load failed");
                    AppState::Error(message)
                }
            };
        }
    }
}
