use eframe::egui::{self, Key, RichText, Ui, Vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use starspire::model::{EntityId, SearchId, StrengthChange};

use crate::util::{format_strength, short_label};

use super::super::ViewModel;
use super::super::render_utils::hue_color;
use super::panels::phase_label;

const STRENGTH_STEP: f64 = 0.5;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

struct EntityRow {
    id: EntityId,
    name: String,
    strength: f64,
    documents: usize,
    soft: bool,
}

enum EntityAction {
    Strengthen(EntityId),
    Weaken(EntityId, f64),
    Remove(EntityId),
}

fn submitted(ui: &Ui, response: &egui::Response) -> bool {
    response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter))
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Workspace");
        ui.separator();
        ui.add_space(4.0);

        egui::ScrollArea::vertical()
            .id_salt("controls_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.draw_layout_controls(ui);
                ui.separator();
                self.draw_project_controls(ui);
                ui.separator();
                self.draw_search_controls(ui);
                ui.separator();
                self.draw_entity_controls(ui);
            });
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Layout").strong());
        let phase = self.workspace.layout_phase();
        let running = self.workspace.layout().is_running();
        ui.horizontal(|ui| {
            ui.label(format!("worker: {}", phase_label(phase)));
            if running {
                if ui.button("Stop").clicked() {
                    self.workspace.stop_layout();
                }
            } else if ui.button("Start").clicked() {
                let result = self.workspace.start_layout();
                self.report("start layout", result);
            }
        });

        let mut paused = self.workspace.layout().is_paused();
        if ui
            .checkbox(&mut paused, "Pause layout")
            .on_hover_text("Keep positions frozen; edits are picked up when resumed.")
            .changed()
        {
            self.workspace.set_layout_paused(paused);
        }

        let stats = self.workspace.layout().stats();
        ui.small(format!(
            "runs {}  |  iterations {}  |  last max velocity {:.2}",
            stats.runs, stats.iterations, stats.last_report.max_velocity
        ));
        if stats.panics > 0 {
            ui.colored_label(
                egui::Color32::from_rgb(235, 110, 100),
                format!("{} layout iterations failed; see log", stats.panics),
            );
        }

        ui.horizontal(|ui| {
            if ui.button("Zoom in").clicked() {
                self.zoom_at(Vec2::ZERO, 1.2);
            }
            if ui.button("Zoom out").clicked() {
                self.zoom_at(Vec2::ZERO, 1.0 / 1.2);
            }
            if ui.button("Reset view").clicked() {
                self.reset_view();
            }
        });
    }

    fn draw_project_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Project").strong());
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.project_path);
            if ui.button("Save project").clicked() {
                self.save_project();
            }
        });

        ui.horizontal(|ui| {
            let pending = self.extraction_rx.is_some();
            if ui
                .add_enabled(!pending, egui::Button::new("Extract entities"))
                .on_hover_text("Scan every document for names in the background.")
                .clicked()
            {
                self.start_extraction();
            }
            if pending {
                ui.spinner();
            }
            if ui
                .button("Rerank")
                .on_hover_text("Rank every document and refill the visible budget.")
                .clicked()
            {
                let result = self.workspace.rerank();
                if self.report("rerank", result).is_some() {
                    self.note("reranked");
                }
            }
        });
    }

    fn draw_search_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Search").strong());
        let mut run_search = false;
        ui.horizontal(|ui| {
            let response = ui.text_edit_singleline(&mut self.search);
            run_search |= submitted(ui, &response);
            run_search |= ui.button("Search").clicked();
        });
        if run_search {
            let query = self.search.trim().to_owned();
            let result = self.workspace.search(&query);
            if let Some(id) = self.report("search", result) {
                let count = self
                    .workspace
                    .store()
                    .search(id)
                    .map_or(0, |search| search.result_count);
                self.note(format!("\"{query}\" matched {count} documents"));
                self.search.clear();
            }
        }

        let searches = self
            .workspace
            .store()
            .searches()
            .map(|search| (search.id, search.query.clone(), search.hue, search.result_count))
            .collect::<Vec<_>>();
        if searches.is_empty() {
            ui.weak("No searches yet.");
            return;
        }

        let mut focus: Option<SearchId> = None;
        let mut remove: Option<SearchId> = None;
        for (id, query, hue, count) in searches {
            ui.horizontal(|ui| {
                ui.colored_label(hue_color(hue), "●");
                if ui
                    .link(format!("{}  ({count})", short_label(&query, 28)))
                    .clicked()
                {
                    focus = Some(id);
                }
                if ui.small_button("x").on_hover_text("Remove search").clicked() {
                    remove = Some(id);
                }
            });
        }

        if let Some(id) = focus
            && let Some(node) = self.workspace.node_for_search(id)
        {
            self.focus_node(node);
        }
        if let Some(id) = remove {
            let result = self.workspace.remove_search(id);
            self.report("remove search", result);
        }
    }

    fn draw_entity_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Entities").strong());
        let mut add = false;
        ui.horizontal(|ui| {
            let response = ui.text_edit_singleline(&mut self.entity_name);
            add |= submitted(ui, &response);
            add |= ui.button("Add").clicked();
        });
        ui.checkbox(&mut self.entity_soft, "Soft (user-supplied term)");
        if add && !self.entity_name.trim().is_empty() {
            let name = self.entity_name.trim().to_owned();
            let result = self.workspace.add_entity(&name, self.entity_soft);
            if self.report("add entity", result).is_some() {
                self.note(format!("added entity \"{name}\""));
                self.entity_name.clear();
            }
        }

        ui.add_space(4.0);
        ui.label("Filter")
            .on_hover_text("Fuzzy-match entity names.");
        ui.text_edit_singleline(&mut self.entity_filter);

        let rows = self.entity_rows();
        ui.small(format!(
            "{} of {} entities, total strength {}",
            rows.len(),
            self.workspace.store().entity_count(),
            format_strength(self.workspace.store().total_strength())
        ));

        let mut action = None;
        egui::ScrollArea::vertical()
            .id_salt("entity_rows")
            .max_height(360.0)
            .auto_shrink([false, true])
            .show_rows(ui, 22.0, rows.len(), |ui, row_range| {
                for row in &rows[row_range] {
                    ui.horizontal(|ui| {
                        let label = if row.soft {
                            format!("{}  ({}, soft)", short_label(&row.name, 24), row.documents)
                        } else {
                            format!("{}  ({})", short_label(&row.name, 24), row.documents)
                        };
                        ui.label(label).on_hover_text(row.name.as_str());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("x").on_hover_text("Remove entity").clicked() {
                                action = Some(EntityAction::Remove(row.id));
                            }
                            if ui.small_button("+").clicked() {
                                action = Some(EntityAction::Strengthen(row.id));
                            }
                            if ui.small_button("-").clicked() {
                                action = Some(EntityAction::Weaken(row.id, row.strength));
                            }
                            ui.monospace(format_strength(row.strength));
                        });
                    });
                }
            });

        match action {
            Some(EntityAction::Strengthen(id)) => {
                let result = self.workspace.increase_entity_strength(id, STRENGTH_STEP);
                self.report("strengthen entity", result);
            }
            Some(EntityAction::Weaken(id, current)) => {
                let value = (current - STRENGTH_STEP).max(0.0);
                let result =
                    self.workspace
                        .set_entity_strength(id, value, StrengthChange::Conserving);
                self.report("weaken entity", result);
            }
            Some(EntityAction::Remove(id)) => {
                let result = self.workspace.remove_entity(id);
                self.report("remove entity", result);
            }
            None => {}
        }
    }

    fn entity_rows(&self) -> Vec<EntityRow> {
        let filter = self.entity_filter.trim();
        let matcher = SkimMatcherV2::default();
        let mut rows = self
            .workspace
            .store()
            .entities()
            .filter(|entity| {
                filter.is_empty() || fuzzy_match_score(&matcher, entity.name(), filter).is_some()
            })
            .map(|entity| EntityRow {
                id: entity.id,
                name: entity.name().to_owned(),
                strength: entity.strength(),
                documents: entity.documents().len(),
                soft: entity.soft_data,
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }
}
