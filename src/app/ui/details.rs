use eframe::egui::{self, Color32, RichText, Ui};
use starspire::graph::NodeKind;
use starspire::lock_graph;
use starspire::model::{DocumentId, NodeId, SearchId};

use crate::util::{format_strength, phrase_range, short_label};

use super::super::ViewModel;
use super::super::highlight::related_entries;

struct SelectedNode {
    id: NodeId,
    kind: NodeKind,
    open: bool,
    pinned: bool,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection");
        ui.add_space(6.0);

        let selected = {
            let graph = lock_graph(self.workspace.graph());
            graph.selected().and_then(|id| graph.node(id)).map(|node| SelectedNode {
                id: node.id,
                kind: node.kind,
                open: node.is_open(),
                pinned: node.is_pinned(),
            })
        };
        let Some(selected) = selected else {
            ui.label("Select a node on the canvas.");
            if let Some(source) = self.link_source {
                ui.add_space(6.0);
                self.draw_link_pending(ui, source);
            }
            return;
        };

        egui::ScrollArea::vertical()
            .id_salt("details_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                match selected.kind {
                    NodeKind::Document(document) => self.draw_document_details(ui, &selected, document),
                    NodeKind::Search(search) => self.draw_search_details(ui, search),
                }

                ui.horizontal(|ui| {
                    let open_label = if selected.open { "Close" } else { "Open" };
                    if ui.button(open_label).clicked() {
                        let result = self.workspace.set_open(selected.id, !selected.open);
                        self.report("toggle node", result);
                    }
                    let pin_label = if selected.pinned { "Unpin" } else { "Pin" };
                    if ui.button(pin_label).clicked() {
                        let result = self.workspace.pin_node(selected.id, !selected.pinned);
                        self.report("pin node", result);
                    }
                });

                ui.separator();
                self.draw_related(ui, selected.id);
            });
    }

    fn draw_document_details(&mut self, ui: &mut Ui, selected: &SelectedNode, id: DocumentId) {
        let Some(document) = self.workspace.store().document(id) else {
            ui.label("The selected document no longer exists.");
            return;
        };
        let name = document.name.clone();
        let ranking = document.ranking();
        let recency = document.recency();
        let total = document.total_strength();
        let content = document.content().to_owned();
        let highlights = document
            .highlights()
            .iter()
            .filter_map(|highlight| content.get(highlight.range()).map(str::to_owned))
            .collect::<Vec<_>>();
        let mut entities = document
            .entities()
            .iter()
            .filter_map(|entity| self.workspace.store().entity(*entity))
            .map(|entity| (entity.name().to_owned(), entity.strength()))
            .collect::<Vec<_>>();
        entities.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if self.notes_draft.as_ref().is_none_or(|(draft_id, _)| *draft_id != id) {
            self.notes_draft = Some((id, document.notes.clone()));
        }

        ui.label(RichText::new(name.as_str()).strong());
        ui.small(format!(
            "rank {}  |  quartile {}  |  idle for {} queries  |  strength {}",
            ranking.rank + 1,
            ranking.quartile + 1,
            recency,
            format_strength(total)
        ));
        ui.add_space(6.0);

        egui::CollapsingHeader::new(format!("Entities ({})", entities.len()))
            .id_salt("document_entities")
            .default_open(true)
            .show(ui, |ui| {
                if entities.is_empty() {
                    ui.weak("No entities mention this document yet.");
                }
                for (entity, strength) in &entities {
                    ui.label(format!("{}  {}", short_label(entity, 30), format_strength(*strength)));
                }
            });

        egui::CollapsingHeader::new("Text")
            .id_salt("document_text")
            .default_open(!selected.open)
            .show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("document_text_scroll")
                    .max_height(220.0)
                    .show(ui, |ui| {
                        ui.label(content.as_str());
                    });
            });

        ui.separator();
        ui.label(RichText::new("Highlight").strong())
            .on_hover_text("Mark a phrase; it becomes a query that can pull in related documents.");
        let mut run_highlight = false;
        ui.horizontal(|ui| {
            let response = ui.text_edit_singleline(&mut self.highlight_phrase);
            run_highlight |=
                response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            run_highlight |= ui.button("Highlight").clicked();
        });
        if run_highlight {
            match phrase_range(&content, &self.highlight_phrase) {
                Some((start, end)) => {
                    let result = self.workspace.highlight(id, start, end);
                    if let Some(pending) = self.report("highlight", result) {
                        self.note(format!(
                            "highlighted \"{}\"; extracting...",
                            short_label(&pending.phrase, 32)
                        ));
                        self.pending_highlights.push(pending);
                        self.highlight_phrase.clear();
                    }
                }
                None => self.note("phrase not found in this document"),
            }
        }
        for highlight in &highlights {
            ui.label(RichText::new(short_label(highlight, 48)).color(Color32::from_rgb(103, 196, 255)));
        }

        ui.separator();
        ui.label(RichText::new("Notes").strong());
        let mut save_notes = false;
        if let Some((_, draft)) = self.notes_draft.as_mut() {
            ui.add(egui::TextEdit::multiline(draft).desired_rows(3));
            save_notes = ui.button("Save notes").clicked();
        }
        if save_notes && let Some((_, draft)) = self.notes_draft.clone() {
            let result = self.workspace.set_document_notes(id, &draft);
            if self.report("save notes", result).is_some() {
                self.note("notes saved");
            }
        }

        ui.separator();
        match self.link_source {
            Some(source) if source != id => self.draw_link_pending(ui, source),
            Some(_) => {
                ui.horizontal(|ui| {
                    ui.label("Select another document to link.");
                    if ui.button("Cancel").clicked() {
                        self.link_source = None;
                    }
                });
            }
            None => {
                if ui
                    .button("Link with...")
                    .on_hover_text("Connect this document to another one you pick next.")
                    .clicked()
                {
                    self.link_source = Some(id);
                }
            }
        }

        if ui
            .button(RichText::new("Remove document").color(Color32::from_rgb(235, 110, 100)))
            .clicked()
        {
            let result = self.workspace.remove_document(id);
            if self.report("remove document", result).is_some() {
                self.notes_draft = None;
                if self.link_source == Some(id) {
                    self.link_source = None;
                }
            }
        }
    }

    fn draw_link_pending(&mut self, ui: &mut Ui, source: DocumentId) {
        let target = self
            .selected_node()
            .and_then(|node| lock_graph(self.workspace.graph()).node(node).map(|node| node.kind))
            .and_then(NodeKind::document)
            .filter(|target| *target != source);
        let source_name = self
            .workspace
            .store()
            .document(source)
            .map_or_else(|| source.to_string(), |document| document.name.clone());

        ui.horizontal(|ui| {
            match target {
                Some(target) => {
                    if ui.button(format!("Link with {}", short_label(&source_name, 24))).clicked() {
                        let result = self.workspace.link_documents(source, target);
                        if let Some(outcome) = self.report("link documents", result) {
                            self.note(format!(
                                "linked: {} entities, {} documents added",
                                outcome.entities.len(),
                                outcome.admitted.len()
                            ));
                            self.link_source = None;
                        }
                    }
                }
                None => {
                    ui.label(format!("Linking from {}", short_label(&source_name, 24)));
                }
            }
            if ui.button("Cancel").clicked() {
                self.link_source = None;
            }
        });
    }

    fn draw_search_details(&mut self, ui: &mut Ui, id: SearchId) {
        let Some(search) = self.workspace.store().search(id) else {
            ui.label("The selected search no longer exists.");
            return;
        };
        ui.label(RichText::new(format!("Search \"{}\"", search.query)).strong());
        ui.small(format!(
            "{} matching documents  |  hue {:.0}",
            search.result_count, search.hue
        ));
        if ui.button("Remove search").clicked() {
            let result = self.workspace.remove_search(id);
            self.report("remove search", result);
        }
    }

    fn draw_related(&mut self, ui: &mut Ui, selected: NodeId) {
        let related = {
            let graph = lock_graph(self.workspace.graph());
            related_entries(&graph, self.workspace.store(), selected)
        };
        ui.label(RichText::new(format!("Connected nodes ({})", related.len())).strong());
        if related.is_empty() {
            ui.weak("No shared entities with any visible node.");
            return;
        }

        let mut focus = None;
        for entry in &related {
            let label = format!(
                "{}  {}",
                short_label(&entry.label, 28),
                format_strength(entry.strength)
            );
            if ui
                .link(label)
                .on_hover_text(entry.shared.join(", "))
                .clicked()
            {
                focus = Some(entry.node);
            }
        }
        if let Some(node) = focus {
            self.focus_node(node);
        }
    }
}
