//! Relevance ranking and visibility management.
//!
//! Documents are ordered by the summed strength of their entities. The order
//! drives rank and quartile, the visible-document budget, pruning of weak
//! documents and retrieval of hidden ones.

mod retrieval;

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::RankingConfig;
use crate::error::Result;
use crate::model::{DocumentId, Ranking};
use crate::store::EntityStore;

pub use retrieval::RetrievalMode;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RerankOutcome {
    pub shown: Vec<DocumentId>,
    pub hidden: Vec<DocumentId>,
}

impl RerankOutcome {
    pub fn changed(&self) -> bool {
        !self.shown.is_empty() || !self.hidden.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Refreshes every document's cached strength and returns the documents
    /// sorted most relevant first. The sort is stable, so equal strengths keep
    /// insertion order.
    fn sorted_by_strength(store: &mut EntityStore) -> Vec<(DocumentId, f64)> {
        let ids = store.documents().map(|document| document.id).collect::<Vec<_>>();
        let mut sorted = ids
            .into_iter()
            .map(|id| (id, store.refresh_total_strength(id)))
            .collect::<Vec<_>>();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        sorted
    }

    fn assign_rankings(store: &mut EntityStore, sorted: &[(DocumentId, f64)]) {
        let population = sorted.len();
        for (index, (id, _)) in sorted.iter().enumerate() {
            store.set_document_ranking(
                *id,
                Ranking {
                    rank: index,
                    quartile: quartile_for(index, population),
                },
            );
        }
    }

    /// Updates rank and quartile without touching visibility.
    pub fn quick_quartile(&self, store: &mut EntityStore) {
        let sorted = Self::sorted_by_strength(store);
        Self::assign_rankings(store, &sorted);
    }

    /// Full pass: ranks every document and shows exactly the top
    /// `documents_visible` of them.
    pub fn rerank(&self, store: &mut EntityStore) -> Result<RerankOutcome> {
        let sorted = Self::sorted_by_strength(store);
        Self::assign_rankings(store, &sorted);

        let mut outcome = RerankOutcome::default();
        for (index, (id, _)) in sorted.iter().enumerate() {
            let visible = index < self.config.documents_visible;
            if store.set_document_visible(*id, visible)? {
                if visible {
                    outcome.shown.push(*id);
                } else {
                    outcome.hidden.push(*id);
                }
            }
        }

        if outcome.changed() {
            info!(
                shown = outcome.shown.len(),
                hidden = outcome.hidden.len(),
                documents = sorted.len(),
                "rerank changed visibility"
            );
        }
        Ok(outcome)
    }

    /// Hides the weakest visible document that falls below the pruning
    /// threshold, if any. Only one document is hidden per call; callers loop.
    pub fn prune_one(
        &self,
        store: &mut EntityStore,
        protected: &HashSet<DocumentId>,
    ) -> Result<Option<DocumentId>> {
        let system_total = store.total_strength();
        if system_total <= 0.0 {
            return Ok(None);
        }
        let cutoff = self.config.pruning_threshold * system_total;

        let weakest = store
            .visible_documents()
            .filter(|document| !protected.contains(&document.id))
            .filter(|document| document.recency() >= self.config.recency_grace)
            .map(|document| (document.id, store.total_entity_strength(document.id)))
            .filter(|(_, strength)| *strength < cutoff)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let Some((id, strength)) = weakest else {
            return Ok(None);
        };
        store.set_document_visible(id, false)?;
        debug!(doc = %id, strength, cutoff, "pruned document");
        Ok(Some(id))
    }

    /// Runs [`Self::prune_one`] until nothing more qualifies.
    pub fn prune(
        &self,
        store: &mut EntityStore,
        protected: &HashSet<DocumentId>,
    ) -> Result<Vec<DocumentId>> {
        let mut pruned = Vec::new();
        while let Some(id) = self.prune_one(store, protected)? {
            pruned.push(id);
        }
        Ok(pruned)
    }
}

/// Quartile bucket for a position in a sorted population: thresholds at 25,
/// 50 and 75 percent.
pub fn quartile_for(index: usize, population: usize) -> u8 {
    if population == 0 {
        return 0;
    }
    ((index * 4) / population).min(3) as u8
}
