use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use super::Ranker;
use crate::error::Result;
use crate::model::{DocumentId, EntityId, entity_key};
use crate::store::EntityStore;

/// What triggered a retrieval pass. Searches admit more documents but demand
/// a stronger match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrievalMode {
    Regular,
    Search,
}

struct Candidate {
    id: DocumentId,
    strength: f64,
    entities: BTreeSet<EntityId>,
}

impl Ranker {
    fn admission_limits(&self, mode: RetrievalMode) -> (usize, f64) {
        match mode {
            RetrievalMode::Regular => (self.config.doc_add_limit, self.config.reg_threshold),
            RetrievalMode::Search => (
                self.config.search_doc_add_limit,
                self.config.search_threshold,
            ),
        }
    }

    /// Pulls hidden documents mentioning any of `terms` back into view.
    ///
    /// A candidate's strength counts every known entity it mentions, linked or
    /// not. The strongest candidates at or above the mode's threshold are
    /// admitted, up to the mode's limit, and their mentioned entities are
    /// linked on the way in.
    pub fn retrieve(
        &self,
        store: &mut EntityStore,
        terms: &[String],
        mode: RetrievalMode,
    ) -> Result<Vec<DocumentId>> {
        let terms = terms
            .iter()
            .map(|term| entity_key(term))
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = store
            .documents()
            .filter(|document| !document.is_visible())
            .filter(|document| terms.iter().any(|term| document.mentions(term)))
            .map(|document| {
                let mut entities = document.entities().clone();
                entities.extend(
                    store
                        .entities()
                        .filter(|entity| document.mentions(entity.key()))
                        .map(|entity| entity.id),
                );
                let strength = entities
                    .iter()
                    .filter_map(|id| store.entity(*id))
                    .map(|entity| entity.strength())
                    .sum::<f64>();
                Candidate {
                    id: document.id,
                    strength,
                    entities,
                }
            })
            .collect::<Vec<_>>();

        candidates.sort_by(|a, b| a.strength.partial_cmp(&b.strength).unwrap_or(Ordering::Equal));

        let (limit, threshold) = self.admission_limits(mode);
        let mut admitted = Vec::new();
        for candidate in candidates.iter().rev() {
            if admitted.len() >= limit {
                break;
            }
            if candidate.strength < threshold {
                break;
            }
            for entity in &candidate.entities {
                store.link_document(*entity, candidate.id)?;
            }
            store.set_document_visible(candidate.id, true)?;
            admitted.push(candidate.id);
        }

        debug!(
            ?mode,
            candidates = candidates.len(),
            admitted = admitted.len(),
            "retrieval pass"
        );
        Ok(admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::model::StrengthChange;

    #[test]
    fn admits_strongest_candidates_up_to_the_limit() {
        let mut store = EntityStore::new(1.0);
        let weak = store.add_document("weak", "gamma only");
        let strong = store.add_document("strong", "gamma and delta");
        let middle = store.add_document("middle", "gamma again");
        let unrelated = store.add_document("unrelated", "nothing here");
        let gamma = store.add_entity("gamma", false);
        let delta = store.add_entity("delta", false);
        store
            .set_entity_strength(delta, 2.0, StrengthChange::Absolute)
            .unwrap();
        store.link_document(gamma, middle).unwrap();

        let ranker = Ranker::new(RankingConfig {
            doc_add_limit: 2,
            ..RankingConfig::default()
        });
        let admitted = ranker
            .retrieve(&mut store, &["Gamma".to_owned()], RetrievalMode::Regular)
            .unwrap();

        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0], strong);
        assert!(store.document(strong).unwrap().entities().contains(&delta));
        assert!(store.document(strong).unwrap().is_visible());
        assert!(!store.document(unrelated).unwrap().is_visible());
        // Equal-strength candidates: the later one in insertion order wins.
        assert!(admitted.contains(&middle));
        assert!(!store.document(weak).unwrap().is_visible());
    }

    #[test]
    fn search_mode_uses_the_higher_threshold() {
        let mut store = EntityStore::new(0.75);
        let doc = store.add_document("doc", "epsilon");
        store.add_entity("epsilon", false);
        let ranker = Ranker::default();

        let terms = ["epsilon".to_owned()];
        assert!(ranker
            .retrieve(&mut store, &terms, RetrievalMode::Search)
            .unwrap()
            .is_empty());
        assert_eq!(
            ranker
                .retrieve(&mut store, &terms, RetrievalMode::Regular)
                .unwrap(),
            vec![doc]
        );
    }

    #[test]
    fn visible_documents_are_not_admitted_twice() {
        let mut store = EntityStore::new(1.0);
        let doc = store.add_document("doc", "zeta");
        store.add_entity("zeta", false);
        store.set_document_visible(doc, true).unwrap();

        let admitted = Ranker::default()
            .retrieve(&mut store, &["zeta".to_owned()], RetrievalMode::Regular)
            .unwrap();
        assert!(admitted.is_empty());
    }
}
