use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{DocumentId, EntityId};

/// A user highlight, stored as a byte range into the document content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

impl Highlight {
    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// Relevance bookkeeping assigned by the ranker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// Position in the sorted document list; 0 is the most relevant.
    pub rank: usize,
    /// 0..=3, 0 being the most relevant quarter.
    pub quartile: u8,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    content: String,
    content_lower: String,
    pub notes: String,
    pub(crate) highlights: Vec<Highlight>,
    pub(crate) entities: BTreeSet<EntityId>,
    pub(crate) visible: bool,
    pub(crate) ranking: Ranking,
    pub(crate) recency: u32,
    pub(crate) total_strength: f64,
}

impl Document {
    pub(crate) fn new(id: DocumentId, name: String, content: String) -> Self {
        let content_lower = content.to_lowercase();
        Self {
            id,
            name,
            content,
            content_lower,
            notes: String::new(),
            highlights: Vec::new(),
            entities: BTreeSet::new(),
            visible: false,
            ranking: Ranking::default(),
            recency: 0,
            total_strength: 0.0,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Case-insensitive containment test used for entity discovery and retrieval.
    pub fn mentions(&self, term_lower: &str) -> bool {
        !term_lower.is_empty() && self.content_lower.contains(term_lower)
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn ranking(&self) -> Ranking {
        self.ranking
    }

    pub fn recency(&self) -> u32 {
        self.recency
    }

    /// Cached sum of linked entity strengths, refreshed by the ranker.
    pub fn total_strength(&self) -> f64 {
        self.total_strength
    }
}
