use eframe::egui::{Rect, Vec2, pos2};
use serde::{Deserialize, Serialize};

use crate::model::{DocumentId, NodeId, Ranking, SearchId};

/// What a node stands for. The node never owns the document or search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Document(DocumentId),
    Search(SearchId),
}

impl NodeKind {
    pub fn document(self) -> Option<DocumentId> {
        match self {
            Self::Document(id) => Some(id),
            Self::Search(_) => None,
        }
    }

    pub fn search(self) -> Option<SearchId> {
        match self {
            Self::Document(_) => None,
            Self::Search(id) => Some(id),
        }
    }
}

/// Highlight code for a node with no highlight.
pub const HIGHLIGHT_NONE: u16 = 0;
/// Highlight code for a generic (non-search) highlight.
pub const HIGHLIGHT_GENERIC: u16 = 1;

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub(crate) position: Vec2,
    pub(crate) previous_position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) closed_size: Vec2,
    pub(crate) open_size: Vec2,
    pub(crate) open: bool,
    pub(crate) pinned: bool,
    pub(crate) weight: f32,
    pub(crate) highlight: u16,
    pub(crate) ranking: Ranking,
    pub(crate) recency: u32,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        label: String,
        position: Vec2,
        closed_size: Vec2,
        open_size: Vec2,
    ) -> Self {
        Self {
            id,
            kind,
            label,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            closed_size,
            open_size,
            open: false,
            pinned: false,
            weight: 1.0,
            highlight: HIGHLIGHT_NONE,
            ranking: Ranking::default(),
            recency: 0,
        }
    }

    /// Centre of the node body.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn previous_position(&self) -> Vec2 {
        self.previous_position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn size(&self) -> Vec2 {
        if self.open {
            self.open_size
        } else {
            self.closed_size
        }
    }

    pub fn body(&self) -> Rect {
        body_at(self.position, self.size())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Inverse-mobility multiplier; heavier nodes move less.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn highlight(&self) -> u16 {
        self.highlight
    }

    pub fn ranking(&self) -> Ranking {
        self.ranking
    }

    pub fn recency(&self) -> u32 {
        self.recency
    }
}

pub(crate) fn body_at(center: Vec2, size: Vec2) -> Rect {
    Rect::from_center_size(pos2(center.x, center.y), size)
}
