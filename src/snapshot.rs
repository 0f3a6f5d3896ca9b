//! Lossless dump of a workspace: store contents, node placement and the
//! engine configuration. Edges are derived data and are rebuilt on load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::NodeKind;
use crate::model::{DocumentId, EntityId, Highlight, Ranking, SearchId};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub version: u32,
    pub config: EngineConfig,
    pub documents: Vec<DocumentRecord>,
    pub entities: Vec<EntityRecord>,
    pub searches: Vec<SearchRecord>,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    pub visible: bool,
    #[serde(default)]
    pub ranking: Ranking,
    #[serde(default)]
    pub recency: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub strength: f64,
    #[serde(default)]
    pub soft_data: bool,
    #[serde(default)]
    pub documents: Vec<DocumentId>,
    #[serde(default)]
    pub searches: Vec<SearchId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: SearchId,
    pub query: String,
    pub hue: f32,
    #[serde(default)]
    pub result_count: usize,
    pub entity: EntityId,
}

/// Placement of the node for a document or search. Nodes are keyed by what
/// they stand for; their ids are reassigned on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub kind: NodeKind,
    pub position: [f32; 2],
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub highlight: u16,
}

impl ProjectSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn max_document_id(&self) -> Option<DocumentId> {
        self.documents.iter().map(|record| record.id).max()
    }

    pub fn max_entity_id(&self) -> Option<EntityId> {
        self.entities.iter().map(|record| record.id).max()
    }

    pub fn max_search_id(&self) -> Option<SearchId> {
        self.searches.iter().map(|record| record.id).max()
    }
}
