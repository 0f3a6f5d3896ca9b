//! Semantic data model: documents, entities and searches.

mod document;
mod entity;
mod ids;
mod search;

pub use document::{Document, Highlight, Ranking};
pub use entity::{Entity, StrengthChange, entity_key};
pub use ids::{DocumentId, EdgeId, EntityId, IdAllocator, IdCounter, NodeId, SearchId};
pub use search::{Search, hue_for_ordinal};
