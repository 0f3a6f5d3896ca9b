//! Incremental graph maintenance and force-directed layout for exploratory
//! text analysis.
//!
//! Documents, entities and searches live in an [`EntityStore`]. A
//! [`Workspace`] derives a node/edge [`Graph`] from the store, ranks
//! documents by the strength of the entities they mention, and runs a
//! background [`LayoutEngine`] that keeps node positions settled as the
//! graph changes.

pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod layout;
pub mod model;
pub mod rank;
pub mod snapshot;
pub mod store;

pub use config::EngineConfig;
pub use controller::{PendingHighlight, Workspace};
pub use error::{CoreError, ErrorKind, Result};
pub use graph::{Graph, RenderFeedback, SharedGraph, lock_graph};
pub use layout::{LayoutEngine, LayoutPhase};
pub use store::EntityStore;
