//! Error types shared by the graph core.

use thiserror::Error;

use crate::model::{DocumentId, EntityId, NodeId, SearchId};

/// Coarse classification of a [`CoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller broke a documented precondition. Shared state is untouched.
    PreconditionViolated,
    /// A transient conflict; retrying after the conflicting work finishes is safe.
    RecoverableConflict,
    /// Reading or writing an external resource failed.
    Io,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("unknown search {0}")]
    UnknownSearch(SearchId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Linking a node or document to itself.
    #[error("cannot link {0} to itself")]
    SelfLink(String),

    #[error("highlight {start}..{end} is outside document {document} ({len} bytes)")]
    InvalidHighlight {
        document: DocumentId,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("search query is empty")]
    EmptyQuery,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDocument(_)
            | Self::UnknownEntity(_)
            | Self::UnknownSearch(_)
            | Self::UnknownNode(_)
            | Self::SelfLink(_)
            | Self::InvalidHighlight { .. }
            | Self::EmptyQuery => ErrorKind::PreconditionViolated,
            Self::Conflict(_) => ErrorKind::RecoverableConflict,
            Self::Io(_) | Self::Snapshot(_) => ErrorKind::Io,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::RecoverableConflict
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
