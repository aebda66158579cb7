//! Error types for the brush tree context.

use brushwork_hierarchy::{ConsistencyIssue, HierarchyError, NodeId};
use brushwork_intersect::IntersectError;
use thiserror::Error;

/// Errors raised by [`CsgTree`](crate::CsgTree).
#[derive(Error, Debug)]
pub enum CsgError {
    /// Hierarchy edit rejected.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Brush geometry rejected.
    #[error(transparent)]
    Geometry(#[from] IntersectError),

    /// Invalid solver settings.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// Settings document is not valid TOML for [`SolverSettings`](crate::SolverSettings).
    #[error("failed to parse settings: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The tree was edited after the pass began; its output was discarded.
    #[error("pass for generation {pass} is stale, tree is at generation {current}")]
    StalePass {
        /// Generation the pass was taken at.
        pass: u64,
        /// Current edit generation.
        current: u64,
    },

    /// The operation needs a brush node.
    #[error("node {0} is not a brush")]
    NotABrush(NodeId),

    /// The hierarchy failed its consistency check after an edit.
    #[error("hierarchy is inconsistent: {} issue(s)", .0.len())]
    Inconsistent(Vec<ConsistencyIssue>),
}

/// Result type for brush tree operations.
pub type Result<T> = std::result::Result<T, CsgError>;
