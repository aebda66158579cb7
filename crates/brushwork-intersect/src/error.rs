//! Error types for brush geometry.

use thiserror::Error;

/// Errors raised while building brush geometry.
///
/// Intersection passes themselves never fail: missing or degenerate
/// geometry is treated as non-intersecting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntersectError {
    /// A vertex has a NaN or infinite coordinate.
    #[error("vertex {0} is not finite")]
    NonFiniteVertex(usize),

    /// A plane has a zero normal or non-finite components.
    #[error("plane {0} is invalid")]
    InvalidPlane(usize),

    /// Local-to-tree transform cannot be inverted.
    #[error("transform is singular or not finite")]
    SingularTransform,
}

/// Result type for brush geometry operations.
pub type Result<T> = std::result::Result<T, IntersectError>;
