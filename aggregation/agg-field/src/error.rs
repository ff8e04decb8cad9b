//! Error types for scalar fields.

use thiserror::Error;

/// Result type for field operations.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors that can occur while building a scalar field.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The value buffer does not match the lattice resolution.
    #[error("expected {expected} field values for the lattice, got {got}")]
    ValueCountMismatch {
        /// Cells in the lattice.
        expected: usize,
        /// Values provided.
        got: usize,
    },

    /// A lattice axis has zero cells.
    #[error("field lattice must have at least one cell per axis")]
    ZeroResolution,

    /// The bounding volume is empty.
    #[error("field bounding volume is empty")]
    EmptyBounds,
}
