//! Error types for the aggregation data model.

use thiserror::Error;

/// Result type for data-model operations.
pub type TypesResult<T> = Result<T, TypesError>;

/// Errors that can occur while building or manipulating aggregation types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// A reference plane was constructed from degenerate axes.
    #[error("degenerate reference plane: axes must be non-zero and non-parallel")]
    DegeneratePlane,

    /// A connector index does not exist on the named part.
    #[error("connector index {index} out of range for part '{part}' ({count} connectors)")]
    ConnectorOutOfRange {
        /// The part name.
        part: String,
        /// The requested connector index.
        index: usize,
        /// The number of connectors on the part.
        count: usize,
    },

    /// A rule string could not be parsed.
    #[error("rule '{rule}' is malformed: {reason}")]
    MalformedRule {
        /// The offending rule text.
        rule: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The catalog has no entry with the given name.
    #[error("catalog has no entry named '{name}'")]
    UnknownCatalogEntry {
        /// The missing entry name.
        name: String,
    },

    /// A weighted draw was requested from an exhausted catalog.
    #[error("catalog is exhausted: no part type has remaining supply")]
    CatalogExhausted,

    /// A catalog update would drive a count below zero.
    #[error("catalog count for '{name}' would drop below zero")]
    CatalogUnderflow {
        /// The entry whose count would underflow.
        name: String,
    },
}
