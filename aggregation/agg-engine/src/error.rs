//! Error types for the aggregation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the aggregation engine.
///
/// These are the *input contract* and *caller contract* failures of the
/// system. Exhaustion conditions (empty queue, empty catalog, attempt
/// budgets) are not errors: they surface as
/// [`Growth::Stalled`](crate::Growth::Stalled) so callers can still
/// inspect the partial assembly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No part template with the given name is registered.
    #[error("part template '{name}' is not defined")]
    UnknownTemplate {
        /// The missing template name.
        name: String,
    },

    /// No placed part carries the given id.
    #[error("no part with id {id} in the assembly")]
    PartNotFound {
        /// The missing instance id.
        id: u32,
    },

    /// A sequential-growth script entry could not be applied.
    #[error("script entry '{entry}' is malformed: {reason}")]
    MalformedScript {
        /// The offending entry.
        entry: String,
        /// Why it failed.
        reason: String,
    },

    /// A connector index does not exist on the named part.
    #[error("connector {index} out of range for part '{part}'")]
    ConnectorOutOfRange {
        /// The part name.
        part: String,
        /// The requested connector index.
        index: usize,
    },

    /// A catalog-driven strategy was started without a catalog.
    #[error("strategy requires a part catalog but none is attached")]
    MissingCatalog,

    /// A field-driven strategy was started without a field.
    #[error("strategy requires a scalar field but none is attached")]
    MissingField,

    /// A growth strategy was started without any part template.
    #[error("run has no part templates")]
    NoTemplates,

    /// Multiple fields are attached but the part names none of them.
    #[error("part '{part}' has no field binding but multiple fields are attached")]
    MissingFieldBinding {
        /// The unbound part name.
        part: String,
    },

    /// A part is bound to a field name that is not attached.
    #[error("no field named '{name}' is attached to the run")]
    UnknownField {
        /// The missing field name.
        name: String,
    },

    /// A persisted run state is internally inconsistent.
    #[error("corrupt run state: {reason}")]
    CorruptState {
        /// What was inconsistent.
        reason: String,
    },

    /// Connection graph precondition violation.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Data-model contract violation (catalog underflow and friends).
    #[error(transparent)]
    Types(#[from] agg_types::TypesError),

    /// Run-state (de)serialization failure.
    #[error("run state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection-graph precondition violations.
///
/// These indicate a bug in the caller (normally the engine itself), not a
/// recoverable growth condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// An edge between the two nodes already exists.
    #[error("edge {start} -> {end} already exists")]
    DuplicateEdge {
        /// Edge source id.
        start: u32,
        /// Edge target id.
        end: u32,
    },

    /// The node is not in the graph.
    #[error("node {id} is not in the graph")]
    NodeNotFound {
        /// The missing node id.
        id: u32,
    },
}
