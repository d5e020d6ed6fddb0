use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AshlarError {
    /// A node with this id already exists.
    #[error("Node `{0}` already exists in the graph.")]
    #[diagnostic(code(ashlar::duplicate_node), url(docsrs))]
    DuplicateNode(String),

    /// An operation referenced a node id that is not in the graph.
    #[error("Node `{0}` does not exist in the graph.")]
    #[diagnostic(code(ashlar::missing_node), url(docsrs))]
    MissingNode(String),

    /// Self-edges are rejected.
    #[error("Refusing self-edge on `{0}`.")]
    #[diagnostic(code(ashlar::self_edge), url(docsrs))]
    SelfEdge(String),

    /// Multi-edges between the same pair are rejected.
    #[error("Edge `{0}` -> `{1}` already exists.")]
    #[diagnostic(code(ashlar::duplicate_edge), url(docsrs))]
    DuplicateEdge(String, String),

    /// An operation that needs row assignments ran on a graph that has none.
    /// This is an internal invariant violation.
    #[error("Graph has nodes without row assignments.")]
    #[diagnostic(code(ashlar::not_layered), url(docsrs))]
    NotLayered,

    /// Layering ran on a graph that still contains a cycle. This is an
    /// internal invariant violation (cycle breaking runs first).
    #[error("Graph contains a cycle; cannot assign rows.")]
    #[diagnostic(code(ashlar::cycle), url(docsrs))]
    CycleDetected,

    /// The serialized graph payload was structurally invalid.
    #[error("Invalid serialized graph: {0}")]
    #[diagnostic(code(ashlar::invalid_wire), url(docsrs))]
    InvalidWire(String),

    #[error(transparent)]
    #[diagnostic(code(ashlar::serde), url(docsrs))]
    SerdeError(#[from] serde_json::Error),
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, AshlarError>;
