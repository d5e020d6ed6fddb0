use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PlumbError {
    /// Ordering ran on a graph whose nodes have no row assignments. The
    /// normalizer establishes rows before ordering; seeing this is a bug in
    /// the calling pipeline.
    #[error("Cannot order an unlayered graph.")]
    #[diagnostic(code(plumb::unlayered), url(docsrs))]
    UnlayeredGraph,

    /// Ordering ran on a graph with an edge spanning more than one row.
    /// Subdivision must run first; an "ordered but un-subdivided" graph is
    /// unrepresentable.
    #[error("Edge `{from}` -> `{to}` spans non-adjacent rows.")]
    #[diagnostic(code(plumb::non_unit_edge), url(docsrs))]
    NonUnitEdge { from: String, to: String },

    /// A consecutiveness constraint emptied a row's permutation family. Only
    /// surfaced in strict mode; the caller may fall back to the heuristic
    /// orderer.
    #[error("Constraints on row {row} admit no ordering.")]
    #[diagnostic(code(plumb::unsatisfiable), url(docsrs))]
    ConstraintUnsatisfiable { row: usize },

    /// Worker pool construction failed.
    #[error("Failed to build ordering worker pool: {0}")]
    #[diagnostic(code(plumb::worker_pool), url(docsrs))]
    WorkerPool(String),
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, PlumbError>;
