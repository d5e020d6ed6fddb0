use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GantryError {
    /// The orders passed to build do not match the graph's rows.
    #[error("Row orders cover {got} rows but the graph has {expected}.")]
    #[diagnostic(code(gantry::row_mismatch), url(docsrs))]
    RowMismatch { expected: usize, got: usize },

    /// An ordered id is not present in the graph.
    #[error("Ordered node `{0}` is not in the graph.")]
    #[diagnostic(code(gantry::missing_node), url(docsrs))]
    MissingNode(String),

    /// Layout needs row assignments; the normalizer establishes them.
    #[error("Cannot lay out an unlayered graph.")]
    #[diagnostic(code(gantry::unlayered), url(docsrs))]
    UnlayeredGraph,

    #[error(transparent)]
    #[diagnostic(code(gantry::serde), url(docsrs))]
    SerdeError(#[from] serde_json::Error),
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, GantryError>;
