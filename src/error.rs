use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PlinthError {
    /// A user-supplied option failed validation. Raised before any I/O.
    #[error("Invalid option: {0}")]
    #[diagnostic(code(plinth::invalid_option), url(docsrs))]
    InvalidOption(String),

    /// No fetcher exists for the requested ecosystem.
    #[error("No registry fetcher for ecosystem `{0}`.")]
    #[diagnostic(code(plinth::unsupported_ecosystem), url(docsrs))]
    UnsupportedEcosystem(String),

    /// Failed to read the cache backend.
    #[error("Cache {op} failed for `{key}`.")]
    #[diagnostic(code(plinth::cache), url(docsrs))]
    Cache {
        op: &'static str,
        key: String,
        #[source]
        source: cacache::Error,
    },

    /// A cached payload failed to decode. Treated as corruption; the entry
    /// is recomputed.
    #[error("Cache entry for `{0}` is corrupt.")]
    #[diagnostic(code(plinth::cache_codec), url(docsrs))]
    CacheCodec(String),

    /// The injected artifact renderer failed.
    #[error("Renderer failed: {0}")]
    #[diagnostic(code(plinth::render), url(docsrs))]
    Render(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled.")]
    #[diagnostic(code(plinth::cancelled), url(docsrs))]
    Cancelled,

    #[error(transparent)]
    #[diagnostic(transparent)]
    ClientError(#[from] plinth_client::PlinthClientError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    QuarryError(#[from] quarry::QuarryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    GraphError(#[from] ashlar::AshlarError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    OrderError(#[from] plumb::PlumbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    LayoutError(#[from] gantry::GantryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ManifestError(#[from] plinth_manifest::ManifestError),

    #[error(transparent)]
    #[diagnostic(code(plinth::serde), url(docsrs))]
    SerdeError(#[from] serde_json::Error),

    /// A generic IO error occurred.
    #[error("{0}")]
    #[diagnostic(code(plinth::io), url(docsrs))]
    IoError(String, #[source] std::io::Error),
}
