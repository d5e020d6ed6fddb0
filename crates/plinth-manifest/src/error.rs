use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// No parser knows this manifest format.
    #[error("No parser supports `{0}`.")]
    #[diagnostic(code(plinth_manifest::unsupported), url(docsrs))]
    Unsupported(String),

    /// A generic IO error occurred. Refer to the error message for details.
    #[error("{0}")]
    #[diagnostic(code(plinth_manifest::io), url(docsrs))]
    IoError(String, #[source] std::io::Error),

    /// The manifest file did not decode as its format promises.
    #[error("Failed to decode `{path}`.")]
    #[diagnostic(code(plinth_manifest::json_decode), url(docsrs))]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode `{path}`.")]
    #[diagnostic(code(plinth_manifest::toml_decode), url(docsrs))]
    TomlError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The manifest decoded but cannot describe a dependency graph (for
    /// example, a v1 package-lock).
    #[error("Invalid manifest: {0}")]
    #[diagnostic(code(plinth_manifest::invalid), url(docsrs))]
    InvalidManifest(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    GraphError(#[from] ashlar::AshlarError),

    /// The injected resolver failed while expanding to transitive
    /// dependencies.
    #[error("Failed to expand manifest to transitive dependencies: {0}")]
    #[diagnostic(code(plinth_manifest::expand), url(docsrs))]
    ExpandError(String),
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, ManifestError>;
