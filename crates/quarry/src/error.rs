use miette::Diagnostic;
use thiserror::Error;

use crate::crawler::Job;

#[derive(Debug, Error, Diagnostic)]
pub enum QuarryError {
    /// Error from the cached HTTP layer.
    #[error(transparent)]
    #[diagnostic(transparent)]
    ClientError(#[from] plinth_client::PlinthClientError),

    /// Error from graph construction.
    #[error(transparent)]
    #[diagnostic(transparent)]
    GraphError(#[from] ashlar::AshlarError),

    /// The registry response was missing a field the fetcher cannot work
    /// without.
    #[error("Registry data for `{name}` is missing {what}.")]
    #[diagnostic(code(quarry::incomplete_registry_data), url(docsrs))]
    IncompleteRegistryData { name: String, what: &'static str },

    /// The crawl was cancelled by the caller.
    #[error("Crawl cancelled.")]
    #[diagnostic(code(quarry::cancelled), url(docsrs))]
    Cancelled,

    #[error("Failed to send a job on the crawl channel.")]
    #[diagnostic(code(quarry::job_send_error), url(docsrs))]
    JobSendError(#[from] futures::channel::mpsc::TrySendError<Job>),
}

impl QuarryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuarryError::ClientError(err) if err.is_not_found())
    }
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, QuarryError>;
