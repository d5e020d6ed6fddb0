use miette::Diagnostic;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Diagnostic)]
pub enum PlinthClientError {
    /// The resource authoritatively does not exist (HTTP 404/410). Never
    /// retried.
    #[error("Resource was not found at {0}.")]
    #[diagnostic(code(plinth_client::not_found), url(docsrs))]
    NotFound(Url),

    /// A retryable upstream failure: timeout, connection reset, or a 5xx
    /// response.
    #[error("Temporary network failure fetching {url}: {reason}")]
    #[diagnostic(code(plinth_client::network), url(docsrs))]
    Network { url: Url, reason: String },

    /// A non-success status that is neither an absence nor obviously
    /// transient. The caller decides what to do with it.
    #[error("Unexpected status {status} fetching {url}.")]
    #[diagnostic(code(plinth_client::status), url(docsrs))]
    Status { status: u16, url: Url },

    /// Any other transport-level failure.
    #[error(transparent)]
    #[diagnostic(code(plinth_client::request), url(docsrs))]
    Request(#[from] reqwest::Error),

    /// The response body was not what the endpoint promised.
    #[error("Failed to decode response from {url}.")]
    #[diagnostic(code(plinth_client::decode), url(docsrs))]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(plinth_client::url_parse_error), url(docsrs))]
    UrlParse(#[from] url::ParseError),

    /// Failed to read from or write to the local response cache.
    #[error("Response cache {op} failed for `{key}`.")]
    #[diagnostic(code(plinth_client::cache), url(docsrs))]
    Cache {
        op: &'static str,
        key: String,
        #[source]
        source: cacache::Error,
    },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled.")]
    #[diagnostic(code(plinth_client::cancelled), url(docsrs))]
    Cancelled,
}

impl PlinthClientError {
    /// Whether the retry policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlinthClientError::Network { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PlinthClientError::NotFound(_))
    }
}
