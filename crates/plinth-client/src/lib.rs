//! A cached HTTP GET layer shared by every registry fetcher and metadata
//! enricher. Responses are cached on disk keyed by URL; a hit inside the TTL
//! never touches the network. Retryable failures are retried with
//! exponential backoff.

mod client;
mod error;

pub use client::*;
pub use error::PlinthClientError;
