use thiserror::Error;

/// Failures of a single search engine round trip.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search engine unreachable: {0}")]
    Network(String),

    #[error("could not decode search engine response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("unsupported content type {0:?}")]
    UnsupportedContent(String),

    #[error("page has no extractable text")]
    Empty,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("ingest failed: {0}")]
    Ingest(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Outcome of one fetch+index task that did not make it into the store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ModelListError {
    #[error("model service unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// The consumer side of an event stream went away.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("event stream closed")]
pub struct StreamClosed;
