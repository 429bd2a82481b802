use thiserror::Error;

/// Failures of the feed write step. None of these touch an existing feed file.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed is missing required marker {0:?}")]
    MissingMarker(String),
    #[error("feed I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("feed serialization failed: {0}")]
    Xml(String),
}

/// Why a single record was left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no vendor code")]
    MissingVendorCode,
    #[error("no name")]
    MissingName,
    #[error("no usable link")]
    RejectedLink,
    #[error("product page returned no data")]
    Unobtainable,
}
