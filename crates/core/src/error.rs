use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request timed out: {0}")]
    Timeout(String),

    #[error("malformed hit: {0}")]
    MalformedHit(String),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("result set truncated: {0}")]
    Truncated(String),
}

impl StoreError {
    /// Splits transport timeouts from the other reqwest failures.
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            StoreError::Timeout(error.to_string())
        } else {
            StoreError::Http(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] StoreError),

    #[error("insertion failed: {0}")]
    Insertion(#[source] StoreError),

    #[error("duplicate cleanup for {path} stopped after {deleted} deletion(s): {source}")]
    DuplicateCleanup {
        path: String,
        deleted: usize,
        #[source]
        source: StoreError,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image fetch failed: {0}")]
    Fetch(#[source] reqwest::Error),
}
