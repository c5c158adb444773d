use thiserror::Error;

/// Failures surfaced to the user as the terminal `Error` state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Malformed input, caught before any network call
    #[error("{0}")]
    Validation(String),

    /// Submission rejected, or the backend reported a failed job
    #[error("{0}")]
    Backend(String),
}

/// Errors from a single call to the download backend
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not write archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive download stalled: no data for {0:?}")]
    Stalled(std::time::Duration),

    #[error("could not build HTTP client: {0}")]
    Client(reqwest::Error),
}
