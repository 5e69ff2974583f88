use thiserror::Error;

#[derive(Error, Debug)]
pub enum KawaError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Invalid manifest: {0}")]
    ManifestParseError(String),

    #[error("Segment unavailable after retries: {0}")]
    SegmentUnavailable(String),

    #[error("No downloadable variant offered for this asset")]
    NoVariantAvailable,

    #[error("Encoding to {format} failed: {message}")]
    EncodeError { format: String, message: String },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
}

pub type KawaResult<T> = Result<T, KawaError>;
