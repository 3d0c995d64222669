use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: reqwest::Error,
    },
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("stream idle timeout fired before the final event")]
    StreamIdleTimeout,
    #[error("response carried no message content")]
    MissingContent,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("retry limit reached: {last}")]
    RetryLimit {
        attempts: u64,
        #[source]
        last: Box<Error>,
    },
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient failures are retried; everything else surfaces immediately.
    ///
    /// Rate limiting and backend-status errors arrive as `UnexpectedStatus`,
    /// so any non-success status counts as transient alongside connection
    /// failures, timeouts, and mid-stream interruptions.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ConnectionFailed { .. }
            | Error::Timeout
            | Error::UnexpectedStatus { .. }
            | Error::Stream(_)
            | Error::StreamIdleTimeout => true,
            Error::MissingContent
            | Error::Json(_)
            | Error::RetryLimit { .. }
            | Error::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::ConnectionFailed { source: err }
        }
    }
}
