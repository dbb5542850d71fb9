use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Network failure, timeout, or a response body that could not be decoded.
    #[error("relay unreachable: {0}")]
    Unreachable(String),

    #[error("relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid relay url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Unreachable(err.to_string())
    }
}
