//! Error types for the token flows.

use std::path::PathBuf;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or refreshing tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The supplied options are missing or contradictory.
    #[error("{0}")]
    Configuration(String),

    /// The options file could not be read or parsed.
    #[error("options file {}: {message}", .path.display())]
    File { path: PathBuf, message: String },

    /// Transport failure while capturing the redirect or reaching the
    /// token endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The accounts server redirected back with an error instead of a
    /// grant token.
    #[error("authorization was refused: {0}")]
    Provider(String),

    /// The token payload could not be formatted or written.
    #[error("output error: {0}")]
    Output(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}
