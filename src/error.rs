// Error types for the library internals. The public entry points
// (`ApiClient::call`, `ApiClient::authenticate`, the credential resolver)
// turn these into plain return values; only the plumbing below them uses
// `Result<T, Error>`.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("credential store {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored secret is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("stored secret is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("no secret entered")]
    NoSecret,

    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Store {
            path: path.into(),
            source,
        }
    }
}
