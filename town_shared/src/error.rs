//! Error taxonomy.
//!
//! [`AuthError`] aborts startup. [`ProtocolError`] and a lost connection
//! reach the user as an [`Alert`]; the rest are logged at the call site and
//! the client degrades.

use thiserror::Error;

/// Login rejected or no token available.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no login token available")]
    MissingToken,
    #[error("login rejected: {0}")]
    Rejected(String),
}

/// Image fetch or decode failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetLoadError {
    #[error("fetch {path}: {reason}")]
    Fetch { path: String, reason: String },
    #[error("decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl AssetLoadError {
    pub fn path(&self) -> &str {
        match self {
            AssetLoadError::Fetch { path, .. } | AssetLoadError::Decode { path, .. } => path,
        }
    }
}

/// HTTP or socket failure outside of login.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Error pushed by the server over the socket.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("server error: {message}")]
pub struct ProtocolError {
    pub message: String,
}

/// A failure surfaced to the user while playing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Alert {
    #[error(transparent)]
    Server(#[from] ProtocolError),
    #[error("disconnected from server: {0}")]
    Disconnected(String),
}

/// Local key-value persistence failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value for {key} is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_asset() {
        let err = AssetLoadError::Decode {
            path: "characters/char7.png".into(),
            reason: "bad png".into(),
        };
        assert_eq!(err.path(), "characters/char7.png");
        assert_eq!(err.to_string(), "decode characters/char7.png: bad png");
    }
}
