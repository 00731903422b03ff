// Error module: one typed error for every failure category the uploader can
// hit. Each component returns `Result<T>` so the CLI boundary can tell a
// missing credential from a network failure without inspecting strings.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used by every library module.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No credential pair was found in the config file or the environment,
    /// or the config file itself could not be parsed.
    #[error("Feishu credentials not found: {0}")]
    Config(String),

    /// The auth endpoint rejected the application credentials.
    #[error("Failed to get access token: {0}")]
    Auth(String),

    /// A local input file is missing or cannot be opened.
    #[error("Cannot open image file {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection failures, timeouts and non-success HTTP statuses.
    #[error("{context}")]
    Transport {
        context: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Malformed inline payload or malformed JSON response.
    #[error("{0}")]
    Decode(String),

    #[error("Image size exceeds 10MB limit ({size} bytes > {limit} bytes)")]
    SizeLimitExceeded { size: usize, limit: usize },

    /// The platform answered with a non-zero business code.
    #[error("Upload failed: {msg} (code {code})")]
    Upload { code: i64, msg: String },
}

impl Error {
    /// Wrap a reqwest failure with a short description of what was being done.
    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Error::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// A request that completed but came back with a non-success status.
    pub(crate) fn http_status(context: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Error::Transport {
            context: format!("{}: HTTP {}", context.into(), status),
            source: None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
