//! Client error types.

use thiserror::Error;

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("credential source returned an empty token")]
    EmptyToken,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("no credential source produced a token")]
    Exhausted,
}

/// Errors returned by [`crate::NotebookClient`].
///
/// Nothing here is retried; `Response` carries the status code so callers can
/// tell client errors from server errors when deciding on their own policy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, DNS or TLS failure. No remote effect is assumed.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx status from the remote.
    #[error("error response status ({code}): {body}")]
    Response { code: u16, body: String },

    /// The identifier is not in the listed collection.
    #[error("notebook runtime template not found: {0}")]
    NotFound(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An update was attempted on a template without a resource name.
    #[error("template has no resource name")]
    MissingName,

    /// The create acknowledgment lacked `response.name`.
    #[error("malformed create operation: {0}")]
    MalformedOperation(String),

    #[error("credentials: {0}")]
    Credentials(#[from] CredentialError),
}

impl ClientError {
    /// HTTP status of a `Response` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Response { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 4xx response.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    /// 5xx response.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Logical not-found or a remote 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_)) || self.status() == Some(404)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
