//! Authentication error types.

use thiserror::Error;

use casgate_protocol::ProtocolError;
use casgate_storage::StorageError;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The CAS server could not be reached or answered with a non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The CAS server rejected the ticket.
    #[error("authentication failure: {message}")]
    AuthenticationFailure {
        /// Failure code (e.g. `INVALID_TICKET`).
        code: Option<String>,
        /// Server supplied text.
        message: String,
    },

    /// The response could not be decoded or lacks required fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The PGT callback was not delivered in time.
    #[error("proxy ticket for {iou} not delivered after {attempts} attempts")]
    TicketResolutionTimeout {
        /// IOU identifier from the validation response.
        iou: String,
        /// Number of lookups performed.
        attempts: u32,
    },

    /// A proxy in the chain is not allowed.
    #[error("proxy not allowed: {0}")]
    DisallowedProxy(String),

    /// Proxy ticket store failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The CAS server refused to issue a proxy ticket.
    #[error("proxy ticket request rejected: {message}")]
    ProxyRejected {
        /// Failure code (e.g. `INVALID_TICKET`).
        code: Option<String>,
        /// Server supplied text.
        message: String,
    },

    /// No proxy-granting ticket is stored for the user.
    #[error("no proxy-granting ticket for user {0}")]
    MissingProxyGrant(String),

    /// The user does not exist and auto-creation is disabled.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Rejected caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backend configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<ProtocolError> for AuthError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::InvalidRequest(msg) => Self::InvalidInput(msg),
            other => Self::MalformedResponse(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
