use thiserror::Error;

/// Errors surfaced by the API gateway and the session context.
///
/// `Api` carries the server's own message so it can be shown verbatim; the
/// other variants are produced locally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to reach the server: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out, please try again")]
    Timeout,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("response error: {0}")]
    Parse(String),
    #[error("request error: {0}")]
    Serialization(String),
    #[error("invalid input: {0}")]
    Validation(String),
}

impl Error {
    /// True for failures where the server refused the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::SessionExpired | Error::Api { status: 401, .. })
    }

    /// True when the request never produced a server answer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }

    /// HTTP status reported by the server, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Maps transport errors, telling timeouts apart from other failures.
pub(crate) fn map_request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(err)
    }
}
