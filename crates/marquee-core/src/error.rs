//! Error types for Marquee Core

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Request construction errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Server/session rejection
    #[error("Connection to media server failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed (HTTP {status})")]
    AuthenticationFailed { status: u16 },

    // Transport errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Response shape errors
    #[error("Failed to decode response: {0}")]
    Decoding(String),

    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    #[error("Invalid response: {0}")]
    Response(String),

    // Engine errors
    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("No active playback session")]
    NoActiveSession,

    #[error("Player error: {0}")]
    Player(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a response error for a well-formed reply missing a required field
    pub fn response(msg: impl Into<String>) -> Self {
        Error::Response(msg.into())
    }

    /// Map a non-success HTTP status to the matching error
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Error::AuthenticationFailed { status },
            _ => Error::Server { status },
        }
    }

    /// Returns true if a later attempt could succeed without changing anything
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::Network(_) | Error::Server { .. }
        )
    }

    /// Returns the error code for telemetry
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::ConnectionFailed(_) => "CONNECTION_FAILED",
            Error::AuthenticationFailed { .. } => "AUTH_FAILED",
            Error::Network(_) => "NETWORK",
            Error::Decoding(_) => "DECODING",
            Error::Server { .. } => "SERVER",
            Error::Response(_) => "RESPONSE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::NoActiveSession => "NO_SESSION",
            Error::Player(_) => "PLAYER",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(Error::from_status(401), Error::AuthenticationFailed { status: 401 }));
        assert!(matches!(Error::from_status(403), Error::AuthenticationFailed { status: 403 }));
        assert!(matches!(Error::from_status(500), Error::Server { status: 500 }));
        assert!(matches!(Error::from_status(404), Error::Server { status: 404 }));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::response("no session").error_code(), "RESPONSE");
        assert_eq!(Error::NoActiveSession.error_code(), "NO_SESSION");
        assert!(!Error::response("x").is_recoverable());
        assert!(Error::Server { status: 502 }.is_recoverable());
    }
}
