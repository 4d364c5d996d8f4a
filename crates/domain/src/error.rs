/// Shared error type used across all spotweb crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Transport unavailable, access point resolution failed, or the
    /// credentials were rejected during the handshake.
    #[error("connection: {0}")]
    Connection(String),

    /// A reply carried an explicit error, or a Mercury status code fell in
    /// `400..=599`.  Timeouts are reported through this variant as well.
    #[error("command \"{command}\"{} failed with message: \"{message}\"", .uri.as_deref().map(|u| format!(" for URI \"{u}\"")).unwrap_or_default())]
    Protocol {
        command: String,
        uri: Option<String>,
        status: Option<i32>,
        message: String,
    },

    /// Programming defect: wrong execution context or a continuation that
    /// no longer exists.
    #[error("usage: {0}")]
    Usage(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decode: {0}")]
    Decode(String),

    #[error("config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP: {0}")]
    Http(String),
}

/// Message carried by replies synthesized when no answer arrived in time.
pub const TIMED_OUT: &str = "timed out";

impl Error {
    pub fn protocol(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Protocol {
            command: command.into(),
            uri: None,
            status: None,
            message: message.into(),
        }
    }

    /// Mercury status code attached to a protocol failure, if any.
    pub fn status(&self) -> Option<i32> {
        match self {
            Error::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Protocol { message, .. } if message == TIMED_OUT)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
