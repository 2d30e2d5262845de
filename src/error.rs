//! Error types for the WebDriver client and its engines

use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a remote browser
#[derive(Error, Debug)]
pub enum Error {
    /// A command was issued before a session was created (no request was sent)
    #[error("no active session")]
    NoActiveSession,

    /// The remote end refused or garbled a new-session request
    #[error("session creation failed: {0}")]
    SessionCreation(String),

    /// The HTTP exchange itself failed (connect, timeout, body read)
    #[error("transport error during {command}: {message}")]
    Transport {
        command: &'static str,
        message: String,
    },

    /// The remote end answered with a non-2xx status
    #[error("{command} failed with status {status}{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Protocol {
        command: &'static str,
        status: u16,
        message: Option<String>,
    },

    /// The response body was not the shape the command expects
    #[error("failed to decode {command} response: {message}")]
    Decode {
        command: &'static str,
        message: String,
    },

    /// A singular lookup matched nothing
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// An enumerated option had an unrecognised value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A polled condition did not hold before the deadline
    #[error("timeout waiting for {what} after {after_ms}ms")]
    Timeout { what: String, after_ms: u64 },

    /// Image bytes could not be decoded
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    /// Image buffer could not be encoded
    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    /// A remote script ran but reported failure
    #[error("script reported failure: {0}")]
    Script(String),

    /// Input was expected to be a `/pattern/` literal
    #[error("not a regex pattern: {0}")]
    NotRegex(String),

    /// A `/pattern/` literal did not compile
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// Filesystem error while persisting an artifact
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation observed a tripped cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// The async facade's worker thread is gone
    #[error("worker unavailable: {0}")]
    Worker(String),
}

/// Coarse stage at which an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Session,
    Transport,
    Protocol,
    Decode,
    Lookup,
    Argument,
    Timeout,
    Image,
    Script,
    Io,
    Cancelled,
    Worker,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoActiveSession | Error::SessionCreation(_) => ErrorKind::Session,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::ElementNotFound(_) => ErrorKind::Lookup,
            Error::InvalidArgument(_) | Error::NotRegex(_) | Error::Regex(_) => ErrorKind::Argument,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ImageDecode(_) | Error::ImageEncode(_) => ErrorKind::Image,
            Error::Script(_) => ErrorKind::Script,
            Error::Io(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Worker(_) => ErrorKind::Worker,
        }
    }

    pub(crate) fn decode(command: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Decode {
            command,
            message: err.to_string(),
        }
    }
}

/// Outcome of a step whose failure must never fail the calling workflow
/// (session teardown, helper-script injection, window sizing).
///
/// Anything other than `Completed` has already been logged at warn level.
#[derive(Debug)]
pub enum BestEffort {
    Completed,
    Skipped(&'static str),
    Failed(Error),
}

impl BestEffort {
    /// Collapse a fallible step into a logged, non-propagating outcome.
    pub fn from_result<T>(step: &str, res: Result<T>) -> Self {
        match res {
            Ok(_) => BestEffort::Completed,
            Err(e) => {
                log::warn!("{} failed (ignored): {}", step, e);
                BestEffort::Failed(e)
            }
        }
    }

    pub fn skipped(step: &str, reason: &'static str) -> Self {
        log::warn!("{} skipped: {}", step, reason);
        BestEffort::Skipped(reason)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BestEffort::Completed)
    }
}
