use std::io;

use thiserror::Error;

/// Coarse classification of an [`ActionError`], for callers that only need to
/// pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProcessNotFound,
    PermissionDenied,
    InvalidArgument,
    Unsupported,
    TimedOut,
    Os,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::ProcessNotFound => "process not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::Os => "os error",
        }
    }
}

/// Failure of an operator-requested mutation. Never fatal; surfaced verbatim.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("process {0} no longer exists")]
    ProcessNotFound(u32),

    #[error("permission denied for process {0}")]
    PermissionDenied(u32),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("no answer for process {pid} within {millis} ms")]
    TimedOut { pid: u32, millis: u64 },

    #[error("operation on process {pid} failed: {source}")]
    Os {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        ActionError::InvalidArgument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::ProcessNotFound(_) => ErrorKind::ProcessNotFound,
            ActionError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ActionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ActionError::Unsupported(_) => ErrorKind::Unsupported,
            ActionError::TimedOut { .. } => ErrorKind::TimedOut,
            ActionError::Os { .. } => ErrorKind::Os,
        }
    }
}

/// A single attribute read that failed during enumeration.
///
/// These never leave the enumerator: the field falls back to its default and
/// the row is still emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("process vanished")]
    Vanished,
    #[error("access denied")]
    AccessDenied,
    #[error("attribute unavailable")]
    Unavailable,
}

impl ReadError {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ReadError::Vanished,
            io::ErrorKind::PermissionDenied => ReadError::AccessDenied,
            _ => ReadError::Unavailable,
        }
    }
}

/// Failures of the service-manager and startup-entry bridges.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} is not available on this host")]
    Unavailable(&'static str),

    #[error("`{command}` timed out after {millis} ms")]
    TimedOut { command: String, millis: u64 },

    #[error("`{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_into_read_errors() {
        let gone = io::Error::from(io::ErrorKind::NotFound);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let other = io::Error::other("boom");
        assert_eq!(ReadError::from_io(&gone), ReadError::Vanished);
        assert_eq!(ReadError::from_io(&denied), ReadError::AccessDenied);
        assert_eq!(ReadError::from_io(&other), ReadError::Unavailable);
    }

    #[test]
    fn action_error_kinds() {
        assert_eq!(
            ActionError::ProcessNotFound(7).kind(),
            ErrorKind::ProcessNotFound
        );
        assert_eq!(
            ActionError::invalid("cpu 9").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ActionError::ProcessNotFound(7).to_string(),
            "process 7 no longer exists"
        );
    }
}
