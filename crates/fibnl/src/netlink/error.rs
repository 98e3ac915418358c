//! Error types for netlink operations.

use std::io;
use std::time::Duration;

use super::codec::Operation;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
///
/// Every variant is delivered through the same [`Completion`] handle used for
/// success; nothing is thrown across the reactor boundary.
///
/// [`Completion`]: super::Completion
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller-provided object failed local validation. Never retried.
    #[error("invalid {object}: {reason}")]
    Encoding {
        /// Kind of object that was rejected ("route", "link", ...).
        object: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Kernel rejected the request with an explicit negative status.
    #[error("{operation}: {message} (errno {errno})")]
    Kernel {
        /// The operation that failed.
        operation: Operation,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// A delete targeted a key the kernel does not hold.
    ///
    /// Split out from [`Error::Kernel`] so that callers can treat it as an
    /// idempotent success.
    #[error("{operation}: entry not found (errno {errno})")]
    NotFound {
        /// The operation that failed.
        operation: Operation,
        /// The errno value from the kernel.
        errno: i32,
    },

    /// A transient kernel condition outlived the retry budget.
    #[error("{operation}: {message} (errno {errno}), gave up after {attempts} attempts")]
    Transient {
        /// The operation that failed.
        operation: Operation,
        /// Errno of the last attempt.
        errno: i32,
        /// Attempts made, including the first.
        attempts: u32,
        /// Human-readable error message.
        message: String,
    },

    /// No kernel response within the request deadline.
    #[error("no response for sequence {seq} within {after:?}")]
    Timeout {
        /// Sequence number of the expired request.
        seq: u32,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// The request was dropped before it reached the kernel.
    #[error("request cancelled before it was sent")]
    Cancelled,

    /// The reactor thread is gone; the request outcome is unknown.
    #[error("netlink reactor has shut down")]
    Shutdown,
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local validation failed before any I/O.
    Encoding,
    /// Kernel returned a terminal error.
    KernelRejected,
    /// Kernel reported the key as absent on delete.
    NotFound,
    /// Retry budget exhausted on a transient error.
    Transient,
    /// Deadline expired.
    Timeout,
    /// Malformed or truncated kernel message.
    ProtocolViolation,
    /// Request dropped before it was written.
    Cancelled,
    /// Reactor no longer running.
    Shutdown,
    /// Socket-level I/O failure.
    Io,
}

/// Errnos meaning "no such entry" for a delete.
const NOT_FOUND_ERRNOS: [i32; 4] = [libc::ENOENT, libc::ESRCH, libc::ENODEV, libc::EADDRNOTAVAIL];

fn errno_message(errno: i32) -> String {
    io::Error::from_raw_os_error(errno).to_string()
}

impl Error {
    /// Create a kernel error from a (positive) errno value.
    ///
    /// Deletes answered with ENOENT, ESRCH, ENODEV or EADDRNOTAVAIL become
    /// [`Error::NotFound`].
    pub fn from_kernel(operation: Operation, errno: i32) -> Self {
        Self::from_kernel_ext(operation, errno, None)
    }

    /// Like [`Error::from_kernel`], appending the kernel's extended-ACK text
    /// to the message when there is one.
    pub fn from_kernel_ext(operation: Operation, errno: i32, ext_ack: Option<&str>) -> Self {
        if operation.is_delete() && NOT_FOUND_ERRNOS.contains(&errno) {
            return Self::NotFound { operation, errno };
        }
        let message = match ext_ack {
            Some(text) => format!("{}: {}", errno_message(errno), text),
            None => errno_message(errno),
        };
        Self::Kernel {
            operation,
            errno,
            message,
        }
    }

    /// Create a transient error once the retry budget is spent.
    pub fn transient(operation: Operation, errno: i32, attempts: u32) -> Self {
        Self::Transient {
            operation,
            errno,
            attempts,
            message: errno_message(errno),
        }
    }

    /// Create a validation error.
    pub fn encoding(object: &'static str, reason: impl Into<String>) -> Self {
        Self::Encoding {
            object,
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::Kernel { .. } => ErrorKind::KernelRejected,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidAttribute(_)
            | Self::Parse(_) => ErrorKind::ProtocolViolation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Shutdown => ErrorKind::Shutdown,
        }
    }

    /// Check if this is a "not found" outcome of a delete.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Check if this is a "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        self.errno() == Some(libc::EBUSY)
    }

    /// Check if this is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the errno value if this error came from the kernel.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. }
            | Self::NotFound { errno, .. }
            | Self::Transient { errno, .. } => Some(*errno),
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
