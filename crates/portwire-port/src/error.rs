use std::time::Duration;

use portwire_adapter::AdapterError;
use portwire_frame::ErrorInfo;

/// Category of an error that crossed (or will cross) the wire.
///
/// The wire carries error names as strings; the well-known ones get a
/// variant so callers can match on them, everything else survives verbatim
/// in [`RemoteErrorKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    Other(String),
}

impl RemoteErrorKind {
    /// The wire name for this kind.
    pub fn name(&self) -> &str {
        match self {
            RemoteErrorKind::Error => "Error",
            RemoteErrorKind::TypeError => "TypeError",
            RemoteErrorKind::RangeError => "RangeError",
            RemoteErrorKind::ReferenceError => "ReferenceError",
            RemoteErrorKind::SyntaxError => "SyntaxError",
            RemoteErrorKind::Other(name) => name,
        }
    }

    /// Map a wire name back to a kind. Unknown names are preserved.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Error" => RemoteErrorKind::Error,
            "TypeError" => RemoteErrorKind::TypeError,
            "RangeError" => RemoteErrorKind::RangeError,
            "ReferenceError" => RemoteErrorKind::ReferenceError,
            "SyntaxError" => RemoteErrorKind::SyntaxError,
            other => RemoteErrorKind::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An error raised by a handler, locally or on the other side of the wire.
///
/// This is the only error shape that travels: handlers fail with it,
/// requesters get it back out of [`crate::PortError::Remote`]. The optional
/// location fields round-trip untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    pub stack: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
            file_name: None,
            line_number: None,
            column_number: None,
        }
    }

    /// A plain error with the generic kind.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Error, message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location(mut self, file_name: impl Into<String>, line: u32, column: u32) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = Some(line);
        self.column_number = Some(column);
        self
    }

    /// The wire name of this error's kind.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Convert to the wire field set.
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            name: self.kind.name().to_owned(),
            message: self.message.clone(),
            stack: self.stack.clone(),
            file_name: self.file_name.clone(),
            line_number: self.line_number,
            column_number: self.column_number,
        }
    }

    /// Reconstruct from the wire field set.
    pub fn from_info(info: ErrorInfo) -> Self {
        Self {
            kind: RemoteErrorKind::from_name(&info.name),
            message: info.message,
            stack: info.stack,
            file_name: info.file_name,
            line_number: info.line_number,
            column_number: info.column_number,
        }
    }
}

/// Errors surfaced by port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Handler names must be non-empty.
    #[error("invalid handler name {0:?}")]
    InvalidName(String),

    /// A handler is already registered under this name or pattern.
    #[error("duplicate handler {0:?}")]
    DuplicateHandler(String),

    /// The wildcard pattern cannot be compiled.
    #[error("invalid wildcard pattern {0:?}")]
    InvalidPattern(String),

    /// The port was destroyed before this call.
    #[error("port disconnected")]
    Disconnected,

    /// The port was destroyed while this request was pending.
    #[error("port destroyed")]
    Destroyed,

    /// The responder for this call was already taken.
    #[error("responder already taken")]
    ResponderTaken,

    /// An inbound value used the reserved tag in a way we cannot decode.
    #[error("cannot unmap argument: {0}")]
    CannotUnmap(String),

    /// `wait_timeout` elapsed. The request stays pending; this is not a
    /// cancellation.
    #[error("reply timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side answered with an error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The adapter refused or failed the operation.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Lets handlers `?` port operations. A nested request that failed with a
/// remote error re-raises that error; everything else degrades to a generic
/// error carrying the port error's message.
impl From<PortError> for RemoteError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Remote(remote) => remote,
            other => RemoteError::generic(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in [
            RemoteErrorKind::Error,
            RemoteErrorKind::TypeError,
            RemoteErrorKind::RangeError,
            RemoteErrorKind::ReferenceError,
            RemoteErrorKind::SyntaxError,
            RemoteErrorKind::Other("QuotaExceededError".into()),
        ] {
            assert_eq!(RemoteErrorKind::from_name(kind.name()), kind);
        }
    }

    #[test]
    fn test_display_is_name_and_message() {
        let error = RemoteError::new(RemoteErrorKind::TypeError, "expected a number");
        assert_eq!(error.to_string(), "TypeError: expected a number");
    }

    #[test]
    fn test_info_roundtrip_preserves_unknown_names() {
        let error = RemoteError::new(RemoteErrorKind::Other("DbError".into()), "locked")
            .with_stack("at lock_table")
            .with_location("db.rs", 40, 9);

        let back = RemoteError::from_info(error.to_info());
        assert_eq!(back, error);
        assert_eq!(back.name(), "DbError");
    }

    #[test]
    fn test_port_error_wraps_remote() {
        let error = PortError::from(RemoteError::generic("boom"));
        assert_eq!(error.to_string(), "remote error: Error: boom");
    }

    #[test]
    fn test_remote_error_from_port_error_unwraps() {
        let original = RemoteError::new(RemoteErrorKind::RangeError, "too big");
        let back = RemoteError::from(PortError::Remote(original.clone()));
        assert_eq!(back, original);

        let degraded = RemoteError::from(PortError::Disconnected);
        assert_eq!(degraded.kind, RemoteErrorKind::Error);
        assert_eq!(degraded.message, "port disconnected");
    }
}
