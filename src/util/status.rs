use std::{error::Error, fmt, io, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    NoSuchElement,
    NotSupported,
    IllegalState,
    InvalidArgument,
    Corruption,
    IOError,
    ValueRead,
    Interrupted,
}

/// Error type shared by every iterator and the JSON layer.
///
/// A `Status` carries a [`Code`], an optional human readable message and an
/// optional cause. The cause is kept behind an `Arc` so a status stays
/// cheap to clone while the original error (and its own `source()` chain)
/// remains reachable through [`Error::source`].
#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: Option<String>,
    cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl Status {
    fn with_code(code: Code, msg: impl Into<String>) -> Self {
        Status {
            code,
            message: Some(msg.into()),
            cause: None,
        }
    }

    pub fn no_such_element() -> Self {
        Status {
            code: Code::NoSuchElement,
            message: None,
            cause: None,
        }
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Status::with_code(Code::NotSupported, msg)
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Status::with_code(Code::IllegalState, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Status::with_code(Code::InvalidArgument, msg)
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Status::with_code(Code::Corruption, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Status::with_code(Code::IOError, msg)
    }

    pub fn value_read(msg: impl Into<String>) -> Self {
        Status::with_code(Code::ValueRead, msg)
    }

    pub fn interrupted(msg: impl Into<String>) -> Self {
        Status::with_code(Code::Interrupted, msg)
    }

    /// Attach the error that caused this status.
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn is_no_such_element(&self) -> bool {
        self.code == Code::NoSuchElement
    }

    pub fn is_not_supported(&self) -> bool {
        self.code == Code::NotSupported
    }

    pub fn is_corruption(&self) -> bool {
        self.code == Code::Corruption
    }

    pub fn is_io_error(&self) -> bool {
        self.code == Code::IOError
    }

    pub fn is_value_read(&self) -> bool {
        self.code == Code::ValueRead
    }

    pub fn is_interrupted(&self) -> bool {
        self.code == Code::Interrupted
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{:?}: {}", self.code, msg),
            None => write!(f, "{:?}", self.code),
        }
    }
}

impl Error for Status {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

impl From<io::Error> for Status {
    fn from(err: io::Error) -> Self {
        let msg = err.to_string();
        if err.kind() == io::ErrorKind::Interrupted {
            Status::interrupted(msg).with_cause(err)
        } else {
            Status::io_error(msg).with_cause(err)
        }
    }
}

impl From<serde_json::Error> for Status {
    fn from(err: serde_json::Error) -> Self {
        let msg = err.to_string();
        if err.is_io() {
            Status::io_error(msg).with_cause(err)
        } else {
            Status::corruption(msg).with_cause(err)
        }
    }
}

/// Walk `err` and its `source()` chain looking for an interruption.
///
/// Both an interrupted [`Status`] and an [`io::Error`] of kind
/// [`io::ErrorKind::Interrupted`] count.
pub fn is_interrupted(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<Status>() {
            if status.is_interrupted() {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::Interrupted {
                return true;
            }
        }
        current = e.source();
    }
    false
}

pub type Result<T> = std::result::Result<T, Status>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_no_such_element() {
        let status = Status::no_such_element();
        assert!(status.is_no_such_element());
        assert_eq!(status.code(), Code::NoSuchElement);
        assert_eq!(status.message(), None);
    }

    #[test]
    fn test_status_display() {
        let status = Status::io_error("disk full");
        assert_eq!(status.to_string(), "IOError: disk full");
        assert_eq!(Status::no_such_element().to_string(), "NoSuchElement");
    }

    #[test]
    fn test_status_keeps_cause() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let status = Status::value_read("bad element").with_cause(io_err);
        let source = status.source().expect("cause");
        assert_eq!(source.to_string(), "pipe");
    }

    #[test]
    fn test_io_interrupted_maps_to_interrupted() {
        let status: Status = io::Error::new(io::ErrorKind::Interrupted, "stop").into();
        assert!(status.is_interrupted());
    }

    #[test]
    fn test_is_interrupted_walks_chain() {
        let inner = io::Error::new(io::ErrorKind::Interrupted, "stop");
        let outer = Status::io_error("write failed").with_cause(inner);
        let wrapped = Status::value_read("element").with_cause(outer);
        assert!(is_interrupted(&wrapped));

        let plain = Status::value_read("element").with_cause(Status::corruption("x"));
        assert!(!is_interrupted(&plain));
    }
}
