use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for migration operations.
///
/// Each kind names one category of failure so callers (the engine, the CLI,
/// tests) can branch on the cause without parsing messages.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError, StrataResult};
///
/// fn lookup() -> StrataResult<()> {
///     Err(StrataError::new("Collection photos not found", ErrorKind::NotFound))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::NotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Schema lookup errors
    /// A collection or field required by an unconditional operation is absent
    NotFound,

    // Store errors
    /// The schema store rejected a save (concurrent modification, stale revision)
    Conflict,
    /// The schema store rejected a malformed collection definition
    Validation,

    // Catalog and engine setup errors, raised before any step executes
    /// Duplicate versions, malformed field specs, missing collaborators
    Configuration,

    // Run errors
    /// A step's transform failed; the cause holds the underlying error
    StepFailed,

    // IO and persistence errors
    /// Generic IO error
    IOError,
    /// Error encoding or decoding persisted data
    EncodingError,
    /// Error from a storage backend
    BackendError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Conflict => write!(f, "Conflict"),
            ErrorKind::Validation => write!(f, "Validation error"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::StepFailed => write!(f, "Step failed"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible strata operation.
///
/// `StrataError` carries a message, a kind and an optional cause, which forms
/// an error chain reachable through [`Error::source`]. A backtrace is captured
/// at construction and printed by the `Debug` representation.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError};
///
/// let cause = StrataError::new("revision 3 is stale", ErrorKind::Conflict);
/// let err = StrataError::new_with_cause("migration 1770000001 failed", ErrorKind::StepFailed, cause);
/// assert_eq!(err.cause().map(|c| c.kind().clone()), Some(ErrorKind::Conflict));
/// ```
#[derive(Clone)]
pub struct StrataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StrataError>>,
    backtrace: Arc<Backtrace>,
}

impl StrataError {
    /// Creates a new `StrataError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `StrataError` wrapping a cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StrataError) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StrataError> {
        self.cause.as_deref()
    }

    /// Returns true when this error is a [`ErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        self.error_kind == ErrorKind::NotFound
    }

    /// Walks the cause chain down to the innermost error.
    pub fn root_cause(&self) -> &StrataError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }

    /// Iterates over this error followed by every cause in the chain.
    pub fn chain(&self) -> impl Iterator<Item = &StrataError> {
        std::iter::successors(Some(self), |err| err.cause.as_deref())
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // message with backtrace, or message followed by the cause chain
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        // a missing file is an IO failure, never a missing collection
        StrataError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        let error_kind = if err.is_io() {
            ErrorKind::IOError
        } else {
            ErrorKind::EncodingError
        };
        StrataError::new(&format!("JSON error: {}", err), error_kind)
    }
}

impl From<std::num::ParseIntError> for StrataError {
    fn from(err: std::num::ParseIntError) -> Self {
        StrataError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::Configuration,
        )
    }
}

impl From<String> for StrataError {
    fn from(msg: String) -> Self {
        StrataError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for StrataError {
    fn from(msg: &str) -> Self {
        StrataError::new(msg, ErrorKind::InternalError)
    }
}
