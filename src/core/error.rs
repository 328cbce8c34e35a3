use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Field present but of the wrong type, or value outside its domain.
    Mismatch,
    /// Field absent from the document node.
    NotFound,
    /// Fixed-capacity destination cannot hold the value plus terminator.
    BufferTooSmall,
    /// Null/absent argument or an unsupported mode combination.
    InvalidParam,
    /// Allocation failure while building an owned result.
    NoMemory,
    /// Input bytes are not valid JSON (parse seam only).
    Parse,
    /// Underlying I/O failure (CLI file handling only).
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    field: Option<String>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            field: None,
            hint: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {field})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Mismatch => 1,
        ErrorKind::InvalidParam => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::BufferTooSmall => 4,
        ErrorKind::NoMemory => 5,
        ErrorKind::Parse => 6,
        ErrorKind::Io => 7,
    }
}

/// C ABI status codes. Parse/Io collapse into the generic failure code since
/// the ABI enum predates them.
pub fn to_status_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Mismatch => -1,
        ErrorKind::NotFound => -2,
        ErrorKind::BufferTooSmall => -3,
        ErrorKind::InvalidParam => -4,
        ErrorKind::NoMemory => -5,
        ErrorKind::Parse | ErrorKind::Io => -1,
    }
}
