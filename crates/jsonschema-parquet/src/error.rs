use thiserror::Error;

/// Core error type for schema compilation and record encoding
///
/// Every variant that concerns a specific field carries the dotted path of
/// that field (for example `root.Address.City`), so a failing schema or
/// record can be traced back to its source.
#[derive(Error, Debug)]
pub enum Error {
    /// A `$ref` pointer could not be followed
    #[error("Schema resolution error at `{path}`: cannot resolve `{reference}`: {reason}")]
    SchemaResolution {
        path: String,
        reference: String,
        reason: String,
    },

    /// A `$ref` chain leads back to a definition that is still being compiled
    #[error(
        "Cyclic schema error at `{path}`: `{reference}` is self-referential ({})",
        .cycle.join(" -> ")
    )]
    CyclicSchema {
        path: String,
        reference: String,
        cycle: Vec<String>,
    },

    /// A type/format combination with no Parquet mapping
    #[error("Unsupported type at `{path}`: {detail}")]
    UnsupportedType { path: String, detail: String },

    /// A schema document or subschema that is not shaped like a schema
    #[error("Invalid schema at `{path}`: {reason}")]
    InvalidSchema { path: String, reason: String },

    /// A record value that cannot be stored in its field's physical type
    #[error("Type mismatch at `{path}`: expected {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// A malformed or truncated Parquet buffer
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// An operation attempted on a writer that has already been closed
    #[error("Use after close: cannot {0} a closed writer")]
    UseAfterClose(&'static str),

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation observed a cancelled token and discarded its output
    #[error("Operation cancelled")]
    Cancelled,

    /// IO errors from the output sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow errors from Arrow operations
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Parquet format errors
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new type mismatch error
    pub fn type_mismatch<P, E, F>(path: P, expected: E, found: F) -> Self
    where
        P: Into<String>,
        E: Into<String>,
        F: Into<String>,
    {
        Error::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a new invalid schema error
    pub fn invalid_schema<P: Into<String>, S: Into<String>>(path: P, reason: S) -> Self {
        Error::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unsupported type error
    pub fn unsupported_type<P: Into<String>, S: Into<String>>(path: P, detail: S) -> Self {
        Error::UnsupportedType {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a new corrupt data error
    pub fn corrupt_data<S: Into<String>>(msg: S) -> Self {
        Error::CorruptData(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// The dotted field path this error refers to, if any
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Error::SchemaResolution { path, .. }
            | Error::CyclicSchema { path, .. }
            | Error::UnsupportedType { path, .. }
            | Error::InvalidSchema { path, .. }
            | Error::TypeMismatch { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// How serious a compile-time finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The field was compiled, but lossily (text fallback, ignored `$ref`)
    Warning,
    /// The field could not be compiled and was replaced by an opaque placeholder
    Error,
}

/// A finding collected while compiling a schema in lenient mode
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: Error,
}

impl Diagnostic {
    pub fn warning(error: Error) -> Self {
        Self {
            severity: Severity::Warning,
            error,
        }
    }

    pub fn error(error: Error) -> Self {
        Self {
            severity: Severity::Error,
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.error),
            Severity::Error => write!(f, "error: {}", self.error),
        }
    }
}

/// Extension trait that reclassifies lower-level failures as corrupt input
///
/// Used on the read path, where any arrow or parquet failure means the buffer
/// could not be decoded.
pub trait ErrorContext<T> {
    /// Wrap an error as [`Error::CorruptData`] with context
    fn corrupt<S: Into<String>>(self, ctx: S) -> Result<T>;

    /// Same as [`ErrorContext::corrupt`], with the context built lazily
    fn with_corrupt<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn corrupt<S: Into<String>>(self, ctx: S) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::CorruptData(format!("{}: {}", ctx.into(), base_error))
        })
    }

    fn with_corrupt<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::CorruptData(format!("{}: {}", f().into(), base_error))
        })
    }
}
