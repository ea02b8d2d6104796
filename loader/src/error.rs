//! Error types and result definitions for load operations.
//!
//! A single [`LoaderError`] type carries an [`ErrorKind`] classification, a
//! static description, optional dynamic detail, an optional source error and
//! the callsite location. The kind is what the orchestrator uses to decide
//! between aborting a run and continuing with an error count.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for load operations using [`LoaderError`] as the error type.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Detailed payload stored for a [`LoaderError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for load operations.
#[derive(Debug, Clone)]
pub struct LoaderError {
    payload: ErrorPayload,
}

/// Categories of errors that can occur during a load run.
///
/// Kinds marked as fatal in the run taxonomy abort the whole run; the rest
/// are recovered locally and surface only in counts and logs.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection errors. Always fatal.
    ConnectionFailed,
    AuthenticationFailed,

    // Source errors. Fatal for the run, zero writes happen.
    SourceMissing,
    SourceEmpty,
    SourceReadFailed,

    // Schema errors. Additive drift is repaired, ambiguous drift is fatal.
    SchemaDrift,
    InvalidIdentifier,

    // Snapshot errors. Fatal, no safe reconciliation basis exists.
    SnapshotReadFailed,

    // Write errors. Recovered per row, counted in the run report.
    QueryFailed,
    ConstraintViolation,

    // Data errors. Recovered per field via sentinel or null substitution.
    ConversionError,
    ValidationError,

    // Configuration and state errors.
    ConfigError,
    InvalidState,

    // IO errors.
    IoError,

    // Unknown / uncategorized.
    Unknown,
}

impl LoaderError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Returns whether this error aborts the whole run.
    ///
    /// Per-row and per-field failures are not fatal; everything touching the
    /// connection, the source as a whole, the schema or the snapshot is.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.payload.kind,
            ErrorKind::ConnectionFailed
                | ErrorKind::AuthenticationFailed
                | ErrorKind::SourceMissing
                | ErrorKind::SourceEmpty
                | ErrorKind::SourceReadFailed
                | ErrorKind::SchemaDrift
                | ErrorKind::InvalidIdentifier
                | ErrorKind::SnapshotReadFailed
                | ErrorKind::ConfigError
                | ErrorKind::InvalidState
        )
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`LoaderError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        LoaderError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
            },
        }
    }
}

impl PartialEq for LoaderError {
    fn eq(&self, other: &LoaderError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = self.payload.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for LoaderError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`LoaderError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for LoaderError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> LoaderError {
        LoaderError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`LoaderError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for LoaderError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> LoaderError {
        LoaderError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`LoaderError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for LoaderError {
    #[track_caller]
    fn from(err: std::io::Error) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`chrono::ParseError`] to [`LoaderError`] with [`ErrorKind::ConversionError`].
impl From<chrono::ParseError> for LoaderError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`std::num::ParseFloatError`] to [`LoaderError`] with [`ErrorKind::ConversionError`].
impl From<std::num::ParseFloatError> for LoaderError {
    #[track_caller]
    fn from(err: std::num::ParseFloatError) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Float parsing failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`std::num::ParseIntError`] to [`LoaderError`] with [`ErrorKind::ConversionError`].
impl From<std::num::ParseIntError> for LoaderError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer parsing failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`calamine::XlsxError`] to [`LoaderError`] with [`ErrorKind::SourceReadFailed`].
impl From<calamine::XlsxError> for LoaderError {
    #[track_caller]
    fn from(err: calamine::XlsxError) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::SourceReadFailed,
            Cow::Borrowed("Spreadsheet reading failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`sqlx::Error`] to [`LoaderError`] with the appropriate error kind.
///
/// Database errors are classified by their SQLSTATE class so that the writer
/// can distinguish per-row constraint violations (recoverable) from
/// connection loss (fatal).
impl From<sqlx::Error> for LoaderError {
    #[track_caller]
    fn from(err: sqlx::Error) -> LoaderError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // Connection exceptions (08xxx).
                Some(code) if code.starts_with("08") => {
                    (ErrorKind::ConnectionFailed, "Postgres connection failed")
                }
                // Authorization failures (28xxx).
                Some(code) if code.starts_with("28") => (
                    ErrorKind::AuthenticationFailed,
                    "Postgres authentication failed",
                ),
                // Integrity constraint violations (23xxx).
                Some(code) if code.starts_with("23") => (
                    ErrorKind::ConstraintViolation,
                    "Postgres constraint violation",
                ),
                // Data exceptions (22xxx).
                Some(code) if code.starts_with("22") => {
                    (ErrorKind::ConversionError, "Postgres data conversion failed")
                }
                // Transaction rollback, including serialization conflicts (40xxx).
                Some(code) if code.starts_with("40") => (
                    ErrorKind::ConstraintViolation,
                    "Postgres transaction rolled back",
                ),
                // Undefined objects and access violations (42xxx).
                Some(code) if code.starts_with("42") => {
                    (ErrorKind::SchemaDrift, "Postgres schema object error")
                }
                // Insufficient resources (53xxx).
                Some(code) if code.starts_with("53") => {
                    (ErrorKind::ConnectionFailed, "Postgres resource limitation")
                }
                _ => (ErrorKind::QueryFailed, "Postgres query failed"),
            },
            sqlx::Error::Io(_) => (ErrorKind::IoError, "Postgres I/O error"),
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                (ErrorKind::ConnectionFailed, "Postgres connection pool error")
            }
            sqlx::Error::RowNotFound => (ErrorKind::QueryFailed, "Postgres row not found"),
            _ => (ErrorKind::QueryFailed, "Database operation failed"),
        };

        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts a config [`config::shared::ValidationError`] to [`LoaderError`]
/// with [`ErrorKind::ConfigError`].
impl From<config::shared::ValidationError> for LoaderError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> LoaderError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoaderError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid load profile"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}
