use std::error::Error;
use std::fmt;

use loader::error::LoaderError;
use telemetry::tracing::TracingSetupError;

/// Result type for importer operations.
pub type ImporterResult<T> = Result<T, ImporterError>;

/// Error type for the importer binary.
///
/// Wraps [`LoaderError`] for pipeline errors and provides variants for
/// infrastructure errors around it.
#[derive(Debug)]
pub enum ImporterError {
    /// Pipeline or load-related error.
    Load(LoaderError),
    /// Configuration error.
    Config(Box<dyn Error + Send + Sync>),
    /// Tracing setup error.
    Tracing(TracingSetupError),
    /// I/O error.
    Io(std::io::Error),
}

impl ImporterError {
    /// Wraps any error as a configuration error.
    pub fn config<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        ImporterError::Config(Box::new(err))
    }

    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            ImporterError::Load(_) => "load error",
            ImporterError::Config(_) => "configuration error",
            ImporterError::Tracing(_) => "tracing error",
            ImporterError::Io(_) => "i/o error",
        }
    }
}

impl fmt::Display for ImporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImporterError::Load(err) => write!(f, "{err}"),
            ImporterError::Config(source) => write!(f, "configuration error: {source}"),
            ImporterError::Tracing(source) => write!(f, "tracing error: {source}"),
            ImporterError::Io(source) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ImporterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImporterError::Load(err) => err.source(),
            ImporterError::Config(source) => Some(source.as_ref()),
            ImporterError::Tracing(source) => Some(source),
            ImporterError::Io(source) => Some(source),
        }
    }
}

impl From<LoaderError> for ImporterError {
    fn from(err: LoaderError) -> Self {
        ImporterError::Load(err)
    }
}

impl From<TracingSetupError> for ImporterError {
    fn from(err: TracingSetupError) -> Self {
        ImporterError::Tracing(err)
    }
}

impl From<std::io::Error> for ImporterError {
    fn from(err: std::io::Error) -> Self {
        ImporterError::Io(err)
    }
}
