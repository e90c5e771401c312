use thiserror::Error;

/// Coarse classification of an [`Error`], used by callers that only need to
/// branch on the failure family (e.g. the server mapping errors to statuses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or empty dataset, missing artifacts, invalid hyperparameters.
    Configuration,
    /// Corrupt or unreadable training image, empty class directory.
    Data,
    /// A checkpoint or tensor does not fit the model it is given to.
    ShapeMismatch,
    /// Invalid base64 payload or unparseable image bytes.
    Decode,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    pub fn shape(what: &'static str, expected: usize, found: usize) -> Self {
        Error::ShapeMismatch { what, expected, found }
    }

    /// Artifacts that cannot be read or parsed count as configuration errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Configuration,
            Error::Data(_) => ErrorKind::Data,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::Decode(_) => ErrorKind::Decode,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
