//! Error types for ziparc-core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the ziparc library
#[derive(Error, Debug)]
pub enum Error {
    /// Input path does not exist
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Source stream or asset could not be opened
    #[error("Couldn't open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: io::Error,
    },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Container structure violation
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// Encrypted entries, unknown compression methods, ...
    #[error("Unsupported archive feature: {0}")]
    Unsupported(String),

    /// Entry name resolves outside the destination directory
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    /// ZIP writer error
    #[error("Zip error: {0}")]
    Zip(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation stopped through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Extraction failed; wraps the underlying cause
    #[error("Couldn't extract {archive}: {source}")]
    Extraction {
        archive: String,
        #[source]
        source: Box<Error>,
    },

    /// Packing failed; wraps the underlying cause
    #[error("Couldn't zip {}: {source}", .destination.display())]
    Pack {
        destination: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

/// Root cause category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Open,
    Io,
    MalformedArchive,
    Unsupported,
    PathTraversal,
    Config,
    Cancelled,
}

impl Error {
    /// Wrap `self` as an extraction failure of `archive`
    pub fn extraction(archive: impl Into<String>, source: Error) -> Self {
        Error::Extraction {
            archive: archive.into(),
            source: Box::new(source),
        }
    }

    /// Wrap `self` as a packing failure of `destination`
    pub fn pack(destination: impl Into<PathBuf>, source: Error) -> Self {
        Error::Pack {
            destination: destination.into(),
            source: Box::new(source),
        }
    }

    /// Category of the innermost cause, looking through boundary wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Open { .. } => ErrorKind::Open,
            Error::Io(_) => ErrorKind::Io,
            Error::MalformedArchive(_) => ErrorKind::MalformedArchive,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::PathTraversal(_) => ErrorKind::PathTraversal,
            Error::Zip(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Extraction { source, .. } | Error::Pack { source, .. } => source.kind(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::Zip(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
