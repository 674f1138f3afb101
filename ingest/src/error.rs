//! Error types of ingestion and rendering.

use dicomview_parser::ParseErrorKind;
use snafu::{Backtrace, Snafu};
use std::fmt;
use std::path::PathBuf;

/// An error which stopped a whole operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read configuration file {}", path.display()))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid configuration file {}", path.display()))]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
        backtrace: Backtrace,
    },

    /// The index store failed, halting further writes
    Store {
        #[snafu(backtrace)]
        source: dicomview_store::Error,
    },

    /// Could not start the worker pool
    BuildThreadPool {
        source: rayon::ThreadPoolBuildError,
        backtrace: Backtrace,
    },

    /// The index writer thread panicked
    WriterPanicked { backtrace: Backtrace },
}

impl Error {
    /// Whether the failed operation may be tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store { source } if source.is_retryable())
    }
}

/// Result type for whole-batch operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error which kept one file out of the index.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum FileError {
    #[snafu(display("Could not read {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse {}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: dicomview_parser::Error,
    },

    #[snafu(display("{} has no {}", path.display(), name))]
    MissingAttribute { path: PathBuf, name: &'static str },
}

impl FileError {
    /// The kind of failure, as reported in ingestion summaries.
    pub fn kind(&self) -> FailureKind {
        match self {
            FileError::ReadFile { .. } => FailureKind::Io,
            FileError::ParseFile { source, .. } => source.kind().into(),
            FileError::MissingAttribute { .. } => FailureKind::MissingAttribute,
        }
    }
}

/// The reason a file was not indexed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// the stream structure is invalid
    MalformedStream,
    /// the transfer syntax is not recognized
    UnknownTransferSyntax,
    /// a value runs past the end of the file
    TruncatedValue,
    /// the file could not be read
    Io,
    /// a required UID is absent
    MissingAttribute,
}

impl From<ParseErrorKind> for FailureKind {
    fn from(kind: ParseErrorKind) -> Self {
        match kind {
            ParseErrorKind::MalformedStream => FailureKind::MalformedStream,
            ParseErrorKind::UnknownTransferSyntax => FailureKind::UnknownTransferSyntax,
            ParseErrorKind::TruncatedValue => FailureKind::TruncatedValue,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::MalformedStream => "MalformedStream",
            FailureKind::UnknownTransferSyntax => "UnknownTransferSyntax",
            FailureKind::TruncatedValue => "TruncatedValue",
            FailureKind::Io => "Io",
            FailureKind::MissingAttribute => "MissingAttribute",
        })
    }
}

/// An error which prevented a frame from being rendered.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum RenderError {
    /// The request was cancelled
    Cancelled,

    #[snafu(display("Instance {} is not in the index", uid))]
    NotIndexed { uid: String },

    /// Could not look up the instance
    LookupInstance {
        #[snafu(backtrace)]
        source: dicomview_store::Error,
    },

    #[snafu(display("Could not read {}", path.display()))]
    ReadInstance {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not parse {}", path.display()))]
    ParseInstance {
        path: PathBuf,
        source: dicomview_parser::Error,
    },

    /// Could not decode the frame
    DecodeFrame {
        source: dicomview_pixeldata::DecodeError,
    },

    /// Could not build the display buffer
    TransformFrame {
        source: dicomview_pixeldata::TransformError,
    },
}
