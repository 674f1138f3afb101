//! Crate-level error types.

use crate::text::TextError;
use dicomview_core::header::{Tag, VR};
use snafu::{Backtrace, Snafu};

/// The kind of a parse error,
/// for callers which only need to report the class of failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// The stream structure is invalid
    MalformedStream,
    /// The file meta group names a transfer syntax which is not recognized
    UnknownTransferSyntax,
    /// A value runs past the end of the stream
    TruncatedValue,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ParseErrorKind::MalformedStream => "MalformedStream",
            ParseErrorKind::UnknownTransferSyntax => "UnknownTransferSyntax",
            ParseErrorKind::TruncatedValue => "TruncatedValue",
        })
    }
}

/// An error which may occur while parsing a DICOM stream.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The `DICM` magic code was not found
    #[snafu(display("Missing DICM magic code"))]
    MissingMagic { backtrace: Backtrace },
    /// The stream ended in the middle of a header
    #[snafu(display("Element header cut short at position {}", position))]
    ReadHeader { position: usize, backtrace: Backtrace },
    /// The file meta group has no transfer syntax
    #[snafu(display("File meta group is missing the transfer syntax UID"))]
    MissingTransferSyntax { backtrace: Backtrace },
    #[snafu(display("Unknown transfer syntax `{}`", uid))]
    UnknownTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display(
        "Value of {} with length {} at position {} runs past end of stream ({} bytes available)",
        tag,
        len,
        position,
        available
    ))]
    TruncatedValue {
        tag: Tag,
        len: u32,
        position: usize,
        available: usize,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Length {} of {} at position {} exceeds its container, which ends at {}",
        len,
        tag,
        position,
        limit
    ))]
    ContainerOverrun {
        tag: Tag,
        len: u32,
        position: usize,
        limit: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected tag {} in sequence at position {}", tag, position))]
    UnexpectedItemTag {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected delimiter {} at position {}", tag, position))]
    UnexpectedDelimiter {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Undefined length in primitive element {} at position {}", tag, position))]
    UndefinedValueLength {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid length {} for a value of {} in element {}", len, vr, tag))]
    InvalidValueLength {
        tag: Tag,
        vr: VR,
        len: u32,
        backtrace: Backtrace,
    },
    /// The basic offset table is not a whole number of 32-bit offsets
    #[snafu(display("Basic offset table of length {} at position {}", len, position))]
    InvalidOffsetTable {
        len: u32,
        position: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Stream ended with {} open sequence(s)", open))]
    UnexpectedEndOfStream { open: usize, backtrace: Backtrace },
    #[snafu(display("Could not decode text in element {}", tag))]
    DecodeText { tag: Tag, source: TextError },
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Error::UnknownTransferSyntax { .. } => ParseErrorKind::UnknownTransferSyntax,
            Error::TruncatedValue { .. } => ParseErrorKind::TruncatedValue,
            _ => ParseErrorKind::MalformedStream,
        }
    }
}

/// Type alias for a result from this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error which may occur while writing a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    #[snafu(display("Unknown transfer syntax `{}`", uid))]
    WriteUnknownTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display("Could not encode text in element {}", tag))]
    EncodeText { tag: Tag, source: TextError },
    #[snafu(display("Element {} holds encapsulated pixel data but no fragment data was given", tag))]
    MissingFragmentData { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Value of {} is too long for a 16-bit length field", tag))]
    ValueTooLong { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Could not write to destination"))]
    WriteIo {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}
