//! Error types for frame decoding and display transforms.

use snafu::{Backtrace, Snafu};
use std::fmt;

/// An error which occurred while decoding a frame.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum DecodeError {
    /// The data set does not declare a transfer syntax
    MissingTransferSyntax { backtrace: Backtrace },

    #[snafu(display("No frame decoder registered for transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("Frame #{} requested, but the image has {} frame(s)", frame, frames))]
    FrameIndexOutOfRange {
        frame: u32,
        frames: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidAttribute {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },

    /// The data set has no pixel data
    MissingPixelData { backtrace: Backtrace },

    #[snafu(display("Pixel data holds {} bytes, but frame #{} needs {}", available, frame, needed))]
    ShortPixelData {
        frame: u32,
        needed: usize,
        available: usize,
        backtrace: Backtrace,
    },

    /// The pixel data value is text rather than samples
    NonNumericPixelData { backtrace: Backtrace },

    /// A fragment lies outside of the source stream
    FragmentOutOfBounds { backtrace: Backtrace },

    /// The codec rejected the compressed data.
    #[snafu(whatever, display("{}", message))]
    Codec {
        message: String,
        /// the underlying codec error, if any
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

/// The broad category of a [`DecodeError`].
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum DecodeErrorKind {
    /// no decoder is registered for the transfer syntax
    UnsupportedTransferSyntax,
    /// the codec failed, or the pixel data is inconsistent with its attributes
    Codec,
    /// the frame index is not below the number of frames
    FrameIndexOutOfRange,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeErrorKind::UnsupportedTransferSyntax => "UnsupportedTransferSyntax",
            DecodeErrorKind::Codec => "CodecError",
            DecodeErrorKind::FrameIndexOutOfRange => "FrameIndexOutOfRange",
        };
        f.write_str(name)
    }
}

impl DecodeError {
    /// Get the kind of this error.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::UnsupportedTransferSyntax { .. }
            | DecodeError::MissingTransferSyntax { .. } => {
                DecodeErrorKind::UnsupportedTransferSyntax
            }
            DecodeError::FrameIndexOutOfRange { .. } => DecodeErrorKind::FrameIndexOutOfRange,
            _ => DecodeErrorKind::Codec,
        }
    }
}

/// Result type for frame decoding.
pub type DecodeResult<T, E = DecodeError> = std::result::Result<T, E>;

/// An error which occurred while building a display buffer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum TransformError {
    #[snafu(display("Invalid window parameters: center {}, width {}", center, width))]
    InvalidWindowParameters {
        center: f64,
        width: f64,
        backtrace: Backtrace,
    },
}
