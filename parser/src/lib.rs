#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]
//! This crate reads and writes DICOM Part 10 streams.
//!
//! Parsing works over a complete in-memory byte stream:
//! the preamble and file meta group are read first,
//! which determine the transfer syntax of the main data set.
//! Encapsulated pixel data is not copied,
//! but kept as fragment references into the stream
//! (see [`dicomview_core::value::PixelFragments`]).
//!
//! # Example
//!
//! ```no_run
//! use dicomview_parser::ParseOptions;
//! use dicomview_core::tags;
//!
//! let bytes = std::fs::read("image.dcm")?;
//! let set = dicomview_parser::parse_with_options(&bytes, ParseOptions::new().stop_at_pixel_data(true))?;
//! println!("{:?}", set.string(tags::PATIENT_NAME));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod dataset;
pub mod decode;
pub mod error;
pub mod meta;
pub mod text;

pub use crate::dataset::{DataSetReader, DataSetWriter, ParseOptions};
pub use crate::error::{Error, ParseErrorKind, Result, WriteError};
pub use crate::text::SpecificCharacterSet;

use crate::decode::{Mode, Source};
use crate::error::UnknownTransferSyntaxSnafu;
use dicomview_core::dataset::DataSet;
use dicomview_core::transfer_syntax;
use snafu::OptionExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Parse a complete DICOM Part 10 stream with the default options.
pub fn parse(bytes: &[u8]) -> Result<DataSet> {
    parse_with_options(bytes, ParseOptions::default())
}

/// Parse a complete DICOM Part 10 stream.
pub fn parse_with_options(bytes: &[u8], options: ParseOptions) -> Result<DataSet> {
    let start = meta::find_meta_start(bytes, options.require_preamble)?;
    let mut source = Source::new(bytes, start);
    let meta = meta::read_meta(&mut source)?;

    let ts = transfer_syntax::get(&meta.transfer_syntax).context(UnknownTransferSyntaxSnafu {
        uid: meta.transfer_syntax.as_str(),
    })?;
    debug!("Reading data set in {}", ts.name());

    let mut set = DataSetReader::new(source, Mode::of(ts), options).read()?;
    set.set_meta(meta);
    Ok(set)
}

/// Check whether the file at the given path looks like a DICOM file.
///
/// Files with a `.dcm` or `.dicom` extension are accepted right away.
/// Files without an extension are accepted
/// if they contain the `DICM` magic code after the preamble.
/// Files with other extensions, and files which cannot be read,
/// are rejected.
pub fn is_dicom_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("dcm") || ext.eq_ignore_ascii_case("dicom"),
        None => has_magic_code(path),
    }
}

fn has_magic_code(path: &Path) -> bool {
    let mut buf = [0u8; meta::PREAMBLE_LEN + 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut buf))
        .map(|_| buf[meta::PREAMBLE_LEN..] == meta::DICM_MAGIC_CODE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognize_dicom_files() {
        let dir = tempfile::tempdir().unwrap();
        let with_magic = dir.path().join("IM0001");
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"DICM");
        std::fs::write(&with_magic, &bytes).unwrap();
        let without_magic = dir.path().join("README");
        std::fs::write(&without_magic, b"hello").unwrap();
        let other = dir.path().join("notes.txt");
        std::fs::write(&other, &bytes).unwrap();

        assert!(is_dicom_file(&with_magic));
        assert!(!is_dicom_file(&without_magic));
        assert!(!is_dicom_file(&other));
        assert!(is_dicom_file(dir.path().join("missing.DCM")));
    }

    #[test]
    fn unknown_transfer_syntax() {
        let meta = dicomview_core::FileMeta {
            transfer_syntax: "1.2.3.4.5".into(),
            ..Default::default()
        };
        let mut bytes = Vec::new();
        meta::write_meta(&meta, &mut bytes).unwrap();
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnknownTransferSyntax);
    }

    #[test]
    fn missing_magic() {
        let err = parse(&[0u8; 200]).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MalformedStream);
    }
}
