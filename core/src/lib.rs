#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core library of dicomview, containing the data structures
//! shared by the parser, the pixel data decoders and the index store.
//!
//! The current structure of this crate is as follows:
//!
//! - [`header`] comprises the data types of a DICOM element header:
//!   attribute tags, value representations and lengths.
//! - [`value`] holds definitions for element values,
//!   with the awareness of multiplicity, sequences
//!   and encapsulated pixel data fragments.
//! - [`dataset`] contains the in-memory data set and data element types.
//! - [`dictionary`] translates attribute tags and aliases
//!   into entries of the standard data dictionary,
//!   and [`tags`] lists the tags used across the workspace as constants.
//! - [`transfer_syntax`] lists the recognized transfer syntaxes.

pub mod dataset;
pub mod dictionary;
pub mod header;
pub mod tags;
pub mod transfer_syntax;
pub mod value;

pub use dataset::{DataElement, DataSet, FileMeta};
pub use dictionary::{DictionaryEntry, StandardDataDictionary};
pub use header::{DataElementHeader, Length, Tag, VR};
pub use transfer_syntax::TransferSyntax;
pub use value::{Fragment, PixelFragments, PrimitiveValue, Value};

// re-export crates that are part of the public API
pub use byteordered::Endianness;
pub use chrono;
pub use smallvec;
