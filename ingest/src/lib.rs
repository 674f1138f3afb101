#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]
//! Ingestion of DICOM files into the dicomview index,
//! and the [`Library`] through which viewers use it.
//!
//! Ingesting a batch reads and parses files on a worker pool,
//! extracts their summary attributes
//! and funnels the records through a single writer into the store.
//! Pixel data is not decoded during ingestion:
//! frames are decoded on demand by [`Library::render_frame`].
//!
//! # Example
//!
//! ```no_run
//! use dicomview_ingest::{CancelToken, IngestConfig, Library};
//!
//! let library = Library::open(IngestConfig::load_default()?)?;
//! let summary = library.import(&["/data/dicom"], |_| {})?;
//! println!("{} indexed, {} failed", summary.succeeded.len(), summary.failed.len());
//!
//! if let Some(path) = summary.succeeded.first() {
//!     let record = dicomview_ingest::read_record(path)?;
//!     let buffer = library.render_frame(&record.instance.sop_instance_uid, 0, None, &CancelToken::new())?;
//!     println!("{}x{}", buffer.width, buffer.height);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
mod error;
pub mod extract;
mod library;
pub mod pipeline;

pub use crate::config::IngestConfig;
pub use crate::error::{Error, FailureKind, FileError, RenderError, Result};
pub use crate::extract::{extract_record, read_record};
pub use crate::library::{CancelToken, Library};
pub use crate::pipeline::{
    discover, ingest, ingest_directory, FailedFile, IngestProgress, IngestSummary,
};
