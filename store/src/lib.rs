#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]
//! A persistent index of DICOM instances,
//! organized in the patient, study, series and instance hierarchy
//! and kept in an SQLite database.
//!
//! Records are keyed by their UIDs:
//! upserting an instance twice leaves a single record.
//! Files referenced by the index are never modified.
//!
//! # Example
//!
//! ```
//! use dicomview_store::{IndexStore, QueryFilter};
//!
//! let store = IndexStore::open_in_memory()?;
//! let records = store.query(&QueryFilter::new().modality("CT"))?;
//! assert!(records.is_empty());
//! # Ok::<(), dicomview_store::Error>(())
//! ```

mod error;
pub mod record;
mod schema;
mod store;

pub use crate::error::{Error, Result};
pub use crate::record::{
    ImageAttributes, IndexRecord, InstanceRecord, PatientRecord, QueryFilter, SeriesEntry,
    SeriesRecord, StudyRecord,
};
pub use crate::store::{IndexStore, StoreOptions};
