//! Record types of the index: one per level of the hierarchy,
//! and the denormalized [`IndexRecord`] combining all four.

use chrono::NaiveDate;
use std::path::PathBuf;

/// Patient level attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRecord {
    /// Patient ID, the key of the patient level (may be empty)
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
}

/// Study level attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyRecord {
    pub study_instance_uid: String,
    pub study_date: Option<NaiveDate>,
    pub study_time: Option<String>,
    pub description: Option<String>,
    pub accession_number: Option<String>,
    pub referring_physician_name: Option<String>,
}

/// Series level attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesRecord {
    pub series_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<i32>,
    pub description: Option<String>,
    pub body_part_examined: Option<String>,
}

/// Image attributes kept for each instance,
/// so that viewers can lay out frames without reading the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAttributes {
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub bits_stored: Option<u16>,
    pub samples_per_pixel: Option<u16>,
    pub photometric_interpretation: Option<String>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
    pub rescale_slope: Option<f64>,
    pub rescale_intercept: Option<f64>,
    pub number_of_frames: Option<u32>,
}

/// Instance level attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceRecord {
    pub sop_instance_uid: String,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i32>,
    /// where the file was found on ingestion
    pub file_path: PathBuf,
    pub file_size: Option<u64>,
    pub transfer_syntax_uid: String,
    pub image: ImageAttributes,
}

/// The summary of one indexed instance
/// together with the levels above it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRecord {
    pub patient: PatientRecord,
    pub study: StudyRecord,
    pub series: SeriesRecord,
    pub instance: InstanceRecord,
}

/// A series in a hierarchy listing,
/// with the number of instances indexed under it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub series: SeriesRecord,
    pub instance_count: u32,
}

/// Criteria for querying the index.
///
/// Hierarchy fields match exactly,
/// except for the patient name pattern,
/// where `*` matches any run of characters and `?` any single character.
/// The study date range is inclusive on both ends.
/// Criteria left as `None` match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_name_pattern: Option<String>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub modality: Option<String>,
    pub study_date_from: Option<NaiveDate>,
    pub study_date_to: Option<NaiveDate>,
}

impl QueryFilter {
    /// A filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the patient name exactly.
    pub fn patient_name(mut self, name: impl Into<String>) -> Self {
        self.patient_name = Some(name.into());
        self
    }

    /// Match the patient name against a pattern
    /// with `*` and `?` wildcards. Matching is case sensitive.
    pub fn patient_name_matching(mut self, pattern: impl Into<String>) -> Self {
        self.patient_name_pattern = Some(pattern.into());
        self
    }

    /// Match the modality exactly.
    pub fn modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    /// Restrict the study date to the given inclusive range.
    pub fn study_date_between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.study_date_from = from;
        self.study_date_to = to;
        self
    }
}
