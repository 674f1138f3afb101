//! Extraction of index records from parsed data sets.

use crate::error::{FileError, MissingAttributeSnafu, ParseFileSnafu, ReadFileSnafu};
use chrono::NaiveDate;
use dicomview_core::dataset::DataSet;
use dicomview_core::header::Tag;
use dicomview_core::tags;
use dicomview_store::{
    ImageAttributes, IndexRecord, InstanceRecord, PatientRecord, SeriesRecord, StudyRecord,
};
use snafu::{OptionExt, ResultExt};
use std::path::Path;

/// Read a file and extract its index record.
///
/// The whole stream is parsed, pixel data included,
/// so that a file cut short is rejected rather than indexed.
/// Pixel data is never decoded during ingestion.
pub fn read_record(path: &Path) -> Result<IndexRecord, FileError> {
    let bytes = std::fs::read(path).context(ReadFileSnafu { path })?;
    let set = dicomview_parser::parse(&bytes).context(ParseFileSnafu { path })?;
    extract_record(&set, path, Some(bytes.len() as u64))
}

/// Build the index record of a parsed data set.
///
/// Study Instance UID, Series Instance UID and SOP Instance UID
/// are required. The SOP UIDs may come from the file meta group.
pub fn extract_record(
    set: &DataSet,
    path: &Path,
    file_size: Option<u64>,
) -> Result<IndexRecord, FileError> {
    let text = |tag: Tag| set.string(tag).map(str::to_string);
    let required = |tag: Tag, name: &'static str| {
        text(tag).context(MissingAttributeSnafu { path, name })
    };
    let meta = set.meta();

    let sop_instance_uid = match text(tags::SOP_INSTANCE_UID) {
        Some(uid) => uid,
        None => meta
            .and_then(|m| m.media_storage_sop_instance_uid.clone())
            .context(MissingAttributeSnafu {
                path,
                name: "SOPInstanceUID",
            })?,
    };
    let sop_class_uid = text(tags::SOP_CLASS_UID)
        .or_else(|| meta.and_then(|m| m.media_storage_sop_class_uid.clone()));

    Ok(IndexRecord {
        patient: PatientRecord {
            patient_id: text(tags::PATIENT_ID).unwrap_or_default(),
            patient_name: text(tags::PATIENT_NAME),
            birth_date: date(set, tags::PATIENT_BIRTH_DATE),
            sex: text(tags::PATIENT_SEX),
        },
        study: StudyRecord {
            study_instance_uid: required(tags::STUDY_INSTANCE_UID, "StudyInstanceUID")?,
            study_date: date(set, tags::STUDY_DATE),
            study_time: text(tags::STUDY_TIME),
            description: text(tags::STUDY_DESCRIPTION),
            accession_number: text(tags::ACCESSION_NUMBER),
            referring_physician_name: text(tags::REFERRING_PHYSICIAN_NAME),
        },
        series: SeriesRecord {
            series_instance_uid: required(tags::SERIES_INSTANCE_UID, "SeriesInstanceUID")?,
            modality: text(tags::MODALITY),
            series_number: set.int(tags::SERIES_NUMBER),
            description: text(tags::SERIES_DESCRIPTION),
            body_part_examined: text(tags::BODY_PART_EXAMINED),
        },
        instance: InstanceRecord {
            sop_instance_uid,
            sop_class_uid,
            instance_number: set.int(tags::INSTANCE_NUMBER),
            file_path: path.to_owned(),
            file_size,
            transfer_syntax_uid: set.transfer_syntax().unwrap_or_default().to_string(),
            image: ImageAttributes {
                rows: set.int(tags::ROWS),
                columns: set.int(tags::COLUMNS),
                bits_allocated: set.int(tags::BITS_ALLOCATED),
                bits_stored: set.int(tags::BITS_STORED),
                samples_per_pixel: set.int(tags::SAMPLES_PER_PIXEL),
                photometric_interpretation: text(tags::PHOTOMETRIC_INTERPRETATION),
                window_center: set.f64(tags::WINDOW_CENTER),
                window_width: set.f64(tags::WINDOW_WIDTH),
                rescale_slope: set.f64(tags::RESCALE_SLOPE),
                rescale_intercept: set.f64(tags::RESCALE_INTERCEPT),
                number_of_frames: set.int(tags::NUMBER_OF_FRAMES),
            },
        },
    })
}

fn date(set: &DataSet, tag: Tag) -> Option<NaiveDate> {
    set.get(tag)?.value().primitive()?.to_date().ok()
}
