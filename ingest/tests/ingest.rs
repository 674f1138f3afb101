//! Batch ingestion and rendering over synthesized files.

use dicomview_core::dataset::{DataElement, DataSet};
use dicomview_core::header::VR;
use dicomview_core::tags;
use dicomview_core::transfer_syntax::{EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN};
use dicomview_core::value::PrimitiveValue;
use dicomview_ingest::{
    ingest, ingest_directory, CancelToken, FailureKind, IngestConfig, Library, RenderError,
};
use dicomview_parser::DataSetWriter;
use dicomview_pixeldata::WindowLevel;
use dicomview_store::{IndexStore, QueryFilter};
use std::path::{Path, PathBuf};

fn config(dir: &Path) -> IngestConfig {
    IngestConfig {
        database_path: dir.join("index.sqlite"),
        worker_threads: 2,
        channel_capacity: 2,
        ..IngestConfig::default()
    }
}

fn text(set: &mut DataSet, tag: dicomview_core::header::Tag, vr: VR, value: &str) {
    set.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

/// A 2x2 8-bit MONOCHROME2 image.
fn image(instance: u32, photometric: &str) -> DataSet {
    let mut set = DataSet::new();
    text(&mut set, tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.7");
    text(&mut set, tags::SOP_INSTANCE_UID, VR::UI, &format!("1.2.9.1.1.{}", instance));
    text(&mut set, tags::STUDY_DATE, VR::DA, "20230405");
    text(&mut set, tags::MODALITY, VR::CS, "OT");
    text(&mut set, tags::PATIENT_NAME, VR::PN, "TEST^PATIENT");
    text(&mut set, tags::PATIENT_ID, VR::LO, "ID0001");
    text(&mut set, tags::STUDY_INSTANCE_UID, VR::UI, "1.2.9");
    text(&mut set, tags::SERIES_INSTANCE_UID, VR::UI, "1.2.9.1");
    text(&mut set, tags::INSTANCE_NUMBER, VR::IS, &instance.to_string());
    set.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
    text(&mut set, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, photometric);
    set.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(2_u16)));
    set.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(2_u16)));
    set.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)));
    set.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)));
    set.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)));
    set.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(vec![0_u8, 64, 128, 255]),
    ));
    set
}

fn write_image(dir: &Path, name: &str, instance: u32, ts: &str) -> PathBuf {
    let path = dir.join(name);
    let bytes = DataSetWriter::new(ts)
        .unwrap()
        .write_to_vec(&image(instance, "MONOCHROME2"))
        .unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn same_file_twice_gives_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = IndexStore::open(&config.database_path, config.store_options()).unwrap();
    let file = write_image(dir.path(), "a.dcm", 1, EXPLICIT_VR_LITTLE_ENDIAN.uid());

    for _ in 0..2 {
        let summary = ingest(&store, &[&file], &config, |_| {}).unwrap();
        assert_eq!(summary.succeeded, vec![file.clone()]);
        assert!(summary.failed.is_empty());
    }
    let records = store.query(&QueryFilter::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].instance.file_path, file);
    assert_eq!(records[0].instance.image.rows, Some(2));
}

#[test]
fn malformed_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = IndexStore::open_in_memory().unwrap();

    let files: Vec<PathBuf> = (1..=10)
        .map(|i| {
            if i == 3 {
                let path = dir.path().join("broken.dcm");
                std::fs::write(&path, vec![0x55_u8; 300]).unwrap();
                path
            } else {
                let ts = if i % 2 == 0 {
                    IMPLICIT_VR_LITTLE_ENDIAN.uid()
                } else {
                    EXPLICIT_VR_LITTLE_ENDIAN.uid()
                };
                write_image(dir.path(), &format!("{:02}.dcm", i), i, ts)
            }
        })
        .collect();

    let mut reports = Vec::new();
    let summary = ingest(&store, &files, &config, |p| {
        reports.push((p.processed, p.total, p.failure));
    })
    .unwrap();

    assert_eq!(summary.succeeded.len(), 9);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].path, files[2]);
    assert_eq!(summary.failed[0].kind, FailureKind::MalformedStream);
    assert!(!summary.failed[0].reason.is_empty());
    // input order is kept
    let expected: Vec<_> = files.iter().filter(|f| **f != files[2]).cloned().collect();
    assert_eq!(summary.succeeded, expected);
    assert_eq!(store.instance_count().unwrap(), 9);

    assert_eq!(reports.len(), 10);
    assert_eq!(reports.last().map(|r| (r.0, r.1)), Some((10, 10)));
    assert_eq!(reports.iter().filter(|r| r.2.is_some()).count(), 1);
}

#[test]
fn unreadable_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = IndexStore::open_in_memory().unwrap();
    let missing = dir.path().join("missing.dcm");
    let summary = ingest(&store, &[&missing], &config, |_| {}).unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, FailureKind::Io);
}

#[test]
fn file_cut_short_in_pixel_data_is_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = IndexStore::open_in_memory().unwrap();

    let mut set = image(1, "MONOCHROME2");
    set.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(64_u16)));
    set.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(64_u16)));
    set.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(vec![0x80_u8; 64 * 64]),
    ));
    let bytes = DataSetWriter::new(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .unwrap()
        .write_to_vec(&set)
        .unwrap();
    let path = dir.path().join("cut.dcm");
    std::fs::write(&path, &bytes[..bytes.len() - 4000]).unwrap();

    let summary = ingest(&store, &[&path], &config, |_| {}).unwrap();
    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, FailureKind::TruncatedValue);
    assert_eq!(store.instance_count().unwrap(), 0);
}

#[test]
fn directory_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let nested = dir.path().join("study").join("series");
    std::fs::create_dir_all(&nested).unwrap();
    write_image(&nested, "IM0001", 1, EXPLICIT_VR_LITTLE_ENDIAN.uid());
    write_image(&nested, "b.DCM", 2, EXPLICIT_VR_LITTLE_ENDIAN.uid());
    std::fs::write(nested.join("notes.txt"), "not an image").unwrap();
    std::fs::write(nested.join("README"), "no magic code").unwrap();

    let store = IndexStore::open_in_memory().unwrap();
    let summary = ingest_directory(&store, dir.path(), &config, |_| {}).unwrap();
    assert_eq!(summary.succeeded.len(), 2);
    assert!(summary.failed.is_empty());
}

#[test]
fn render_indexed_frame() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let library = Library::with_store(IndexStore::open_in_memory().unwrap(), config);
    let file = write_image(dir.path(), "a.dcm", 1, EXPLICIT_VR_LITTLE_ENDIAN.uid());
    let summary = library.import(&[&file], |_| {}).unwrap();
    assert_eq!(summary.succeeded.len(), 1);

    let window = WindowLevel {
        center: 128.,
        width: 256.,
    };
    let buffer = library
        .render_frame("1.2.9.1.1.1", 0, Some(window), &CancelToken::new())
        .unwrap();
    assert_eq!((buffer.width, buffer.height), (2, 2));
    assert_eq!(buffer.samples_per_pixel, 1);
    assert_eq!(buffer.data, vec![0, 64, 128, 255]);

    let err = library
        .render_frame("1.2.9.1.1.1", 1, None, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, RenderError::DecodeFrame { .. }));

    let err = library
        .render_frame("9.9", 0, None, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, RenderError::NotIndexed { .. }));

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = library
        .render_frame("1.2.9.1.1.1", 0, None, &cancel)
        .unwrap_err();
    assert!(matches!(err, RenderError::Cancelled));
}

#[test]
fn browse_and_delete_through_the_library() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::open(config(dir.path())).unwrap();
    let files: Vec<_> = (1..=3)
        .map(|i| write_image(dir.path(), &format!("{}.dcm", i), i, EXPLICIT_VR_LITTLE_ENDIAN.uid()))
        .collect();
    library.import(&files, |_| {}).unwrap();

    let patients = library.patients().unwrap();
    assert_eq!(patients.len(), 1);
    let studies = library.studies_for_patient("ID0001").unwrap();
    assert_eq!(studies.len(), 1);
    let series = library.series_for_study("1.2.9").unwrap();
    assert_eq!(series[0].instance_count, 3);
    assert_eq!(library.instances_for_series("1.2.9.1").unwrap().len(), 3);
    assert_eq!(library.file_paths_for_study("1.2.9").unwrap().len(), 3);

    assert_eq!(library.delete_study("1.2.9").unwrap(), 3);
    assert!(library.patients().unwrap().is_empty());
    // files are left in place
    assert!(files.iter().all(|f| f.exists()));
}
