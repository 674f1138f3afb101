//! Write data sets in each native transfer syntax and parse them back.

use dicomview_core::dataset::{DataElement, DataSet, FileMeta};
use dicomview_core::header::{Tag, VR};
use dicomview_core::smallvec::smallvec;
use dicomview_core::tags;
use dicomview_core::transfer_syntax::{
    EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN, RLE_LOSSLESS,
};
use dicomview_core::value::{PrimitiveValue, Value};
use dicomview_parser::{meta, parse, parse_with_options, DataSetWriter, ParseErrorKind, ParseOptions};
use rstest::rstest;

fn sample_data_set() -> DataSet {
    let item: DataSet = vec![
        DataElement::new(tags::REFERENCED_SOP_CLASS_UID, VR::UI, PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.2")),
        DataElement::new(tags::REFERENCED_SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.42")),
    ]
    .into_iter()
    .collect();

    vec![
        DataElement::new(tags::SPECIFIC_CHARACTER_SET, VR::CS, PrimitiveValue::from("ISO_IR 192")),
        DataElement::new(
            tags::IMAGE_TYPE,
            VR::CS,
            PrimitiveValue::Strs(smallvec!["ORIGINAL".into(), "PRIMARY".into()]),
        ),
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.2")),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.1234")),
        DataElement::new(tags::STUDY_DATE, VR::DA, PrimitiveValue::from("20240131")),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        DataElement::new(tags::REFERENCED_IMAGE_SEQUENCE, VR::SQ, Value::Sequence(vec![item])),
        DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Müller^Hans")),
        DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P01")),
        DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.1")),
        DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.12")),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("7")),
        DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            PrimitiveValue::Strs(smallvec!["0".into(), "-12.5".into(), "3".into()]),
        ),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::WINDOW_CENTER, VR::DS, PrimitiveValue::from("40")),
        DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from("-1024")),
        DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(smallvec![1, 2, 0x0300, 0xFFFF]),
        ),
    ]
    .into_iter()
    .collect()
}

#[rstest]
#[case(IMPLICIT_VR_LITTLE_ENDIAN.uid())]
#[case(EXPLICIT_VR_LITTLE_ENDIAN.uid())]
#[case(EXPLICIT_VR_BIG_ENDIAN.uid())]
fn write_then_parse_reproduces_values(#[case] ts: &str) {
    let original = sample_data_set();
    let bytes = DataSetWriter::new(ts).unwrap().write_to_vec(&original).unwrap();
    let parsed = parse(&bytes).unwrap();

    assert_eq!(parsed.transfer_syntax(), Some(ts));
    assert_eq!(parsed, original);
    assert_eq!(parsed.string(tags::PATIENT_NAME), Some("Müller^Hans"));
    let meta = parsed.meta().unwrap();
    assert_eq!(meta.media_storage_sop_instance_uid.as_deref(), Some("2.25.1234"));
}

#[test]
fn explicit_and_implicit_encodings_parse_equal() {
    let original = sample_data_set();
    let parsed: Vec<DataSet> = [
        IMPLICIT_VR_LITTLE_ENDIAN.uid(),
        EXPLICIT_VR_LITTLE_ENDIAN.uid(),
        EXPLICIT_VR_BIG_ENDIAN.uid(),
    ]
    .iter()
    .map(|ts| {
        let bytes = DataSetWriter::new(ts).unwrap().write_to_vec(&original).unwrap();
        parse(&bytes).unwrap()
    })
    .collect();

    assert_eq!(parsed[0], parsed[1]);
    assert_eq!(parsed[1], parsed[2]);
}

#[test]
fn implicit_vr_resolves_standard_attributes() {
    let original: DataSet = vec![
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.99")),
        DataElement::new(Tag(0x0010, 0x1000), VR::LO, PrimitiveValue::from("ABC")),
        DataElement::new(Tag(0x0018, 0x0050), VR::DS, PrimitiveValue::from("2.5")),
        DataElement::new(Tag(0x0020, 0x0060), VR::CS, PrimitiveValue::from("L")),
    ]
    .into_iter()
    .collect();

    let encode = |ts: &str| {
        let bytes = DataSetWriter::new(ts).unwrap().write_to_vec(&original).unwrap();
        parse(&bytes).unwrap()
    };
    let implicit = encode(IMPLICIT_VR_LITTLE_ENDIAN.uid());
    let explicit = encode(EXPLICIT_VR_LITTLE_ENDIAN.uid());

    assert_eq!(implicit, explicit);
    let laterality = implicit.get(Tag(0x0020, 0x0060)).unwrap();
    assert_eq!(laterality.vr(), VR::CS);
    assert_eq!(implicit.string(Tag(0x0020, 0x0060)), Some("L"));
    assert_eq!(implicit.get(Tag(0x0010, 0x1000)).unwrap().vr(), VR::LO);
    assert_eq!(implicit.string(Tag(0x0010, 0x1000)), Some("ABC"));
    assert_eq!(implicit.get(Tag(0x0018, 0x0050)).unwrap().vr(), VR::DS);
    assert_eq!(implicit.f64(Tag(0x0018, 0x0050)), Some(2.5));
}

#[test]
fn stop_at_pixel_data() {
    let bytes = DataSetWriter::new(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .unwrap()
        .write_to_vec(&sample_data_set())
        .unwrap();
    let set = parse_with_options(&bytes, ParseOptions::new().stop_at_pixel_data(true)).unwrap();
    assert!(!set.contains(tags::PIXEL_DATA));
    assert!(set.contains(tags::RESCALE_INTERCEPT));
}

#[test]
fn encapsulated_pixel_data_keeps_fragment_references() {
    let set: DataSet = vec![
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.7")),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(4_u16)),
    ]
    .into_iter()
    .collect();
    let fragments = vec![vec![1, 2, 3, 4, 5, 6], vec![7, 8, 9, 10]];
    let bytes = DataSetWriter::new(RLE_LOSSLESS.uid())
        .unwrap()
        .with_offset_table(vec![0])
        .with_fragments(fragments.clone())
        .write_to_vec(&set)
        .unwrap();

    let parsed = parse(&bytes).unwrap();
    let pixel_data = parsed.get(tags::PIXEL_DATA).unwrap();
    let encapsulated = pixel_data.value().fragments().unwrap();
    assert_eq!(&encapsulated.offset_table[..], &[0]);
    assert_eq!(encapsulated.fragments.len(), 2);
    for (fragment, expected) in encapsulated.fragments.iter().zip(&fragments) {
        assert_eq!(&bytes[fragment.range()], &expected[..]);
    }
}

#[test]
fn offset_table_of_partial_offsets() {
    let set: DataSet = vec![DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("2.25.7"),
    )]
    .into_iter()
    .collect();
    let bytes = DataSetWriter::new(RLE_LOSSLESS.uid())
        .unwrap()
        .with_offset_table(vec![0])
        .with_fragments(vec![vec![1, 2, 3, 4]])
        .write_to_vec(&set)
        .unwrap();

    // shorten the offset table item from 4 to 3 bytes
    let table_item = [0xFE, 0xFF, 0x00, 0xE0, 4, 0, 0, 0, 0, 0, 0, 0];
    let at = bytes
        .windows(table_item.len())
        .position(|w| w == table_item)
        .unwrap();
    let mut broken = bytes[..at].to_vec();
    broken.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 3, 0, 0, 0, 0, 0, 0]);
    broken.extend_from_slice(&bytes[at + table_item.len()..]);

    let err = parse(&broken).unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::MalformedStream);
}

#[test]
fn truncated_value() {
    let bytes = DataSetWriter::new(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .unwrap()
        .write_to_vec(&sample_data_set())
        .unwrap();
    // cut in the middle of the pixel data value
    let err = parse(&bytes[..bytes.len() - 3]).unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::TruncatedValue);
}

/// Encode the file meta group followed by the given data set body.
fn explicit_le_stream(body: &[u8]) -> Vec<u8> {
    let meta = FileMeta {
        transfer_syntax: EXPLICIT_VR_LITTLE_ENDIAN.uid().to_string(),
        ..FileMeta::default()
    };
    let mut bytes = Vec::new();
    meta::write_meta(&meta, &mut bytes).unwrap();
    bytes.extend_from_slice(body);
    bytes
}

#[rustfmt::skip]
fn defined_length_sequence(item_len: u8) -> Vec<u8> {
    vec![
        // (0008,1140) SQ, length 20
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0, 20, 0, 0, 0,
        // item
        0xFE, 0xFF, 0x00, 0xE0, item_len, 0, 0, 0,
        // (0008,1150) UI "1.2\0"
        0x08, 0x00, 0x50, 0x11, b'U', b'I', 4, 0, b'1', b'.', b'2', 0,
        // (0010,0010) PN "A^B "
        0x10, 0x00, 0x10, 0x00, b'P', b'N', 4, 0, b'A', b'^', b'B', b' ',
    ]
}

#[test]
fn sequences_of_defined_length() {
    let set = parse(&explicit_le_stream(&defined_length_sequence(12))).unwrap();
    let items = set.get(tags::REFERENCED_IMAGE_SEQUENCE).unwrap().items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].string(tags::REFERENCED_SOP_CLASS_UID), Some("1.2"));
    assert_eq!(set.string(tags::PATIENT_NAME), Some("A^B"));
}

#[test]
fn item_overrunning_its_sequence() {
    let err = parse(&explicit_le_stream(&defined_length_sequence(40))).unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::MalformedStream);
}

#[test]
fn unexpected_item_tag_in_sequence() {
    #[rustfmt::skip]
    let body = [
        // (0008,1140) SQ, undefined length
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0, 0xFF, 0xFF, 0xFF, 0xFF,
        // a regular element where an item was expected
        0x10, 0x00, 0x10, 0x00, b'P', b'N', 4, 0, b'A', b'^', b'B', b' ',
    ];
    let err = parse(&explicit_le_stream(&body)).unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::MalformedStream);
}

#[test]
fn private_sequence_of_unknown_vr() {
    #[rustfmt::skip]
    let body = [
        // (0009,1010) UN, undefined length: implicit VR LE content
        0x09, 0x00, 0x10, 0x10, b'U', b'N', 0, 0, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF,
        // (0028,0010) Rows, implicit: 2 bytes
        0x28, 0x00, 0x10, 0x00, 2, 0, 0, 0, 0x00, 0x02,
        0xFE, 0xFF, 0x0D, 0xE0, 0, 0, 0, 0,
        0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0,
    ];
    let set = parse(&explicit_le_stream(&body)).unwrap();
    let element = set.get(Tag(0x0009, 0x1010)).unwrap();
    assert_eq!(element.vr(), VR::SQ);
    let items = element.items().unwrap();
    assert_eq!(items[0].int::<u16>(tags::ROWS), Some(512));
}
