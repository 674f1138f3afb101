#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]
//! This crate decodes single frames of DICOM pixel data
//! and turns them into 8-bit display buffers.
//!
//! Decoding dispatches on the transfer syntax through a [`CodecRegistry`].
//! All decoders produce frames in one canonical layout:
//! row-major, sample-interleaved,
//! with little endian samples of _Bits Allocated_ width.
//! The display transform ([`to_display_buffer`]) then applies
//! the modality rescale, the VOI window
//! and the MONOCHROME1 inversion, in this order.
//!
//! # Example
//!
//! ```no_run
//! use dicomview_pixeldata::{decode_frame, to_display_buffer};
//!
//! let bytes = std::fs::read("image.dcm")?;
//! let set = dicomview_parser::parse(&bytes)?;
//! let frame = decode_frame(&set, &bytes, 0)?;
//! let display = to_display_buffer(&frame, &set, None)?;
//! println!("{}x{}", display.width, display.height);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `native` (default): the Rust native JPEG and RLE Lossless decoders
//! - `jpeg2k` (default): JPEG 2000 decoding through the `jpeg2k` crate,
//!   using its Rust port of OpenJPEG
//! - `rayon` (default): parallel look-up table construction

pub mod adapters;
pub mod attribute;
mod error;
mod frame;
mod lut;
pub mod registry;
pub mod transform;

pub use crate::adapters::jpeg2k::Jpeg2000Codec;
pub use crate::attribute::{
    ImageGeometry, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};
pub use crate::error::{DecodeError, DecodeErrorKind, DecodeResult, TransformError};
pub use crate::frame::DecodedFrame;
pub use crate::lut::{DisplayLut, MAX_LUT_BITS};
pub use crate::registry::{CodecRegistry, FrameDecoder};
pub use crate::transform::{to_display_buffer, DisplayBuffer, Rescale, WindowLevel};

use crate::error::{
    FrameIndexOutOfRangeSnafu, MissingTransferSyntaxSnafu, UnsupportedTransferSyntaxSnafu,
};
use crate::frame::{encapsulated_frame, native_frame, pixel_fragments};
use dicomview_core::dataset::DataSet;
use dicomview_core::transfer_syntax;
use dicomview_core::Endianness;
use once_cell::sync::Lazy;
use snafu::{ensure, OptionExt};
use tracing::trace;

static STANDARD_REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::standard);

/// Decode a single frame with the decoders built into this crate.
///
/// `source` must be the byte stream the data set was parsed from,
/// since encapsulated pixel data fragments are read from it.
pub fn decode_frame(set: &DataSet, source: &[u8], frame: u32) -> DecodeResult<DecodedFrame> {
    decode_frame_with(&STANDARD_REGISTRY, set, source, frame)
}

/// Decode a single frame with the decoders of the given registry.
pub fn decode_frame_with(
    registry: &CodecRegistry,
    set: &DataSet,
    source: &[u8],
    frame: u32,
) -> DecodeResult<DecodedFrame> {
    let uid = set.transfer_syntax().context(MissingTransferSyntaxSnafu)?;
    let decoder = registry
        .get(uid)
        .context(UnsupportedTransferSyntaxSnafu { uid })?;

    let geometry = ImageGeometry::from_data_set(set)?;
    ensure!(
        frame < geometry.number_of_frames,
        FrameIndexOutOfRangeSnafu {
            frame,
            frames: geometry.number_of_frames,
        }
    );

    let ts = transfer_syntax::get(uid);
    let encapsulated = ts.map_or(false, |ts| ts.is_encapsulated());
    let byte_order = ts.map_or(Endianness::Little, |ts| ts.endianness());
    let data = match pixel_fragments(set) {
        Some(fragments) if encapsulated => {
            encapsulated_frame(fragments, source, frame, geometry.number_of_frames)?
        }
        Some(_) => snafu::whatever!("Encapsulated pixel data in a native transfer syntax"),
        None => native_frame(set, &geometry, frame, byte_order)?,
    };
    trace!(
        "Decoding frame #{} ({} bytes) with {:?}",
        frame,
        data.len(),
        decoder
    );
    decoder.decode(&data, &geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicomview_core::dataset::{DataElement, FileMeta};
    use dicomview_core::header::VR;
    use dicomview_core::tags;
    use dicomview_core::transfer_syntax::{
        EXPLICIT_VR_LITTLE_ENDIAN, JPEG_LS_LOSSLESS_IMAGE_COMPRESSION,
    };
    use dicomview_core::value::PrimitiveValue;

    fn image(ts: &str, frames: u32, pixel_data: Option<Vec<u8>>) -> DataSet {
        let mut set = DataSet::with_meta(FileMeta {
            transfer_syntax: ts.to_string(),
            ..FileMeta::default()
        });
        set.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        set.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ));
        set.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(frames.to_string()),
        ));
        set.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(2_u16)));
        set.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(2_u16)));
        set.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)));
        set.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)));
        if let Some(data) = pixel_data {
            set.put(DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(data)));
        }
        set
    }

    #[test]
    fn native_frames() {
        let set = image(EXPLICIT_VR_LITTLE_ENDIAN.uid(), 2, Some((0..8).collect()));
        let first = decode_frame(&set, &[], 0).unwrap();
        let second = decode_frame(&set, &[], 1).unwrap();
        assert_eq!(first.data, vec![0, 1, 2, 3]);
        assert_eq!(second.data, vec![4, 5, 6, 7]);
        assert_eq!((second.width(), second.height()), (2, 2));
    }

    #[test]
    fn frame_index_out_of_range() {
        let set = image(EXPLICIT_VR_LITTLE_ENDIAN.uid(), 2, Some((0..8).collect()));
        let err = decode_frame(&set, &[], 2).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::FrameIndexOutOfRange);
    }

    #[test]
    fn jpeg_ls_is_not_supported() {
        let set = image(JPEG_LS_LOSSLESS_IMAGE_COMPRESSION.uid(), 1, None);
        let err = decode_frame(&set, &[], 0).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnsupportedTransferSyntax);
    }

    #[test]
    fn missing_transfer_syntax() {
        // collecting the elements leaves the file meta behind
        let set: DataSet = image(EXPLICIT_VR_LITTLE_ENDIAN.uid(), 1, None)
            .iter()
            .cloned()
            .collect();
        let err = decode_frame(&set, &[], 0).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnsupportedTransferSyntax);
    }

    #[test]
    fn missing_pixel_data() {
        let set = image(EXPLICIT_VR_LITTLE_ENDIAN.uid(), 1, None);
        let err = decode_frame(&set, &[], 0).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPixelData { .. }));
        assert_eq!(err.kind(), DecodeErrorKind::Codec);
    }

    #[cfg(feature = "rle")]
    #[test]
    fn rle_frames_from_parsed_stream() {
        use crate::adapters::rle_lossless::tests::rle_frame;
        use dicomview_core::transfer_syntax::RLE_LOSSLESS;
        use dicomview_parser::DataSetWriter;

        let set = image(RLE_LOSSLESS.uid(), 2, None);
        let fragments = vec![rle_frame(&[vec![1, 2, 3, 4]]), rle_frame(&[vec![9, 9, 9, 9]])];
        let bytes = DataSetWriter::new(RLE_LOSSLESS.uid())
            .unwrap()
            .with_fragments(fragments)
            .write_to_vec(&set)
            .unwrap();

        let parsed = dicomview_parser::parse(&bytes).unwrap();
        let first = decode_frame(&parsed, &bytes, 0).unwrap();
        let second = decode_frame(&parsed, &bytes, 1).unwrap();
        assert_eq!(first.data, vec![1, 2, 3, 4]);
        assert_eq!(second.data, vec![9, 9, 9, 9]);
    }

    #[test]
    fn big_endian_32_bit_native_samples() {
        use dicomview_core::transfer_syntax::EXPLICIT_VR_BIG_ENDIAN;
        use dicomview_parser::DataSetWriter;

        let ts = EXPLICIT_VR_BIG_ENDIAN.uid();
        let mut set = image(ts, 1, None);
        set.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(1_u16)));
        set.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(32_u16)));
        set.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(32_u16)));
        // samples 0x0001_0002 and 0xFFFF_FFFE as OW words
        set.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16([0x0001, 0x0002, 0xFFFF, 0xFFFE].into_iter().collect()),
        ));
        let bytes = DataSetWriter::new(ts).unwrap().write_to_vec(&set).unwrap();

        let parsed = dicomview_parser::parse(&bytes).unwrap();
        let frame = decode_frame(&parsed, &bytes, 0).unwrap();
        assert_eq!((frame.width(), frame.height()), (1, 2));
        assert_eq!(frame.sample(0), 0x0001_0002);
        assert_eq!(frame.sample(1), 0xFFFF_FFFE);
        assert_eq!(frame.data, vec![0x02, 0x00, 0x01, 0x00, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn jpeg2000_frames_go_through_the_external_codec() {
        use dicomview_core::transfer_syntax::JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY;
        use dicomview_parser::DataSetWriter;

        /// Hands the code stream back as samples.
        #[derive(Debug)]
        struct Echo;

        impl Jpeg2000Codec for Echo {
            fn decode_jpeg2000(&self, compressed: &[u8], _: &ImageGeometry) -> DecodeResult<Vec<u8>> {
                Ok(compressed.to_vec())
            }
        }

        let ts = JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY.uid();
        let set = image(ts, 2, None);
        let bytes = DataSetWriter::new(ts)
            .unwrap()
            .with_fragments(vec![vec![1, 2, 3, 4], vec![10, 11, 12, 13]])
            .write_to_vec(&set)
            .unwrap();
        let parsed = dicomview_parser::parse(&bytes).unwrap();

        let registry = CodecRegistry::new().with_jpeg2000(Echo);
        let second = decode_frame_with(&registry, &parsed, &bytes, 1).unwrap();
        assert_eq!(second.data, vec![10, 11, 12, 13]);
        assert_eq!((second.width(), second.height()), (2, 2));
    }
}
