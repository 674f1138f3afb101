//! Support for JPEG image decoding.

use crate::attribute::{ImageGeometry, PhotometricInterpretation, PlanarConfiguration};
use crate::error::DecodeResult;
use crate::frame::DecodedFrame;
use crate::registry::FrameDecoder;
use jpeg_decoder::{Decoder, PixelFormat};
use snafu::{ensure_whatever, OptionExt, ResultExt};
use std::io::Cursor;

/// Frame decoder for JPEG-based transfer syntaxes
/// (baseline, extended and lossless).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JpegAdapter;

impl FrameDecoder for JpegAdapter {
    fn decode(&self, data: &[u8], geometry: &ImageGeometry) -> DecodeResult<DecodedFrame> {
        ensure_whatever!(
            geometry.bits_allocated == 8 || geometry.bits_allocated == 16,
            "BitsAllocated other than 8 or 16 is not supported"
        );

        let mut decoder = Decoder::new(Cursor::new(data));
        let mut decoded = decoder
            .decode()
            .whatever_context("JPEG decoder failure")?;
        let info = decoder
            .info()
            .whatever_context("JPEG decoder did not report image information")?;

        ensure_whatever!(
            info.width == geometry.columns && info.height == geometry.rows,
            "JPEG image is {}x{}, expected {}x{}",
            info.width,
            info.height,
            geometry.columns,
            geometry.rows
        );

        let mut out_geometry = geometry.clone();
        out_geometry.planar_configuration = PlanarConfiguration::Standard;
        match info.pixel_format {
            PixelFormat::L8 => {}
            PixelFormat::L16 => {
                // the decoder yields big endian samples
                for pair in decoded.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            PixelFormat::RGB24 => {
                // the decoder converts YCbCr to RGB
                out_geometry.photometric_interpretation = PhotometricInterpretation::Rgb;
            }
            other => snafu::whatever!("Unsupported JPEG pixel format {:?}", other),
        }

        ensure_whatever!(
            decoded.len() == out_geometry.frame_len(),
            "JPEG frame decoded into {} bytes, expected {}",
            decoded.len(),
            out_geometry.frame_len()
        );
        Ok(DecodedFrame::new(out_geometry, decoded))
    }
}
