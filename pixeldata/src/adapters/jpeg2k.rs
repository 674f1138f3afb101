//! Support for JPEG 2000 image decoding.
//!
//! Entropy decoding is left to an external codec
//! behind the [`Jpeg2000Codec`] boundary.
//! An implementation based on the `jpeg2k` crate
//! is available with the `jpeg2k` feature.

use crate::attribute::{ImageGeometry, PhotometricInterpretation, PlanarConfiguration};
use crate::error::DecodeResult;
use crate::frame::DecodedFrame;
use crate::registry::FrameDecoder;
use snafu::ensure_whatever;
use std::fmt;

/// An external JPEG 2000 decoding capability.
pub trait Jpeg2000Codec: Send + Sync + fmt::Debug {
    /// Decode a JPEG 2000 code stream into samples in the canonical layout:
    /// row-major, sample-interleaved,
    /// with little endian samples of _Bits Allocated_ width.
    fn decode_jpeg2000(
        &self,
        compressed: &[u8],
        expected: &ImageGeometry,
    ) -> DecodeResult<Vec<u8>>;
}

/// Frame decoder for transfer syntaxes based on JPEG 2000.
#[derive(Debug)]
pub struct Jpeg2000Adapter<C> {
    codec: C,
}

impl<C> Jpeg2000Adapter<C> {
    /// Wrap an external codec.
    pub fn new(codec: C) -> Self {
        Jpeg2000Adapter { codec }
    }
}

impl<C: Jpeg2000Codec> FrameDecoder for Jpeg2000Adapter<C> {
    fn decode(&self, data: &[u8], geometry: &ImageGeometry) -> DecodeResult<DecodedFrame> {
        let samples = self.codec.decode_jpeg2000(data, geometry)?;
        ensure_whatever!(
            samples.len() == geometry.frame_len(),
            "JPEG 2000 frame decoded into {} bytes, expected {}",
            samples.len(),
            geometry.frame_len()
        );
        let mut out_geometry = geometry.clone();
        out_geometry.planar_configuration = PlanarConfiguration::Standard;
        // the multiple component transform is reversed by the codec
        if matches!(
            geometry.photometric_interpretation,
            PhotometricInterpretation::YbrIct | PhotometricInterpretation::YbrRct
        ) {
            out_geometry.photometric_interpretation = PhotometricInterpretation::Rgb;
        }
        Ok(DecodedFrame::new(out_geometry, samples))
    }
}

#[cfg(feature = "jpeg2k")]
pub use self::openjpeg::OpenJpeg2000;

#[cfg(feature = "jpeg2k")]
mod openjpeg {
    use super::Jpeg2000Codec;
    use crate::attribute::ImageGeometry;
    use crate::error::DecodeResult;
    use jpeg2k::Image;
    use snafu::ResultExt;
    use tracing::warn;

    /// JPEG 2000 codec backed by the Rust port of OpenJPEG.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct OpenJpeg2000;

    impl Jpeg2000Codec for OpenJpeg2000 {
        fn decode_jpeg2000(
            &self,
            compressed: &[u8],
            expected: &ImageGeometry,
        ) -> DecodeResult<Vec<u8>> {
            let samples_per_pixel = expected.samples_per_pixel as usize;
            let bytes_per_sample = expected.bytes_per_sample();
            let mut dst = vec![0; expected.frame_len()];

            let image = Image::from_bytes(compressed).whatever_context("jpeg2k decoder failure")?;

            // `get_pixels` would narrow the data down to 8 bits per sample
            for (component_i, component) in image.components().iter().enumerate() {
                if component_i >= samples_per_pixel {
                    warn!(
                        "JPEG 2000 image has more components than expected ({} > {})",
                        component_i + 1,
                        samples_per_pixel
                    );
                    break;
                }

                for (i, sample) in component.data().iter().enumerate() {
                    let offset = (i * samples_per_pixel + component_i) * bytes_per_sample;
                    let Some(out) = dst.get_mut(offset..offset + bytes_per_sample) else {
                        break;
                    };
                    out.copy_from_slice(&sample.to_le_bytes()[..bytes_per_sample]);
                }
            }
            Ok(dst)
        }
    }
}
