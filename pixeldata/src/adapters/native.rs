//! Decoder for native (uncompressed) pixel data.

use crate::attribute::{ImageGeometry, PlanarConfiguration};
use crate::error::{DecodeResult, ShortPixelDataSnafu};
use crate::frame::DecodedFrame;
use crate::registry::FrameDecoder;
use snafu::ensure;

/// Frame decoder for the native transfer syntaxes.
///
/// Samples are expected in little endian order,
/// which is how native frames are extracted from a data set
/// regardless of the byte order of the transfer syntax.
/// Planar (color-by-plane) frames are re-interleaved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeAdapter;

impl FrameDecoder for NativeAdapter {
    fn decode(&self, data: &[u8], geometry: &ImageGeometry) -> DecodeResult<DecodedFrame> {
        let frame_len = geometry.frame_len();
        ensure!(
            data.len() >= frame_len,
            ShortPixelDataSnafu {
                frame: 0_u32,
                needed: frame_len,
                available: data.len(),
            }
        );
        let data = &data[..frame_len];

        let mut out_geometry = geometry.clone();
        out_geometry.planar_configuration = PlanarConfiguration::Standard;

        let out = match geometry.planar_configuration {
            PlanarConfiguration::Standard => data.to_vec(),
            PlanarConfiguration::PixelFirst => interleave_planes(
                data,
                geometry.samples_per_pixel as usize,
                geometry.bytes_per_sample(),
            ),
        };
        Ok(DecodedFrame::new(out_geometry, out))
    }
}

/// Turn `R1 R2 ... G1 G2 ... B1 B2 ...` into `R1 G1 B1 R2 G2 B2 ...`.
pub(crate) fn interleave_planes(
    data: &[u8],
    samples_per_pixel: usize,
    bytes_per_sample: usize,
) -> Vec<u8> {
    let plane_len = data.len() / samples_per_pixel;
    let mut out = vec![0; data.len()];
    for (sample, plane) in data.chunks_exact(plane_len).enumerate() {
        for (pixel, value) in plane.chunks_exact(bytes_per_sample).enumerate() {
            let at = (pixel * samples_per_pixel + sample) * bytes_per_sample;
            out[at..at + bytes_per_sample].copy_from_slice(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{PhotometricInterpretation, PixelRepresentation};

    fn rgb_geometry(planar_configuration: PlanarConfiguration) -> ImageGeometry {
        ImageGeometry {
            rows: 1,
            columns: 2,
            samples_per_pixel: 3,
            bits_allocated: 8,
            bits_stored: 8,
            pixel_representation: PixelRepresentation::Unsigned,
            planar_configuration,
            photometric_interpretation: PhotometricInterpretation::Rgb,
            number_of_frames: 1,
        }
    }

    #[test]
    fn planar_frames_are_interleaved() {
        let planar = [10, 11, 20, 21, 30, 31];
        let decoded = NativeAdapter
            .decode(&planar, &rgb_geometry(PlanarConfiguration::PixelFirst))
            .unwrap();
        assert_eq!(decoded.data, vec![10, 20, 30, 11, 21, 31]);
        assert_eq!(decoded.geometry.planar_configuration, PlanarConfiguration::Standard);
    }

    #[test]
    fn interleaved_frames_are_copied() {
        let pixels = [10, 20, 30, 11, 21, 31];
        let decoded = NativeAdapter
            .decode(&pixels, &rgb_geometry(PlanarConfiguration::Standard))
            .unwrap();
        assert_eq!(decoded.data, pixels.to_vec());
    }

    #[test]
    fn interleave_16_bit_planes() {
        let planar = [1, 0, 4, 0, 2, 0, 5, 0, 3, 0, 6, 0];
        assert_eq!(
            interleave_planes(&planar, 3, 2),
            vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0]
        );
    }

    #[test]
    fn short_frame() {
        let err = NativeAdapter
            .decode(&[1, 2, 3], &rgb_geometry(PlanarConfiguration::Standard))
            .unwrap_err();
        assert_eq!(err.kind(), crate::DecodeErrorKind::Codec);
    }
}
