//! Support for RLE Lossless image decoding.
//!
//! See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>
use crate::attribute::{ImageGeometry, PlanarConfiguration};
use crate::error::DecodeResult;
use crate::frame::DecodedFrame;
use crate::registry::FrameDecoder;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure_whatever, OptionExt};

/// The size of the RLE header: the number of segments and 15 offsets.
const RLE_HEADER_LEN: usize = 64;

/// Frame decoder for the RLE Lossless transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RleLosslessAdapter;

impl FrameDecoder for RleLosslessAdapter {
    /// Decode one RLE Lossless frame.
    ///
    /// RLE encoded data is ordered like this (for 16-bit, 3 sample):
    ///  Segment: 0     | 1     | 2     | 3     | 4     | 5
    ///           R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
    /// A segment contains only the MSB or LSB parts of all the sample pixels.
    /// The output is rearranged to interleaved little endian samples:
    ///    LSB R MSB R LSB G MSB G LSB B MSB B | ...
    fn decode(&self, fragment: &[u8], geometry: &ImageGeometry) -> DecodeResult<DecodedFrame> {
        let bytes_per_sample = geometry.bytes_per_sample();
        let samples_per_pixel = geometry.samples_per_pixel as usize;
        let pixels = geometry.pixels_per_frame();
        let mut dst = vec![0; geometry.frame_len()];

        let mut offsets = read_rle_header(fragment)?;
        let expected_segments = samples_per_pixel * bytes_per_sample;
        ensure_whatever!(
            offsets.len() == expected_segments,
            "RLE frame has {} segments, expected {}",
            offsets.len(),
            expected_segments
        );
        offsets.push(fragment.len() as u32);

        for sample_number in 0..samples_per_pixel {
            for byte_offset in 0..bytes_per_sample {
                // segments go from the most significant byte to the least
                let ii = sample_number * bytes_per_sample + byte_offset;
                let (start, end) = (offsets[ii] as usize, offsets[ii + 1] as usize);
                ensure_whatever!(
                    start <= end && end <= fragment.len(),
                    "RLE segment #{} has invalid bounds {}..{}",
                    ii,
                    start,
                    end
                );
                let decoded_segment = unpack_segment(&fragment[start..end], pixels)?;
                ensure_whatever!(
                    decoded_segment.len() == pixels,
                    "RLE segment #{} decoded into {} bytes, expected {}",
                    ii,
                    decoded_segment.len(),
                    pixels
                );

                // little endian: the first segment of a sample goes last
                let start =
                    sample_number * bytes_per_sample + (bytes_per_sample - 1 - byte_offset);
                for (decoded_index, dst_index) in (start..dst.len())
                    .step_by(bytes_per_sample * samples_per_pixel)
                    .enumerate()
                {
                    dst[dst_index] = decoded_segment[decoded_index];
                }
            }
        }

        let mut out_geometry = geometry.clone();
        out_geometry.planar_configuration = PlanarConfiguration::Standard;
        Ok(DecodedFrame::new(out_geometry, dst))
    }
}

/// Read the RLE header and return the segment offsets.
fn read_rle_header(fragment: &[u8]) -> DecodeResult<Vec<u32>> {
    let header = fragment
        .get(..RLE_HEADER_LEN)
        .whatever_context("RLE frame is shorter than its header")?;
    let nr_segments = LittleEndian::read_u32(&header[0..4]) as usize;
    ensure_whatever!(
        (1..=15).contains(&nr_segments),
        "Invalid number of RLE segments: {}",
        nr_segments
    );
    let mut offsets = vec![0; nr_segments];
    LittleEndian::read_u32_into(&header[4..4 * (nr_segments + 1)], &mut offsets);
    Ok(offsets)
}

/// Expand one PackBits segment into `len` bytes.
///
/// A header byte `n` in `0..=127` is followed by `n + 1` literal bytes,
/// `n` in `-127..=-1` by one byte repeated `1 - n` times,
/// and `-128` is skipped.
/// Output beyond `len` is discarded, as is trailing padding.
fn unpack_segment(segment: &[u8], len: usize) -> DecodeResult<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    let mut rest = segment;
    while out.len() < len {
        let Some((&header, tail)) = rest.split_first() else {
            break;
        };
        rest = tail;
        match header as i8 {
            -128 => {}
            n if n < 0 => {
                let (&value, tail) = rest
                    .split_first()
                    .whatever_context("RLE replicate run is cut short")?;
                rest = tail;
                out.resize(out.len() + (1 - n as isize) as usize, value);
            }
            n => {
                let count = n as usize + 1;
                let literal = rest
                    .get(..count)
                    .whatever_context("RLE literal run is cut short")?;
                out.extend_from_slice(literal);
                rest = &rest[count..];
            }
        }
    }
    out.truncate(len);
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::attribute::{PhotometricInterpretation, PixelRepresentation};

    /// Encode one segment with literal runs and replicate runs.
    fn pack_bits(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let run = data[i..].iter().take(128).take_while(|&&b| b == data[i]).count();
            if run >= 2 {
                out.push((1 - run as isize) as i8 as u8);
                out.push(data[i]);
                i += run;
            } else {
                let mut end = i + 1;
                while end < data.len()
                    && end - i < 128
                    && (end + 1 >= data.len() || data[end] != data[end + 1])
                {
                    end += 1;
                }
                out.push((end - i - 1) as u8);
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
        }
        out
    }

    /// Build an RLE Lossless frame from its byte segments.
    pub(crate) fn rle_frame(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut header = vec![0u8; RLE_HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], segments.len() as u32);
        let mut body = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let offset = (RLE_HEADER_LEN + body.len()) as u32;
            LittleEndian::write_u32(&mut header[4 + 4 * i..8 + 4 * i], offset);
            body.extend(pack_bits(segment));
            if body.len() % 2 == 1 {
                body.push(0x80);
            }
        }
        header.extend(body);
        header
    }

    fn geometry(rows: u16, columns: u16, bits_allocated: u16) -> ImageGeometry {
        ImageGeometry {
            rows,
            columns,
            samples_per_pixel: 1,
            bits_allocated,
            bits_stored: bits_allocated,
            pixel_representation: PixelRepresentation::Unsigned,
            planar_configuration: PlanarConfiguration::Standard,
            photometric_interpretation: PhotometricInterpretation::Monochrome2,
            number_of_frames: 1,
        }
    }

    #[test]
    fn unpack_literal_and_replicate_runs() {
        // 3 x 0x11, literal [1, 2], no-op, 2 x 0x22
        let segment = [0xFE, 0x11, 0x01, 0x01, 0x02, 0x80, 0xFF, 0x22];
        let decoded = unpack_segment(&segment, 7).unwrap();
        assert_eq!(decoded, vec![0x11, 0x11, 0x11, 0x01, 0x02, 0x22, 0x22]);
        // padding and excess output are dropped
        assert_eq!(unpack_segment(&segment, 4).unwrap(), vec![0x11, 0x11, 0x11, 0x01]);
    }

    #[test]
    fn unpack_cut_short() {
        assert!(unpack_segment(&[0x03, 0x01, 0x02], 4).is_err());
        assert!(unpack_segment(&[0xFD], 4).is_err());
        // running out of input early leaves a short segment
        assert_eq!(unpack_segment(&[0x00, 0x07], 4).unwrap(), vec![0x07]);
    }

    #[test]
    fn pack_bits_round_trip() {
        let data = [1, 1, 1, 2, 3, 4, 4, 5, 9, 9, 9, 9, 9, 9, 0];
        let encoded = pack_bits(&data);
        assert_eq!(unpack_segment(&encoded, data.len()).unwrap(), data);
    }

    #[test]
    fn decode_8_bit_runs() {
        let (rows, columns) = (6, 10);
        // runs of varying length, with literal stretches in between
        let image: Vec<u8> = (0..rows * columns)
            .map(|i| match i % 17 {
                0..=7 => 200,
                8..=10 => (i % 251) as u8,
                _ => 17,
            })
            .collect();
        let frame = rle_frame(&[image.clone()]);
        let decoded = RleLosslessAdapter
            .decode(&frame, &geometry(rows as u16, columns as u16, 8))
            .unwrap();
        assert_eq!(decoded.data, image);
    }

    #[test]
    fn decode_16_bit_segments() {
        let samples: [u16; 4] = [0x0102, 0x0102, 0xFF00, 0x0A0B];
        let msb: Vec<u8> = samples.iter().map(|s| (s >> 8) as u8).collect();
        let lsb: Vec<u8> = samples.iter().map(|s| *s as u8).collect();
        let frame = rle_frame(&[msb, lsb]);
        let decoded = RleLosslessAdapter.decode(&frame, &geometry(2, 2, 16)).unwrap();
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(decoded.data, expected);
    }

    #[test]
    fn wrong_number_of_segments() {
        let frame = rle_frame(&[vec![0; 4], vec![0; 4]]);
        let err = RleLosslessAdapter.decode(&frame, &geometry(2, 2, 8)).unwrap_err();
        assert_eq!(err.kind(), crate::DecodeErrorKind::Codec);
    }
}
