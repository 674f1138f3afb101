//! Locating the bytes of a single frame in a data set,
//! and the decoded frame type.

use crate::attribute::ImageGeometry;
use crate::error::{
    DecodeResult, FragmentOutOfBoundsSnafu, MissingPixelDataSnafu, NonNumericPixelDataSnafu,
    ShortPixelDataSnafu,
};
use dicomview_core::dataset::DataSet;
use dicomview_core::tags;
use dicomview_core::value::{Fragment, PixelFragments, PrimitiveValue, Value};
use dicomview_core::Endianness;
use snafu::{ensure, OptionExt};
use std::borrow::Cow;

/// A decoded frame in the canonical layout:
/// row-major, sample-interleaved,
/// with little endian samples of _Bits Allocated_ width.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// The geometry of the decoded samples.
    ///
    /// Its photometric interpretation describes the decoded samples,
    /// which may differ from the one declared in the data set
    /// when the codec converts colour spaces.
    pub geometry: ImageGeometry,
    /// the sample bytes
    pub data: Vec<u8>,
}

impl DecodedFrame {
    /// Wrap decoded samples.
    pub fn new(geometry: ImageGeometry, data: Vec<u8>) -> Self {
        DecodedFrame { geometry, data }
    }

    /// The number of columns.
    pub fn width(&self) -> u32 {
        u32::from(self.geometry.columns)
    }

    /// The number of rows.
    pub fn height(&self) -> u32 {
        u32::from(self.geometry.rows)
    }

    /// Read sample `i` of the buffer as an unsigned integer.
    pub(crate) fn sample(&self, i: usize) -> u32 {
        let bytes_per_sample = self.geometry.bytes_per_sample();
        let at = i * bytes_per_sample;
        match bytes_per_sample {
            1 => u32::from(self.data[at]),
            2 => u32::from(u16::from_le_bytes([self.data[at], self.data[at + 1]])),
            _ => u32::from_le_bytes([
                self.data[at],
                self.data[at + 1],
                self.data[at + 2],
                self.data[at + 3],
            ]),
        }
    }

    /// The number of samples in the buffer.
    pub fn sample_count(&self) -> usize {
        self.data.len() / self.geometry.bytes_per_sample()
    }
}

/// Fetch the little endian bytes of the given frame
/// from native pixel data encoded with the given byte order.
pub(crate) fn native_frame<'a>(
    set: &'a DataSet,
    geometry: &ImageGeometry,
    frame: u32,
    byte_order: Endianness,
) -> DecodeResult<Cow<'a, [u8]>> {
    let value = set
        .get(tags::PIXEL_DATA)
        .and_then(|e| e.value().primitive())
        .context(MissingPixelDataSnafu)?;
    let bytes = samples_to_le_bytes(value, geometry.bytes_per_sample(), byte_order)?;
    let frame_len = geometry.frame_len();
    let start = frame as usize * frame_len;
    let end = start + frame_len;
    ensure!(
        end <= bytes.len(),
        ShortPixelDataSnafu {
            frame,
            needed: end,
            available: bytes.len(),
        }
    );
    Ok(match bytes {
        Cow::Borrowed(b) => Cow::Borrowed(&b[start..end]),
        Cow::Owned(b) => Cow::Owned(b[start..end].to_vec()),
    })
}

/// Lay out native pixel data as little endian samples
/// of `bytes_per_sample` bytes each.
///
/// The value type follows the VR (OB bytes, OW words),
/// which may be narrower or wider than a sample.
/// With a big endian stream, such values are first turned back
/// into the encoded byte sequence, whose samples are then byte swapped.
fn samples_to_le_bytes(
    value: &PrimitiveValue,
    bytes_per_sample: usize,
    byte_order: Endianness,
) -> DecodeResult<Cow<'_, [u8]>> {
    let swap_samples = |mut bytes: Vec<u8>| {
        bytes
            .chunks_exact_mut(bytes_per_sample)
            .for_each(|sample| sample.reverse());
        Cow::Owned(bytes)
    };
    macro_rules! samples {
        ($c: expr, $width: expr) => {
            if byte_order == Endianness::Little || $width == bytes_per_sample {
                Cow::Owned($c.iter().flat_map(|v| v.to_le_bytes()).collect())
            } else {
                swap_samples($c.iter().flat_map(|v| v.to_be_bytes()).collect())
            }
        };
    }
    Ok(match value {
        PrimitiveValue::Empty => Cow::Borrowed(&[]),
        PrimitiveValue::U8(c) if byte_order == Endianness::Little || bytes_per_sample == 1 => {
            Cow::Borrowed(&c[..])
        }
        PrimitiveValue::U8(c) => swap_samples(c.to_vec()),
        PrimitiveValue::U16(c) => samples!(c, 2),
        PrimitiveValue::I16(c) => samples!(c, 2),
        PrimitiveValue::U32(c) => samples!(c, 4),
        PrimitiveValue::I32(c) => samples!(c, 4),
        PrimitiveValue::F32(c) => samples!(c, 4),
        PrimitiveValue::U64(c) => samples!(c, 8),
        PrimitiveValue::I64(c) => samples!(c, 8),
        PrimitiveValue::F64(c) => samples!(c, 8),
        PrimitiveValue::Strs(_) | PrimitiveValue::Str(_) | PrimitiveValue::Tags(_) => {
            return NonNumericPixelDataSnafu.fail();
        }
    })
}

/// Gather the bytes of the given frame from encapsulated pixel data,
/// reading the fragments from the source stream.
///
/// A single-frame image takes all fragments.
/// Otherwise the basic offset table is used when present,
/// or else each fragment is taken as one frame.
pub(crate) fn encapsulated_frame<'a>(
    fragments: &PixelFragments,
    source: &'a [u8],
    frame: u32,
    number_of_frames: u32,
) -> DecodeResult<Cow<'a, [u8]>> {
    let selected = select_fragments(fragments, frame, number_of_frames)?;
    let read = move |f: &Fragment| source.get(f.range()).context(FragmentOutOfBoundsSnafu);
    if let [single] = selected[..] {
        return read(&single).map(Cow::Borrowed);
    }
    let mut out = Vec::with_capacity(selected.iter().map(|f| f.length as usize).sum());
    for fragment in &selected {
        out.extend_from_slice(read(fragment)?);
    }
    Ok(Cow::Owned(out))
}

fn select_fragments(
    pixel: &PixelFragments,
    frame: u32,
    number_of_frames: u32,
) -> DecodeResult<Vec<Fragment>> {
    let fragments = &pixel.fragments;
    if fragments.is_empty() {
        snafu::whatever!("Encapsulated pixel data has no fragments");
    }
    if number_of_frames == 1 {
        return Ok(fragments.clone());
    }

    if !pixel.offset_table.is_empty() {
        // offsets are relative to the first byte of the first fragment's item
        let first = fragments[0].offset;
        let frame = frame as usize;
        let Some(&start) = pixel.offset_table.get(frame) else {
            snafu::whatever!("Basic offset table has no entry for frame #{}", frame);
        };
        let end = pixel.offset_table.get(frame + 1).copied();
        let selected: Vec<Fragment> = fragments
            .iter()
            .filter(|f| {
                let relative = f.offset - first;
                relative >= u64::from(start) && end.map_or(true, |end| relative < u64::from(end))
            })
            .copied()
            .collect();
        if selected.is_empty() {
            snafu::whatever!("No fragments at offset {} for frame #{}", start, frame);
        }
        return Ok(selected);
    }

    if fragments.len() == number_of_frames as usize {
        return Ok(vec![fragments[frame as usize]]);
    }
    snafu::whatever!(
        "Cannot map {} fragments to {} frames without a basic offset table",
        fragments.len(),
        number_of_frames
    )
}

/// Whether the data set holds encapsulated pixel data.
pub(crate) fn pixel_fragments(set: &DataSet) -> Option<&PixelFragments> {
    match set.get(tags::PIXEL_DATA)?.value() {
        Value::PixelSequence(fragments) => Some(fragments),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(lengths: &[u32], offset_table: Vec<u32>) -> (PixelFragments, Vec<u8>) {
        // fake stream: the value of each fragment is preceded by an 8-byte item header
        let mut source = vec![0u8; 16];
        let mut out = PixelFragments {
            offset_table: offset_table.into(),
            fragments: Vec::new(),
        };
        for (i, &length) in lengths.iter().enumerate() {
            source.extend_from_slice(&[0; 8]);
            out.fragments.push(Fragment {
                offset: source.len() as u64,
                length,
            });
            source.extend(std::iter::repeat(i as u8 + 1).take(length as usize));
        }
        (out, source)
    }

    fn words(values: &[u16]) -> PrimitiveValue {
        PrimitiveValue::U16(values.iter().copied().collect())
    }

    #[test]
    fn big_endian_words_into_32_bit_samples() {
        // sample 0x0102_0304 encoded big endian, read back as OW words
        let value = words(&[0x0102, 0x0304]);
        let bytes = samples_to_le_bytes(&value, 4, Endianness::Big).unwrap();
        assert_eq!(&bytes[..], &[0x04, 0x03, 0x02, 0x01]);
        // little endian streams keep the word order
        let value = words(&[0x0304, 0x0102]);
        let bytes = samples_to_le_bytes(&value, 4, Endianness::Little).unwrap();
        assert_eq!(&bytes[..], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn samples_matching_the_value_width() {
        let value = words(&[0x0102]);
        let bytes = samples_to_le_bytes(&value, 2, Endianness::Big).unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x01]);
        let value = PrimitiveValue::U8([0x01, 0x02, 0x03, 0x04].into_iter().collect());
        let bytes = samples_to_le_bytes(&value, 2, Endianness::Big).unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn text_is_not_pixel_data() {
        let err = samples_to_le_bytes(&PrimitiveValue::from("abc"), 1, Endianness::Little)
            .unwrap_err();
        assert_eq!(err.kind(), crate::DecodeErrorKind::Codec);
    }

    #[test]
    fn single_frame_takes_all_fragments() {
        let (pixel, source) = fragments(&[2, 4], vec![]);
        let data = encapsulated_frame(&pixel, &source, 0, 1).unwrap();
        assert_eq!(&data[..], &[1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn frames_from_offset_table() {
        // frame 0: fragments 0 and 1; frame 1: fragment 2
        let (pixel, source) = fragments(&[2, 2, 4], vec![0, 20]);
        let first = encapsulated_frame(&pixel, &source, 0, 2).unwrap();
        assert_eq!(&first[..], &[1, 1, 2, 2]);
        let second = encapsulated_frame(&pixel, &source, 1, 2).unwrap();
        assert_eq!(&second[..], &[3, 3, 3, 3]);
    }

    #[test]
    fn one_fragment_per_frame() {
        let (pixel, source) = fragments(&[2, 2, 2], vec![]);
        let data = encapsulated_frame(&pixel, &source, 2, 3).unwrap();
        assert_eq!(&data[..], &[3, 3]);
    }

    #[test]
    fn ambiguous_fragments() {
        let (pixel, source) = fragments(&[2, 2, 2], vec![]);
        let err = encapsulated_frame(&pixel, &source, 0, 2).unwrap_err();
        assert_eq!(err.kind(), crate::DecodeErrorKind::Codec);
    }
}
