//! Low level decoding of element headers and primitive values
//! from an in-memory byte stream.

use crate::error::{
    InvalidValueLengthSnafu, ReadHeaderSnafu, Result, TruncatedValueSnafu, UnexpectedItemTagSnafu,
};
use crate::text::SpecificCharacterSet;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dicomview_core::dictionary::StandardDataDictionary;
use dicomview_core::header::{DataElementHeader, Length, Tag, VR};
use dicomview_core::transfer_syntax::TransferSyntax;
use dicomview_core::value::{PrimitiveValue, C};
use snafu::{ensure, OptionExt, ResultExt};
use tracing::warn;

/// The encoding rules in effect for a portion of the stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mode {
    /// byte order of numbers
    pub endianness: Endianness,
    /// whether headers carry the value representation
    pub explicit_vr: bool,
}

impl Mode {
    /// Explicit VR Little Endian, used by the file meta group.
    pub const EXPLICIT_LE: Mode = Mode {
        endianness: Endianness::Little,
        explicit_vr: true,
    };

    /// Implicit VR Little Endian, used in the content of
    /// sequences of unknown VR.
    pub const IMPLICIT_LE: Mode = Mode {
        endianness: Endianness::Little,
        explicit_vr: false,
    };

    /// The mode of the main data set under the given transfer syntax.
    pub fn of(ts: &TransferSyntax) -> Self {
        Mode {
            endianness: ts.endianness(),
            explicit_vr: ts.is_explicit_vr(),
        }
    }

    /// Read a 16-bit unsigned integer from the start of `buf`.
    pub fn u16(self, buf: &[u8]) -> u16 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        }
    }

    /// Read a 32-bit unsigned integer from the start of `buf`.
    pub fn u32(self, buf: &[u8]) -> u32 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        }
    }
}

/// A position-aware view over the full stream being parsed.
///
/// Positions are absolute offsets from the start of the stream,
/// so that they can be kept as fragment references.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Source<'a> {
    /// Start reading the given stream at the given position.
    pub fn new(bytes: &'a [u8], position: usize) -> Self {
        Source { bytes, position }
    }

    /// The current absolute position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The total length of the stream.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the end of the stream was reached.
    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    /// The number of bytes left until the end of the stream.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    fn take_header_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let position = self.position;
        let out = self
            .bytes
            .get(position..position + n)
            .context(ReadHeaderSnafu { position })?;
        self.position += n;
        Ok(out)
    }

    /// Take the next `len` bytes of a value.
    ///
    /// Fails with a truncated value error if the stream ends before.
    pub fn take_value(&mut self, tag: Tag, len: u32) -> Result<&'a [u8]> {
        let position = self.position;
        let end = position + len as usize;
        ensure!(
            end <= self.bytes.len(),
            TruncatedValueSnafu {
                tag,
                len,
                position,
                available: self.remaining(),
            }
        );
        self.position = end;
        Ok(&self.bytes[position..end])
    }

    /// Skip `n` bytes, which must be available.
    pub fn skip(&mut self, n: usize) {
        self.position = (self.position + n).min(self.bytes.len());
    }

    /// Look at the next tag without consuming it.
    pub fn peek_tag(&self, mode: Mode) -> Option<Tag> {
        let buf = self.bytes.get(self.position..self.position + 4)?;
        Some(Tag(mode.u16(&buf[0..2]), mode.u16(&buf[2..4])))
    }

    /// Decode the next data element header.
    ///
    /// Item and delimitation headers have no VR in either mode,
    /// and are reported with VR `UN`.
    pub fn decode_header(&mut self, mode: Mode) -> Result<DataElementHeader> {
        let buf = self.take_header_bytes(4)?;
        let tag = Tag(mode.u16(&buf[0..2]), mode.u16(&buf[2..4]));

        if tag.group() == 0xFFFE {
            let len = mode.u32(self.take_header_bytes(4)?);
            return Ok(DataElementHeader::new(tag, VR::UN, Length(len)));
        }

        if !mode.explicit_vr {
            let len = mode.u32(self.take_header_bytes(4)?);
            let vr = StandardDataDictionary.vr_of(tag);
            return Ok(DataElementHeader::new(tag, vr, Length(len)));
        }

        let vr_bytes = self.take_header_bytes(2)?;
        let vr = match VR::from_binary([vr_bytes[0], vr_bytes[1]]) {
            Some(vr) => vr,
            None => {
                warn!(
                    "Unknown VR {:?} in element {}, reading as UN",
                    String::from_utf8_lossy(vr_bytes),
                    tag
                );
                VR::UN
            }
        };
        let len = if vr.has_short_length() {
            u32::from(mode.u16(self.take_header_bytes(2)?))
        } else {
            // 2 reserved bytes, then a 32-bit length
            let buf = self.take_header_bytes(6)?;
            mode.u32(&buf[2..6])
        };
        Ok(DataElementHeader::new(tag, vr, Length(len)))
    }

    /// Decode the next item header inside a sequence,
    /// which must be an item or a sequence delimiter.
    pub fn decode_item_header(&mut self, mode: Mode) -> Result<DataElementHeader> {
        let position = self.position;
        let buf = self.take_header_bytes(8)?;
        let tag = Tag(mode.u16(&buf[0..2]), mode.u16(&buf[2..4]));
        let len = mode.u32(&buf[4..8]);
        let header = DataElementHeader::new(tag, VR::UN, Length(len));
        ensure!(
            header.is_item() || header.is_sequence_delimiter(),
            UnexpectedItemTagSnafu { tag, position }
        );
        Ok(header)
    }
}

/// Decode a primitive value of the given VR from its bytes.
///
/// Textual values are split on the backslash delimiter
/// (unless the VR is single valued) and stripped of trailing padding.
pub fn decode_value(
    header: &DataElementHeader,
    bytes: &[u8],
    mode: Mode,
    charset: SpecificCharacterSet,
) -> Result<PrimitiveValue> {
    use crate::error::DecodeTextSnafu;

    let tag = header.tag;
    let vr = header.vr;
    if bytes.is_empty() {
        return Ok(PrimitiveValue::Empty);
    }

    if vr.is_textual() {
        let text = charset
            .decode_for(vr, bytes)
            .context(DecodeTextSnafu { tag })?;
        let trim = |s: &str| {
            s.trim_end_matches(|c: char| c == ' ' || c == '\0')
                .to_string()
        };
        if vr.is_single_text() {
            return Ok(PrimitiveValue::Str(trim(&text)));
        }
        let values: C<String> = text.split('\\').map(trim).collect();
        return Ok(PrimitiveValue::Strs(values));
    }

    let value = match vr {
        VR::AT => {
            check_width(header, bytes.len(), 4)?;
            PrimitiveValue::Tags(
                bytes
                    .chunks_exact(4)
                    .map(|c| Tag(mode.u16(&c[0..2]), mode.u16(&c[2..4])))
                    .collect(),
            )
        }
        VR::US | VR::OW => {
            check_width(header, bytes.len(), 2)?;
            PrimitiveValue::U16(bytes.chunks_exact(2).map(|c| mode.u16(c)).collect())
        }
        VR::SS => {
            check_width(header, bytes.len(), 2)?;
            PrimitiveValue::I16(
                bytes
                    .chunks_exact(2)
                    .map(|c| mode.u16(c) as i16)
                    .collect(),
            )
        }
        VR::UL | VR::OL => {
            check_width(header, bytes.len(), 4)?;
            PrimitiveValue::U32(bytes.chunks_exact(4).map(|c| mode.u32(c)).collect())
        }
        VR::SL => {
            check_width(header, bytes.len(), 4)?;
            PrimitiveValue::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| mode.u32(c) as i32)
                    .collect(),
            )
        }
        VR::FL | VR::OF => {
            check_width(header, bytes.len(), 4)?;
            PrimitiveValue::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(mode.u32(c)))
                    .collect(),
            )
        }
        VR::FD | VR::OD => {
            check_width(header, bytes.len(), 8)?;
            PrimitiveValue::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_bits(read_u64(mode, c)))
                    .collect(),
            )
        }
        VR::SV => {
            check_width(header, bytes.len(), 8)?;
            PrimitiveValue::I64(
                bytes
                    .chunks_exact(8)
                    .map(|c| read_u64(mode, c) as i64)
                    .collect(),
            )
        }
        VR::UV | VR::OV => {
            check_width(header, bytes.len(), 8)?;
            PrimitiveValue::U64(bytes.chunks_exact(8).map(|c| read_u64(mode, c)).collect())
        }
        // OB, UN and anything else kept as bytes
        _ => PrimitiveValue::U8(C::from_slice(bytes)),
    };
    Ok(value)
}

fn read_u64(mode: Mode, buf: &[u8]) -> u64 {
    match mode.endianness {
        Endianness::Little => LittleEndian::read_u64(buf),
        Endianness::Big => BigEndian::read_u64(buf),
    }
}

fn check_width(header: &DataElementHeader, len: usize, width: usize) -> Result<()> {
    ensure!(
        len % width == 0,
        InvalidValueLengthSnafu {
            tag: header.tag,
            vr: header.vr,
            len: len as u32,
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    const BE: Mode = Mode {
        endianness: Endianness::Big,
        explicit_vr: true,
    };

    #[test]
    fn explicit_le_short_and_long_headers() {
        #[rustfmt::skip]
        let bytes: &[u8] = &[
            // (0010,0010) PN, len 8
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00,
            // (7FE0,0010) OB, reserved, len 4
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
        ];
        let mut source = Source::new(bytes, 0);
        let header = source.decode_header(Mode::EXPLICIT_LE).unwrap();
        assert_eq!(header.tag, Tag(0x0010, 0x0010));
        assert_eq!(header.vr, VR::PN);
        assert_eq!(header.len, Length(8));
        assert_eq!(source.position(), 8);

        let header = source.decode_header(Mode::EXPLICIT_LE).unwrap();
        assert_eq!(header.tag, Tag(0x7FE0, 0x0010));
        assert_eq!(header.vr, VR::OB);
        assert_eq!(header.len, Length(4));
        assert_eq!(source.position(), 20);
    }

    #[test]
    fn implicit_le_header_uses_dictionary() {
        let bytes: &[u8] = &[0x28, 0x00, 0x10, 0x00, 0x02, 0x00, 0x00, 0x00];
        let header = Source::new(bytes, 0)
            .decode_header(Mode::IMPLICIT_LE)
            .unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        assert_eq!(header.vr, VR::US);
        assert_eq!(header.len, Length(2));
    }

    #[test]
    fn explicit_be_header_and_value() {
        let bytes: &[u8] = &[0x00, 0x28, 0x00, 0x10, b'U', b'S', 0x00, 0x02, 0x02, 0x00];
        let mut source = Source::new(bytes, 0);
        let header = source.decode_header(BE).unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        let value_bytes = source.take_value(header.tag, 2).unwrap();
        let value = decode_value(&header, value_bytes, BE, SpecificCharacterSet::Default).unwrap();
        assert_eq!(value, PrimitiveValue::from(512_u16));
    }

    #[test]
    fn header_cut_short() {
        let bytes: &[u8] = &[0x10, 0x00, 0x10, 0x00, b'P'];
        let err = Source::new(bytes, 0)
            .decode_header(Mode::EXPLICIT_LE)
            .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MalformedStream);
    }

    #[test]
    fn value_past_end_of_stream() {
        let mut source = Source::new(&[1, 2, 3], 0);
        let err = source.take_value(Tag(0x0010, 0x0010), 8).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::TruncatedValue);
    }

    #[test]
    fn textual_values_are_split_and_trimmed() {
        let header = DataElementHeader::new(Tag(0x0008, 0x0008), VR::CS, Length(16));
        let value = decode_value(
            &header,
            b"ORIGINAL\\PRIMARY ",
            Mode::EXPLICIT_LE,
            SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(
            value,
            PrimitiveValue::Strs(smallvec::smallvec!["ORIGINAL".into(), "PRIMARY".into()])
        );

        let header = DataElementHeader::new(Tag(0x0020, 0x4000), VR::LT, Length(4));
        let value = decode_value(&header, b"a\\b ", Mode::EXPLICIT_LE, SpecificCharacterSet::Default)
            .unwrap();
        assert_eq!(value, PrimitiveValue::Str("a\\b".into()));
    }
}
