//! The data set writer, which encodes a data set into a DICOM Part 10 stream.

use crate::error::{
    EncodeTextSnafu, MissingFragmentDataSnafu, ValueTooLongSnafu, WriteError, WriteIoSnafu,
    WriteUnknownTransferSyntaxSnafu,
};
use crate::meta::{write_meta, IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use crate::text::SpecificCharacterSet;
use byteordered::Endianness;
use dicomview_core::dataset::{DataElement, DataSet, FileMeta};
use dicomview_core::header::{Tag, VR};
use dicomview_core::tags;
use dicomview_core::transfer_syntax::{self, TransferSyntax};
use dicomview_core::value::{PixelFragments, PrimitiveValue, Value};
use snafu::{ensure, OptionExt, ResultExt};
use std::io::Write;

type Result<T, E = WriteError> = std::result::Result<T, E>;

/// A writer of data sets into DICOM Part 10 streams.
///
/// Sequences and items are always written with undefined length.
/// Encapsulated pixel data needs the fragment contents,
/// given through [`with_fragments`](DataSetWriter::with_fragments),
/// since data sets only keep references to them.
#[derive(Debug, Clone)]
pub struct DataSetWriter {
    ts: &'static TransferSyntax,
    offset_table: Vec<u32>,
    fragments: Option<Vec<Vec<u8>>>,
}

impl DataSetWriter {
    /// Create a writer for the transfer syntax with the given UID.
    pub fn new(ts_uid: &str) -> Result<Self> {
        let ts = transfer_syntax::get(ts_uid).context(WriteUnknownTransferSyntaxSnafu { uid: ts_uid })?;
        Ok(DataSetWriter {
            ts,
            offset_table: Vec::new(),
            fragments: None,
        })
    }

    /// Provide the fragments of encapsulated pixel data.
    ///
    /// If the data set has no Pixel Data element,
    /// one is appended at the end.
    pub fn with_fragments(mut self, fragments: Vec<Vec<u8>>) -> Self {
        self.fragments = Some(fragments);
        self
    }

    /// Provide a basic offset table for the encapsulated pixel data.
    pub fn with_offset_table(mut self, offset_table: Vec<u32>) -> Self {
        self.offset_table = offset_table;
        self
    }

    /// Encode the data set into a new byte vector.
    pub fn write_to_vec(&self, set: &DataSet) -> Result<Vec<u8>> {
        let meta = self.meta_for(set);
        let mut out = Vec::with_capacity(1024);
        write_meta(&meta, &mut out)?;

        let charset = set
            .get(tags::SPECIFIC_CHARACTER_SET)
            .and_then(|e| e.to_str())
            .and_then(|code| SpecificCharacterSet::from_code(&code))
            .unwrap_or_default();
        let mut encoder = Encoder {
            endianness: self.ts.endianness(),
            explicit_vr: self.ts.is_explicit_vr(),
            charset,
            out,
        };
        let mut wrote_pixel_data = false;
        for element in set {
            if element.tag() == tags::PIXEL_DATA {
                wrote_pixel_data = true;
                if let Value::PixelSequence(_) = element.value() {
                    let fragments = self
                        .fragments
                        .as_ref()
                        .context(MissingFragmentDataSnafu { tag: element.tag() })?;
                    encoder.encapsulated(element.tag(), element.vr(), &self.offset_table, fragments);
                    continue;
                }
            }
            encoder.element(element)?;
        }
        if let (false, Some(fragments)) = (wrote_pixel_data, &self.fragments) {
            encoder.encapsulated(tags::PIXEL_DATA, VR::OB, &self.offset_table, fragments);
        }
        Ok(encoder.out)
    }

    /// Encode the data set into the given writer.
    pub fn write<W: Write>(&self, set: &DataSet, mut to: W) -> Result<()> {
        let bytes = self.write_to_vec(set)?;
        to.write_all(&bytes).context(WriteIoSnafu)
    }

    fn meta_for(&self, set: &DataSet) -> FileMeta {
        let original = set.meta();
        let pick = |from_meta: Option<&Option<String>>, tag: Tag| {
            from_meta
                .and_then(|v| v.clone())
                .or_else(|| set.string(tag).map(str::to_string))
        };
        FileMeta {
            transfer_syntax: self.ts.uid().to_string(),
            media_storage_sop_class_uid: pick(
                original.map(|m| &m.media_storage_sop_class_uid),
                tags::SOP_CLASS_UID,
            ),
            media_storage_sop_instance_uid: pick(
                original.map(|m| &m.media_storage_sop_instance_uid),
                tags::SOP_INSTANCE_UID,
            ),
            implementation_class_uid: Some(IMPLEMENTATION_CLASS_UID.to_string()),
            implementation_version_name: Some(IMPLEMENTATION_VERSION_NAME.to_string()),
        }
    }
}

struct Encoder {
    endianness: Endianness,
    explicit_vr: bool,
    charset: SpecificCharacterSet,
    out: Vec<u8>,
}

macro_rules! put_numbers {
    ($self: ident, $values: expr) => {
        for v in $values.iter() {
            match $self.endianness {
                Endianness::Little => $self.out.extend_from_slice(&v.to_le_bytes()),
                Endianness::Big => $self.out.extend_from_slice(&v.to_be_bytes()),
            }
        }
    };
}

impl Encoder {
    fn u16(&mut self, v: u16) {
        put_numbers!(self, [v]);
    }

    fn u32(&mut self, v: u32) {
        put_numbers!(self, [v]);
    }

    fn tag(&mut self, tag: Tag) {
        self.u16(tag.group());
        self.u16(tag.element());
    }

    fn header(&mut self, tag: Tag, vr: VR, len: u32) -> Result<()> {
        self.tag(tag);
        if self.explicit_vr {
            self.out.extend_from_slice(&vr.to_bytes());
            if vr.has_short_length() {
                ensure!(len <= u32::from(u16::MAX), ValueTooLongSnafu { tag });
                self.u16(len as u16);
            } else {
                self.out.extend_from_slice(&[0, 0]);
                self.u32(len);
            }
        } else {
            self.u32(len);
        }
        Ok(())
    }

    fn item_header(&mut self, tag: Tag, len: u32) {
        self.tag(tag);
        self.u32(len);
    }

    fn element(&mut self, element: &DataElement) -> Result<()> {
        match element.value() {
            Value::Primitive(value) => {
                let bytes = self.primitive(element.tag(), element.vr(), value)?;
                self.header(element.tag(), element.vr(), bytes.len() as u32)?;
                self.out.extend_from_slice(&bytes);
            }
            Value::Sequence(items) => {
                self.header(element.tag(), element.vr(), u32::MAX)?;
                for item in items {
                    self.item_header(dicomview_core::header::ITEM, u32::MAX);
                    for e in item {
                        self.element(e)?;
                    }
                    self.item_header(dicomview_core::header::ITEM_DELIMITER, 0);
                }
                self.item_header(dicomview_core::header::SEQUENCE_DELIMITER, 0);
            }
            Value::PixelSequence(PixelFragments { .. }) => {
                return MissingFragmentDataSnafu { tag: element.tag() }.fail();
            }
        }
        Ok(())
    }

    fn encapsulated(&mut self, tag: Tag, vr: VR, offset_table: &[u32], fragments: &[Vec<u8>]) {
        self.tag(tag);
        if self.explicit_vr {
            self.out.extend_from_slice(&vr.to_bytes());
            self.out.extend_from_slice(&[0, 0]);
        }
        self.u32(u32::MAX);
        self.item_header(dicomview_core::header::ITEM, (offset_table.len() * 4) as u32);
        for offset in offset_table {
            self.u32(*offset);
        }
        for fragment in fragments {
            let padded_len = fragment.len() + fragment.len() % 2;
            self.item_header(dicomview_core::header::ITEM, padded_len as u32);
            self.out.extend_from_slice(fragment);
            if fragment.len() % 2 == 1 {
                self.out.push(0);
            }
        }
        self.item_header(dicomview_core::header::SEQUENCE_DELIMITER, 0);
    }

    /// Encode a primitive value, padded to even length.
    fn primitive(&mut self, tag: Tag, vr: VR, value: &PrimitiveValue) -> Result<Vec<u8>> {
        let mut bytes = match value {
            PrimitiveValue::Empty => Vec::new(),
            PrimitiveValue::Str(s) => self
                .charset
                .encode_for(vr, s)
                .context(EncodeTextSnafu { tag })?,
            PrimitiveValue::Strs(c) => self
                .charset
                .encode_for(vr, &c.join("\\"))
                .context(EncodeTextSnafu { tag })?,
            PrimitiveValue::U8(c) => c.to_vec(),
            numbers => {
                let mut sub = Encoder {
                    endianness: self.endianness,
                    explicit_vr: self.explicit_vr,
                    charset: self.charset,
                    out: Vec::new(),
                };
                match numbers {
                    PrimitiveValue::Tags(c) => c.iter().for_each(|t| sub.tag(*t)),
                    PrimitiveValue::I16(c) => put_numbers!(sub, c),
                    PrimitiveValue::U16(c) => put_numbers!(sub, c),
                    PrimitiveValue::I32(c) => put_numbers!(sub, c),
                    PrimitiveValue::U32(c) => put_numbers!(sub, c),
                    PrimitiveValue::I64(c) => put_numbers!(sub, c),
                    PrimitiveValue::U64(c) => put_numbers!(sub, c),
                    PrimitiveValue::F32(c) => put_numbers!(sub, c),
                    PrimitiveValue::F64(c) => put_numbers!(sub, c),
                    _ => {}
                }
                sub.out
            }
        };
        if bytes.len() % 2 == 1 {
            bytes.push(vr.padding());
        }
        Ok(bytes)
    }
}
