//! Reading and writing of the DICOM file preamble and
//! file meta information group (0002,xxxx).
//!
//! The meta group is always encoded in Explicit VR Little Endian.

use crate::decode::{decode_value, Mode, Source};
use crate::error::{
    EncodeTextSnafu, MissingMagicSnafu, MissingTransferSyntaxSnafu, Result, UndefinedValueLengthSnafu,
    WriteError,
};
use crate::text::SpecificCharacterSet;
use dicomview_core::dataset::FileMeta;
use dicomview_core::header::{Tag, VR};
use dicomview_core::tags;
use dicomview_core::transfer_syntax::trim_uid;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::debug;

/// The magic code following the 128-byte preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = *b"DICM";

/// The length of the file preamble.
pub const PREAMBLE_LEN: usize = 128;

/// Implementation class UID written by this library.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.137038125948464847900039011591283709926";

/// Implementation version name written by this library.
pub const IMPLEMENTATION_VERSION_NAME: &str = "DICOMVIEW_010";

/// Locate the start of the meta group,
/// right after the `DICM` magic code.
///
/// When the preamble is not required,
/// streams starting directly with the magic code are also accepted.
pub fn find_meta_start(bytes: &[u8], require_preamble: bool) -> Result<usize> {
    if bytes.get(PREAMBLE_LEN..PREAMBLE_LEN + 4) == Some(&DICM_MAGIC_CODE[..]) {
        return Ok(PREAMBLE_LEN + 4);
    }
    ensure!(
        !require_preamble && bytes.get(0..4) == Some(&DICM_MAGIC_CODE[..]),
        MissingMagicSnafu
    );
    debug!("No preamble found, reading from the magic code");
    Ok(4)
}

/// Read the file meta group, starting at the given source position.
///
/// Reading stops at the first element outside of group 0002.
pub fn read_meta(source: &mut Source) -> Result<FileMeta> {
    let mode = Mode::EXPLICIT_LE;
    let mut meta = FileMeta::default();
    let mut transfer_syntax = None;

    while source.peek_tag(mode).map(|t| t.group()) == Some(0x0002) {
        let position = source.position();
        let header = source.decode_header(mode)?;
        let len = header.len.get().context(UndefinedValueLengthSnafu {
            tag: header.tag,
            position,
        })?;
        let bytes = source.take_value(header.tag, len)?;
        let value = decode_value(&header, bytes, mode, SpecificCharacterSet::Default)?;
        let text = || value.string().map(|s| trim_uid(s).to_string());
        match header.tag {
            tags::TRANSFER_SYNTAX_UID => transfer_syntax = text(),
            tags::MEDIA_STORAGE_SOP_CLASS_UID => meta.media_storage_sop_class_uid = text(),
            tags::MEDIA_STORAGE_SOP_INSTANCE_UID => meta.media_storage_sop_instance_uid = text(),
            tags::IMPLEMENTATION_CLASS_UID => meta.implementation_class_uid = text(),
            tags::IMPLEMENTATION_VERSION_NAME => meta.implementation_version_name = text(),
            _ => {}
        }
    }

    meta.transfer_syntax = transfer_syntax.context(MissingTransferSyntaxSnafu)?;
    Ok(meta)
}

/// Encode the preamble, magic code and file meta group.
pub fn write_meta(meta: &FileMeta, to: &mut Vec<u8>) -> Result<(), WriteError> {
    let mut group = Vec::with_capacity(256);
    put_meta_element(&mut group, tags::FILE_META_INFORMATION_VERSION, VR::OB, &[0x00, 0x01]);
    let strings = [
        (tags::MEDIA_STORAGE_SOP_CLASS_UID, VR::UI, meta.media_storage_sop_class_uid.as_deref()),
        (tags::MEDIA_STORAGE_SOP_INSTANCE_UID, VR::UI, meta.media_storage_sop_instance_uid.as_deref()),
        (tags::TRANSFER_SYNTAX_UID, VR::UI, Some(meta.transfer_syntax.as_str())),
        (tags::IMPLEMENTATION_CLASS_UID, VR::UI, meta.implementation_class_uid.as_deref()),
        (tags::IMPLEMENTATION_VERSION_NAME, VR::SH, meta.implementation_version_name.as_deref()),
    ];
    for (tag, vr, value) in strings {
        if let Some(value) = value {
            let mut bytes = SpecificCharacterSet::Default
                .encode(value)
                .context(EncodeTextSnafu { tag })?;
            if bytes.len() % 2 == 1 {
                bytes.push(vr.padding());
            }
            put_meta_element(&mut group, tag, vr, &bytes);
        }
    }

    to.extend_from_slice(&[0; PREAMBLE_LEN]);
    to.extend_from_slice(&DICM_MAGIC_CODE);
    put_meta_element(
        to,
        tags::FILE_META_INFORMATION_GROUP_LENGTH,
        VR::UL,
        &(group.len() as u32).to_le_bytes(),
    );
    to.extend_from_slice(&group);
    Ok(())
}

fn put_meta_element(to: &mut Vec<u8>, tag: Tag, vr: VR, value: &[u8]) {
    to.extend_from_slice(&tag.group().to_le_bytes());
    to.extend_from_slice(&tag.element().to_le_bytes());
    to.extend_from_slice(&vr.to_bytes());
    if vr.has_short_length() {
        to.extend_from_slice(&(value.len() as u16).to_le_bytes());
    } else {
        to.extend_from_slice(&[0, 0]);
        to.extend_from_slice(&(value.len() as u32).to_le_bytes());
    }
    to.extend_from_slice(value);
}
