//! The table of transfer syntaxes recognized by this library.
//!
//! A transfer syntax determines the byte order and VR explicitness
//! of the main data set, and whether pixel data is encapsulated.
//! The parser refuses streams whose transfer syntax is not listed here.
//! Whether a frame can actually be decoded is a separate concern,
//! resolved by the pixel codec registry.

use byteordered::Endianness;

/// The kind of pixel data encoding implied by a transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Native (uncompressed) pixel data
    None,
    /// RLE Lossless
    Rle,
    /// JPEG Baseline (process 1)
    JpegBaseline,
    /// JPEG Extended (process 2 & 4)
    JpegExtended,
    /// JPEG Lossless, non-hierarchical
    JpegLossless,
    /// JPEG 2000, lossless or lossy
    Jpeg2000,
    /// JPEG-LS, lossless or near-lossless
    JpegLs,
    /// Video or other encapsulated formats not meant for frame decoding
    Other,
}

/// A DICOM transfer syntax specifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    byte_order: Endianness,
    explicit_vr: bool,
    codec: Codec,
}

impl TransferSyntax {
    /// Create a new transfer syntax descriptor.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            byte_order,
            explicit_vr,
            codec,
        }
    }

    /// Create a new explicit VR little endian descriptor
    /// with encapsulated pixel data.
    pub const fn new_ele(uid: &'static str, name: &'static str, codec: Codec) -> Self {
        Self::new(uid, name, Endianness::Little, true, codec)
    }

    /// The unique identifier of the transfer syntax.
    pub const fn uid(&self) -> &'static str {
        self.uid
    }

    /// The human readable name of the transfer syntax.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The byte order of the main data set.
    pub const fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether value representations are written in the data set.
    pub const fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The pixel data codec implied by this transfer syntax.
    pub const fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether pixel data is expected to be encapsulated in fragments.
    pub fn is_encapsulated(&self) -> bool {
        self.codec != Codec::None
    }
}

/// Implicit VR Little Endian: Default Transfer Syntax for DICOM
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Codec::None,
);

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Codec::None,
);

/// Explicit VR Big Endian
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Codec::None,
);

/// RLE Lossless
pub const RLE_LOSSLESS: TransferSyntax =
    TransferSyntax::new_ele("1.2.840.10008.1.2.5", "RLE Lossless", Codec::Rle);

/// JPEG Baseline (Process 1): Default Transfer Syntax for Lossy JPEG 8-bit Image Compression
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Codec::JpegBaseline,
);

/// JPEG Extended (Process 2 & 4): Default Transfer Syntax for Lossy JPEG 12-bit Image Compression
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Codec::JpegExtended,
);

/// JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Codec::JpegLossless,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14 [Selection Value 1]):
/// Default Transfer Syntax for Lossless JPEG Image Compression
pub const JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION: TransferSyntax =
    TransferSyntax::new_ele(
        "1.2.840.10008.1.2.4.70",
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Codec::JpegLossless,
    );

/// JPEG-LS Lossless Image Compression
pub const JPEG_LS_LOSSLESS_IMAGE_COMPRESSION: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    Codec::JpegLs,
);

/// JPEG-LS Lossy (Near-Lossless) Image Compression
pub const JPEG_LS_LOSSY_IMAGE_COMPRESSION: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    Codec::JpegLs,
);

/// JPEG 2000 Image Compression (Lossless Only)
pub const JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    Codec::Jpeg2000,
);

/// JPEG 2000 Image Compression
pub const JPEG_2000_IMAGE_COMPRESSION: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Codec::Jpeg2000,
);

/// MPEG2 Main Profile / Main Level
pub const MPEG2_MAIN_PROFILE_MAIN_LEVEL: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.100",
    "MPEG2 Main Profile / Main Level",
    Codec::Other,
);

/// MPEG-4 AVC/H.264 High Profile / Level 4.1
pub const MPEG4_AVC_H264_HIGH_PROFILE: TransferSyntax = TransferSyntax::new_ele(
    "1.2.840.10008.1.2.4.102",
    "MPEG-4 AVC/H.264 High Profile / Level 4.1",
    Codec::Other,
);

/// All transfer syntaxes recognized by the parser.
pub static ENTRIES: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    RLE_LOSSLESS,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS_NON_HIERARCHICAL,
    JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION,
    JPEG_LS_LOSSLESS_IMAGE_COMPRESSION,
    JPEG_LS_LOSSY_IMAGE_COMPRESSION,
    JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY,
    JPEG_2000_IMAGE_COMPRESSION,
    MPEG2_MAIN_PROFILE_MAIN_LEVEL,
    MPEG4_AVC_H264_HIGH_PROFILE,
];

/// Strip the trailing null padding of a UID read from a data set.
pub fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Look up a transfer syntax by its UID.
///
/// Trailing padding in the given UID is ignored.
pub fn get(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = trim_uid(uid);
    ENTRIES.iter().find(|ts| ts.uid == uid)
}
