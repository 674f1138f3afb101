//! Text decoding and encoding with awareness of the
//! Specific Character Set (0008,0005) of a data set.
//!
//! Only the value representations affected by the character set
//! (SH, LO, UC, ST, LT, UT and PN) go through the selected codec.
//! All other textual representations use the default repertoire.

use encoding::all::{
    GB18030, ISO_2022_JP, ISO_8859_1, ISO_8859_2, ISO_8859_5, UTF_8, WINDOWS_31J, WINDOWS_949,
};
use encoding::{DecoderTrap, EncoderTrap, Encoding, RawDecoder, StringWriter};
use dicomview_core::VR;
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;

/// An error type for text encoding and decoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum TextError {
    /// The text could not be decoded with the selected character set.
    #[snafu(display("Could not decode text as {}: {}", charset, message))]
    DecodeText {
        charset: &'static str,
        message: Cow<'static, str>,
        backtrace: Backtrace,
    },
    /// The text could not be encoded with the selected character set.
    #[snafu(display("Could not encode text as {}: {}", charset, message))]
    EncodeText {
        charset: &'static str,
        message: Cow<'static, str>,
        backtrace: Backtrace,
    },
}

/// An enum type for all supported character sets.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum SpecificCharacterSet {
    /// **ISO-IR 6**: the default character set.
    #[default]
    Default,
    /// **ISO-IR 100** (ISO-8859-1): the Western Europe character set.
    IsoIr100,
    /// **ISO-IR 101** (ISO-8859-2): the Central/Eastern Europe character set.
    IsoIr101,
    /// **ISO-IR 144** (ISO-8859-5): the Latin/Cyrillic character set.
    IsoIr144,
    /// **ISO-IR 13**: Japanese katakana, here decoded as Shift_JIS.
    IsoIr13,
    /// **ISO 2022 IR 87**: Japanese kanji with ISO 2022 code extensions.
    IsoIr87,
    /// **ISO-IR 149**: the Korean character set, decoded as EUC-KR.
    IsoIr149,
    /// **ISO-IR 192**: Unicode in UTF-8.
    IsoIr192,
    /// **GB18030**: the Simplified Chinese character set.
    Gb18030,
}

impl SpecificCharacterSet {
    /// Obtain the specific character set identified by the given code string.
    ///
    /// Multi-valued code strings (as used with ISO 2022 code extensions)
    /// are resolved by their most specific term.
    pub fn from_code(code: &str) -> Option<Self> {
        use SpecificCharacterSet::*;
        let mut resolved = None;
        for term in code.split('\\').map(str::trim) {
            let charset = match term {
                "" | "ISO_IR 6" | "ISO_IR_6" | "ISO 2022 IR 6" => Default,
                "ISO_IR 100" | "ISO_IR_100" | "ISO 2022 IR 100" => IsoIr100,
                "ISO_IR 101" | "ISO_IR_101" | "ISO 2022 IR 101" => IsoIr101,
                "ISO_IR 144" | "ISO_IR_144" | "ISO 2022 IR 144" => IsoIr144,
                "ISO_IR 13" | "ISO_IR_13" | "ISO 2022 IR 13" => IsoIr13,
                "ISO 2022 IR 87" | "ISO 2022 IR 159" => IsoIr87,
                "ISO 2022 IR 149" | "ISO_IR 149" => IsoIr149,
                "ISO_IR 192" | "ISO_IR_192" => IsoIr192,
                "GB18030" | "GBK" | "ISO 2022 IR 58" => Gb18030,
                _ => return None,
            };
            if charset != Default || resolved.is_none() {
                resolved = Some(charset);
            }
        }
        resolved
    }

    /// The defined term of this character set.
    pub fn name(self) -> &'static str {
        use SpecificCharacterSet::*;
        match self {
            Default => "ISO_IR 6",
            IsoIr100 => "ISO_IR 100",
            IsoIr101 => "ISO_IR 101",
            IsoIr144 => "ISO_IR 144",
            IsoIr13 => "ISO_IR 13",
            IsoIr87 => "ISO 2022 IR 87",
            IsoIr149 => "ISO 2022 IR 149",
            IsoIr192 => "ISO_IR 192",
            Gb18030 => "GB18030",
        }
    }

    fn encoding(self) -> &'static dyn Encoding {
        use SpecificCharacterSet::*;
        match self {
            // 8859-1 is a superset of the default repertoire
            Default | IsoIr100 => ISO_8859_1,
            IsoIr101 => ISO_8859_2,
            IsoIr144 => ISO_8859_5,
            IsoIr13 => WINDOWS_31J,
            IsoIr87 => ISO_2022_JP,
            IsoIr149 => WINDOWS_949,
            IsoIr192 => UTF_8,
            Gb18030 => GB18030,
        }
    }

    /// Decode the given bytes into a string.
    ///
    /// Characters which cannot be represented are replaced
    /// by their octal escape (`\ooo`).
    pub fn decode(self, text: &[u8]) -> Result<String, TextError> {
        self.encoding()
            .decode(text, DecoderTrap::Call(decode_text_trap))
            .map_err(|message| {
                DecodeTextSnafu {
                    charset: self.name(),
                    message,
                }
                .build()
            })
    }

    /// Encode the given string into bytes.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, TextError> {
        self.encoding()
            .encode(text, EncoderTrap::Strict)
            .map_err(|message| {
                EncodeTextSnafu {
                    charset: self.name(),
                    message,
                }
                .build()
            })
    }

    /// Decode a value of the given VR,
    /// using this character set only where the VR is affected by it.
    pub fn decode_for(self, vr: VR, text: &[u8]) -> Result<String, TextError> {
        if is_charset_sensitive(vr) {
            self.decode(text)
        } else {
            SpecificCharacterSet::Default.decode(text)
        }
    }

    /// Encode a value of the given VR,
    /// using this character set only where the VR is affected by it.
    pub fn encode_for(self, vr: VR, text: &str) -> Result<Vec<u8>, TextError> {
        if is_charset_sensitive(vr) {
            self.encode(text)
        } else {
            SpecificCharacterSet::Default.encode(text)
        }
    }
}

fn is_charset_sensitive(vr: VR) -> bool {
    matches!(
        vr,
        VR::SH | VR::LO | VR::UC | VR::ST | VR::LT | VR::UT | VR::PN
    )
}

fn decode_text_trap(
    _decoder: &mut dyn RawDecoder,
    input: &[u8],
    output: &mut dyn StringWriter,
) -> bool {
    let c = input[0];
    let o0 = c & 7;
    let o1 = (c & 56) >> 3;
    let o2 = (c & 192) >> 6;
    output.write_char('\\');
    output.write_char((o2 + b'0') as char);
    output.write_char((o1 + b'0') as char);
    output.write_char((o0 + b'0') as char);
    true
}
