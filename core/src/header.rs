//! Element header primitives: tags, value representations and lengths.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub type GroupNumber = u16;
pub type ElementNumber = u16;

/// An attribute tag, as a (group, element) pair.
///
/// Tags are ordered by group, then element,
/// which is also the order of elements in an encoded data set.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Whether this tag belongs to a private group (odd group number).
    #[inline]
    pub fn is_private(self) -> bool {
        self.0 & 1 == 1
    }

    /// Whether this is a group length tag (element `0000`).
    #[inline]
    pub fn is_group_length(self) -> bool {
        self.1 == 0x0000
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from((group, element): (u16, u16)) -> Self {
        Tag(group, element)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from([group, element]: [u16; 2]) -> Self {
        Tag(group, element)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

macro_rules! value_representations {
    ($($vr:ident => $name:literal,)*) => {
        /// A DICOM value representation, by its two-letter code.
        #[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
        pub enum VR {
            $(
                #[doc = $name]
                $vr,
            )*
        }

        impl VR {
            /// Every value representation, in alphabetical order.
            pub const ALL: &'static [VR] = &[$(VR::$vr,)*];

            /// The two-letter code.
            pub fn to_str(self) -> &'static str {
                match self {
                    $(VR::$vr => stringify!($vr),)*
                }
            }

            /// The full name of the representation.
            pub fn name(self) -> &'static str {
                match self {
                    $(VR::$vr => $name,)*
                }
            }
        }
    };
}

value_representations! {
    AE => "Application Entity",
    AS => "Age String",
    AT => "Attribute Tag",
    CS => "Code String",
    DA => "Date",
    DS => "Decimal String",
    DT => "Date Time",
    FD => "Floating Point Double",
    FL => "Floating Point Single",
    IS => "Integer String",
    LO => "Long String",
    LT => "Long Text",
    OB => "Other Byte",
    OD => "Other Double",
    OF => "Other Float",
    OL => "Other Long",
    OV => "Other 64-bit Very Long",
    OW => "Other Word",
    PN => "Person Name",
    SH => "Short String",
    SL => "Signed Long",
    SQ => "Sequence of Items",
    SS => "Signed Short",
    ST => "Short Text",
    SV => "Signed 64-bit Very Long",
    TM => "Time",
    UC => "Unlimited Characters",
    UI => "Unique Identifier",
    UL => "Unsigned Long",
    UN => "Unknown",
    UR => "URI/URL",
    US => "Unsigned Short",
    UT => "Unlimited Text",
    UV => "Unsigned 64-bit Very Long",
}

impl VR {
    /// Read the VR code of an explicit VR element header.
    /// `None` if the bytes are not a known code.
    pub fn from_binary(code: [u8; 2]) -> Option<Self> {
        VR::ALL
            .iter()
            .copied()
            .find(|vr| vr.to_str().as_bytes() == code)
    }

    /// The code as written in an explicit VR element header.
    pub fn to_bytes(self) -> [u8; 2] {
        let code = self.to_str().as_bytes();
        [code[0], code[1]]
    }

    /// Whether explicit VR headers of this VR carry a 16-bit length,
    /// as opposed to 2 reserved bytes and a 32-bit length.
    pub fn has_short_length(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | AT | CS | DA | DS | DT | FL | FD | IS | LO | LT | PN | SH | SL | SS | ST | TM
                | UI | UL | US
        )
    }

    /// Whether values of this VR are character strings.
    pub fn is_textual(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UC | UI | UR | UT
        )
    }

    /// Text VRs where the backslash is part of the value
    /// rather than a separator.
    pub fn is_single_text(self) -> bool {
        matches!(self, VR::LT | VR::ST | VR::UT | VR::UR)
    }

    /// The byte appended to odd-length values.
    pub fn padding(self) -> u8 {
        match self {
            VR::UI => 0,
            vr if vr.is_textual() => b' ',
            _ => 0,
        }
    }
}

impl FromStr for VR {
    type Err = &'static str;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        VR::ALL
            .iter()
            .copied()
            .find(|vr| vr.to_str() == code)
            .ok_or("unknown value representation")
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

/// The value length of an element or item.
///
/// `0xFFFFFFFF` stands for an undefined length,
/// in which case the value ends at a delimitation item.
/// Undefined lengths compare unequal to everything, themselves included.
#[derive(Clone, Copy)]
pub struct Length(pub u32);

impl Length {
    pub const UNDEFINED: Self = Length(UNDEFINED_LEN);

    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// The number of bytes, if defined.
    #[inline]
    pub fn get(self) -> Option<u32> {
        Some(self.0).filter(|&len| len != UNDEFINED_LEN)
    }
}

impl From<u32> for Length {
    #[inline]
    fn from(len: u32) -> Self {
        Length(len)
    }
}

impl PartialEq for Length {
    fn eq(&self, other: &Length) -> bool {
        matches!((self.get(), other.get()), (Some(a), Some(b)) if a == b)
    }
}

impl PartialOrd for Length {
    fn partial_cmp(&self, other: &Length) -> Option<Ordering> {
        Some(self.get()?.cmp(&other.get()?))
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get() {
            Some(len) => write!(f, "Length({})", len),
            None => f.write_str("Length(Undefined)"),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get() {
            Some(len) => write!(f, "{}", len),
            None => f.write_str("U/L"),
        }
    }
}

/// Item tag `(FFFE,E000)`.
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
/// Item Delimitation Item tag `(FFFE,E00D)`.
pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
/// Sequence Delimitation Item tag `(FFFE,E0DD)`.
pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

/// The header of an encoded element: tag, VR and value length.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DataElementHeader {
    pub tag: Tag,
    pub vr: VR,
    pub len: Length,
}

impl DataElementHeader {
    #[inline]
    pub fn new<T: Into<Tag>>(tag: T, vr: VR, len: Length) -> DataElementHeader {
        DataElementHeader {
            tag: tag.into(),
            vr,
            len,
        }
    }

    pub fn is_item(&self) -> bool {
        self.tag == ITEM
    }

    pub fn is_item_delimiter(&self) -> bool {
        self.tag == ITEM_DELIMITER
    }

    pub fn is_sequence_delimiter(&self) -> bool {
        self.tag == SEQUENCE_DELIMITER
    }

    /// Pixel Data with an undefined length holds fragments, not samples.
    pub fn is_encapsulated_pixeldata(&self) -> bool {
        self.tag == Tag(0x7FE0, 0x0010) && self.len.is_undefined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_display_and_order() {
        let tag = Tag(0x0010, 0x0020);
        assert_eq!(tag.to_string(), "(0010,0020)");
        assert!(Tag(0x0008, 0x0060) < Tag(0x0010, 0x0010));
        assert!(Tag(0x0009, 0x0010).is_private());
        assert!(Tag(0x0028, 0x0000).is_group_length());
    }

    #[test]
    fn vr_round_trip_and_length_class() {
        for &vr in VR::ALL {
            assert_eq!(VR::from_binary(vr.to_bytes()), Some(vr));
            assert_eq!(vr.to_str().parse::<VR>(), Ok(vr));
        }
        assert_eq!(VR::ALL.len(), 34);
        assert_eq!(VR::PN.name(), "Person Name");
        assert_eq!(VR::from_binary(*b"ZZ"), None);
        assert!(VR::US.has_short_length());
        assert!(!VR::OB.has_short_length());
        assert!(!VR::UT.has_short_length());
        assert!(!VR::SQ.has_short_length());
    }

    #[test]
    fn undefined_length_never_equal() {
        assert_ne!(Length::UNDEFINED, Length::UNDEFINED);
        assert_eq!(Length(4), Length(4));
        assert_eq!(Length::UNDEFINED.get(), None);
        assert_eq!(Length(10).get(), Some(10));
        assert!(Length(2) < Length(4));
        assert_eq!(Length::UNDEFINED.partial_cmp(&Length(4)), None);
        assert_eq!(Length::UNDEFINED.to_string(), "U/L");
    }
}
