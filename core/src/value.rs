//! Representation of DICOM values.
//!
//! A data element value is a closed variant:
//! a primitive value (a scalar or a list of scalars, see [`PrimitiveValue`]),
//! a sequence of nested data sets,
//! or a sequence of encapsulated pixel data fragments.
//! Encapsulated fragments are kept as references into the source stream
//! so that pixel data is only read when a frame is decoded.

use crate::dataset::DataSet;
use crate::header::Tag;
use chrono::NaiveDate;
use itertools::Itertools;
use num_traits::NumCast;
use smallvec::SmallVec;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// An aggregation of one or more elements in a value.
pub type C<T> = SmallVec<[T; 2]>;

/// An error which may occur when converting a value into another type.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ConvertValueError {
    /// The value is empty
    #[snafu(display("Value is empty"))]
    EmptyValue,
    /// The value cannot be interpreted as the requested type
    #[snafu(display("Cannot convert {} value into {}", original, requested))]
    Incompatible {
        original: &'static str,
        requested: &'static str,
    },
    /// A textual value could not be parsed
    #[snafu(display("Could not parse `{}` as {}", text, requested))]
    ParseText {
        text: String,
        requested: &'static str,
    },
    /// A numeric value does not fit the requested type
    #[snafu(display("Numeric value out of range for {}", requested))]
    OutOfRange { requested: &'static str },
    /// A date value could not be parsed
    #[snafu(display("Could not parse date `{}`", text))]
    ParseDate {
        text: String,
        source: chrono::ParseError,
    },
}

type ConvertResult<T> = Result<T, ConvertValueError>;

/// A primitive DICOM value, with awareness of multiplicity.
///
/// Each variant holds the semantic type implied by a value representation.
/// Textual representations (including DS, IS, DA, TM, DT)
/// are kept as strings, preserving their original form;
/// the conversion methods interpret them on demand.
#[derive(Debug, PartialEq, Clone)]
pub enum PrimitiveValue {
    /// No data. Usually employed for zero-length values.
    Empty,
    /// A sequence of strings.
    /// Used for AE, AS, CS, DA, DS, DT, IS, LO, PN, SH, TM, UC and UI.
    Strs(C<String>),
    /// A single string.
    /// Used for ST, LT, UT and UR, which are never multi-valued.
    Str(String),
    /// A sequence of attribute tags. Used for AT.
    Tags(C<Tag>),
    /// A sequence of bytes. Used for OB and UN.
    U8(C<u8>),
    /// Signed 16-bit integers. Used for SS.
    I16(C<i16>),
    /// Unsigned 16-bit integers. Used for US and OW.
    U16(C<u16>),
    /// Signed 32-bit integers. Used for SL.
    I32(C<i32>),
    /// Unsigned 32-bit integers. Used for UL and OL.
    U32(C<u32>),
    /// Signed 64-bit integers. Used for SV.
    I64(C<i64>),
    /// Unsigned 64-bit integers. Used for UV and OV.
    U64(C<u64>),
    /// 32-bit floating point numbers. Used for FL and OF.
    F32(C<f32>),
    /// 64-bit floating point numbers. Used for FD and OD.
    F64(C<f64>),
}

macro_rules! impl_from_for_primitive {
    ($typ: ty, $variant: ident) => {
        impl From<$typ> for PrimitiveValue {
            fn from(value: $typ) -> Self {
                PrimitiveValue::$variant(smallvec::smallvec![value])
            }
        }
    };
}

impl_from_for_primitive!(Tag, Tags);
impl_from_for_primitive!(i16, I16);
impl_from_for_primitive!(u16, U16);
impl_from_for_primitive!(i32, I32);
impl_from_for_primitive!(u32, U32);
impl_from_for_primitive!(i64, I64);
impl_from_for_primitive!(u64, U64);
impl_from_for_primitive!(f32, F32);
impl_from_for_primitive!(f64, F64);

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![value.to_owned()])
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![value])
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(value: Vec<u8>) -> Self {
        PrimitiveValue::U8(C::from_vec(value))
    }
}

impl PrimitiveValue {
    /// Obtain the number of individual values.
    pub fn multiplicity(&self) -> u32 {
        use PrimitiveValue::*;
        match self {
            Empty => 0,
            Str(_) => 1,
            Strs(c) => c.len() as u32,
            Tags(c) => c.len() as u32,
            U8(c) => c.len() as u32,
            I16(c) => c.len() as u32,
            U16(c) => c.len() as u32,
            I32(c) => c.len() as u32,
            U32(c) => c.len() as u32,
            I64(c) => c.len() as u32,
            U64(c) => c.len() as u32,
            F32(c) => c.len() as u32,
            F64(c) => c.len() as u32,
        }
    }

    /// A short name of the variant, for diagnostics.
    pub fn value_type(&self) -> &'static str {
        use PrimitiveValue::*;
        match self {
            Empty => "Empty",
            Str(_) => "Str",
            Strs(_) => "Strs",
            Tags(_) => "Tags",
            U8(_) => "U8",
            I16(_) => "I16",
            U16(_) => "U16",
            I32(_) => "I32",
            U32(_) => "U32",
            I64(_) => "I64",
            U64(_) => "U64",
            F32(_) => "F32",
            F64(_) => "F64",
        }
    }

    /// Convert the full primitive value into a single string.
    ///
    /// Multiple values are joined with a backslash (`'\\'`),
    /// and trailing padding is not present in textual values.
    pub fn to_str(&self) -> Cow<str> {
        match self {
            PrimitiveValue::Empty => Cow::from(""),
            PrimitiveValue::Str(value) => Cow::from(value.as_str()),
            PrimitiveValue::Strs(values) if values.len() == 1 => Cow::from(values[0].as_str()),
            PrimitiveValue::Strs(values) => Cow::from(values.iter().join("\\")),
            prim => Cow::from(prim.to_string()),
        }
    }

    /// Retrieve the first string of a textual value.
    pub fn string(&self) -> Option<&str> {
        match self {
            PrimitiveValue::Str(s) => Some(s.as_str()),
            PrimitiveValue::Strs(c) => c.first().map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Retrieve and convert the first value into an integer.
    ///
    /// Textual values (such as IS) are parsed after trimming whitespace.
    pub fn to_int<T>(&self) -> ConvertResult<T>
    where
        T: NumCast + FromStr,
    {
        let requested = std::any::type_name::<T>();
        match self {
            PrimitiveValue::Empty => EmptyValueSnafu.fail(),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
                let text = self.string().context(EmptyValueSnafu)?.trim();
                text.parse().ok().context(ParseTextSnafu { text, requested })
            }
            PrimitiveValue::U8(c) => cast_first(c, requested),
            PrimitiveValue::I16(c) => cast_first(c, requested),
            PrimitiveValue::U16(c) => cast_first(c, requested),
            PrimitiveValue::I32(c) => cast_first(c, requested),
            PrimitiveValue::U32(c) => cast_first(c, requested),
            PrimitiveValue::I64(c) => cast_first(c, requested),
            PrimitiveValue::U64(c) => cast_first(c, requested),
            PrimitiveValue::F32(c) => cast_first(c, requested),
            PrimitiveValue::F64(c) => cast_first(c, requested),
            PrimitiveValue::Tags(_) => IncompatibleSnafu {
                original: self.value_type(),
                requested,
            }
            .fail(),
        }
    }

    /// Retrieve and convert the first value into a double precision float.
    pub fn to_f64(&self) -> ConvertResult<f64> {
        self.to_multi_f64()?
            .into_iter()
            .next()
            .context(EmptyValueSnafu)
    }

    /// Retrieve and convert all values into double precision floats.
    ///
    /// Textual values (such as DS) are split and parsed individually.
    pub fn to_multi_f64(&self) -> ConvertResult<Vec<f64>> {
        fn cast_all<T: NumCast + Copy>(c: &[T]) -> ConvertResult<Vec<f64>> {
            c.iter()
                .map(|v| NumCast::from(*v).context(OutOfRangeSnafu { requested: "f64" }))
                .collect()
        }
        match self {
            PrimitiveValue::Empty => EmptyValueSnafu.fail(),
            PrimitiveValue::Str(s) => parse_floats(std::iter::once(s.as_str())),
            PrimitiveValue::Strs(c) => parse_floats(c.iter().map(|s| s.as_str())),
            PrimitiveValue::U8(c) => cast_all(c),
            PrimitiveValue::I16(c) => cast_all(c),
            PrimitiveValue::U16(c) => cast_all(c),
            PrimitiveValue::I32(c) => cast_all(c),
            PrimitiveValue::U32(c) => cast_all(c),
            PrimitiveValue::I64(c) => cast_all(c),
            PrimitiveValue::U64(c) => cast_all(c),
            PrimitiveValue::F32(c) => Ok(c.iter().map(|v| <f64 as From<f32>>::from(*v)).collect()),
            PrimitiveValue::F64(c) => Ok(c.to_vec()),
            PrimitiveValue::Tags(_) => IncompatibleSnafu {
                original: self.value_type(),
                requested: "f64",
            }
            .fail(),
        }
    }

    /// Interpret the first value as a DICOM date (DA).
    ///
    /// Both the standard `YYYYMMDD` form
    /// and the legacy `YYYY.MM.DD` form are accepted.
    pub fn to_date(&self) -> ConvertResult<NaiveDate> {
        let text = self.string().context(EmptyValueSnafu)?.trim();
        ensure!(!text.is_empty(), EmptyValueSnafu);
        let format = if text.contains('.') { "%Y.%m.%d" } else { "%Y%m%d" };
        NaiveDate::parse_from_str(text, format).context(ParseDateSnafu { text })
    }

    /// Retrieve the bytes of an OB or UN value.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            PrimitiveValue::U8(c) => Some(c),
            _ => None,
        }
    }

    /// Retrieve the words of an US or OW value.
    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            PrimitiveValue::U16(c) => Some(c),
            _ => None,
        }
    }
}

fn cast_first<S, T>(c: &[S], requested: &'static str) -> ConvertResult<T>
where
    S: NumCast + Copy,
    T: NumCast,
{
    let first = c.first().context(EmptyValueSnafu)?;
    T::from(*first).context(OutOfRangeSnafu { requested })
}

fn parse_floats<'a>(values: impl Iterator<Item = &'a str>) -> ConvertResult<Vec<f64>> {
    values
        .map(|text| {
            let text = text.trim();
            text.parse::<f64>()
                .ok()
                .context(ParseTextSnafu {
                    text,
                    requested: "f64",
                })
        })
        .collect()
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn seq<I>(f: &mut fmt::Formatter, iter: I) -> fmt::Result
        where
            I: IntoIterator,
            I::Item: fmt::Display,
        {
            write!(f, "{}", iter.into_iter().join("\\"))
        }
        match self {
            PrimitiveValue::Empty => Ok(()),
            PrimitiveValue::Str(s) => f.write_str(s),
            PrimitiveValue::Strs(c) => seq(f, c),
            PrimitiveValue::Tags(c) => seq(f, c),
            PrimitiveValue::U8(c) => seq(f, c),
            PrimitiveValue::I16(c) => seq(f, c),
            PrimitiveValue::U16(c) => seq(f, c),
            PrimitiveValue::I32(c) => seq(f, c),
            PrimitiveValue::U32(c) => seq(f, c),
            PrimitiveValue::I64(c) => seq(f, c),
            PrimitiveValue::U64(c) => seq(f, c),
            PrimitiveValue::F32(c) => seq(f, c),
            PrimitiveValue::F64(c) => seq(f, c),
        }
    }
}

/// A reference to one encapsulated pixel data fragment
/// in the stream the data set was parsed from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    /// byte offset of the fragment's value from the start of the stream
    pub offset: u64,
    /// length of the fragment's value in bytes
    pub length: u32,
}

impl Fragment {
    /// The byte range of this fragment in its source stream.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// Encapsulated pixel data: the basic offset table
/// followed by fragment references, in stream order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PixelFragments {
    /// the basic offset table (may be empty)
    pub offset_table: C<u32>,
    /// the fragments after the offset table
    pub fragments: Vec<Fragment>,
}

/// The value of a data element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A primitive value, single or multi-valued.
    Primitive(PrimitiveValue),
    /// A sequence of items, each of them a nested data set.
    Sequence(Vec<DataSet>),
    /// Encapsulated pixel data, kept as references into the source stream.
    PixelSequence(PixelFragments),
}

impl Value {
    /// Retrieve the primitive value, if this is one.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Retrieve the sequence items, if this is a sequence.
    pub fn items(&self) -> Option<&[DataSet]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Retrieve the encapsulated pixel data fragments, if applicable.
    pub fn fragments(&self) -> Option<&PixelFragments> {
        match self {
            Value::PixelSequence(f) => Some(f),
            _ => None,
        }
    }

    /// Number of values (primitive), items (sequence) or fragments.
    pub fn multiplicity(&self) -> u32 {
        match self {
            Value::Primitive(v) => v.multiplicity(),
            Value::Sequence(items) => items.len() as u32,
            Value::PixelSequence(f) => f.fragments.len() as u32,
        }
    }
}

impl From<PrimitiveValue> for Value {
    fn from(value: PrimitiveValue) -> Self {
        Value::Primitive(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn primitive_value_to_str() {
        let value = PrimitiveValue::Strs(smallvec!["DERIVED".into(), "PRIMARY".into()]);
        assert_eq!(value.to_str(), "DERIVED\\PRIMARY");
        assert_eq!(PrimitiveValue::from(512_u16).to_str(), "512");
        assert_eq!(PrimitiveValue::Empty.to_str(), "");
    }

    #[test]
    fn primitive_value_to_int() {
        assert_eq!(PrimitiveValue::from(" 42 ").to_int::<i32>().unwrap(), 42);
        assert_eq!(PrimitiveValue::from(16_u16).to_int::<u32>().unwrap(), 16);
        assert!(PrimitiveValue::from(-1_i16).to_int::<u16>().is_err());
        assert!(PrimitiveValue::from("abc").to_int::<i32>().is_err());
        assert!(PrimitiveValue::Empty.to_int::<i32>().is_err());
    }

    #[test]
    fn primitive_value_to_f64() {
        let ds = PrimitiveValue::Strs(smallvec!["40".into(), "-600.5 ".into()]);
        assert_eq!(ds.to_multi_f64().unwrap(), vec![40., -600.5]);
        assert_eq!(ds.to_f64().unwrap(), 40.);
        assert_eq!(PrimitiveValue::from(2.5_f32).to_f64().unwrap(), 2.5);
    }

    #[test]
    fn primitive_value_to_date() {
        let date = PrimitiveValue::from("20141012").to_date().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2014, 10, 12).unwrap());
        let legacy = PrimitiveValue::from("2014.10.12").to_date().unwrap();
        assert_eq!(legacy, date);
        assert!(PrimitiveValue::from("2014").to_date().is_err());
    }
}
