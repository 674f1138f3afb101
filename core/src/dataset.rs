//! In-memory representation of a parsed data set.

use crate::dictionary::StandardDataDictionary;
use crate::header::{DataElementHeader, Length, Tag, VR};
use crate::value::{PrimitiveValue, Value};
use num_traits::NumCast;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A data element: an attribute tag, its value representation
/// and its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    tag: Tag,
    vr: VR,
    value: Value,
}

impl DataElement {
    /// Create a data element from the given parts.
    pub fn new<T, V>(tag: T, vr: VR, value: V) -> Self
    where
        T: Into<Tag>,
        V: Into<Value>,
    {
        DataElement {
            tag: tag.into(),
            vr,
            value: value.into(),
        }
    }

    /// Create an empty data element.
    pub fn empty<T: Into<Tag>>(tag: T, vr: VR) -> Self {
        Self::new(tag, vr, PrimitiveValue::Empty)
    }

    /// The element's attribute tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The element's value representation.
    pub fn vr(&self) -> VR {
        self.vr
    }

    /// The element's value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Turn the element into its value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// A header for this element, with an undefined length
    /// for sequences and encapsulated pixel data.
    pub fn header(&self) -> DataElementHeader {
        let len = match self.value {
            Value::Primitive(_) => Length(0),
            _ => Length::UNDEFINED,
        };
        DataElementHeader::new(self.tag, self.vr, len)
    }

    /// Obtain the primitive value as a string,
    /// joining multiple values with a backslash.
    ///
    /// Returns `None` for sequences and encapsulated pixel data.
    pub fn to_str(&self) -> Option<std::borrow::Cow<str>> {
        self.value.primitive().map(|v| v.to_str())
    }

    /// The nested items of a sequence element.
    pub fn items(&self) -> Option<&[DataSet]> {
        self.value.items()
    }
}

/// File meta information:
/// the attributes of group 0002 which describe how the data set is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileMeta {
    /// Transfer Syntax UID, without trailing padding
    pub transfer_syntax: String,
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: Option<String>,
    /// Implementation Class UID
    pub implementation_class_uid: Option<String>,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
}

/// An ordered collection of data elements with unique tags.
///
/// Elements are kept in insertion order, which is the file order
/// for data sets produced by the parser.
/// The file meta group is held apart from the main elements
/// and does not take part in equality comparisons.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    meta: Option<FileMeta>,
    elements: Vec<DataElement>,
    index: BTreeMap<Tag, usize>,
}

impl PartialEq for DataSet {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl DataSet {
    /// Create an empty data set without file meta information.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty data set with the given file meta information.
    pub fn with_meta(meta: FileMeta) -> Self {
        DataSet {
            meta: Some(meta),
            ..Self::default()
        }
    }

    /// The file meta information, if this data set was read from a file.
    pub fn meta(&self) -> Option<&FileMeta> {
        self.meta.as_ref()
    }

    /// Attach file meta information to this data set.
    pub fn set_meta(&mut self, meta: FileMeta) {
        self.meta = Some(meta);
    }

    /// The UID of the transfer syntax the data set was encoded in.
    pub fn transfer_syntax(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.transfer_syntax.as_str())
    }

    /// Insert a data element.
    ///
    /// An element with the same tag is replaced in place
    /// and returned.
    pub fn put(&mut self, element: DataElement) -> Option<DataElement> {
        match self.index.get(&element.tag) {
            Some(&i) => Some(std::mem::replace(&mut self.elements[i], element)),
            None => {
                self.index.insert(element.tag, self.elements.len());
                self.elements.push(element);
                None
            }
        }
    }

    /// Fetch a data element by tag.
    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.index.get(&tag).map(|&i| &self.elements[i])
    }

    /// Fetch a data element by its dictionary alias,
    /// such as `"PatientName"`.
    pub fn element_by_name(&self, name: &str) -> Option<&DataElement> {
        let entry = StandardDataDictionary.by_name(name)?;
        self.get(entry.tag)
    }

    /// Whether the data set contains an element with the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.index.contains_key(&tag)
    }

    /// Fetch the first string of a textual element,
    /// trimmed of padding.
    /// Empty values are reported as absent.
    pub fn string(&self, tag: Tag) -> Option<&str> {
        let s = self.get(tag)?.value.primitive()?.string()?;
        let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    /// Fetch and convert the first value of an element into an integer.
    pub fn int<T>(&self, tag: Tag) -> Option<T>
    where
        T: NumCast + FromStr,
    {
        self.get(tag)?.value.primitive()?.to_int().ok()
    }

    /// Fetch and convert the first value of an element into a float.
    pub fn f64(&self, tag: Tag) -> Option<f64> {
        self.get(tag)?.value.primitive()?.to_f64().ok()
    }

    /// Fetch and convert all values of an element into floats.
    pub fn multi_f64(&self, tag: Tag) -> Option<Vec<f64>> {
        self.get(tag)?.value.primitive()?.to_multi_f64().ok()
    }

    /// Iterate over the elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, DataElement> {
        self.elements.iter()
    }

    /// The number of elements in the data set.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the data set has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataElement;
    type IntoIter = std::slice::Iter<'a, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<DataElement> for DataSet {
    fn from_iter<I: IntoIterator<Item = DataElement>>(iter: I) -> Self {
        let mut set = DataSet::new();
        for element in iter {
            set.put(element);
        }
        set
    }
}

impl fmt::Display for DataElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let alias = StandardDataDictionary
            .by_tag(self.tag)
            .map(|e| e.alias)
            .unwrap_or("«Unknown Attribute»");
        write!(f, "{} {:<32} {} ", self.tag, alias, self.vr)?;
        match &self.value {
            Value::Primitive(v) => write!(f, "[{}]", v),
            Value::Sequence(items) => write!(f, "({} items)", items.len()),
            Value::PixelSequence(p) => write!(
                f,
                "(encapsulated, {} fragments, offset table of {} entries)",
                p.fragments.len(),
                p.offset_table.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn put_keeps_insertion_order_and_replaces() {
        let mut set = DataSet::new();
        assert!(set.put(DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^John"))).is_none());
        set.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(64_u16)));
        let old = set.put(DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Roe^Jane")));
        assert!(old.is_some());

        assert_eq!(set.len(), 2);
        let tags: Vec<_> = set.iter().map(|e| e.tag()).collect();
        assert_eq!(tags, vec![tags::PATIENT_NAME, tags::ROWS]);
        assert_eq!(set.string(tags::PATIENT_NAME), Some("Roe^Jane"));
        assert_eq!(set.int::<u32>(tags::ROWS), Some(64));
    }

    #[test]
    fn lookups_by_name_and_padding() {
        let set: DataSet = vec![
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.3\0")),
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("  ")),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.string(tags::SOP_INSTANCE_UID), Some("1.2.3"));
        assert_eq!(set.string(tags::MODALITY), None);
        assert!(set.element_by_name("SOPInstanceUID").is_some());
        assert!(set.element_by_name("PatientName").is_none());
        assert!(set.element_by_name("NotAnAttribute").is_none());
    }

    #[test]
    fn meta_does_not_affect_equality() {
        let mut a = DataSet::new();
        a.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")));
        let mut b = a.clone();
        b.set_meta(FileMeta {
            transfer_syntax: "1.2.840.10008.1.2".into(),
            ..FileMeta::default()
        });
        assert_eq!(a, b);
        assert_eq!(b.transfer_syntax(), Some("1.2.840.10008.1.2"));
    }
}
