//! The attribute dictionary:
//! a mapping from attribute tags to their alias
//! and typical value representation.
//!
//! Entries come from the standard DICOM data dictionary (PS3.6)
//! as published by the `dicom-dictionary-std` crate,
//! translated into this crate's header types.

use crate::header::{Tag, VR};
use dicom_core::dictionary::DataDictionary;
use dicom_dictionary_std::StandardDataDictionary as Ps36Dictionary;
use std::fmt;

/// A dictionary entry, representing a DICOM attribute.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DictionaryEntry {
    /// The attribute tag.
    /// For repeating groups (such as `(60xx,3000)`)
    /// this is the tag which was looked up.
    pub tag: Tag,
    /// The alias of the attribute, with no spaces, in UpperCamelCase
    pub alias: &'static str,
    /// The _typical_ value representation of the attribute.
    /// Context dependent representations (US or SS, OB or OW)
    /// resolve to US and OW respectively.
    pub vr: VR,
}

/// The attribute dictionary.
///
/// Group length and private creator elements resolve to generic entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardDataDictionary;

impl StandardDataDictionary {
    /// Fetch an entry by its alias (e.g. `"PatientName"`).
    pub fn by_name(&self, name: &str) -> Option<DictionaryEntry> {
        let entry = Ps36Dictionary.by_name(name)?;
        let tag = entry.tag.inner();
        Some(DictionaryEntry {
            tag: Tag(tag.0, tag.1),
            alias: entry.alias,
            vr: translate_vr(entry.vr.relaxed()),
        })
    }

    /// Fetch an entry by its tag.
    pub fn by_tag(&self, tag: Tag) -> Option<DictionaryEntry> {
        let entry = Ps36Dictionary.by_tag(dicom_core::Tag(tag.0, tag.1))?;
        Some(DictionaryEntry {
            tag,
            alias: entry.alias,
            vr: translate_vr(entry.vr.relaxed()),
        })
    }

    /// Resolve the value representation of an attribute
    /// for implicit VR decoding,
    /// falling back to UN for unknown attributes.
    pub fn vr_of(&self, tag: Tag) -> VR {
        self.by_tag(tag).map(|e| e.vr).unwrap_or(VR::UN)
    }
}

fn translate_vr(vr: dicom_core::VR) -> VR {
    VR::from_binary(vr.to_bytes()).unwrap_or(VR::UN)
}

impl fmt::Display for StandardDataDictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Standard DICOM Data Dictionary")
    }
}
