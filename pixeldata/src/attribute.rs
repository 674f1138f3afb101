//! Key image attributes fetched from a data set.

use crate::error::{DecodeResult, InvalidAttributeSnafu, MissingAttributeSnafu};
use dicomview_core::dataset::DataSet;
use dicomview_core::header::Tag;
use dicomview_core::tags;
use snafu::{ensure, OptionExt};
use std::fmt;

/// An interpreted representation of the DICOM _Pixel Representation_ attribute.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PixelRepresentation {
    /// unsigned pixel data sample values
    Unsigned,
    /// signed pixel data sample values
    Signed,
}

/// An interpreted representation of the _Planar Configuration_ attribute.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PlanarConfiguration {
    /// samples are interleaved per pixel (`R1 G1 B1 R2 G2 B2 ...`)
    Standard,
    /// samples are grouped per plane (`R1 R2 ... G1 G2 ... B1 B2 ...`)
    PixelFirst,
}

/// The _Photometric Interpretation_ of an image.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum PhotometricInterpretation {
    /// grayscale, minimum sample value is white
    Monochrome1,
    /// grayscale, minimum sample value is black
    Monochrome2,
    /// indices into a colour palette
    PaletteColor,
    /// red, green and blue samples
    Rgb,
    /// full range luminance and chrominance
    YbrFull,
    /// luminance and horizontally subsampled chrominance
    YbrFull422,
    /// partial range luminance and chrominance
    YbrPartial420,
    /// irreversible colour transform of JPEG 2000
    YbrIct,
    /// reversible colour transform of JPEG 2000
    YbrRct,
    /// any other interpretation
    Other(String),
}

impl PhotometricInterpretation {
    /// Interpret the defined term of the attribute.
    pub fn from_term(term: &str) -> Self {
        use PhotometricInterpretation::*;
        match term.trim() {
            "MONOCHROME1" => Monochrome1,
            "MONOCHROME2" => Monochrome2,
            "PALETTE COLOR" => PaletteColor,
            "RGB" => Rgb,
            "YBR_FULL" => YbrFull,
            "YBR_FULL_422" => YbrFull422,
            "YBR_PARTIAL_420" => YbrPartial420,
            "YBR_ICT" => YbrIct,
            "YBR_RCT" => YbrRct,
            other => Other(other.to_string()),
        }
    }

    /// The defined term of the interpretation.
    pub fn as_str(&self) -> &str {
        use PhotometricInterpretation::*;
        match self {
            Monochrome1 => "MONOCHROME1",
            Monochrome2 => "MONOCHROME2",
            PaletteColor => "PALETTE COLOR",
            Rgb => "RGB",
            YbrFull => "YBR_FULL",
            YbrFull422 => "YBR_FULL_422",
            YbrPartial420 => "YBR_PARTIAL_420",
            YbrIct => "YBR_ICT",
            YbrRct => "YBR_RCT",
            Other(s) => s,
        }
    }

    /// Whether samples are grayscale intensities.
    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The geometry and sample layout of the frames in a data set.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry {
    /// number of rows (height)
    pub rows: u16,
    /// number of columns (width)
    pub columns: u16,
    /// number of samples per pixel (1 or 3)
    pub samples_per_pixel: u16,
    /// bits allocated per sample
    pub bits_allocated: u16,
    /// bits effectively used per sample
    pub bits_stored: u16,
    /// sample signedness
    pub pixel_representation: PixelRepresentation,
    /// how multi-sample pixels are laid out
    pub planar_configuration: PlanarConfiguration,
    /// the colour model of the samples
    pub photometric_interpretation: PhotometricInterpretation,
    /// the number of frames in the pixel data
    pub number_of_frames: u32,
}

impl ImageGeometry {
    /// Collect the image geometry attributes of a data set.
    ///
    /// _Rows_, _Columns_ and _Bits Allocated_ are required.
    /// Absent attributes otherwise take the usual defaults:
    /// one sample per pixel, _Bits Stored_ equal to _Bits Allocated_,
    /// unsigned samples, interleaved planes, MONOCHROME2, one frame.
    pub fn from_data_set(set: &DataSet) -> DecodeResult<Self> {
        let rows = required_u16(set, tags::ROWS, "Rows")?;
        let columns = required_u16(set, tags::COLUMNS, "Columns")?;
        let bits_allocated = required_u16(set, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let samples_per_pixel =
            optional_u16(set, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?.unwrap_or(1);
        let bits_stored =
            optional_u16(set, tags::BITS_STORED, "BitsStored")?.unwrap_or(bits_allocated);

        ensure!(
            matches!(bits_allocated, 8 | 16 | 32),
            InvalidAttributeSnafu {
                name: "BitsAllocated",
                value: bits_allocated.to_string(),
            }
        );
        ensure!(
            bits_stored > 0 && bits_stored <= bits_allocated,
            InvalidAttributeSnafu {
                name: "BitsStored",
                value: bits_stored.to_string(),
            }
        );
        ensure!(
            matches!(samples_per_pixel, 1 | 3),
            InvalidAttributeSnafu {
                name: "SamplesPerPixel",
                value: samples_per_pixel.to_string(),
            }
        );

        let pixel_representation =
            match optional_u16(set, tags::PIXEL_REPRESENTATION, "PixelRepresentation")? {
                None | Some(0) => PixelRepresentation::Unsigned,
                Some(1) => PixelRepresentation::Signed,
                Some(p) => {
                    return InvalidAttributeSnafu {
                        name: "PixelRepresentation",
                        value: p.to_string(),
                    }
                    .fail()
                }
            };
        let planar_configuration =
            match optional_u16(set, tags::PLANAR_CONFIGURATION, "PlanarConfiguration")? {
                Some(1) if samples_per_pixel > 1 => PlanarConfiguration::PixelFirst,
                _ => PlanarConfiguration::Standard,
            };
        let photometric_interpretation = set
            .string(tags::PHOTOMETRIC_INTERPRETATION)
            .map(PhotometricInterpretation::from_term)
            .unwrap_or(if samples_per_pixel == 1 {
                PhotometricInterpretation::Monochrome2
            } else {
                PhotometricInterpretation::Rgb
            });

        Ok(ImageGeometry {
            rows,
            columns,
            samples_per_pixel,
            bits_allocated,
            bits_stored,
            pixel_representation,
            planar_configuration,
            photometric_interpretation,
            number_of_frames: number_of_frames(set)?,
        })
    }

    /// The number of pixels in one frame.
    pub fn pixels_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// The number of bytes used by each sample in the canonical layout.
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_allocated as usize / 8
    }

    /// The number of bytes of one frame in the canonical layout.
    pub fn frame_len(&self) -> usize {
        self.pixels_per_frame() * self.samples_per_pixel as usize * self.bytes_per_sample()
    }

    /// Whether samples are signed integers.
    pub fn is_signed(&self) -> bool {
        self.pixel_representation == PixelRepresentation::Signed
    }
}

/// Get the _Number of Frames_ of a data set,
/// returning 1 if it is not present.
pub fn number_of_frames(set: &DataSet) -> DecodeResult<u32> {
    let Some(element) = set.get(tags::NUMBER_OF_FRAMES) else {
        return Ok(1);
    };
    let value = element.to_str().unwrap_or_default();
    if value.trim().is_empty() {
        return Ok(1);
    }
    let frames = set
        .int::<i32>(tags::NUMBER_OF_FRAMES)
        .context(InvalidAttributeSnafu {
            name: "NumberOfFrames",
            value: value.to_string(),
        })?;
    ensure!(
        frames > 0,
        InvalidAttributeSnafu {
            name: "NumberOfFrames",
            value: frames.to_string(),
        }
    );
    Ok(frames as u32)
}

/// Get the _Rescale Slope_ of a data set, 1 if absent or invalid.
pub fn rescale_slope(set: &DataSet) -> f64 {
    set.f64(tags::RESCALE_SLOPE).unwrap_or(1.)
}

/// Get the _Rescale Intercept_ of a data set, 0 if absent or invalid.
pub fn rescale_intercept(set: &DataSet) -> f64 {
    set.f64(tags::RESCALE_INTERCEPT).unwrap_or(0.)
}

/// Retrieve the first _Window Center_ of a data set if it exists.
pub fn window_center(set: &DataSet) -> Option<f64> {
    set.f64(tags::WINDOW_CENTER)
}

/// Retrieve the first _Window Width_ of a data set if it exists.
pub fn window_width(set: &DataSet) -> Option<f64> {
    set.f64(tags::WINDOW_WIDTH)
}

fn required_u16(set: &DataSet, tag: Tag, name: &'static str) -> DecodeResult<u16> {
    optional_u16(set, tag, name)?.context(MissingAttributeSnafu { name })
}

fn optional_u16(set: &DataSet, tag: Tag, name: &'static str) -> DecodeResult<Option<u16>> {
    let Some(element) = set.get(tag) else {
        return Ok(None);
    };
    if element.value().multiplicity() == 0 {
        return Ok(None);
    }
    set.int::<u16>(tag).map(Some).context(InvalidAttributeSnafu {
        name,
        value: element.to_str().unwrap_or_default().into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicomview_core::dataset::DataElement;
    use dicomview_core::header::VR;
    use dicomview_core::value::PrimitiveValue;

    fn base() -> DataSet {
        vec![
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(3_u16)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn defaults_for_absent_attributes() {
        let geometry = ImageGeometry::from_data_set(&base()).unwrap();
        assert_eq!(geometry.samples_per_pixel, 1);
        assert_eq!(geometry.bits_stored, 16);
        assert_eq!(geometry.pixel_representation, PixelRepresentation::Unsigned);
        assert_eq!(
            geometry.photometric_interpretation,
            PhotometricInterpretation::Monochrome2
        );
        assert_eq!(geometry.number_of_frames, 1);
        assert_eq!(geometry.frame_len(), 4 * 3 * 2);
    }

    #[test]
    fn missing_rows() {
        let set: DataSet = base()
            .iter()
            .filter(|e| e.tag() != tags::ROWS)
            .cloned()
            .collect();
        let err = ImageGeometry::from_data_set(&set).unwrap_err();
        assert!(matches!(err, crate::DecodeError::MissingAttribute { name: "Rows", .. }));
    }

    #[test]
    fn number_of_frames_from_text() {
        let mut set = base();
        set.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from("12"),
        ));
        assert_eq!(number_of_frames(&set).unwrap(), 12);

        set.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from("0"),
        ));
        assert!(number_of_frames(&set).is_err());
    }

    #[test]
    fn bad_pixel_representation() {
        let mut set = base();
        set.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(2_u16),
        ));
        let err = ImageGeometry::from_data_set(&set).unwrap_err();
        assert!(matches!(
            err,
            crate::DecodeError::InvalidAttribute {
                name: "PixelRepresentation",
                ..
            }
        ));
    }
}
