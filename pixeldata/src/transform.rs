//! Display transforms: modality rescale, VOI windowing
//! and photometric correction,
//! turning decoded frames into 8-bit display buffers.

use crate::attribute::{self, ImageGeometry, PhotometricInterpretation, PixelRepresentation};
use crate::error::{InvalidWindowParametersSnafu, TransformError};
use crate::frame::DecodedFrame;
use crate::lut::{DisplayLut, MAX_LUT_BITS};
use dicomview_core::dataset::DataSet;
use snafu::ensure;
use tracing::warn;

/// The number of output levels of a display buffer.
const OUTPUT_RANGE: f64 = 256.;

/// Description of a modality rescale function,
/// defined by a _rescale slope_ and _rescale intercept_.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// the rescale slope
    pub slope: f64,
    /// the rescale intercept
    pub intercept: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Rescale::new(1., 0.)
    }
}

impl Rescale {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    /// Fetch the rescale function of a data set,
    /// slope 1 and intercept 0 when absent.
    pub fn from_data_set(set: &DataSet) -> Self {
        Rescale::new(
            attribute::rescale_slope(set),
            attribute::rescale_intercept(set),
        )
    }

    /// Apply the rescale function to a value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }
}

/// The parameters of a single window level
/// for a VOI LUT transformation,
/// comprising the window center and the window width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    /// The _Window Width_.
    ///
    /// Should be greater than 0
    pub width: f64,
    /// The _Window Center_.
    pub center: f64,
}

impl WindowLevel {
    /// Create a window level, checking that the width is positive.
    pub fn new(center: f64, width: f64) -> Result<Self, TransformError> {
        ensure!(
            width > 0. && width.is_finite() && center.is_finite(),
            InvalidWindowParametersSnafu { center, width }
        );
        Ok(WindowLevel { width, center })
    }

    /// The window covering the full range of sample values
    /// implied by _Bits Stored_ and _Pixel Representation_,
    /// after the given rescale.
    pub fn full_range(geometry: &ImageGeometry, rescale: Rescale) -> Self {
        let bits = i32::from(geometry.bits_stored);
        let (min, max) = match geometry.pixel_representation {
            PixelRepresentation::Unsigned => (0., 2f64.powi(bits) - 1.),
            PixelRepresentation::Signed => (-(2f64.powi(bits - 1)), 2f64.powi(bits - 1) - 1.),
        };
        let (min, max) = {
            let (a, b) = (rescale.apply(min), rescale.apply(max));
            (a.min(b), a.max(b))
        };
        let width = max - min + 1.;
        WindowLevel {
            width,
            center: min + width / 2.,
        }
    }

    /// Apply the linear window function on a rescaled value,
    /// into a display level between 0 and 255.
    ///
    /// Values at or below `center - width / 2` map to 0,
    /// values above `center + width / 2` map to 255,
    /// and values in between follow
    /// `((value - center) / width + 0.5) * 256`, rounded down.
    pub fn apply(&self, value: f64) -> f64 {
        let min = self.center - self.width / 2.;
        let max = self.center + self.width / 2.;
        let y_max = OUTPUT_RANGE - 1.;
        if value <= min {
            0.
        } else if value > max {
            y_max
        } else {
            (((value - self.center) / self.width + 0.5) * OUTPUT_RANGE)
                .floor()
                .clamp(0., y_max)
        }
    }
}

/// An 8-bit buffer ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    /// the number of columns
    pub width: u32,
    /// the number of rows
    pub height: u32,
    /// 1 for grayscale, 3 for RGB
    pub samples_per_pixel: u16,
    /// row-major, sample-interleaved display levels
    pub data: Vec<u8>,
}

/// Decide which window to apply to a grayscale frame.
///
/// An explicitly requested window takes precedence,
/// then the first window in the data set,
/// then the full range of the sample values.
pub fn resolve_window(
    set: &DataSet,
    geometry: &ImageGeometry,
    rescale: Rescale,
    requested: Option<WindowLevel>,
) -> Result<WindowLevel, TransformError> {
    if let Some(window) = requested {
        return WindowLevel::new(window.center, window.width);
    }
    match (attribute::window_center(set), attribute::window_width(set)) {
        (Some(center), Some(width)) => match WindowLevel::new(center, width) {
            Ok(window) => return Ok(window),
            Err(_) => warn!(
                "Ignoring invalid window (center {}, width {}), using the full range",
                center, width
            ),
        },
        (None, None) => {}
        _ => warn!("Incomplete window in data set, using the full range"),
    }
    Ok(WindowLevel::full_range(geometry, rescale))
}

/// Turn a decoded frame into an 8-bit display buffer.
///
/// Grayscale frames go through the modality rescale,
/// then the VOI window (see [`resolve_window`]),
/// then inversion if the photometric interpretation is MONOCHROME1.
/// Colour frames bypass these steps:
/// samples are only narrowed to 8 bits and converted to RGB.
pub fn to_display_buffer(
    frame: &DecodedFrame,
    set: &DataSet,
    window: Option<WindowLevel>,
) -> Result<DisplayBuffer, TransformError> {
    let geometry = &frame.geometry;
    if geometry.samples_per_pixel == 3 {
        return Ok(colour_display_buffer(frame));
    }
    if geometry.photometric_interpretation == PhotometricInterpretation::PaletteColor {
        warn!("Palette colour lookup is not supported, rendering indices as grayscale");
    }

    let rescale = Rescale::from_data_set(set);
    let window = resolve_window(set, geometry, rescale, window)?;
    let invert = geometry.photometric_interpretation == PhotometricInterpretation::Monochrome1;
    let signed = geometry.pixel_representation == PixelRepresentation::Signed;
    let count = frame.sample_count();

    let mut data: Vec<u8> = if geometry.bits_stored <= MAX_LUT_BITS {
        let lut = DisplayLut::for_window(geometry.bits_stored, signed, rescale, window);
        (0..count).map(|i| lut.get(frame.sample(i))).collect()
    } else {
        let bits = u32::from(geometry.bits_stored);
        (0..count)
            .map(|i| {
                let x = sample_value(frame.sample(i), bits, signed);
                window.apply(rescale.apply(x)) as u8
            })
            .collect()
    };

    if invert {
        data.iter_mut().for_each(|v| *v = 255 - *v);
    }

    Ok(DisplayBuffer {
        width: frame.width(),
        height: frame.height(),
        samples_per_pixel: 1,
        data,
    })
}

/// Interpret the low `bits` bits of a raw sample.
fn sample_value(raw: u32, bits: u32, signed: bool) -> f64 {
    let raw = if bits >= 32 { raw } else { raw & ((1 << bits) - 1) };
    if signed && bits < 32 && raw >= 1 << (bits - 1) {
        f64::from(raw) - 2f64.powi(bits as i32)
    } else if signed && bits >= 32 {
        f64::from(raw as i32)
    } else {
        f64::from(raw)
    }
}

fn colour_display_buffer(frame: &DecodedFrame) -> DisplayBuffer {
    let geometry = &frame.geometry;
    let shift = geometry.bits_stored.saturating_sub(8);
    let mut data: Vec<u8> = (0..frame.sample_count())
        .map(|i| (frame.sample(i) >> shift).min(255) as u8)
        .collect();
    match geometry.photometric_interpretation {
        PhotometricInterpretation::Rgb => {}
        PhotometricInterpretation::YbrFull | PhotometricInterpretation::YbrFull422 => {
            data.chunks_exact_mut(3).for_each(ybr_full_to_rgb);
        }
        ref other => warn!("Displaying {} samples as RGB", other),
    }
    DisplayBuffer {
        width: frame.width(),
        height: frame.height(),
        samples_per_pixel: 3,
        data,
    }
}

/// Convert one YBR_FULL pixel to RGB in place.
fn ybr_full_to_rgb(pixel: &mut [u8]) {
    let y = f64::from(pixel[0]);
    let cb = f64::from(pixel[1]) - 128.;
    let cr = f64::from(pixel[2]) - 128.;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    for (out, v) in pixel.iter_mut().zip([r, g, b]) {
        *out = v.round().clamp(0., 255.) as u8;
    }
}
