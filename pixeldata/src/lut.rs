//! Display look-up tables.
//!
//! A [`DisplayLut`] holds the 8-bit display value
//! of every stored sample value of a frame,
//! so that rescale and window are evaluated once per possible value
//! rather than once per pixel.

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::transform::{Rescale, WindowLevel};

/// The widest stored sample for which a table is built.
pub const MAX_LUT_BITS: u16 = 16;

/// Display values indexed by stored sample value.
///
/// ```
/// # use dicomview_pixeldata::{DisplayLut, Rescale, WindowLevel};
/// let lut = DisplayLut::for_window(
///     12,
///     false,
///     Rescale::new(1., -1024.),
///     WindowLevel { width: 400., center: 40. },
/// );
/// assert_eq!(lut.get(1024 + 40), 128);
/// ```
#[derive(Debug, Clone)]
pub struct DisplayLut {
    /// `2^bits_stored` entries; for signed samples the upper half
    /// holds the negative values in two's complement order
    table: Vec<u8>,
}

impl DisplayLut {
    /// Build a table from a mapping of stored values to display values.
    ///
    /// `bits_stored` is clamped to `1..=MAX_LUT_BITS`.
    /// The mapping may run concurrently.
    pub fn from_fn(bits_stored: u16, signed: bool, f: impl Fn(f64) -> u8 + Sync) -> Self {
        let bits = bits_stored.clamp(1, MAX_LUT_BITS);
        let size = 1_usize << bits;
        let half = size / 2;
        let entry = |i: usize| {
            let x = if signed && i >= half {
                i as f64 - size as f64
            } else {
                i as f64
            };
            f(x)
        };

        #[cfg(feature = "rayon")]
        let table = (0..size).into_par_iter().map(entry).collect();
        #[cfg(not(feature = "rayon"))]
        let table = (0..size).map(entry).collect();

        DisplayLut { table }
    }

    /// The table of a modality rescale followed by a linear window.
    pub fn for_window(bits_stored: u16, signed: bool, rescale: Rescale, window: WindowLevel) -> Self {
        Self::from_fn(bits_stored, signed, |v| window.apply(rescale.apply(v)) as u8)
    }

    /// The display value of a raw sample.
    /// Bits above Bits Stored are ignored.
    #[inline]
    pub fn get(&self, raw: u32) -> u8 {
        self.table[raw as usize & (self.table.len() - 1)]
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
