//! Frame decoders for each family of transfer syntaxes.

#[cfg(feature = "jpeg")]
pub mod jpeg;
pub mod jpeg2k;
pub mod native;
#[cfg(feature = "rle")]
pub mod rle_lossless;
