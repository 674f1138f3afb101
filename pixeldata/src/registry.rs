//! The codec registry: a dispatch table from transfer syntax UID
//! to frame decoder.

use crate::adapters::jpeg2k::{Jpeg2000Adapter, Jpeg2000Codec};
use crate::adapters::native::NativeAdapter;
use crate::attribute::ImageGeometry;
use crate::error::DecodeResult;
use crate::frame::DecodedFrame;
use dicomview_core::transfer_syntax::{self, trim_uid, Codec};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A decoder of single frames.
///
/// The input is the complete byte stream of one frame:
/// the reassembled fragments of encapsulated pixel data,
/// or the frame's little endian samples in native pixel data.
/// The output is always in the canonical layout:
/// row-major, sample-interleaved,
/// with little endian samples of _Bits Allocated_ width.
pub trait FrameDecoder: Send + Sync + fmt::Debug {
    /// Decode the bytes of a single frame.
    fn decode(&self, data: &[u8], geometry: &ImageGeometry) -> DecodeResult<DecodedFrame>;
}

/// A mapping from transfer syntax UIDs to frame decoders.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    decoders: HashMap<String, Arc<dyn FrameDecoder>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut uids: Vec<_> = self.decoders.keys().collect();
        uids.sort();
        f.debug_struct("CodecRegistry").field("uids", &uids).finish()
    }
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all decoders built into this crate,
    /// as enabled by the crate's features.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let native = Arc::new(NativeAdapter);
        for ts in transfer_syntax::ENTRIES {
            match ts.codec() {
                Codec::None => registry.register_arc(ts.uid(), native.clone()),
                #[cfg(feature = "rle")]
                Codec::Rle => {
                    registry.register(ts.uid(), crate::adapters::rle_lossless::RleLosslessAdapter)
                }
                #[cfg(feature = "jpeg")]
                Codec::JpegBaseline | Codec::JpegExtended | Codec::JpegLossless => {
                    registry.register(ts.uid(), crate::adapters::jpeg::JpegAdapter)
                }
                _ => {}
            }
        }
        #[cfg(feature = "jpeg2k")]
        {
            registry = registry.with_jpeg2000(crate::adapters::jpeg2k::OpenJpeg2000);
        }
        registry
    }

    /// Register the decoder for the given transfer syntax,
    /// replacing any decoder registered before.
    pub fn register(&mut self, uid: &str, decoder: impl FrameDecoder + 'static) {
        self.register_arc(uid, Arc::new(decoder));
    }

    fn register_arc(&mut self, uid: &str, decoder: Arc<dyn FrameDecoder>) {
        debug!("Registering {:?} for {}", decoder, uid);
        self.decoders.insert(trim_uid(uid).to_string(), decoder);
    }

    /// Register an external JPEG 2000 codec
    /// for both JPEG 2000 transfer syntaxes.
    pub fn with_jpeg2000(mut self, codec: impl Jpeg2000Codec + 'static) -> Self {
        let adapter = Arc::new(Jpeg2000Adapter::new(codec));
        for ts in transfer_syntax::ENTRIES {
            if ts.codec() == Codec::Jpeg2000 {
                self.register_arc(ts.uid(), adapter.clone());
            }
        }
        self
    }

    /// Look up the decoder for the given transfer syntax.
    pub fn get(&self, uid: &str) -> Option<&dyn FrameDecoder> {
        self.decoders.get(trim_uid(uid)).map(|d| &**d)
    }

    /// Whether a decoder is registered for the given transfer syntax.
    pub fn supports(&self, uid: &str) -> bool {
        self.decoders.contains_key(trim_uid(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicomview_core::transfer_syntax::{
        EXPLICIT_VR_BIG_ENDIAN, JPEG_2000_IMAGE_COMPRESSION, JPEG_LS_LOSSLESS_IMAGE_COMPRESSION, RLE_LOSSLESS,
    };

    #[test]
    fn standard_registry() {
        let registry = CodecRegistry::standard();
        assert!(registry.supports(EXPLICIT_VR_BIG_ENDIAN.uid()));
        assert!(registry.supports("1.2.840.10008.1.2\0"));
        assert_eq!(registry.supports(RLE_LOSSLESS.uid()), cfg!(feature = "rle"));
        assert!(!registry.supports(JPEG_LS_LOSSLESS_IMAGE_COMPRESSION.uid()));
        assert_eq!(
            registry.supports(JPEG_2000_IMAGE_COMPRESSION.uid()),
            cfg!(feature = "jpeg2k")
        );
    }
}
