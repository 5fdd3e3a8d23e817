use std::sync::{Arc, Mutex};

use crate::{
    codec::{BitsPerPixel, EncodedFrame, VideoEncoder},
    error::{Error, Result},
    fourcc::FourCC,
};

/// Serializes every call into an encoder that must not be re-entered concurrently.
///
/// Clones share the same encoder instance, so one native codec session can be handed
/// to several owners while only one of them encodes at a time.
#[derive(Clone)]
pub struct SingleThreadedVideoEncoder {
    inner: Arc<Mutex<Box<dyn VideoEncoder>>>,
    codec: FourCC,
    bits_per_pixel: BitsPerPixel,
    max_encoded_size: usize,
}

impl SingleThreadedVideoEncoder {
    /// Builds the wrapped encoder through `factory`; its descriptor is read once here.
    pub fn new<F>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn VideoEncoder>>,
    {
        let encoder = factory()?;
        Ok(Self {
            codec: encoder.codec(),
            bits_per_pixel: encoder.bits_per_pixel(),
            max_encoded_size: encoder.max_encoded_size(),
            inner: Arc::new(Mutex::new(encoder)),
        })
    }
}

impl VideoEncoder for SingleThreadedVideoEncoder {
    fn codec(&self) -> FourCC {
        self.codec
    }

    fn bits_per_pixel(&self) -> BitsPerPixel {
        self.bits_per_pixel
    }

    fn max_encoded_size(&self) -> usize {
        self.max_encoded_size
    }

    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame> {
        let mut encoder = self
            .inner
            .lock()
            .map_err(|_| Error::Encoder(anyhow::anyhow!("encoder poisoned by an earlier panic")))?;
        encoder.encode_frame(source, destination)
    }
}
