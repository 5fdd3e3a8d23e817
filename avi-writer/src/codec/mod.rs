//! Codec contract shared by every encoder the writer can drive.
//!
//! Encoders are pure transforms: no I/O, deterministic for identical input and state.
//! The caller sizes the destination from `max_encoded_size` / `max_encoded_length`
//! before encoding; writing past that bound is a defect in the encoder.

use crate::{error::Result, fourcc::FourCC};

pub mod mjpeg;
pub mod mp3;
pub mod single_threaded;
pub mod uncompressed;

pub use mjpeg::MotionJpegVideoEncoder;
pub use mp3::{LameFacade, Mp3LameAudioEncoder};
pub use single_threaded::SingleThreadedVideoEncoder;
pub use uncompressed::UncompressedVideoEncoder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitsPerPixel {
    Bpp8 = 8,
    Bpp16 = 16,
    Bpp24 = 24,
    Bpp32 = 32,
}

impl BitsPerPixel {
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// Result of encoding one video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    pub length: usize,
    pub is_key_frame: bool,
}

/// WAVE format tags written into the audio stream format.
pub mod audio_formats {
    pub const UNKNOWN: u16 = 0x0000;
    pub const PCM: u16 = 0x0001;
    pub const MP3: u16 = 0x0055;
}

pub trait VideoEncoder: Send {
    fn codec(&self) -> FourCC;

    fn bits_per_pixel(&self) -> BitsPerPixel;

    /// Upper bound on the encoded size of one frame.
    fn max_encoded_size(&self) -> usize;

    /// Encodes one BGR32 top-down frame into `destination`.
    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame>;
}

pub trait AudioEncoder: Send {
    fn channel_count(&self) -> u16;

    fn sample_rate(&self) -> u32;

    fn bits_per_sample(&self) -> u16;

    fn format(&self) -> u16;

    fn bytes_per_second(&self) -> u32;

    /// Size of the minimal addressable unit of encoded data.
    fn granularity(&self) -> u16;

    /// Extra bytes appended to the WAVE format header.
    fn format_specific_data(&self) -> Vec<u8>;

    /// Upper bound on the encoded size of `source_len` bytes of input.
    fn max_encoded_length(&self, source_len: usize) -> usize;

    /// Encodes one block; may return 0 when the encoder only buffered the input.
    fn encode_block(&mut self, source: &[u8], destination: &mut [u8]) -> Result<usize>;

    /// Emits whatever the encoder still buffers. Called once, after the last block.
    fn flush(&mut self, destination: &mut [u8]) -> Result<usize>;
}

impl<T: VideoEncoder + ?Sized> VideoEncoder for Box<T> {
    fn codec(&self) -> FourCC {
        (**self).codec()
    }

    fn bits_per_pixel(&self) -> BitsPerPixel {
        (**self).bits_per_pixel()
    }

    fn max_encoded_size(&self) -> usize {
        (**self).max_encoded_size()
    }

    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame> {
        (**self).encode_frame(source, destination)
    }
}

/// Video encoder selected when a stream is built. The pipeline only matches on the
/// variant; platform specifics live in `Custom` implementations.
pub enum VideoCodec {
    Uncompressed(UncompressedVideoEncoder),
    MotionJpeg(MotionJpegVideoEncoder),
    SingleThreaded(SingleThreadedVideoEncoder),
    Custom(Box<dyn VideoEncoder>),
}

impl VideoCodec {
    fn as_encoder(&self) -> &dyn VideoEncoder {
        match self {
            VideoCodec::Uncompressed(e) => e,
            VideoCodec::MotionJpeg(e) => e,
            VideoCodec::SingleThreaded(e) => e,
            VideoCodec::Custom(e) => e.as_ref(),
        }
    }

    fn as_encoder_mut(&mut self) -> &mut dyn VideoEncoder {
        match self {
            VideoCodec::Uncompressed(e) => e,
            VideoCodec::MotionJpeg(e) => e,
            VideoCodec::SingleThreaded(e) => e,
            VideoCodec::Custom(e) => e.as_mut(),
        }
    }
}

impl VideoEncoder for VideoCodec {
    fn codec(&self) -> FourCC {
        self.as_encoder().codec()
    }

    fn bits_per_pixel(&self) -> BitsPerPixel {
        self.as_encoder().bits_per_pixel()
    }

    fn max_encoded_size(&self) -> usize {
        self.as_encoder().max_encoded_size()
    }

    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame> {
        self.as_encoder_mut().encode_frame(source, destination)
    }
}

impl From<UncompressedVideoEncoder> for VideoCodec {
    fn from(encoder: UncompressedVideoEncoder) -> Self {
        VideoCodec::Uncompressed(encoder)
    }
}

impl From<MotionJpegVideoEncoder> for VideoCodec {
    fn from(encoder: MotionJpegVideoEncoder) -> Self {
        VideoCodec::MotionJpeg(encoder)
    }
}

impl From<SingleThreadedVideoEncoder> for VideoCodec {
    fn from(encoder: SingleThreadedVideoEncoder) -> Self {
        VideoCodec::SingleThreaded(encoder)
    }
}

/// Audio encoder selected when a stream is built.
pub enum AudioCodec {
    Mp3(Mp3LameAudioEncoder<Box<dyn LameFacade>>),
    Custom(Box<dyn AudioEncoder>),
}

impl AudioCodec {
    fn as_encoder(&self) -> &dyn AudioEncoder {
        match self {
            AudioCodec::Mp3(e) => e,
            AudioCodec::Custom(e) => e.as_ref(),
        }
    }

    fn as_encoder_mut(&mut self) -> &mut dyn AudioEncoder {
        match self {
            AudioCodec::Mp3(e) => e,
            AudioCodec::Custom(e) => e.as_mut(),
        }
    }
}

impl AudioEncoder for AudioCodec {
    fn channel_count(&self) -> u16 {
        self.as_encoder().channel_count()
    }

    fn sample_rate(&self) -> u32 {
        self.as_encoder().sample_rate()
    }

    fn bits_per_sample(&self) -> u16 {
        self.as_encoder().bits_per_sample()
    }

    fn format(&self) -> u16 {
        self.as_encoder().format()
    }

    fn bytes_per_second(&self) -> u32 {
        self.as_encoder().bytes_per_second()
    }

    fn granularity(&self) -> u16 {
        self.as_encoder().granularity()
    }

    fn format_specific_data(&self) -> Vec<u8> {
        self.as_encoder().format_specific_data()
    }

    fn max_encoded_length(&self, source_len: usize) -> usize {
        self.as_encoder().max_encoded_length(source_len)
    }

    fn encode_block(&mut self, source: &[u8], destination: &mut [u8]) -> Result<usize> {
        self.as_encoder_mut().encode_block(source, destination)
    }

    fn flush(&mut self, destination: &mut [u8]) -> Result<usize> {
        self.as_encoder_mut().flush(destination)
    }
}

impl From<Mp3LameAudioEncoder<Box<dyn LameFacade>>> for AudioCodec {
    fn from(encoder: Mp3LameAudioEncoder<Box<dyn LameFacade>>) -> Self {
        AudioCodec::Mp3(encoder)
    }
}
