//! Stream chains.
//!
//! ```text
//! producer ──► VideoStreamWriter ──► [AsyncVideoStream] ──► [EncodingVideoStream] ──► AviVideoStream ──► AviWriter
//!                 (validation)        (ordered worker)        (codec)                  (chunk append)
//! ```
//!
//! Every layer exposes the same sink capability and holds the next one, so chains
//! compose to any depth without a class hierarchy.

use crate::error::Result;

pub mod async_wrapper;
pub mod encoding;
pub mod handle;

pub use async_wrapper::{AsyncAudioStream, AsyncVideoStream};
pub use encoding::{EncodingAudioStream, EncodingVideoStream};
pub use handle::{AudioStreamInfo, AudioStreamWriter, VideoStreamInfo, VideoStreamWriter};

/// Accepts already validated video units.
pub trait VideoStreamSink: Send + 'static {
    fn write_frame(&mut self, is_key_frame: bool, frame: &[u8]) -> Result<()>;

    /// Ends the stream; may write one last unit synchronously.
    fn finish_writing(&mut self) -> Result<()>;
}

/// Accepts already validated audio units.
pub trait AudioStreamSink: Send + 'static {
    fn write_block(&mut self, block: &[u8]) -> Result<()>;

    fn finish_writing(&mut self) -> Result<()>;
}

impl<T: VideoStreamSink + ?Sized> VideoStreamSink for Box<T> {
    fn write_frame(&mut self, is_key_frame: bool, frame: &[u8]) -> Result<()> {
        (**self).write_frame(is_key_frame, frame)
    }

    fn finish_writing(&mut self) -> Result<()> {
        (**self).finish_writing()
    }
}

impl<T: AudioStreamSink + ?Sized> AudioStreamSink for Box<T> {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        (**self).write_block(block)
    }

    fn finish_writing(&mut self) -> Result<()> {
        (**self).finish_writing()
    }
}
