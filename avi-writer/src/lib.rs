//! Multiplexed AVI writer with ordered asynchronous stream chains.
//!
//! Each track is a chain of sinks: an optional encoder, an optional async wrapper
//! running on its own worker, and the shared container sink at the end. Writes to
//! one track complete in submission order, whether they were submitted blocking or
//! not; the container interleaves chunks of all tracks under one lock.

pub mod avi;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod fourcc;
pub mod invoker;
pub mod native;
pub mod stream;

#[cfg(test)]
mod test_helpers;

pub use avi::AviWriter;
pub use codec::{AudioCodec, AudioEncoder, BitsPerPixel, EncodedFrame, VideoCodec, VideoEncoder};
pub use config::{RecorderConfig, WriterConfig};
pub use error::{Error, Result};
pub use fourcc::FourCC;
pub use invoker::{Invocation, SequentialInvoker};
pub use native::NativeLibraries;
pub use stream::{AudioStreamWriter, VideoStreamWriter};
