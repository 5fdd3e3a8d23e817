use std::{
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;

use crate::{
    codec::BitsPerPixel,
    error::{Error, Result, unit_range},
    fourcc::FourCC,
    invoker::Invocation,
    stream::{AsyncAudioStream, AsyncVideoStream, AudioStreamSink, VideoStreamSink},
};

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub codec: FourCC,
    pub bits_per_pixel: BitsPerPixel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub format: u16,
}

enum VideoChain {
    Direct(Mutex<Box<dyn VideoStreamSink>>),
    Async(AsyncVideoStream<Box<dyn VideoStreamSink>>),
}

/// Producer-facing surface of one video track.
pub struct VideoStreamWriter {
    info: VideoStreamInfo,
    chain: VideoChain,
    finished: AtomicBool,
}

impl fmt::Debug for VideoStreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoStreamWriter")
            .field("info", &self.info)
            .field("async", &self.supports_async_writes())
            .field("finished", &self.finished.load(Ordering::SeqCst))
            .finish()
    }
}

impl VideoStreamWriter {
    pub(crate) fn direct(info: VideoStreamInfo, sink: Box<dyn VideoStreamSink>) -> Self {
        Self {
            info,
            chain: VideoChain::Direct(Mutex::new(sink)),
            finished: AtomicBool::new(false),
        }
    }

    pub(crate) fn asynchronous(info: VideoStreamInfo, sink: Box<dyn VideoStreamSink>) -> Result<Self> {
        let name = format!("video-{}", info.index);
        Ok(Self {
            info,
            chain: VideoChain::Async(AsyncVideoStream::new(&name, sink)?),
            finished: AtomicBool::new(false),
        })
    }

    pub fn info(&self) -> &VideoStreamInfo {
        &self.info
    }

    pub fn supports_async_writes(&self) -> bool {
        matches!(self.chain, VideoChain::Async(_))
    }

    /// Writes `data[start..start + length]` and returns once it reached the container.
    pub fn write_frame(&self, is_key_frame: bool, data: &[u8], start: usize, length: usize) -> Result<()> {
        match &self.chain {
            VideoChain::Direct(sink) => {
                let frame = unit_range(data, start, length)?;
                self.ensure_open()?;
                lock_sink(sink)?.write_frame(is_key_frame, frame)
            }
            VideoChain::Async(stream) => stream.write_frame(is_key_frame, data, start, length),
        }
    }

    pub fn write_frame_async(
        &self,
        is_key_frame: bool,
        data: &[u8],
        start: usize,
        length: usize,
    ) -> Result<Invocation> {
        match &self.chain {
            VideoChain::Direct(_) => Err(Error::state(format!(
                "video stream {} was created without async writes",
                self.info.index
            ))),
            VideoChain::Async(stream) => stream.write_frame_async(is_key_frame, data, start, length),
        }
    }

    pub fn write_frame_bytes_async(&self, is_key_frame: bool, frame: Bytes) -> Result<Invocation> {
        match &self.chain {
            VideoChain::Direct(_) => Err(Error::state(format!(
                "video stream {} was created without async writes",
                self.info.index
            ))),
            VideoChain::Async(stream) => stream.write_frame_bytes_async(is_key_frame, frame),
        }
    }

    /// Flushes every pending write and ends the track. Later calls are no-ops.
    pub fn finish_writing(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::debug!("finishing video stream {}", self.info.index);
        match &self.chain {
            VideoChain::Direct(sink) => lock_sink(sink)?.finish_writing(),
            VideoChain::Async(stream) => stream.finish_writing(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(Error::state("stream has finished writing"));
        }
        Ok(())
    }
}

enum AudioChain {
    Direct(Mutex<Box<dyn AudioStreamSink>>),
    Async(AsyncAudioStream<Box<dyn AudioStreamSink>>),
}

/// Producer-facing surface of one audio track.
pub struct AudioStreamWriter {
    info: AudioStreamInfo,
    chain: AudioChain,
    finished: AtomicBool,
}

impl fmt::Debug for AudioStreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStreamWriter")
            .field("info", &self.info)
            .field("async", &self.supports_async_writes())
            .field("finished", &self.finished.load(Ordering::SeqCst))
            .finish()
    }
}

impl AudioStreamWriter {
    pub(crate) fn direct(info: AudioStreamInfo, sink: Box<dyn AudioStreamSink>) -> Self {
        Self {
            info,
            chain: AudioChain::Direct(Mutex::new(sink)),
            finished: AtomicBool::new(false),
        }
    }

    pub(crate) fn asynchronous(info: AudioStreamInfo, sink: Box<dyn AudioStreamSink>) -> Result<Self> {
        let name = format!("audio-{}", info.index);
        Ok(Self {
            info,
            chain: AudioChain::Async(AsyncAudioStream::new(&name, sink)?),
            finished: AtomicBool::new(false),
        })
    }

    pub fn info(&self) -> &AudioStreamInfo {
        &self.info
    }

    pub fn supports_async_writes(&self) -> bool {
        matches!(self.chain, AudioChain::Async(_))
    }

    pub fn write_block(&self, data: &[u8], start: usize, length: usize) -> Result<()> {
        match &self.chain {
            AudioChain::Direct(sink) => {
                let block = unit_range(data, start, length)?;
                self.ensure_open()?;
                lock_sink(sink)?.write_block(block)
            }
            AudioChain::Async(stream) => stream.write_block(data, start, length),
        }
    }

    pub fn write_block_async(&self, data: &[u8], start: usize, length: usize) -> Result<Invocation> {
        match &self.chain {
            AudioChain::Direct(_) => Err(Error::state(format!(
                "audio stream {} was created without async writes",
                self.info.index
            ))),
            AudioChain::Async(stream) => stream.write_block_async(data, start, length),
        }
    }

    pub fn write_block_bytes_async(&self, block: Bytes) -> Result<Invocation> {
        match &self.chain {
            AudioChain::Direct(_) => Err(Error::state(format!(
                "audio stream {} was created without async writes",
                self.info.index
            ))),
            AudioChain::Async(stream) => stream.write_block_bytes_async(block),
        }
    }

    pub fn finish_writing(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::debug!("finishing audio stream {}", self.info.index);
        match &self.chain {
            AudioChain::Direct(sink) => lock_sink(sink)?.finish_writing(),
            AudioChain::Async(stream) => stream.finish_writing(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(Error::state("stream has finished writing"));
        }
        Ok(())
    }
}

fn lock_sink<T: ?Sized>(sink: &Mutex<Box<T>>) -> Result<std::sync::MutexGuard<'_, Box<T>>> {
    sink.lock()
        .map_err(|_| Error::state("stream poisoned by an earlier panic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fourcc::codec_ids,
        test_helpers::{RecordingSink, SinkEvent},
    };

    fn video_info() -> VideoStreamInfo {
        VideoStreamInfo {
            index: 0,
            width: 2,
            height: 2,
            codec: codec_ids::UNCOMPRESSED,
            bits_per_pixel: BitsPerPixel::Bpp24,
        }
    }

    #[test]
    fn test_direct_stream_rejects_async_writes() -> anyhow::Result<()> {
        let sink = RecordingSink::default();
        let writer = VideoStreamWriter::direct(video_info(), Box::new(sink.clone()));
        assert!(!writer.supports_async_writes());
        assert!(matches!(
            writer.write_frame_async(true, &[1], 0, 1),
            Err(Error::InvalidState(_))
        ));
        writer.write_frame(false, &[0, 1, 2], 1, 2)?;
        assert_eq!(
            sink.events(),
            vec![SinkEvent::Frame {
                is_key_frame: false,
                data: vec![1, 2]
            }]
        );
        Ok(())
    }

    #[test]
    fn test_direct_stream_validates_before_writing() {
        let sink = RecordingSink::default();
        let writer = VideoStreamWriter::direct(video_info(), Box::new(sink.clone()));
        assert!(writer.write_frame(true, &[1, 2], 1, 2).unwrap_err().is_argument());
        assert!(writer.write_frame(true, &[1, 2], 0, 0).unwrap_err().is_argument());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_finish_is_idempotent_and_closes_the_stream() -> anyhow::Result<()> {
        let sink = RecordingSink::default();
        let info = AudioStreamInfo {
            index: 1,
            channel_count: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            format: crate::codec::audio_formats::PCM,
        };
        let writer = AudioStreamWriter::asynchronous(info, Box::new(sink.clone()))?;
        writer.write_block(&[1, 0], 0, 2)?;
        writer.finish_writing()?;
        writer.finish_writing()?;
        assert!(matches!(
            writer.write_block(&[1, 0], 0, 2),
            Err(Error::InvalidState(_))
        ));
        assert_eq!(
            sink.events(),
            vec![SinkEvent::Block(vec![1, 0]), SinkEvent::Finished]
        );
        Ok(())
    }
}
