use std::{
    io::{Seek, Write},
    sync::{Arc, Mutex},
};

use crate::{
    avi::{
        file::{AviFile, StreamFormat},
        stream::{AviAudioStream, AviVideoStream, SharedFile, lock_file},
    },
    codec::{AudioEncoder, BitsPerPixel, VideoEncoder, audio_formats},
    config::WriterConfig,
    error::{Error, Result},
    fourcc::FourCC,
    stream::{
        AudioStreamInfo, AudioStreamSink, AudioStreamWriter, EncodingAudioStream,
        EncodingVideoStream, VideoStreamInfo, VideoStreamSink, VideoStreamWriter,
    },
};

enum StreamHandle {
    Video(Arc<VideoStreamWriter>),
    Audio(Arc<AudioStreamWriter>),
}

impl StreamHandle {
    fn finish_writing(&self) -> Result<()> {
        match self {
            StreamHandle::Video(stream) => stream.finish_writing(),
            StreamHandle::Audio(stream) => stream.finish_writing(),
        }
    }
}

/// AVI 1.0 writer multiplexing any number of video and audio streams into one target.
///
/// Streams are added up front; the headers go out with the first chunk of any
/// stream. [`close`](Self::close) must be called to produce a valid file.
pub struct AviWriter<W: Write + Seek + Send + 'static> {
    file: SharedFile<W>,
    streams: Vec<StreamHandle>,
    closed: bool,
}

impl<W: Write + Seek + Send + 'static> AviWriter<W> {
    pub fn new(target: W, config: WriterConfig) -> Result<Self> {
        log::info!(
            "creating AVI writer at {} fps, index {}",
            config.frames_per_second,
            if config.emit_index1 { "on" } else { "off" }
        );
        let file = AviFile::new(target, config)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: AviFile<W>) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
            streams: Vec::new(),
            closed: false,
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Stream whose frames are stored exactly as written.
    pub fn add_video_stream(
        &mut self,
        width: u32,
        height: u32,
        bits_per_pixel: BitsPerPixel,
        codec: FourCC,
        async_writes: bool,
    ) -> Result<Arc<VideoStreamWriter>> {
        let info = self.register_video(width, height, bits_per_pixel, codec)?;
        let sink = AviVideoStream::new(info.index, self.file.clone());
        self.attach_video(info, Box::new(sink), async_writes)
    }

    /// Stream whose BGR32 frames run through `encoder` before they are stored.
    pub fn add_encoding_video_stream<E: VideoEncoder + 'static>(
        &mut self,
        encoder: E,
        async_writes: bool,
        width: u32,
        height: u32,
    ) -> Result<Arc<VideoStreamWriter>> {
        let info = self.register_video(width, height, encoder.bits_per_pixel(), encoder.codec())?;
        let sink = AviVideoStream::new(info.index, self.file.clone());
        let encoding = EncodingVideoStream::new(encoder, sink);
        self.attach_video(info, Box::new(encoding), async_writes)
    }

    /// PCM stream whose blocks are stored exactly as written.
    pub fn add_audio_stream(
        &mut self,
        channel_count: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        async_writes: bool,
    ) -> Result<Arc<AudioStreamWriter>> {
        if channel_count == 0 || sample_rate == 0 || bits_per_sample == 0 || bits_per_sample % 8 != 0 {
            return Err(Error::argument(format!(
                "invalid PCM format: {} channels, {} Hz, {} bits",
                channel_count, sample_rate, bits_per_sample
            )));
        }
        let granularity = channel_count
            .checked_mul(bits_per_sample / 8)
            .ok_or_else(|| Error::argument("PCM block alignment overflows"))?;
        let bytes_per_second = sample_rate
            .checked_mul(granularity as u32)
            .ok_or_else(|| Error::argument("PCM byte rate overflows"))?;
        let info = self.register_audio(StreamFormat::Audio {
            channel_count,
            sample_rate,
            bits_per_sample,
            format: audio_formats::PCM,
            bytes_per_second,
            granularity,
            format_data: Vec::new(),
        })?;
        let sink = AviAudioStream::new(info.index, self.file.clone());
        self.attach_audio(info, Box::new(sink), async_writes)
    }

    /// Stream whose PCM blocks run through `encoder` before they are stored.
    pub fn add_encoding_audio_stream<E: AudioEncoder + 'static>(
        &mut self,
        encoder: E,
        async_writes: bool,
    ) -> Result<Arc<AudioStreamWriter>> {
        let info = self.register_audio(StreamFormat::Audio {
            channel_count: encoder.channel_count(),
            sample_rate: encoder.sample_rate(),
            bits_per_sample: encoder.bits_per_sample(),
            format: encoder.format(),
            bytes_per_second: encoder.bytes_per_second(),
            granularity: encoder.granularity(),
            format_data: encoder.format_specific_data(),
        })?;
        let sink = AviAudioStream::new(info.index, self.file.clone());
        let encoding = EncodingAudioStream::new(encoder, sink);
        self.attach_audio(info, Box::new(encoding), async_writes)
    }

    /// Names a stream in its `strn` chunk. Only possible before the first write.
    pub fn set_stream_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        lock_file(&self.file)?.set_stream_name(index, name.into())
    }

    /// Finishes every stream, then completes the file and returns the target.
    ///
    /// All streams are finished even when one fails; the first failure is returned
    /// after the file was completed.
    pub fn close(mut self) -> Result<W> {
        let mut first_error = None;
        for stream in &self.streams {
            if let Err(e) = stream.finish_writing() {
                log::error!("failed to finish stream: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.closed = true;
        let target = lock_file(&self.file)?.close()?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(target),
        }
    }

    fn register_video(
        &mut self,
        width: u32,
        height: u32,
        bits_per_pixel: BitsPerPixel,
        codec: FourCC,
    ) -> Result<VideoStreamInfo> {
        if width == 0 || height == 0 {
            return Err(Error::argument(format!(
                "frame size must be positive, got {}x{}",
                width, height
            )));
        }
        let index = lock_file(&self.file)?.add_stream(StreamFormat::Video {
            width,
            height,
            bits_per_pixel,
            codec,
        })?;
        Ok(VideoStreamInfo {
            index,
            width,
            height,
            codec,
            bits_per_pixel,
        })
    }

    fn register_audio(&mut self, format: StreamFormat) -> Result<AudioStreamInfo> {
        let StreamFormat::Audio {
            channel_count,
            sample_rate,
            bits_per_sample,
            format: format_tag,
            ..
        } = format
        else {
            return Err(Error::argument("expected an audio format"));
        };
        let index = lock_file(&self.file)?.add_stream(format)?;
        Ok(AudioStreamInfo {
            index,
            channel_count,
            sample_rate,
            bits_per_sample,
            format: format_tag,
        })
    }

    fn attach_video(
        &mut self,
        info: VideoStreamInfo,
        sink: Box<dyn VideoStreamSink>,
        async_writes: bool,
    ) -> Result<Arc<VideoStreamWriter>> {
        let writer = if async_writes {
            VideoStreamWriter::asynchronous(info, sink)?
        } else {
            VideoStreamWriter::direct(info, sink)
        };
        let writer = Arc::new(writer);
        self.streams.push(StreamHandle::Video(writer.clone()));
        Ok(writer)
    }

    fn attach_audio(
        &mut self,
        info: AudioStreamInfo,
        sink: Box<dyn AudioStreamSink>,
        async_writes: bool,
    ) -> Result<Arc<AudioStreamWriter>> {
        let writer = if async_writes {
            AudioStreamWriter::asynchronous(info, sink)?
        } else {
            AudioStreamWriter::direct(info, sink)
        };
        let writer = Arc::new(writer);
        self.streams.push(StreamHandle::Audio(writer.clone()));
        Ok(writer)
    }
}

impl<W: Write + Seek + Send + 'static> Drop for AviWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("AVI writer dropped without close; the output is incomplete");
        }
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
