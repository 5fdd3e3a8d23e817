use crate::{
    codec::{AudioEncoder, VideoEncoder},
    error::{Error, Result},
    stream::{AudioStreamSink, VideoStreamSink},
};

/// Encodes every frame before handing it to the inner sink.
pub struct EncodingVideoStream<E: VideoEncoder, S: VideoStreamSink> {
    encoder: E,
    inner: S,
    buffer: Vec<u8>,
}

impl<E: VideoEncoder, S: VideoStreamSink> EncodingVideoStream<E, S> {
    pub fn new(encoder: E, inner: S) -> Self {
        let buffer = vec![0; encoder.max_encoded_size()];
        Self {
            encoder,
            inner,
            buffer,
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

impl<E: VideoEncoder + 'static, S: VideoStreamSink> VideoStreamSink for EncodingVideoStream<E, S> {
    /// The caller's key-frame flag is replaced by the encoder's.
    fn write_frame(&mut self, _is_key_frame: bool, frame: &[u8]) -> Result<()> {
        if frame.is_empty() {
            return Err(Error::argument("cannot write an empty frame"));
        }
        let encoded = self.encoder.encode_frame(frame, &mut self.buffer)?;
        self.inner
            .write_frame(encoded.is_key_frame, &self.buffer[..encoded.length])
    }

    fn finish_writing(&mut self) -> Result<()> {
        self.inner.finish_writing()
    }
}

/// Encodes every block of samples before handing the output to the inner sink.
pub struct EncodingAudioStream<E: AudioEncoder, S: AudioStreamSink> {
    encoder: E,
    inner: S,
    buffer: Vec<u8>,
}

impl<E: AudioEncoder, S: AudioStreamSink> EncodingAudioStream<E, S> {
    pub fn new(encoder: E, inner: S) -> Self {
        Self {
            encoder,
            inner,
            buffer: Vec::new(),
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    fn ensure_buffer(&mut self, source_len: usize) {
        let needed = self.encoder.max_encoded_length(source_len);
        if self.buffer.len() < needed {
            self.buffer.resize(needed, 0);
        }
    }
}

impl<E: AudioEncoder + 'static, S: AudioStreamSink> AudioStreamSink for EncodingAudioStream<E, S> {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        if block.is_empty() {
            return Err(Error::argument("cannot write an empty block"));
        }
        self.ensure_buffer(block.len());
        let length = self.encoder.encode_block(block, &mut self.buffer)?;
        if length > 0 {
            self.inner.write_block(&self.buffer[..length])?;
        }
        Ok(())
    }

    fn finish_writing(&mut self) -> Result<()> {
        self.ensure_buffer(0);
        let length = self.encoder.flush(&mut self.buffer)?;
        if length > 0 {
            self.inner.write_block(&self.buffer[..length])?;
        }
        self.inner.finish_writing()
    }
}
