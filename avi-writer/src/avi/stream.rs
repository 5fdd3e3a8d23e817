use std::{
    io::{Seek, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    avi::file::AviFile,
    error::{Error, Result},
    stream::{AudioStreamSink, VideoStreamSink},
};

pub(crate) type SharedFile<W> = Arc<Mutex<AviFile<W>>>;

pub(crate) fn lock_file<W: Write + Seek>(file: &SharedFile<W>) -> Result<MutexGuard<'_, AviFile<W>>> {
    file.lock()
        .map_err(|_| Error::state("AVI file poisoned by an earlier panic"))
}

/// Innermost video sink: appends each frame as one chunk of its stream.
pub(crate) struct AviVideoStream<W: Write + Seek> {
    index: usize,
    file: SharedFile<W>,
}

impl<W: Write + Seek> AviVideoStream<W> {
    pub fn new(index: usize, file: SharedFile<W>) -> Self {
        Self { index, file }
    }
}

impl<W: Write + Seek + Send + 'static> VideoStreamSink for AviVideoStream<W> {
    fn write_frame(&mut self, is_key_frame: bool, frame: &[u8]) -> Result<()> {
        lock_file(&self.file)?.write_chunk(self.index, is_key_frame, frame)
    }

    fn finish_writing(&mut self) -> Result<()> {
        lock_file(&self.file)?.finish_stream(self.index)
    }
}

/// Innermost audio sink. Every block is stored as a key chunk.
pub(crate) struct AviAudioStream<W: Write + Seek> {
    index: usize,
    file: SharedFile<W>,
}

impl<W: Write + Seek> AviAudioStream<W> {
    pub fn new(index: usize, file: SharedFile<W>) -> Self {
        Self { index, file }
    }
}

impl<W: Write + Seek + Send + 'static> AudioStreamSink for AviAudioStream<W> {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        lock_file(&self.file)?.write_chunk(self.index, true, block)
    }

    fn finish_writing(&mut self) -> Result<()> {
        lock_file(&self.file)?.finish_stream(self.index)
    }
}
