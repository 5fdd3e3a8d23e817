use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::{
    error::{Error, Result, unit_range},
    invoker::{Invocation, SequentialInvoker},
    stream::{AudioStreamSink, VideoStreamSink},
};

/// Routes every write of a video sink through its own sequential invoker.
///
/// Units are copied before they are queued, so the caller's buffer is free as soon
/// as a write call returns.
pub struct AsyncVideoStream<S: VideoStreamSink> {
    invoker: SequentialInvoker<S>,
    finished: AtomicBool,
}

impl<S: VideoStreamSink> AsyncVideoStream<S> {
    pub fn new(name: &str, inner: S) -> Result<Self> {
        Ok(Self {
            invoker: SequentialInvoker::new(name, inner)?,
            finished: AtomicBool::new(false),
        })
    }

    pub fn write_frame(&self, is_key_frame: bool, data: &[u8], start: usize, length: usize) -> Result<()> {
        let frame = Bytes::copy_from_slice(unit_range(data, start, length)?);
        self.ensure_open()?;
        self.invoker
            .invoke(move |inner| inner.write_frame(is_key_frame, &frame))
    }

    pub fn write_frame_async(
        &self,
        is_key_frame: bool,
        data: &[u8],
        start: usize,
        length: usize,
    ) -> Result<Invocation> {
        let frame = Bytes::copy_from_slice(unit_range(data, start, length)?);
        self.write_frame_bytes_async(is_key_frame, frame)
    }

    /// Queues a frame the caller already owns, without copying it.
    pub fn write_frame_bytes_async(&self, is_key_frame: bool, frame: Bytes) -> Result<Invocation> {
        if frame.is_empty() {
            return Err(Error::argument("cannot write an empty frame"));
        }
        self.ensure_open()?;
        self.invoker
            .invoke_async(move |inner| inner.write_frame(is_key_frame, &frame))
    }

    /// Waits for every queued write, then finishes the inner sink. Idempotent.
    pub fn finish_writing(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.invoker.wait_for_pending_invocations()?;
        self.invoker.invoke(|inner| inner.finish_writing())
    }

    pub fn pending_writes(&self) -> usize {
        self.invoker.pending_invocations()
    }

    /// Stops the worker and returns the inner sink.
    pub fn into_inner(self) -> Result<S> {
        self.invoker.into_inner()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(Error::state("stream has finished writing"));
        }
        Ok(())
    }
}

/// Routes every write of an audio sink through its own sequential invoker.
pub struct AsyncAudioStream<S: AudioStreamSink> {
    invoker: SequentialInvoker<S>,
    finished: AtomicBool,
}

impl<S: AudioStreamSink> AsyncAudioStream<S> {
    pub fn new(name: &str, inner: S) -> Result<Self> {
        Ok(Self {
            invoker: SequentialInvoker::new(name, inner)?,
            finished: AtomicBool::new(false),
        })
    }

    pub fn write_block(&self, data: &[u8], start: usize, length: usize) -> Result<()> {
        let block = Bytes::copy_from_slice(unit_range(data, start, length)?);
        self.ensure_open()?;
        self.invoker.invoke(move |inner| inner.write_block(&block))
    }

    pub fn write_block_async(&self, data: &[u8], start: usize, length: usize) -> Result<Invocation> {
        let block = Bytes::copy_from_slice(unit_range(data, start, length)?);
        self.write_block_bytes_async(block)
    }

    pub fn write_block_bytes_async(&self, block: Bytes) -> Result<Invocation> {
        if block.is_empty() {
            return Err(Error::argument("cannot write an empty block"));
        }
        self.ensure_open()?;
        self.invoker.invoke_async(move |inner| inner.write_block(&block))
    }

    pub fn finish_writing(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.invoker.wait_for_pending_invocations()?;
        self.invoker.invoke(|inner| inner.finish_writing())
    }

    pub fn pending_writes(&self) -> usize {
        self.invoker.pending_invocations()
    }

    pub fn into_inner(self) -> Result<S> {
        self.invoker.into_inner()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(Error::state("stream has finished writing"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "async_wrapper_test.rs"]
mod async_wrapper_test;
