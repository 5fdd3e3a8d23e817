//! Shared fakes for unit tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crate::{
    codec::LameFacade,
    error::Result,
    stream::{AudioStreamSink, VideoStreamSink},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Frame { is_key_frame: bool, data: Vec<u8> },
    Block(Vec<u8>),
    Finished,
}

/// Records every call; asserts that no two calls overlap.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
    active: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// First byte of every recorded frame or block.
    pub fn payload_ids(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Frame { data, .. } | SinkEvent::Block(data) => data.first().copied(),
                SinkEvent::Finished => None,
            })
            .collect()
    }

    fn record(&self, event: SinkEvent) {
        assert!(
            !self.active.swap(true, Ordering::SeqCst),
            "sink entered concurrently"
        );
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.events.lock().unwrap().push(event);
        self.active.store(false, Ordering::SeqCst);
    }
}

impl VideoStreamSink for RecordingSink {
    fn write_frame(&mut self, is_key_frame: bool, frame: &[u8]) -> Result<()> {
        self.record(SinkEvent::Frame {
            is_key_frame,
            data: frame.to_vec(),
        });
        Ok(())
    }

    fn finish_writing(&mut self) -> Result<()> {
        self.record(SinkEvent::Finished);
        Ok(())
    }
}

impl AudioStreamSink for RecordingSink {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        self.record(SinkEvent::Block(block.to_vec()));
        Ok(())
    }

    fn finish_writing(&mut self) -> Result<()> {
        self.record(SinkEvent::Finished);
        Ok(())
    }
}

/// Scripted LAME facade: emits one 4-byte frame per 1152 buffered samples.
pub struct FakeLame {
    calls: Arc<Mutex<Vec<String>>>,
    channels: u16,
    input_rate: u32,
    bit_rate: u32,
    buffered: usize,
    prepared: bool,
}

impl FakeLame {
    pub fn new(calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            calls,
            channels: 0,
            input_rate: 0,
            bit_rate: 0,
            buffered: 0,
            prepared: false,
        }
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl LameFacade for FakeLame {
    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn set_channel_count(&mut self, value: u16) {
        assert!(!self.prepared);
        self.channels = value;
    }

    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn set_input_sample_rate(&mut self, value: u32) {
        assert!(!self.prepared);
        self.input_rate = value;
    }

    fn output_bit_rate(&self) -> u32 {
        self.bit_rate
    }

    fn set_output_bit_rate(&mut self, value: u32) {
        assert!(!self.prepared);
        self.bit_rate = value;
    }

    fn output_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn frame_size(&self) -> u32 {
        1152
    }

    fn encoder_delay(&self) -> u32 {
        576
    }

    fn prepare_encoding(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.prepared, "prepared twice");
        self.prepared = true;
        self.log("prepare".to_string());
        Ok(())
    }

    fn encode(&mut self, _source: &[u8], sample_count: usize, dest: &mut [u8]) -> anyhow::Result<usize> {
        anyhow::ensure!(self.prepared, "encode before prepare");
        self.log(format!("encode {}", sample_count));
        self.buffered += sample_count;
        let frames = self.buffered / 1152;
        self.buffered %= 1152;
        dest[..frames * 4].fill(0xfb);
        Ok(frames * 4)
    }

    fn finish_encoding(&mut self, dest: &mut [u8]) -> anyhow::Result<usize> {
        self.log("finish".to_string());
        let tail = if self.buffered > 0 { 4 } else { 0 };
        self.buffered = 0;
        dest[..tail].fill(0xfb);
        Ok(tail)
    }
}
