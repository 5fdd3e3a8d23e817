use std::f64::consts::TAU;

use bytes::{BufMut, Bytes, BytesMut};

/// Moving gradient standing in for a screen grab. Produces BGR32 top-down frames.
pub struct SyntheticScreen {
    width: u32,
    height: u32,
}

impl SyntheticScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn capture(&self, frame_index: u64) -> Bytes {
        let mut frame = BytesMut::with_capacity(self.frame_len());
        let shift = (frame_index * 4) as u32;
        for y in 0..self.height {
            for x in 0..self.width {
                frame.put_u8((x.wrapping_add(shift) % 256) as u8);
                frame.put_u8((y % 256) as u8);
                frame.put_u8((x.wrapping_add(y).wrapping_add(shift) / 2 % 256) as u8);
                frame.put_u8(0xff);
            }
        }
        frame.freeze()
    }
}

/// Sine tone rendered as interleaved 16-bit little-endian PCM.
pub struct ToneGenerator {
    sample_rate: u32,
    channel_count: u16,
    frequency: f64,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32, channel_count: u16, frequency: f64) -> Self {
        Self {
            sample_rate,
            channel_count,
            frequency,
            phase: 0.0,
        }
    }

    pub fn next_block(&mut self, sample_count: usize) -> Bytes {
        let mut block = BytesMut::with_capacity(sample_count * self.channel_count as usize * 2);
        let step = TAU * self.frequency / self.sample_rate as f64;
        for _ in 0..sample_count {
            let value = (self.phase.sin() * i16::MAX as f64 * 0.25) as i16;
            for _ in 0..self.channel_count {
                block.put_i16_le(value);
            }
            self.phase = (self.phase + step) % TAU;
        }
        block.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_have_declared_size_and_move() {
        let screen = SyntheticScreen::new(5, 3);
        let first = screen.capture(0);
        let second = screen.capture(1);
        assert_eq!(first.len(), 60);
        assert_eq!(second.len(), 60);
        assert_ne!(first, second);
        assert!(first.chunks(4).all(|px| px[3] == 0xff));
    }

    #[test]
    fn test_tone_is_interleaved_and_continuous() {
        let mut tone = ToneGenerator::new(8000, 2, 1000.0);
        let block = tone.next_block(4);
        assert_eq!(block.len(), 16);
        // both channels carry the same sample
        assert_eq!(block[0..2], block[2..4]);
        assert_eq!(i16::from_le_bytes([block[0], block[1]]), 0);

        // 1 kHz at 8 kHz: sample 2 is the positive peak
        let peak = i16::from_le_bytes([block[8], block[9]]);
        assert_eq!(peak, (i16::MAX as f64 * 0.25) as i16);

        let next = tone.next_block(1);
        // continues at sample 4, half a period in
        assert!(i16::from_le_bytes([next[0], next[1]]).abs() <= 1);
    }
}
