//! MP3 audio encoder on top of an externally provided LAME binding.

use crate::{
    codec::{AudioEncoder, audio_formats},
    error::{Error, Result},
};

/// Access to a LAME encoder instance living in a native library.
///
/// Lifecycle: set `channel_count`, `input_sample_rate` and `output_bit_rate`, call
/// `prepare_encoding` once, call `encode` any number of times, call
/// `finish_encoding` once, then drop. The read-only properties are meaningful only
/// after `prepare_encoding`.
pub trait LameFacade: Send {
    fn channel_count(&self) -> u16;
    fn set_channel_count(&mut self, value: u16);

    fn input_sample_rate(&self) -> u32;
    fn set_input_sample_rate(&mut self, value: u32);

    /// Output bit rate in kbps.
    fn output_bit_rate(&self) -> u32;
    fn set_output_bit_rate(&mut self, value: u32);

    fn output_sample_rate(&self) -> u32;

    /// Samples per channel in one MP3 frame.
    fn frame_size(&self) -> u32;

    /// Samples of lookahead the encoder prepends to the output.
    fn encoder_delay(&self) -> u32;

    fn prepare_encoding(&mut self) -> anyhow::Result<()>;

    /// Encodes `sample_count` samples per channel; partial frames are buffered.
    fn encode(&mut self, source: &[u8], sample_count: usize, dest: &mut [u8])
    -> anyhow::Result<usize>;

    fn finish_encoding(&mut self, dest: &mut [u8]) -> anyhow::Result<usize>;
}

impl<T: LameFacade + ?Sized> LameFacade for Box<T> {
    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }
    fn set_channel_count(&mut self, value: u16) {
        (**self).set_channel_count(value)
    }
    fn input_sample_rate(&self) -> u32 {
        (**self).input_sample_rate()
    }
    fn set_input_sample_rate(&mut self, value: u32) {
        (**self).set_input_sample_rate(value)
    }
    fn output_bit_rate(&self) -> u32 {
        (**self).output_bit_rate()
    }
    fn set_output_bit_rate(&mut self, value: u32) {
        (**self).set_output_bit_rate(value)
    }
    fn output_sample_rate(&self) -> u32 {
        (**self).output_sample_rate()
    }
    fn frame_size(&self) -> u32 {
        (**self).frame_size()
    }
    fn encoder_delay(&self) -> u32 {
        (**self).encoder_delay()
    }
    fn prepare_encoding(&mut self) -> anyhow::Result<()> {
        (**self).prepare_encoding()
    }
    fn encode(
        &mut self,
        source: &[u8],
        sample_count: usize,
        dest: &mut [u8],
    ) -> anyhow::Result<usize> {
        (**self).encode(source, sample_count, dest)
    }
    fn finish_encoding(&mut self, dest: &mut [u8]) -> anyhow::Result<usize> {
        (**self).finish_encoding(dest)
    }
}

/// Default logical name of the LAME library, resolved through
/// [`NativeLibraries`](crate::native::NativeLibraries).
pub const LAME_LIBRARY_NAME: &str = "lameenc";

/// Output bit rates accepted by the MP3 encoder, in kbps.
pub const SUPPORTED_MP3_BIT_RATES: [u32; 6] = [64, 96, 128, 160, 192, 320];

const SAMPLE_BYTE_SIZE: usize = 2;
// LAME documents 1.25 * samples + 7200 as the worst case for one call.
const MAX_FRAME_OVERHEAD: usize = 7200;

pub struct Mp3LameAudioEncoder<F: LameFacade> {
    lame: F,
    channel_count: u16,
    bit_rate_kbps: u32,
    format_data: Vec<u8>,
    finished: bool,
}

impl<F: LameFacade> Mp3LameAudioEncoder<F> {
    pub const SUPPORTED_BIT_RATES: [u32; 6] = SUPPORTED_MP3_BIT_RATES;

    /// Configures `lame` and prepares it for encoding 16-bit PCM input.
    pub fn new(channel_count: u16, sample_rate: u32, bit_rate_kbps: u32, mut lame: F) -> Result<Self> {
        if !(1..=2).contains(&channel_count) {
            return Err(Error::argument(format!(
                "channel count {} out of range 1..=2",
                channel_count
            )));
        }
        if sample_rate == 0 {
            return Err(Error::argument("sample rate must be positive"));
        }
        if !Self::SUPPORTED_BIT_RATES.contains(&bit_rate_kbps) {
            return Err(Error::argument(format!(
                "unsupported MP3 bit rate {} kbps",
                bit_rate_kbps
            )));
        }

        lame.set_channel_count(channel_count);
        lame.set_input_sample_rate(sample_rate);
        lame.set_output_bit_rate(bit_rate_kbps);
        lame.prepare_encoding().map_err(Error::Encoder)?;

        let format_data = mpeg_layer3_format_data(
            lame.frame_size(),
            bit_rate_kbps,
            lame.output_sample_rate(),
            lame.encoder_delay(),
        )?;
        log::info!(
            "mp3 encoder prepared: {} ch, {} Hz -> {} Hz, {} kbps, delay {}",
            channel_count,
            sample_rate,
            lame.output_sample_rate(),
            bit_rate_kbps,
            lame.encoder_delay()
        );

        Ok(Self {
            lame,
            channel_count,
            bit_rate_kbps,
            format_data,
            finished: false,
        })
    }

    pub fn encoder_delay(&self) -> u32 {
        self.lame.encoder_delay()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.finished {
            return Err(Error::state("mp3 encoder already finished"));
        }
        Ok(())
    }
}

/// MPEGLAYER3WAVEFORMAT fields following WAVEFORMATEX.
fn mpeg_layer3_format_data(
    frame_size: u32,
    bit_rate_kbps: u32,
    output_sample_rate: u32,
    encoder_delay: u32,
) -> Result<Vec<u8>> {
    if output_sample_rate == 0 {
        return Err(Error::Encoder(anyhow::anyhow!(
            "facade reports zero output sample rate"
        )));
    }
    let block_size = frame_size as u64 * bit_rate_kbps as u64 * 1000 / 8 / output_sample_rate as u64;

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&1u16.to_le_bytes()); // MPEGLAYER3_ID_MPEG
    data.extend_from_slice(&2u32.to_le_bytes()); // MPEGLAYER3_FLAG_PADDING_OFF
    data.extend_from_slice(&(block_size as u16).to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // frames per block
    data.extend_from_slice(&(encoder_delay as u16).to_le_bytes());
    Ok(data)
}

impl<F: LameFacade> AudioEncoder for Mp3LameAudioEncoder<F> {
    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.lame.output_sample_rate()
    }

    fn bits_per_sample(&self) -> u16 {
        0
    }

    fn format(&self) -> u16 {
        audio_formats::MP3
    }

    fn bytes_per_second(&self) -> u32 {
        self.bit_rate_kbps * 1000 / 8
    }

    fn granularity(&self) -> u16 {
        1
    }

    fn format_specific_data(&self) -> Vec<u8> {
        self.format_data.clone()
    }

    fn max_encoded_length(&self, source_len: usize) -> usize {
        let samples = source_len / SAMPLE_BYTE_SIZE / self.channel_count as usize;
        samples * 5 / 4 + MAX_FRAME_OVERHEAD
    }

    fn encode_block(&mut self, source: &[u8], destination: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        let sample_bytes = SAMPLE_BYTE_SIZE * self.channel_count as usize;
        if source.len() % sample_bytes != 0 {
            return Err(Error::Encoder(anyhow::anyhow!(
                "block of {} bytes is not a whole number of {}-channel 16-bit samples",
                source.len(),
                self.channel_count
            )));
        }
        let sample_count = source.len() / sample_bytes;
        self.lame
            .encode(source, sample_count, destination)
            .map_err(Error::Encoder)
    }

    fn flush(&mut self, destination: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        self.finished = true;
        self.lame.finish_encoding(destination).map_err(Error::Encoder)
    }
}

impl<F: LameFacade> Drop for Mp3LameAudioEncoder<F> {
    fn drop(&mut self) {
        if !self.finished {
            let mut scratch = vec![0; MAX_FRAME_OVERHEAD];
            if let Err(e) = self.lame.finish_encoding(&mut scratch) {
                log::warn!("mp3 encoder dropped without flush, finish failed: {:#}", e);
            }
        }
    }
}
