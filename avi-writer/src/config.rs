use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    codec::mp3::SUPPORTED_MP3_BIT_RATES,
    error::{Error, Result},
    native::NativeLibraries,
};

/// Container-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub frames_per_second: f64,
    /// Writes the trailing `idx1` index on close.
    pub emit_index1: bool,
    /// Hint used to pre-size the chunk index; 0 when unknown.
    pub expected_frame_count: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 10.0,
            emit_index1: true,
            expected_frame_count: 0,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.frames_per_second.is_finite() || self.frames_per_second <= 0.0 {
            return Err(Error::argument(format!(
                "frame rate must be positive, got {}",
                self.frames_per_second
            )));
        }
        if self.frames_per_second > 1_000_000.0 {
            return Err(Error::argument("frame rate is unreasonably high"));
        }
        Ok(())
    }

    /// Frame rate as the `(rate, scale)` pair stored in stream headers.
    pub fn frame_rate(&self) -> (u32, u32) {
        let scale = 1000u32;
        let rate = (self.frames_per_second * scale as f64).round() as u32;
        let divisor = gcd(rate.max(1), scale);
        (rate.max(1) / divisor, scale / divisor)
    }

    pub fn micro_seconds_per_frame(&self) -> u32 {
        (1_000_000.0 / self.frames_per_second).round() as u32
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodecKind {
    Uncompressed,
    Mjpeg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoStreamConfig {
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodecKind,
    /// JPEG quality, 1 to 100. Ignored by the uncompressed codec.
    pub quality: u8,
    pub force_single_threaded: bool,
    pub async_writes: bool,
}

impl Default for VideoStreamConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            codec: VideoCodecKind::Mjpeg,
            quality: 70,
            force_single_threaded: false,
            async_writes: true,
        }
    }
}

impl VideoStreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::argument(format!(
                "frame size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.codec == VideoCodecKind::Mjpeg {
            if !(1..=100).contains(&self.quality) {
                return Err(Error::argument(format!(
                    "quality must be within 1..=100, got {}",
                    self.quality
                )));
            }
            if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
                return Err(Error::argument("MJPEG frames are limited to 65535 pixels per side"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioStreamConfig {
    pub channel_count: u16,
    pub sample_rate: u32,
    /// MP3 output bit rate in kbps.
    pub output_bit_rate: u32,
}

impl Default for AudioStreamConfig {
    fn default() -> Self {
        Self {
            channel_count: 2,
            sample_rate: 44100,
            output_bit_rate: 160,
        }
    }
}

impl AudioStreamConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.channel_count) {
            return Err(Error::argument(format!(
                "channel count must be 1 or 2, got {}",
                self.channel_count
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::argument("sample rate must be positive"));
        }
        if !SUPPORTED_MP3_BIT_RATES.contains(&self.output_bit_rate) {
            return Err(Error::argument(format!(
                "unsupported output bit rate {} kbps",
                self.output_bit_rate
            )));
        }
        Ok(())
    }
}

/// Everything the recorder needs to produce one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub output: PathBuf,
    /// Recording length; 0 records until cancelled.
    pub duration_secs: u64,
    pub writer: WriterConfig,
    pub video: VideoStreamConfig,
    pub audio: Option<AudioStreamConfig>,
    pub libraries: NativeLibraries,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("recording.avi"),
            duration_secs: 10,
            writer: WriterConfig::default(),
            video: VideoStreamConfig::default(),
            audio: None,
            libraries: NativeLibraries::default(),
        }
    }
}

impl RecorderConfig {
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RecorderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.writer.validate()?;
        self.video.validate()?;
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = path.into();
        self
    }

    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.config.duration_secs = secs;
        self
    }

    pub fn frames_per_second(mut self, fps: f64) -> Self {
        self.config.writer.frames_per_second = fps;
        self
    }

    pub fn emit_index1(mut self, emit: bool) -> Self {
        self.config.writer.emit_index1 = emit;
        self
    }

    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.config.video.width = width;
        self.config.video.height = height;
        self
    }

    pub fn uncompressed(mut self) -> Self {
        self.config.video.codec = VideoCodecKind::Uncompressed;
        self
    }

    pub fn motion_jpeg(mut self, quality: u8) -> Self {
        self.config.video.codec = VideoCodecKind::Mjpeg;
        self.config.video.quality = quality;
        self
    }

    pub fn force_single_threaded(mut self, force: bool) -> Self {
        self.config.video.force_single_threaded = force;
        self
    }

    /// Add an MP3 audio track
    pub fn mp3_audio(mut self, channel_count: u16, sample_rate: u32, output_bit_rate: u32) -> Self {
        self.config.audio = Some(AudioStreamConfig {
            channel_count,
            sample_rate,
            output_bit_rate,
        });
        self
    }

    pub fn redirect_library(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.config.libraries.set_redirect(name, target);
        self
    }

    pub fn build(self) -> Result<RecorderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
