//! Ready-made encoding streams.
//!
//! Every stream built here encodes on its own worker: writes go through an async
//! wrapper so the producer can capture the next unit while the previous one is
//! being encoded and stored.

use std::{
    io::{Seek, Write},
    sync::Arc,
};

use crate::{
    avi::AviWriter,
    codec::{
        AudioCodec, LameFacade, MotionJpegVideoEncoder, Mp3LameAudioEncoder,
        SingleThreadedVideoEncoder, UncompressedVideoEncoder, VideoCodec, VideoEncoder,
        mp3::LAME_LIBRARY_NAME,
    },
    config::{AudioStreamConfig, VideoCodecKind, VideoStreamConfig},
    error::{Error, Result},
    native::NativeLibraries,
    stream::{AudioStreamWriter, VideoStreamWriter},
};

impl<W: Write + Seek + Send + 'static> AviWriter<W> {
    pub fn add_uncompressed_video_stream(&mut self, width: u32, height: u32) -> Result<Arc<VideoStreamWriter>> {
        let encoder = UncompressedVideoEncoder::new(width, height)?;
        self.add_encoding_video_stream(VideoCodec::from(encoder), true, width, height)
    }

    pub fn add_motion_jpeg_video_stream(
        &mut self,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Arc<VideoStreamWriter>> {
        let encoder = MotionJpegVideoEncoder::new(width, height, quality)?;
        self.add_encoding_video_stream(VideoCodec::from(encoder), true, width, height)
    }

    /// Stream driven by an externally provided encoder.
    ///
    /// With `force_single_threaded` the encoder is built and then only ever entered
    /// under one lock, for codecs that must not be called concurrently.
    pub fn add_custom_video_stream<F>(
        &mut self,
        width: u32,
        height: u32,
        factory: F,
        force_single_threaded: bool,
    ) -> Result<Arc<VideoStreamWriter>>
    where
        F: FnOnce() -> Result<Box<dyn VideoEncoder>>,
    {
        let codec = if force_single_threaded {
            VideoCodec::SingleThreaded(SingleThreadedVideoEncoder::new(factory)?)
        } else {
            VideoCodec::Custom(factory()?)
        };
        self.add_encoding_video_stream(codec, true, width, height)
    }

    /// MP3 stream over a LAME facade.
    ///
    /// `loader` receives the library name after redirection through `libraries`.
    pub fn add_mp3_lame_audio_stream<L>(
        &mut self,
        channel_count: u16,
        sample_rate: u32,
        output_bit_rate: u32,
        libraries: &NativeLibraries,
        loader: L,
    ) -> Result<Arc<AudioStreamWriter>>
    where
        L: FnOnce(&str) -> anyhow::Result<Box<dyn LameFacade>>,
    {
        AudioStreamConfig {
            channel_count,
            sample_rate,
            output_bit_rate,
        }
        .validate()?;

        let library = libraries.resolve(LAME_LIBRARY_NAME);
        log::info!("loading LAME from {}", library);
        let lame = loader(library).map_err(Error::Encoder)?;
        let encoder = Mp3LameAudioEncoder::new(channel_count, sample_rate, output_bit_rate, lame)?;
        self.add_encoding_audio_stream(AudioCodec::from(encoder), true)
    }

    /// Video stream described by a configuration section.
    pub fn add_configured_video_stream(&mut self, config: &VideoStreamConfig) -> Result<Arc<VideoStreamWriter>> {
        config.validate()?;
        let (width, height) = (config.width, config.height);
        let codec: VideoCodec = match (config.codec, config.force_single_threaded) {
            (VideoCodecKind::Uncompressed, false) => UncompressedVideoEncoder::new(width, height)?.into(),
            (VideoCodecKind::Mjpeg, false) => MotionJpegVideoEncoder::new(width, height, config.quality)?.into(),
            (kind, true) => {
                let quality = config.quality;
                SingleThreadedVideoEncoder::new(move || -> Result<Box<dyn VideoEncoder>> {
                    Ok(match kind {
                        VideoCodecKind::Uncompressed => {
                            Box::new(UncompressedVideoEncoder::new(width, height)?) as Box<dyn VideoEncoder>
                        }
                        VideoCodecKind::Mjpeg => {
                            Box::new(MotionJpegVideoEncoder::new(width, height, quality)?) as Box<dyn VideoEncoder>
                        }
                    })
                })?
                .into()
            }
        };
        self.add_encoding_video_stream(codec, config.async_writes, width, height)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{config::WriterConfig, fourcc::codec_ids, test_helpers::FakeLame};

    fn new_writer() -> anyhow::Result<AviWriter<Cursor<Vec<u8>>>> {
        Ok(AviWriter::new(Cursor::new(Vec::new()), WriterConfig::default())?)
    }

    #[test]
    fn test_factory_streams_write_asynchronously() -> anyhow::Result<()> {
        let mut writer = new_writer()?;
        let raw = writer.add_uncompressed_video_stream(2, 2)?;
        let jpeg = writer.add_motion_jpeg_video_stream(8, 8, 50)?;
        assert!(raw.supports_async_writes());
        assert!(jpeg.supports_async_writes());
        assert_eq!(raw.info().codec, codec_ids::UNCOMPRESSED);
        assert_eq!(jpeg.info().codec, codec_ids::MOTION_JPEG);
        assert_eq!(jpeg.info().index, 1);
        let described = format!("{:?}", jpeg);
        assert!(described.contains("index: 1"), "{}", described);

        let _ = jpeg.write_frame_async(true, &[0x80; 8 * 8 * 4], 0, 8 * 8 * 4)?;
        let bytes = writer.close()?.into_inner();
        // SOI marker of the stored JPEG follows the 00dc/01dc chunk header
        let chunk = bytes
            .windows(4)
            .position(|w| w == b"01dc")
            .expect("mjpeg chunk");
        assert_eq!(&bytes[chunk + 8..chunk + 10], &[0xff, 0xd8]);
        Ok(())
    }

    #[test]
    fn test_factory_rejects_invalid_quality() -> anyhow::Result<()> {
        let mut writer = new_writer()?;
        assert!(
            writer
                .add_motion_jpeg_video_stream(8, 8, 0)
                .unwrap_err()
                .is_argument()
        );
        assert_eq!(writer.stream_count(), 0);
        Ok(())
    }

    #[test]
    fn test_custom_stream_uses_provided_encoder() -> anyhow::Result<()> {
        let mut writer = new_writer()?;
        let mut streams = Vec::new();
        for force in [false, true] {
            streams.push(writer.add_custom_video_stream(
                4,
                2,
                || Ok(Box::new(UncompressedVideoEncoder::new(4, 2)?) as Box<dyn VideoEncoder>),
                force,
            )?);
        }
        let failing = writer.add_custom_video_stream(
            4,
            2,
            || Err(Error::Encoder(anyhow::anyhow!("codec not installed"))),
            true,
        );
        assert!(matches!(failing, Err(Error::Encoder(_))));
        assert_eq!(writer.stream_count(), 2);

        for stream in &streams {
            stream.write_frame(true, &[1; 32], 0, 32)?;
        }
        let bytes = writer.close()?.into_inner();
        assert!(bytes.windows(4).any(|w| w == b"00db"));
        assert!(bytes.windows(4).any(|w| w == b"01db"));
        Ok(())
    }

    #[test]
    fn test_mp3_loader_gets_redirected_library() -> anyhow::Result<()> {
        let mut libraries = NativeLibraries::new();
        libraries.set_redirect(LAME_LIBRARY_NAME, "/opt/lame/libmp3lame.so.0");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loaded = Arc::new(Mutex::new(String::new()));

        let mut writer = new_writer()?;
        let audio = {
            let calls = calls.clone();
            let loaded = loaded.clone();
            writer.add_mp3_lame_audio_stream(1, 22050, 64, &libraries, move |name| {
                *loaded.lock().unwrap() = name.to_string();
                Ok(Box::new(FakeLame::new(calls)) as Box<dyn LameFacade>)
            })?
        };
        assert_eq!(*loaded.lock().unwrap(), "/opt/lame/libmp3lame.so.0");
        assert_eq!(audio.info().format, crate::codec::audio_formats::MP3);
        assert_eq!(audio.info().channel_count, 1);

        audio.write_block(&[0; 1152 * 2], 0, 1152 * 2)?;
        writer.close()?;
        assert_eq!(*calls.lock().unwrap(), vec!["prepare", "encode 1152", "finish"]);
        Ok(())
    }

    #[test]
    fn test_mp3_validates_before_loading() -> anyhow::Result<()> {
        let mut writer = new_writer()?;
        let result = writer.add_mp3_lame_audio_stream(2, 44100, 100, &NativeLibraries::new(), |_| {
            panic!("loader must not run for invalid arguments")
        });
        assert!(result.unwrap_err().is_argument());

        let result = writer.add_mp3_lame_audio_stream(2, 44100, 128, &NativeLibraries::new(), |name| {
            anyhow::bail!("{} not found", name)
        });
        assert!(matches!(result, Err(Error::Encoder(_))));
        assert_eq!(writer.stream_count(), 0);
        Ok(())
    }

    #[test]
    fn test_configured_stream_honours_flags() -> anyhow::Result<()> {
        let mut writer = new_writer()?;
        let config = VideoStreamConfig {
            width: 4,
            height: 4,
            codec: VideoCodecKind::Uncompressed,
            force_single_threaded: true,
            async_writes: false,
            ..Default::default()
        };
        let stream = writer.add_configured_video_stream(&config)?;
        assert!(!stream.supports_async_writes());
        assert_eq!(stream.info().bits_per_pixel, crate::codec::BitsPerPixel::Bpp24);
        stream.write_frame(true, &[0; 64], 0, 64)?;
        writer.close()?;
        Ok(())
    }
}
