use jpeg_encoder::{ColorType, Encoder};

use crate::{
    codec::{BitsPerPixel, EncodedFrame, VideoEncoder},
    error::{Error, Result},
    fourcc::{FourCC, codec_ids},
};

/// Three components of 64 coefficients at 27 bits each.
const BLOCK_WORST_CASE: usize = 3 * 64 * 27 / 8;
/// Markers, quantization and Huffman tables.
const HEADER_SLACK: usize = 2048;

/// Motion-JPEG: every frame is an independent baseline JPEG image.
#[derive(Debug)]
pub struct MotionJpegVideoEncoder {
    width: u16,
    height: u16,
    quality: u8,
    buffer: Vec<u8>,
}

impl MotionJpegVideoEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Result<Self> {
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(Error::argument(format!(
                "invalid frame size {}x{} for MJPEG",
                width, height
            )));
        }
        if !(1..=100).contains(&quality) {
            return Err(Error::argument(format!(
                "quality {} out of range 1..=100",
                quality
            )));
        }
        Ok(Self {
            width: width as u16,
            height: height as u16,
            quality,
            buffer: Vec::new(),
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl VideoEncoder for MotionJpegVideoEncoder {
    fn codec(&self) -> FourCC {
        codec_ids::MOTION_JPEG
    }

    fn bits_per_pixel(&self) -> BitsPerPixel {
        BitsPerPixel::Bpp24
    }

    /// Every coefficient of every 8x8 block at its longest Huffman code (16 bits)
    /// plus magnitude bits (11), for three components over the MCU-padded frame.
    fn max_encoded_size(&self) -> usize {
        let padded = |n: u16| (n as usize).div_ceil(16) * 16;
        let blocks = padded(self.width) / 8 * (padded(self.height) / 8);
        blocks * BLOCK_WORST_CASE + HEADER_SLACK
    }

    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame> {
        let source_len = 4 * self.width as usize * self.height as usize;
        if source.len() < source_len {
            return Err(Error::Encoder(anyhow::anyhow!(
                "source frame has {} bytes, {}x{} BGR32 needs {}",
                source.len(),
                self.width,
                self.height,
                source_len
            )));
        }

        self.buffer.clear();
        let encoder = Encoder::new(&mut self.buffer, self.quality);
        encoder
            .encode(&source[..source_len], self.width, self.height, ColorType::Bgra)
            .map_err(|e| Error::Encoder(anyhow::anyhow!("jpeg encode: {}", e)))?;

        let length = self.buffer.len();
        if length > destination.len() {
            return Err(Error::Encoder(anyhow::anyhow!(
                "encoded frame of {} bytes exceeds buffer of {}",
                length,
                destination.len()
            )));
        }
        destination[..length].copy_from_slice(&self.buffer);
        Ok(EncodedFrame {
            length,
            is_key_frame: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_range() {
        assert!(MotionJpegVideoEncoder::new(8, 8, 0).unwrap_err().is_argument());
        assert!(MotionJpegVideoEncoder::new(8, 8, 101).unwrap_err().is_argument());
        assert!(MotionJpegVideoEncoder::new(8, 8, 1).is_ok());
        assert!(MotionJpegVideoEncoder::new(8, 8, 100).is_ok());
    }

    #[test]
    fn test_rejects_oversized_frame() {
        assert!(MotionJpegVideoEncoder::new(70_000, 8, 70).unwrap_err().is_argument());
    }

    #[test]
    fn test_encodes_jpeg_key_frame() -> anyhow::Result<()> {
        let (w, h) = (16u32, 8u32);
        let source: Vec<u8> = (0..w * h)
            .flat_map(|i| [(i % 256) as u8, 0x40, 0x80, 0xff])
            .collect();
        let mut encoder = MotionJpegVideoEncoder::new(w, h, 70)?;
        let mut dest = vec![0; encoder.max_encoded_size()];
        let encoded = encoder.encode_frame(&source, &mut dest)?;

        assert!(encoded.is_key_frame);
        assert!(encoded.length > 4);
        // SOI ... EOI
        assert_eq!(&dest[..2], &[0xff, 0xd8]);
        assert_eq!(&dest[encoded.length - 2..encoded.length], &[0xff, 0xd9]);
        Ok(())
    }

    #[test]
    fn test_noise_at_full_quality_fits_the_bound() -> anyhow::Result<()> {
        let (w, h) = (64u32, 64u32);
        let mut seed = 0x2545_f491u32;
        let source: Vec<u8> = (0..w * h * 4)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed as u8
            })
            .collect();
        let mut encoder = MotionJpegVideoEncoder::new(w, h, 100)?;
        let mut dest = vec![0; encoder.max_encoded_size()];
        let encoded = encoder.encode_frame(&source, &mut dest)?;
        assert!(encoded.length <= encoder.max_encoded_size());
        assert_eq!(&dest[encoded.length - 2..encoded.length], &[0xff, 0xd9]);

        // odd sizes are padded to whole MCUs
        let odd = MotionJpegVideoEncoder::new(17, 1, 100)?;
        assert_eq!(odd.max_encoded_size(), 4 * 2 * BLOCK_WORST_CASE + HEADER_SLACK);
        Ok(())
    }

    #[test]
    fn test_short_source_is_an_encoder_error() -> anyhow::Result<()> {
        let mut encoder = MotionJpegVideoEncoder::new(8, 8, 70)?;
        let mut dest = vec![0; encoder.max_encoded_size()];
        assert!(matches!(
            encoder.encode_frame(&[0; 16], &mut dest),
            Err(Error::Encoder(_))
        ));
        Ok(())
    }
}
