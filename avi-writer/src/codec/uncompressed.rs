use crate::{
    codec::{BitsPerPixel, EncodedFrame, VideoEncoder},
    error::{Error, Result},
    fourcc::{FourCC, codec_ids},
};

/// Writes frames as 24-bit bottom-up BGR without compression.
///
/// The source is 32-bit BGRA scanned top-down; the output flips it vertically and
/// drops the alpha byte, padding every row to a 4-byte boundary.
#[derive(Debug, Clone)]
pub struct UncompressedVideoEncoder {
    width: usize,
    height: usize,
    stride: usize,
}

impl UncompressedVideoEncoder {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::argument(format!(
                "invalid frame size {}x{}",
                width, height
            )));
        }
        let width = width as usize;
        let height = height as usize;
        Ok(Self {
            width,
            height,
            // DIB scan lines are DWORD aligned
            stride: (width * 3 + 3) / 4 * 4,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl VideoEncoder for UncompressedVideoEncoder {
    fn codec(&self) -> FourCC {
        codec_ids::UNCOMPRESSED
    }

    fn bits_per_pixel(&self) -> BitsPerPixel {
        BitsPerPixel::Bpp24
    }

    fn max_encoded_size(&self) -> usize {
        self.stride * self.height
    }

    fn encode_frame(&mut self, source: &[u8], destination: &mut [u8]) -> Result<EncodedFrame> {
        let source_len = 4 * self.width * self.height;
        if source.len() < source_len {
            return Err(Error::Encoder(anyhow::anyhow!(
                "source frame has {} bytes, {}x{} BGR32 needs {}",
                source.len(),
                self.width,
                self.height,
                source_len
            )));
        }
        let encoded_len = self.max_encoded_size();
        if destination.len() < encoded_len {
            return Err(Error::argument(format!(
                "destination has {} bytes, need {}",
                destination.len(),
                encoded_len
            )));
        }

        let src_row = self.width * 4;
        for y in 0..self.height {
            let src = &source[y * src_row..(y + 1) * src_row];
            let dest_start = (self.height - 1 - y) * self.stride;
            let dest = &mut destination[dest_start..dest_start + self.stride];
            bgr32_to_bgr24(src, dest, self.width);
        }

        Ok(EncodedFrame {
            length: encoded_len,
            is_key_frame: true,
        })
    }
}

/// Converts one row of BGRA pixels to BGR and zeroes the row padding.
pub(crate) fn bgr32_to_bgr24(source: &[u8], destination: &mut [u8], width: usize) {
    for (src, dest) in source
        .chunks_exact(4)
        .zip(destination.chunks_exact_mut(3))
        .take(width)
    {
        dest.copy_from_slice(&src[..3]);
    }
    destination[width * 3..].fill(0);
}
