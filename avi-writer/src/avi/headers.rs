//! Fixed-layout AVI header structures, serialized little-endian.

use crate::fourcc::FourCC;

pub(crate) const AVIF_HASINDEX: u32 = 0x0000_0010;
pub(crate) const AVIF_ISINTERLEAVED: u32 = 0x0000_0100;
pub(crate) const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// `avih` chunk payload.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct MainHeader {
    pub micro_sec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
}

impl MainHeader {
    pub const SIZE: usize = 56;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        put_u32(&mut out, self.micro_sec_per_frame);
        put_u32(&mut out, self.max_bytes_per_sec);
        put_u32(&mut out, 0); // padding granularity
        put_u32(&mut out, self.flags);
        put_u32(&mut out, self.total_frames);
        put_u32(&mut out, 0); // initial frames
        put_u32(&mut out, self.streams);
        put_u32(&mut out, self.suggested_buffer_size);
        put_u32(&mut out, self.width);
        put_u32(&mut out, self.height);
        out.resize(Self::SIZE, 0);
        out
    }
}

/// `strh` chunk payload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StreamHeader {
    pub kind: FourCC,
    pub handler: FourCC,
    pub scale: u32,
    pub rate: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub sample_size: u32,
    pub frame_width: u16,
    pub frame_height: u16,
}

impl StreamHeader {
    pub const SIZE: usize = 56;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(self.kind.as_bytes());
        out.extend_from_slice(self.handler.as_bytes());
        put_u32(&mut out, 0); // flags
        put_u16(&mut out, 0); // priority
        put_u16(&mut out, 0); // language
        put_u32(&mut out, 0); // initial frames
        put_u32(&mut out, self.scale);
        put_u32(&mut out, self.rate);
        put_u32(&mut out, 0); // start
        put_u32(&mut out, self.length);
        put_u32(&mut out, self.suggested_buffer_size);
        put_u32(&mut out, u32::MAX); // quality: driver default
        put_u32(&mut out, self.sample_size);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, self.frame_width);
        put_u16(&mut out, self.frame_height);
        out
    }
}

/// `BITMAPINFOHEADER` for a video `strf`. Positive height marks a bottom-up image.
pub(crate) fn bitmap_info_header(width: u32, height: u32, bits_per_pixel: u16, codec: FourCC) -> Vec<u8> {
    let row_bytes = (width as u64 * bits_per_pixel as u64).div_ceil(32) * 4;
    let image_size = u32::try_from(row_bytes * height as u64).unwrap_or(0);

    let mut out = Vec::with_capacity(40);
    put_u32(&mut out, 40);
    put_u32(&mut out, width);
    put_u32(&mut out, height);
    put_u16(&mut out, 1); // planes
    put_u16(&mut out, bits_per_pixel);
    put_u32(&mut out, codec.as_u32());
    put_u32(&mut out, image_size);
    put_u32(&mut out, 0); // x pixels per meter
    put_u32(&mut out, 0); // y pixels per meter
    put_u32(&mut out, 0); // colors used
    put_u32(&mut out, 0); // colors important
    out
}

/// `WAVEFORMATEX` for an audio `strf`, followed by the codec's extra data.
pub(crate) struct WaveFormat<'a> {
    pub format: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bytes_per_second: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extra: &'a [u8],
}

impl WaveFormat<'_> {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18 + self.extra.len());
        put_u16(&mut out, self.format);
        put_u16(&mut out, self.channel_count);
        put_u32(&mut out, self.sample_rate);
        put_u32(&mut out, self.bytes_per_second);
        put_u16(&mut out, self.block_align);
        put_u16(&mut out, self.bits_per_sample);
        put_u16(&mut out, self.extra.len() as u16);
        out.extend_from_slice(self.extra);
        out
    }
}

/// One 16-byte `idx1` entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IndexEntry {
    pub chunk_id: FourCC,
    pub is_key_frame: bool,
    /// Position of the chunk header relative to the `movi` list type.
    pub offset: u32,
    pub size: u32,
}

impl IndexEntry {
    pub const SIZE: usize = 16;

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.chunk_id.as_bytes());
        put_u32(out, if self.is_key_frame { AVIIF_KEYFRAME } else { 0 });
        put_u32(out, self.offset);
        put_u32(out, self.size);
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::{codec_ids, riff_ids};

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(MainHeader::default().to_bytes().len(), MainHeader::SIZE);
        let strh = StreamHeader {
            kind: riff_ids::VIDS,
            handler: codec_ids::MOTION_JPEG,
            scale: 1,
            rate: 25,
            length: 3,
            suggested_buffer_size: 100,
            sample_size: 0,
            frame_width: 2,
            frame_height: 2,
        }
        .to_bytes();
        assert_eq!(strh.len(), StreamHeader::SIZE);
        assert_eq!(&strh[0..8], b"vidsMJPG");
        assert_eq!(u32_at(&strh, 24), 25);
        assert_eq!(u32_at(&strh, 32), 3);
        assert_eq!(u32_at(&strh, 40), u32::MAX);
    }

    #[test]
    fn test_bitmap_info_header_pads_rows() {
        let header = bitmap_info_header(2, 2, 24, codec_ids::UNCOMPRESSED);
        assert_eq!(header.len(), 40);
        assert_eq!(u32_at(&header, 16), 0);
        // 2 pixels * 3 bytes padded to 8 per row
        assert_eq!(u32_at(&header, 20), 16);
    }

    #[test]
    fn test_wave_format_appends_extra_data() {
        let bytes = WaveFormat {
            format: 0x55,
            channel_count: 2,
            sample_rate: 44100,
            bytes_per_second: 20000,
            block_align: 1,
            bits_per_sample: 0,
            extra: &[1, 2, 3],
        }
        .to_bytes();
        assert_eq!(bytes.len(), 21);
        assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]), 3);
        assert_eq!(&bytes[18..], &[1, 2, 3]);
    }
}
