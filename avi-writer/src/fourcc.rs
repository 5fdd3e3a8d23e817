use std::fmt::{Display, Formatter};

/// Four-character code used for RIFF chunk ids, list types and codec ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct FourCC([u8; 4]);

impl FourCC {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Chunk id of a stream payload chunk, e.g. `01wb` for audio in stream 1.
    pub fn stream_chunk(stream_index: usize, suffix: &[u8; 2]) -> Self {
        let tens = b'0' + ((stream_index / 10) % 10) as u8;
        let ones = b'0' + (stream_index % 10) as u8;
        Self([tens, ones, suffix[0], suffix[1]])
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        for b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Codec identifiers written into the stream header's handler field.
pub mod codec_ids {
    use super::FourCC;

    /// Uncompressed bottom-up DIB.
    pub const UNCOMPRESSED: FourCC = FourCC::new([0, 0, 0, 0]);
    pub const MOTION_JPEG: FourCC = FourCC::new(*b"MJPG");
    pub const X264: FourCC = FourCC::new(*b"X264");
    pub const XVID: FourCC = FourCC::new(*b"XVID");
    pub const DIVX: FourCC = FourCC::new(*b"DIVX");
}

/// RIFF chunk and list ids used by the AVI layout.
pub(crate) mod riff_ids {
    use super::FourCC;

    pub const RIFF: FourCC = FourCC::new(*b"RIFF");
    pub const LIST: FourCC = FourCC::new(*b"LIST");
    pub const AVI: FourCC = FourCC::new(*b"AVI ");
    pub const HDRL: FourCC = FourCC::new(*b"hdrl");
    pub const AVIH: FourCC = FourCC::new(*b"avih");
    pub const STRL: FourCC = FourCC::new(*b"strl");
    pub const STRH: FourCC = FourCC::new(*b"strh");
    pub const STRF: FourCC = FourCC::new(*b"strf");
    pub const STRN: FourCC = FourCC::new(*b"strn");
    pub const MOVI: FourCC = FourCC::new(*b"movi");
    pub const IDX1: FourCC = FourCC::new(*b"idx1");
    pub const VIDS: FourCC = FourCC::new(*b"vids");
    pub const AUDS: FourCC = FourCC::new(*b"auds");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_chunk_ids() {
        assert_eq!(FourCC::stream_chunk(0, b"dc"), FourCC::new(*b"00dc"));
        assert_eq!(FourCC::stream_chunk(1, b"wb"), FourCC::new(*b"01wb"));
        assert_eq!(FourCC::stream_chunk(12, b"db"), FourCC::new(*b"12db"));
    }

    #[test]
    fn display_escapes_non_printable() {
        assert_eq!(codec_ids::MOTION_JPEG.to_string(), "MJPG");
        assert_eq!(codec_ids::UNCOMPRESSED.to_string(), "\\x00\\x00\\x00\\x00");
    }

    #[test]
    fn as_u32_is_little_endian() {
        assert_eq!(FourCC::new(*b"RIFF").as_u32(), 0x4646_4952);
    }
}
