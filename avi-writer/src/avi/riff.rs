use std::io::{Seek, SeekFrom, Write};

use crate::{
    error::{Error, Result},
    fourcc::{FourCC, riff_ids},
};

/// Start of an open chunk: where its size field lives and where its data begins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkMark {
    size_pos: u64,
    data_pos: u64,
}

impl ChunkMark {
    pub fn data_pos(&self) -> u64 {
        self.data_pos
    }
}

/// Sequential RIFF writer that tracks its own position, seeking only to patch fields.
pub(crate) struct RiffWriter<W: Write + Seek> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> RiffWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, position })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_fourcc(&mut self, fourcc: FourCC) -> Result<()> {
        self.write_bytes(fourcc.as_bytes())
    }

    pub fn begin_chunk(&mut self, id: FourCC) -> Result<ChunkMark> {
        self.write_fourcc(id)?;
        let size_pos = self.position;
        self.write_u32(0)?;
        Ok(ChunkMark {
            size_pos,
            data_pos: self.position,
        })
    }

    pub fn begin_list(&mut self, list_type: FourCC) -> Result<ChunkMark> {
        let mark = self.begin_chunk(riff_ids::LIST)?;
        self.write_fourcc(list_type)?;
        Ok(mark)
    }

    pub fn begin_riff(&mut self, form_type: FourCC) -> Result<ChunkMark> {
        let mark = self.begin_chunk(riff_ids::RIFF)?;
        self.write_fourcc(form_type)?;
        Ok(mark)
    }

    /// Patches the chunk size and pads the data to an even length.
    pub fn end_chunk(&mut self, mark: ChunkMark) -> Result<()> {
        let size = self.position - mark.data_pos;
        let size = u32::try_from(size)
            .map_err(|_| Error::Container(format!("chunk of {} bytes exceeds the RIFF limit", size)))?;
        self.patch_u32(mark.size_pos, size)?;
        if size % 2 == 1 {
            self.write_bytes(&[0])?;
        }
        Ok(())
    }

    /// Writes a complete chunk; returns the position of its header.
    pub fn write_chunk(&mut self, id: FourCC, data: &[u8]) -> Result<u64> {
        let header_pos = self.position;
        let size = u32::try_from(data.len())
            .map_err(|_| Error::Container(format!("chunk of {} bytes exceeds the RIFF limit", data.len())))?;
        self.write_fourcc(id)?;
        self.write_u32(size)?;
        self.write_bytes(data)?;
        if size % 2 == 1 {
            self.write_bytes(&[0])?;
        }
        Ok(header_pos)
    }

    pub fn patch_u32(&mut self, at: u64, value: u32) -> Result<()> {
        self.overwrite(at, &value.to_le_bytes())
    }

    /// Rewrites bytes already written at `at`, then returns to the end.
    pub fn overwrite(&mut self, at: u64, data: &[u8]) -> Result<()> {
        if at + data.len() as u64 > self.position {
            return Err(Error::state("cannot overwrite past the written end"));
        }
        self.inner.seek(SeekFrom::Start(at))?;
        self.inner.write_all(data)?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
