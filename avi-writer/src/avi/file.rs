use std::io::{Seek, Write};

use crate::{
    avi::{
        headers::{
            AVIF_HASINDEX, AVIF_ISINTERLEAVED, IndexEntry, MainHeader, StreamHeader, WaveFormat,
            bitmap_info_header,
        },
        riff::{ChunkMark, RiffWriter},
    },
    codec::BitsPerPixel,
    config::WriterConfig,
    error::{Error, Result},
    fourcc::{FourCC, codec_ids, riff_ids},
};

/// Two-digit chunk ids limit the number of streams.
pub(crate) const MAX_STREAMS: usize = 100;

/// Upper bound on index entries reserved up front from the frame count hint.
const MAX_INDEX_RESERVE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub(crate) enum StreamFormat {
    Video {
        width: u32,
        height: u32,
        bits_per_pixel: BitsPerPixel,
        codec: FourCC,
    },
    Audio {
        channel_count: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        format: u16,
        bytes_per_second: u32,
        granularity: u16,
        format_data: Vec<u8>,
    },
}

#[derive(Debug)]
struct StreamRecord {
    format: StreamFormat,
    name: Option<String>,
    chunk_id: FourCC,
    chunk_count: u32,
    total_bytes: u64,
    max_chunk_size: u32,
    finished: bool,
    // data position of the strh chunk, rewritten on close
    header_pos: u64,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    riff: ChunkMark,
    main_header_pos: u64,
    movi: ChunkMark,
}

/// Shared state of one AVI file. Every stream sink appends through this, under one lock.
pub(crate) struct AviFile<W: Write + Seek> {
    writer: Option<RiffWriter<W>>,
    config: WriterConfig,
    streams: Vec<StreamRecord>,
    index: Vec<IndexEntry>,
    layout: Option<Layout>,
    riff_limit: u64,
}

impl<W: Write + Seek> AviFile<W> {
    pub fn new(target: W, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let index = Vec::with_capacity((config.expected_frame_count as usize).min(MAX_INDEX_RESERVE));
        Ok(Self {
            writer: Some(RiffWriter::new(target)?),
            config,
            streams: Vec::new(),
            index,
            layout: None,
            riff_limit: u32::MAX as u64,
        })
    }

    #[cfg(test)]
    pub fn with_riff_limit(mut self, limit: u64) -> Self {
        self.riff_limit = limit;
        self
    }

    pub fn is_started(&self) -> bool {
        self.layout.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Registers a stream and returns its index.
    pub fn add_stream(&mut self, format: StreamFormat) -> Result<usize> {
        self.ensure_configurable()?;
        let index = self.streams.len();
        if index >= MAX_STREAMS {
            return Err(Error::Container(format!(
                "an AVI file holds at most {} streams",
                MAX_STREAMS
            )));
        }
        let chunk_id = match &format {
            StreamFormat::Video { codec, .. } if *codec == codec_ids::UNCOMPRESSED => {
                FourCC::stream_chunk(index, b"db")
            }
            StreamFormat::Video { .. } => FourCC::stream_chunk(index, b"dc"),
            StreamFormat::Audio { .. } => FourCC::stream_chunk(index, b"wb"),
        };
        log::info!("added AVI stream {} ({})", index, chunk_id);
        self.streams.push(StreamRecord {
            format,
            name: None,
            chunk_id,
            chunk_count: 0,
            total_bytes: 0,
            max_chunk_size: 0,
            finished: false,
            header_pos: 0,
        });
        Ok(index)
    }

    pub fn set_stream_name(&mut self, index: usize, name: String) -> Result<()> {
        self.ensure_configurable()?;
        let stream = self
            .streams
            .get_mut(index)
            .ok_or_else(|| Error::argument(format!("no stream with index {}", index)))?;
        stream.name = Some(name);
        Ok(())
    }

    /// Appends one payload chunk to `movi`, writing the file headers first if needed.
    pub fn write_chunk(&mut self, stream_index: usize, is_key_frame: bool, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::state("AVI file is already closed"));
        }
        let stream = self
            .streams
            .get(stream_index)
            .ok_or_else(|| Error::argument(format!("no stream with index {}", stream_index)))?;
        if stream.finished {
            return Err(Error::state(format!("stream {} has finished writing", stream_index)));
        }
        let chunk_id = stream.chunk_id;
        if self.layout.is_none() {
            self.write_headers()?;
        }

        let layout = self.layout()?;
        let size = u32::try_from(data.len())
            .map_err(|_| Error::Container(format!("chunk of {} bytes is too large", data.len())))?;
        let header_pos = self.writer_mut()?.position();
        let padded = 8 + data.len() as u64 + data.len() as u64 % 2;
        self.ensure_room(header_pos + padded, self.index.len() + 1)?;

        let offset = u32::try_from(header_pos - layout.movi.data_pos())
            .map_err(|_| Error::Container("movi list exceeds the RIFF limit".to_string()))?;
        self.writer_mut()?.write_chunk(chunk_id, data)?;
        self.index.push(IndexEntry {
            chunk_id,
            is_key_frame,
            offset,
            size,
        });

        let stream = &mut self.streams[stream_index];
        stream.chunk_count += 1;
        stream.total_bytes += data.len() as u64;
        stream.max_chunk_size = stream.max_chunk_size.max(size);
        if stream.chunk_count == 1 {
            log::debug!("first chunk of stream {} written ({} bytes)", stream_index, size);
        }
        Ok(())
    }

    /// Marks a stream as complete. Later chunks for it are rejected.
    pub fn finish_stream(&mut self, stream_index: usize) -> Result<()> {
        let stream = self
            .streams
            .get_mut(stream_index)
            .ok_or_else(|| Error::argument(format!("no stream with index {}", stream_index)))?;
        if !stream.finished {
            stream.finished = true;
            log::debug!(
                "stream {} finished after {} chunks",
                stream_index,
                stream.chunk_count
            );
        }
        Ok(())
    }

    /// Completes `movi`, writes `idx1`, patches every size and counter and hands back
    /// the target.
    pub fn close(&mut self) -> Result<W> {
        if self.is_closed() {
            return Err(Error::state("AVI file is already closed"));
        }
        if self.layout.is_none() {
            self.write_headers()?;
        }
        let layout = self.layout()?;
        let end = self.writer_mut()?.position();
        self.ensure_room(end, self.index.len())?;

        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| Error::state("AVI file is already closed"))?;
        writer.end_chunk(layout.movi)?;
        if self.config.emit_index1 {
            let mut entries = Vec::with_capacity(self.index.len() * IndexEntry::SIZE);
            for entry in &self.index {
                entry.write_to(&mut entries);
            }
            writer.write_chunk(riff_ids::IDX1, &entries)?;
        }
        writer.end_chunk(layout.riff)?;

        writer.overwrite(layout.main_header_pos, &self.main_header().to_bytes())?;
        for stream in &self.streams {
            writer.overwrite(stream.header_pos, &self.stream_header(stream).to_bytes())?;
        }
        writer.flush()?;

        log::info!(
            "closed AVI file: {} streams, {} chunks, {} bytes",
            self.streams.len(),
            self.index.len(),
            writer.position()
        );
        Ok(writer.into_inner())
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::state("AVI file is already closed"));
        }
        if self.is_started() {
            return Err(Error::state("streams cannot change after the first chunk was written"));
        }
        Ok(())
    }

    /// Fails when the file would grow past the RIFF size limit, leaving room for the index.
    fn ensure_room(&self, end: u64, index_entries: usize) -> Result<()> {
        let layout = self.layout()?;
        let index_size = if self.config.emit_index1 {
            8 + (index_entries * IndexEntry::SIZE) as u64
        } else {
            0
        };
        let riff_size = end + index_size - layout.riff.data_pos();
        if riff_size > self.riff_limit {
            return Err(Error::Container(format!(
                "RIFF size of {} bytes exceeds the AVI 1.0 limit",
                riff_size
            )));
        }
        Ok(())
    }

    fn layout(&self) -> Result<Layout> {
        self.layout
            .ok_or_else(|| Error::state("AVI headers have not been written"))
    }

    fn writer_mut(&mut self) -> Result<&mut RiffWriter<W>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::state("AVI file is already closed"))
    }

    fn write_headers(&mut self) -> Result<()> {
        let main_header = self.main_header().to_bytes();
        let mut stream_chunks = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            stream_chunks.push((
                self.stream_header(stream).to_bytes(),
                stream_format(&stream.format),
                stream.name.clone(),
            ));
        }

        let writer = self.writer_mut()?;
        let riff = writer.begin_riff(riff_ids::AVI)?;
        let hdrl = writer.begin_list(riff_ids::HDRL)?;
        let main_header_pos = writer.write_chunk(riff_ids::AVIH, &main_header)? + 8;
        let mut header_positions = Vec::with_capacity(stream_chunks.len());
        for (strh, strf, name) in stream_chunks {
            let strl = writer.begin_list(riff_ids::STRL)?;
            header_positions.push(writer.write_chunk(riff_ids::STRH, &strh)? + 8);
            writer.write_chunk(riff_ids::STRF, &strf)?;
            if let Some(name) = name {
                let mut bytes = name.into_bytes();
                bytes.push(0);
                writer.write_chunk(riff_ids::STRN, &bytes)?;
            }
            writer.end_chunk(strl)?;
        }
        writer.end_chunk(hdrl)?;
        let movi = writer.begin_list(riff_ids::MOVI)?;

        for (stream, pos) in self.streams.iter_mut().zip(header_positions) {
            stream.header_pos = pos;
        }
        self.layout = Some(Layout {
            riff,
            main_header_pos,
            movi,
        });
        log::debug!("AVI headers written for {} streams", self.streams.len());
        Ok(())
    }

    fn main_header(&self) -> MainHeader {
        let (rate, scale) = self.config.frame_rate();
        let mut flags = 0;
        if self.config.emit_index1 {
            flags |= AVIF_HASINDEX;
        }
        if self.streams.len() > 1 {
            flags |= AVIF_ISINTERLEAVED;
        }

        let mut header = MainHeader {
            micro_sec_per_frame: self.config.micro_seconds_per_frame(),
            flags,
            streams: self.streams.len() as u32,
            ..Default::default()
        };
        let mut bytes_per_sec = 0u64;
        let mut first_video = true;
        for stream in &self.streams {
            header.suggested_buffer_size = header.suggested_buffer_size.max(stream.max_chunk_size);
            match &stream.format {
                StreamFormat::Video { width, height, .. } => {
                    bytes_per_sec += stream.max_chunk_size as u64 * rate as u64 / scale as u64;
                    if first_video {
                        header.total_frames = stream.chunk_count;
                        header.width = *width;
                        header.height = *height;
                        first_video = false;
                    }
                }
                StreamFormat::Audio {
                    bytes_per_second, ..
                } => bytes_per_sec += *bytes_per_second as u64,
            }
        }
        header.max_bytes_per_sec = u32::try_from(bytes_per_sec).unwrap_or(u32::MAX);
        header
    }

    fn stream_header(&self, stream: &StreamRecord) -> StreamHeader {
        match &stream.format {
            StreamFormat::Video {
                width,
                height,
                codec,
                ..
            } => {
                let (rate, scale) = self.config.frame_rate();
                StreamHeader {
                    kind: riff_ids::VIDS,
                    handler: *codec,
                    scale,
                    rate,
                    length: stream.chunk_count,
                    suggested_buffer_size: stream.max_chunk_size,
                    sample_size: 0,
                    frame_width: (*width).min(u16::MAX as u32) as u16,
                    frame_height: (*height).min(u16::MAX as u32) as u16,
                }
            }
            StreamFormat::Audio {
                bytes_per_second,
                granularity,
                ..
            } => {
                let granularity = (*granularity).max(1) as u32;
                StreamHeader {
                    kind: riff_ids::AUDS,
                    handler: FourCC::default(),
                    scale: granularity,
                    rate: *bytes_per_second,
                    length: u32::try_from(stream.total_bytes / granularity as u64).unwrap_or(u32::MAX),
                    suggested_buffer_size: stream.max_chunk_size,
                    sample_size: granularity,
                    frame_width: 0,
                    frame_height: 0,
                }
            }
        }
    }
}

fn stream_format(format: &StreamFormat) -> Vec<u8> {
    match format {
        StreamFormat::Video {
            width,
            height,
            bits_per_pixel,
            codec,
        } => bitmap_info_header(*width, *height, bits_per_pixel.bits(), *codec),
        StreamFormat::Audio {
            channel_count,
            sample_rate,
            bits_per_sample,
            format,
            bytes_per_second,
            granularity,
            format_data,
        } => WaveFormat {
            format: *format,
            channel_count: *channel_count,
            sample_rate: *sample_rate,
            bytes_per_second: *bytes_per_second,
            block_align: *granularity,
            bits_per_sample: *bits_per_sample,
            extra: format_data,
        }
        .to_bytes(),
    }
}
