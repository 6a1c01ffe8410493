//! First-sample locator for H.264 MP4 files
//!
//! Walks `moov/trak/mdia/minf/stbl` of the first video track, far enough to
//! pull out the decoder configuration and the bytes of sample zero. Nothing
//! past the first sample is ever read.

use crate::errors::DiaryError;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

const MOOV: u32 = fourcc(b"moov");
const TRAK: u32 = fourcc(b"trak");
const MDIA: u32 = fourcc(b"mdia");
const HDLR: u32 = fourcc(b"hdlr");
const MINF: u32 = fourcc(b"minf");
const STBL: u32 = fourcc(b"stbl");
const STSD: u32 = fourcc(b"stsd");
const STSZ: u32 = fourcc(b"stsz");
const STCO: u32 = fourcc(b"stco");
const CO64: u32 = fourcc(b"co64");
const AVC1: u32 = fourcc(b"avc1");
const AVC3: u32 = fourcc(b"avc3");
const AVCC: u32 = fourcc(b"avcC");
const VIDE: u32 = fourcc(b"vide");

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Larger first samples are treated as corrupt
const MAX_SAMPLE_SIZE: u64 = 64 * 1024 * 1024;

/// Decoder configuration and bytes of a clip's first video sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstSample {
    pub width: u16,
    pub height: u16,
    /// Size in bytes of the NAL length prefix inside samples (1, 2 or 4)
    pub nal_length_size: u8,
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
    /// Sample zero exactly as stored in `mdat`
    pub sample: Vec<u8>,
}

impl FirstSample {
    /// SPS, PPS and the sample as one Annex B access unit
    ///
    /// A sample that already starts with a start code is passed through.
    pub fn to_annex_b(&self) -> Result<Vec<u8>, DiaryError> {
        let mut out = Vec::with_capacity(self.sample.len() + 64);
        for nal in self.sps.iter().chain(self.pps.iter()) {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(nal);
        }

        if has_start_code(&self.sample) {
            out.extend_from_slice(&self.sample);
            return Ok(out);
        }

        let len_size = self.nal_length_size as usize;
        let mut pos = 0;
        while pos < self.sample.len() {
            if pos + len_size > self.sample.len() {
                return Err(decode_error("truncated NAL length prefix"));
            }
            let nal_len = self.sample[pos..pos + len_size]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            pos += len_size;

            if nal_len == 0 || pos + nal_len > self.sample.len() {
                return Err(decode_error("NAL unit overruns sample"));
            }
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(&self.sample[pos..pos + nal_len]);
            pos += nal_len;
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    kind: u32,
    content_start: u64,
    end: u64,
}

/// Locate the first sample of the first H.264 video track
pub fn locate_first_sample<R: Read + Seek>(reader: &mut R) -> Result<FirstSample, DiaryError> {
    let file_end = reader.seek(SeekFrom::End(0)).map_err(io_error)?;

    let moov = find_child(reader, 0, file_end, MOOV)?
        .ok_or_else(|| decode_error("no moov box"))?;

    for trak in children(reader, moov.content_start, moov.end)?
        .into_iter()
        .filter(|b| b.kind == TRAK)
    {
        let Some(mdia) = find_child(reader, trak.content_start, trak.end, MDIA)? else {
            continue;
        };
        let Some(hdlr) = find_child(reader, mdia.content_start, mdia.end, HDLR)? else {
            continue;
        };

        // version/flags and pre_defined precede the handler type
        reader
            .seek(SeekFrom::Start(hdlr.content_start + 8))
            .map_err(io_error)?;
        if reader.read_u32::<BigEndian>().map_err(io_error)? != VIDE {
            continue;
        }

        let minf = find_child(reader, mdia.content_start, mdia.end, MINF)?
            .ok_or_else(|| decode_error("video track without minf"))?;
        let stbl = find_child(reader, minf.content_start, minf.end, STBL)?
            .ok_or_else(|| decode_error("video track without stbl"))?;
        return read_sample_table(reader, &stbl);
    }

    Err(decode_error("no video track"))
}

fn read_sample_table<R: Read + Seek>(
    reader: &mut R,
    stbl: &BoxHeader,
) -> Result<FirstSample, DiaryError> {
    let boxes = children(reader, stbl.content_start, stbl.end)?;
    let find = |kind: u32| boxes.iter().find(|b| b.kind == kind).copied();

    let stsd = find(STSD).ok_or_else(|| decode_error("missing stsd"))?;
    let mut sample = read_avc_entry(reader, &stsd)?;

    let stsz = find(STSZ).ok_or_else(|| decode_error("missing stsz"))?;
    reader
        .seek(SeekFrom::Start(stsz.content_start + 4))
        .map_err(io_error)?;
    let default_size = reader.read_u32::<BigEndian>().map_err(io_error)?;
    let count = reader.read_u32::<BigEndian>().map_err(io_error)?;
    if count == 0 {
        return Err(decode_error("track has no samples"));
    }
    let size = u64::from(if default_size != 0 {
        default_size
    } else {
        reader.read_u32::<BigEndian>().map_err(io_error)?
    });

    let offset = if let Some(stco) = find(STCO) {
        read_first_chunk_offset(reader, &stco, false)?
    } else if let Some(co64) = find(CO64) {
        read_first_chunk_offset(reader, &co64, true)?
    } else {
        return Err(decode_error("missing chunk offsets"));
    };

    if size == 0 || size > MAX_SAMPLE_SIZE {
        return Err(decode_error(&format!("implausible sample size {}", size)));
    }

    reader.seek(SeekFrom::Start(offset)).map_err(io_error)?;
    let mut bytes = vec![0u8; size as usize];
    reader.read_exact(&mut bytes).map_err(io_error)?;
    sample.sample = bytes;

    log::debug!(
        "First sample: {} bytes at offset {} ({}x{})",
        size,
        offset,
        sample.width,
        sample.height
    );
    Ok(sample)
}

fn read_first_chunk_offset<R: Read + Seek>(
    reader: &mut R,
    table: &BoxHeader,
    wide: bool,
) -> Result<u64, DiaryError> {
    reader
        .seek(SeekFrom::Start(table.content_start + 4))
        .map_err(io_error)?;
    if reader.read_u32::<BigEndian>().map_err(io_error)? == 0 {
        return Err(decode_error("track has no chunks"));
    }
    if wide {
        reader.read_u64::<BigEndian>().map_err(io_error)
    } else {
        Ok(reader.read_u32::<BigEndian>().map_err(io_error)? as u64)
    }
}

fn read_avc_entry<R: Read + Seek>(
    reader: &mut R,
    stsd: &BoxHeader,
) -> Result<FirstSample, DiaryError> {
    reader
        .seek(SeekFrom::Start(stsd.content_start + 4))
        .map_err(io_error)?;
    if reader.read_u32::<BigEndian>().map_err(io_error)? == 0 {
        return Err(decode_error("empty stsd"));
    }

    let entry = read_box_header(reader, stsd.end)?;
    if entry.kind != AVC1 && entry.kind != AVC3 {
        return Err(decode_error(&format!(
            "unsupported sample entry '{}'",
            fourcc_name(entry.kind)
        )));
    }

    // SampleEntry (8) + VisualSampleEntry pre_defined/reserved (16)
    reader
        .seek(SeekFrom::Start(entry.content_start + 24))
        .map_err(io_error)?;
    let width = reader.read_u16::<BigEndian>().map_err(io_error)?;
    let height = reader.read_u16::<BigEndian>().map_err(io_error)?;
    // resolution, reserved, frame count, compressor name, depth, pre_defined
    let children_start = entry.content_start + 24 + 4 + 50;

    let avcc = find_child(reader, children_start, entry.end, AVCC)?
        .ok_or_else(|| decode_error("avc1 entry without avcC"))?;
    reader
        .seek(SeekFrom::Start(avcc.content_start))
        .map_err(io_error)?;

    let _version = reader.read_u8().map_err(io_error)?;
    let _profile = reader.read_u8().map_err(io_error)?;
    let _compat = reader.read_u8().map_err(io_error)?;
    let _level = reader.read_u8().map_err(io_error)?;
    let nal_length_size = (reader.read_u8().map_err(io_error)? & 0x03) + 1;

    let sps_count = reader.read_u8().map_err(io_error)? & 0x1F;
    let sps = read_parameter_sets(reader, sps_count as usize)?;
    let pps_count = reader.read_u8().map_err(io_error)?;
    let pps = read_parameter_sets(reader, pps_count as usize)?;

    if nal_length_size == 3 {
        return Err(decode_error("invalid NAL length size 3"));
    }

    Ok(FirstSample {
        width,
        height,
        nal_length_size,
        sps,
        pps,
        sample: Vec::new(),
    })
}

fn read_parameter_sets<R: Read>(reader: &mut R, count: usize) -> Result<Vec<Vec<u8>>, DiaryError> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u16::<BigEndian>().map_err(io_error)? as usize;
        let mut nal = vec![0u8; len];
        reader.read_exact(&mut nal).map_err(io_error)?;
        sets.push(nal);
    }
    Ok(sets)
}

fn read_box_header<R: Read + Seek>(reader: &mut R, parent_end: u64) -> Result<BoxHeader, DiaryError> {
    let offset = reader.stream_position().map_err(io_error)?;
    let size32 = reader.read_u32::<BigEndian>().map_err(io_error)?;
    let kind = reader.read_u32::<BigEndian>().map_err(io_error)?;

    let invalid = |size: u64| {
        decode_error(&format!(
            "box '{}' at {} has invalid size {}",
            fourcc_name(kind),
            offset,
            size
        ))
    };

    // Sizes come straight from the file; all arithmetic on them is checked.
    let (size, header_len) = match size32 {
        0 => (parent_end.checked_sub(offset).ok_or_else(|| invalid(0))?, 8),
        1 => (reader.read_u64::<BigEndian>().map_err(io_error)?, 16),
        n => (u64::from(n), 8),
    };

    let end = offset.checked_add(size).ok_or_else(|| invalid(size))?;
    if size < header_len || end > parent_end {
        return Err(invalid(size));
    }

    Ok(BoxHeader {
        kind,
        content_start: offset + header_len,
        end,
    })
}

fn children<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> Result<Vec<BoxHeader>, DiaryError> {
    let mut found = Vec::new();
    let mut pos = start;
    while pos.checked_add(8).is_some_and(|header_end| header_end <= end) {
        reader.seek(SeekFrom::Start(pos)).map_err(io_error)?;
        let header = read_box_header(reader, end)?;
        pos = header.end;
        found.push(header);
    }
    Ok(found)
}

fn find_child<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: u32,
) -> Result<Option<BoxHeader>, DiaryError> {
    Ok(children(reader, start, end)?
        .into_iter()
        .find(|b| b.kind == kind))
}

// Only the four-byte form: a three-byte start code is indistinguishable from
// a four-byte length prefix of a 256..511 byte NAL unit.
fn has_start_code(data: &[u8]) -> bool {
    data.starts_with(&START_CODE)
}

fn fourcc_name(kind: u32) -> String {
    kind.to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

fn decode_error(reason: &str) -> DiaryError {
    DiaryError::DecodeError(format!("MP4: {}", reason))
}

fn io_error(e: std::io::Error) -> DiaryError {
    DiaryError::DecodeError(format!("MP4: read failed: {}", e))
}
