//! Length-prefixed record framing for already demuxed media
//!
//! A framed stream is a sequence of records:
//!
//! ```text
//! record  = type:varint length:varint payload
//! type    = 0x01 initialization segment | 0x02 sample
//! ```
//!
//! Integers use QUIC variable-length encoding (RFC 9000, Section 16). Signed
//! time values are zigzag encoded before varint encoding. A time is written
//! as `value timescale`.
//!
//! [`FrameWriter`] produces such streams and [`FramedDemuxer`] parses them
//! incrementally, holding back incomplete records until more bytes arrive.

use crate::demux::{DemuxError, DemuxedItem, Demuxer};
use crate::tracks::{InitializationSegment, TrackDescription};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use sourcebuf_core::{MediaKind, MediaTime, Sample, TrackId};
use std::io::Cursor;

/// Record type of an initialization segment
pub const RECORD_INIT_SEGMENT: u64 = 0x01;
/// Record type of a coded sample
pub const RECORD_SAMPLE: u64 = 0x02;

const MAX_VARINT: u64 = (1 << 62) - 1;
const FLAG_SYNC: u8 = 0x01;

/// Encode a variable-length integer
pub fn encode_varint(value: u64, buf: &mut BytesMut) -> Result<(), DemuxError> {
    if value < 0x40 {
        buf.put_u8(value as u8);
    } else if value < 0x4000 {
        buf.put_u16((0x4000 | value) as u16);
    } else if value < 0x4000_0000 {
        buf.put_u32((0x8000_0000 | value) as u32);
    } else if value <= MAX_VARINT {
        buf.put_u64(0xC000_0000_0000_0000 | value);
    } else {
        return Err(DemuxError::Malformed {
            reason: format!("value too large for varint encoding: {}", value),
        });
    }
    Ok(())
}

/// Decode a variable-length integer. Returns `None` when `buf` ends early.
pub fn decode_varint<B: Buf>(buf: &mut B) -> Option<u64> {
    if !buf.has_remaining() {
        return None;
    }
    let first_byte = buf.chunk()[0];
    let length = 1usize << (first_byte >> 6);
    if buf.remaining() < length {
        return None;
    }
    buf.advance(1);
    let mut value = (first_byte & 0x3F) as u64;
    for _ in 1..length {
        value = (value << 8) | buf.get_u8() as u64;
    }
    Some(value)
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Serialises initialization segments and samples into framed records
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an initialization segment record
    pub fn write_init_segment(&mut self, segment: &InitializationSegment) -> Result<&mut Self, DemuxError> {
        let mut payload = BytesMut::new();
        match segment.duration {
            Some(duration) => {
                payload.put_u8(1);
                put_time(duration, &mut payload)?;
            }
            None => payload.put_u8(0),
        }
        encode_varint(segment.tracks.len() as u64, &mut payload)?;
        for track in &segment.tracks {
            put_str(track.id.as_str(), &mut payload)?;
            payload.put_u8(track.kind.as_u8());
            put_str(&track.codec, &mut payload)?;
        }
        self.put_record(RECORD_INIT_SEGMENT, &payload)?;
        Ok(self)
    }

    /// Append a sample record
    pub fn write_sample(&mut self, sample: &Sample) -> Result<&mut Self, DemuxError> {
        let mut payload = BytesMut::with_capacity(sample.size() + 32);
        put_str(sample.track_id().as_str(), &mut payload)?;
        put_time(sample.presentation_time(), &mut payload)?;
        put_time(sample.decode_time(), &mut payload)?;
        put_time(sample.duration(), &mut payload)?;
        payload.put_u8(if sample.is_sync() { FLAG_SYNC } else { 0 });
        encode_varint(sample.size() as u64, &mut payload)?;
        payload.extend_from_slice(sample.data());
        self.put_record(RECORD_SAMPLE, &payload)?;
        Ok(self)
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the framed bytes
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    fn put_record(&mut self, record_type: u64, payload: &[u8]) -> Result<(), DemuxError> {
        encode_varint(record_type, &mut self.buf)?;
        encode_varint(payload.len() as u64, &mut self.buf)?;
        self.buf.extend_from_slice(payload);
        Ok(())
    }
}

fn put_str(value: &str, buf: &mut BytesMut) -> Result<(), DemuxError> {
    encode_varint(value.len() as u64, buf)?;
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn put_time(time: MediaTime, buf: &mut BytesMut) -> Result<(), DemuxError> {
    encode_varint(zigzag(time.value()), buf)?;
    encode_varint(time.timescale() as u64, buf)
}

/// Incremental parser for framed record streams
#[derive(Debug, Default)]
pub struct FramedDemuxer {
    pending: BytesMut,
    records_parsed: u64,
}

impl FramedDemuxer {
    /// Create a demuxer with no buffered input
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for the rest of a record
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Complete records parsed since creation
    pub fn records_parsed(&self) -> u64 {
        self.records_parsed
    }

    fn pending_record_type(&self) -> Option<u64> {
        decode_varint(&mut Cursor::new(&self.pending[..]))
    }
}

impl Demuxer for FramedDemuxer {
    fn append(&mut self, data: &[u8]) -> Result<Vec<DemuxedItem>, DemuxError> {
        self.pending.extend_from_slice(data);
        let mut items = Vec::new();

        loop {
            let mut cursor = Cursor::new(&self.pending[..]);
            let Some(record_type) = decode_varint(&mut cursor) else {
                break;
            };
            let Some(length) = decode_varint(&mut cursor) else {
                break;
            };
            let header_len = cursor.position() as usize;
            let Some(total) = usize::try_from(length).ok().and_then(|l| l.checked_add(header_len)) else {
                self.pending.clear();
                return Err(DemuxError::Malformed {
                    reason: format!("record length {} out of range", length),
                });
            };
            if self.pending.len() < total {
                break;
            }

            let mut record = self.pending.split_to(total).freeze();
            record.advance(header_len);
            let parsed = match record_type {
                RECORD_INIT_SEGMENT => parse_init_segment(record).map(DemuxedItem::InitializationSegment),
                RECORD_SAMPLE => parse_sample(record).map(DemuxedItem::Sample),
                other => Err(DemuxError::UnknownRecord { record_type: other }),
            };
            match parsed {
                Ok(item) => {
                    self.records_parsed += 1;
                    items.push(item);
                }
                Err(error) => {
                    self.pending.clear();
                    return Err(error);
                }
            }
        }

        Ok(items)
    }

    fn reset(&mut self) {
        self.pending.clear();
    }

    fn is_parsing_media_segment(&self) -> bool {
        self.pending_record_type() == Some(RECORD_SAMPLE)
    }
}

fn malformed(what: &str) -> DemuxError {
    DemuxError::Malformed {
        reason: format!("truncated {}", what),
    }
}

fn get_varint(buf: &mut Bytes, what: &str) -> Result<u64, DemuxError> {
    decode_varint(buf).ok_or_else(|| malformed(what))
}

fn get_u8(buf: &mut Bytes, what: &str) -> Result<u8, DemuxError> {
    if !buf.has_remaining() {
        return Err(malformed(what));
    }
    Ok(buf.get_u8())
}

fn get_bytes(buf: &mut Bytes, what: &str) -> Result<Bytes, DemuxError> {
    let length = get_varint(buf, what)? as usize;
    if buf.remaining() < length {
        return Err(malformed(what));
    }
    Ok(buf.split_to(length))
}

fn get_string(buf: &mut Bytes, what: &str) -> Result<String, DemuxError> {
    let raw = get_bytes(buf, what)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DemuxError::Malformed {
        reason: format!("{} is not valid UTF-8", what),
    })
}

fn get_time(buf: &mut Bytes, what: &str) -> Result<MediaTime, DemuxError> {
    let value = unzigzag(get_varint(buf, what)?);
    let timescale = u32::try_from(get_varint(buf, what)?).map_err(|_| DemuxError::Malformed {
        reason: format!("{} timescale out of range", what),
    })?;
    Ok(MediaTime::new(value, timescale))
}

fn parse_init_segment(mut buf: Bytes) -> Result<InitializationSegment, DemuxError> {
    let duration = match get_u8(&mut buf, "duration flag")? {
        0 => None,
        _ => Some(get_time(&mut buf, "duration")?),
    };
    let count = get_varint(&mut buf, "track count")?;
    let mut tracks = Vec::new();
    for _ in 0..count {
        let id = get_string(&mut buf, "track id")?;
        let tag = get_u8(&mut buf, "track kind")?;
        let kind = MediaKind::from_u8(tag).ok_or_else(|| DemuxError::Malformed {
            reason: format!("unknown track kind {}", tag),
        })?;
        let codec = get_string(&mut buf, "codec")?;
        tracks.push(TrackDescription::new(TrackId::new(id), kind, codec));
    }
    Ok(InitializationSegment::new(duration, tracks))
}

fn parse_sample(mut buf: Bytes) -> Result<Sample, DemuxError> {
    let track_id = get_string(&mut buf, "track id")?;
    let presentation_time = get_time(&mut buf, "presentation time")?;
    let decode_time = get_time(&mut buf, "decode time")?;
    let duration = get_time(&mut buf, "duration")?;
    let flags = get_u8(&mut buf, "flags")?;
    let data = get_bytes(&mut buf, "payload")?;
    Ok(Sample::new(
        track_id,
        presentation_time,
        decode_time,
        duration,
        flags & FLAG_SYNC != 0,
        data,
    ))
}
