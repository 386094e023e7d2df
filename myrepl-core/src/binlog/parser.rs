use super::fde::FormatDescriptionData;
use super::gtid::{GtidLogData, PreviousGtidsData};
use super::header::EventHeader;
use super::query::QueryData;
use super::rotate::RotateData;
use super::rows::{RowsData, RowsEventVersion};
use super::table_map::TableMapData;
use super::{Event, LogEventType, RawEvent};
use crate::error::{Error, Result};
use bytes::{Buf, Bytes};
use bytes_parser::{ReadBytesExt, ReadFromBytes};
use crc_any::CRCu32;

pub(crate) fn checksum_crc32(bytes: &[u8]) -> u32 {
    let mut hasher = CRCu32::crc32();
    hasher.digest(bytes);
    hasher.get_crc()
}

/// binlog v4 event parser
///
/// constructed from the format description event, which fixes the
/// post header lengths of all following events and whether every
/// event carries a 4-byte crc32 trailer
#[derive(Debug, Clone)]
pub struct ParserV4 {
    post_header_lengths: Vec<u8>,
    checksum: bool,
}

impl ParserV4 {
    pub fn new(post_header_lengths: Vec<u8>, checksum: bool) -> Self {
        ParserV4 {
            post_header_lengths,
            checksum,
        }
    }

    /// create parser from a decoded format description event
    pub fn from_fde(fde: &FormatDescriptionData) -> Self {
        // raw lengths do not cover UnknownEvent(code=0), push a
        // placeholder at the front so indexing by type code works
        let mut post_header_lengths = Vec::with_capacity(fde.post_header_lengths.len() + 1);
        post_header_lengths.push(0);
        post_header_lengths.extend_from_slice(&fde.post_header_lengths);
        ParserV4::new(post_header_lengths, fde.checksum_flag == 1)
    }

    pub fn checksum_enabled(&self) -> bool {
        self.checksum
    }

    pub fn post_header_length(&self, event_type: LogEventType) -> u8 {
        let idx = u8::from(event_type) as usize;
        self.post_header_lengths.get(idx).copied().unwrap_or(0)
    }

    /// parse one event from a buffer positioned at its 19-byte header
    ///
    /// the 4-byte crc32 trailer, when enabled, is stripped before the
    /// payload decoder runs; FDE events decode even before the parser
    /// knows the checksum mode because their payload is self-describing
    pub fn parse_event(&self, input: &mut Bytes, validate_checksum: bool) -> Result<Event> {
        if self.checksum && validate_checksum {
            self.validate_checksum(input)?;
        }
        let header = EventHeader::read_from(input)?;
        if (header.event_len as usize) < EventHeader::LEN {
            return Err(Error::BinlogEventError(format!(
                "malformed event header: event_len={}",
                header.event_len
            )));
        }
        if (header.data_len() as usize) > input.remaining() {
            return Err(Error::BinlogEventError(format!(
                "truncated event payload: expected {} bytes, got {}",
                header.data_len(),
                input.remaining()
            )));
        }
        let mut raw_data = input.read_len(header.data_len() as usize)?;
        let event_type = LogEventType::from(header.type_code);
        if self.checksum && event_type != LogEventType::FormatDescriptionEvent {
            if raw_data.remaining() < 4 {
                return Err(Error::BinlogEventError(
                    "event payload too short for its checksum trailer".to_owned(),
                ));
            }
            raw_data.truncate(raw_data.remaining() - 4);
        }
        let event = match event_type {
            LogEventType::QueryEvent => Event::Query(RawEvent {
                header,
                data: QueryData::read_from(&mut raw_data)?,
            }),
            LogEventType::StopEvent => Event::Stop(RawEvent { header, data: () }),
            LogEventType::RotateEvent => Event::Rotate(RawEvent {
                header,
                data: RotateData::read_from(&mut raw_data)?,
            }),
            LogEventType::FormatDescriptionEvent => Event::FormatDescription(RawEvent {
                header,
                data: FormatDescriptionData::read_from(&mut raw_data)?,
            }),
            LogEventType::XidEvent => Event::Xid(RawEvent {
                header,
                data: raw_data.read_le_u64()?,
            }),
            LogEventType::TableMapEvent => Event::TableMap(RawEvent {
                header,
                data: TableMapData::read_from(&mut raw_data)?,
            }),
            LogEventType::WriteRowsEventV1 => Event::WriteRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V1)?,
            }),
            LogEventType::UpdateRowsEventV1 => Event::UpdateRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V1)?,
            }),
            LogEventType::DeleteRowsEventV1 => Event::DeleteRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V1)?,
            }),
            LogEventType::WriteRowsEventV2 => Event::WriteRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V2)?,
            }),
            LogEventType::UpdateRowsEventV2 => Event::UpdateRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V2)?,
            }),
            LogEventType::DeleteRowsEventV2 => Event::DeleteRows(RawEvent {
                header,
                data: RowsData::read_with_version(&mut raw_data, RowsEventVersion::V2)?,
            }),
            LogEventType::GtidLogEvent => Event::Gtid(RawEvent {
                header,
                data: GtidLogData::read_from(&mut raw_data)?,
            }),
            LogEventType::AnonymousGtidLogEvent => Event::AnonymousGtid(RawEvent {
                header,
                data: GtidLogData::read_from(&mut raw_data)?,
            }),
            LogEventType::PreviousGtidsLogEvent => Event::PreviousGtids(RawEvent {
                header,
                data: PreviousGtidsData::read_from(&mut raw_data)?,
            }),
            LogEventType::HeartbeatLogEvent => Event::Heartbeat(RawEvent { header, data: () }),
            _ => Event::Unsupported(RawEvent {
                header,
                data: raw_data,
            }),
        };
        Ok(event)
    }

    /// skip one event without decoding its payload
    pub fn skip_event(&self, input: &mut Bytes) -> Result<()> {
        let header = EventHeader::read_from(input)?;
        input.read_len(header.data_len() as usize)?;
        Ok(())
    }

    /// verify the crc32 trailer of the event at the buffer head,
    /// without consuming input
    fn validate_checksum(&self, input: &Bytes) -> Result<()> {
        let header = EventHeader::read_from(&mut input.clone())?;
        let mut raw = input.clone().read_len(header.event_len as usize)?;
        if raw.remaining() < 4 {
            return Err(Error::BinlogEventError(
                "event too short for its checksum trailer".to_owned(),
            ));
        }
        let mut trailer = raw.split_off(raw.remaining() - 4);
        let expected = trailer.read_le_u32()?;
        let actual = checksum_crc32(&raw);
        if expected != actual {
            return Err(Error::BinlogChecksumMismatch(expected, actual));
        }
        Ok(())
    }
}
