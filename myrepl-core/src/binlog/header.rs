use bitflags::bitflags;
use bytes::Bytes;
use bytes_parser::error::Result;
use bytes_parser::{ReadBytesExt, ReadFromBytes};

bitflags! {
    pub struct EventHeaderFlags: u16 {
        const BINLOG_IN_USE         = 0x0001;
        const FORCED_ROTATE         = 0x0002;
        const THREAD_SPECIFIC       = 0x0004;
        const SUPPRESS_USE          = 0x0008;
        const UPDATE_TABLE_MAP_VERSION  = 0x0010;
        const ARTIFICIAL            = 0x0020;
        const RELAY_LOG             = 0x0040;
        const IGNORABLE             = 0x0080;
        const NO_FILTER             = 0x0100;
        const MTS_ISOLATE           = 0x0200;
    }
}

/// common 19-byte header of binlog v4 events
///
/// timestamp 0:4, type_code 4:1, server_id 5:4,
/// event_length 9:4, next_position 13:4, flags 17:2
#[derive(Debug, Clone)]
pub struct EventHeader {
    pub timestamp: u32,
    pub type_code: u8,
    pub server_id: u32,
    pub event_len: u32,
    pub next_pos: u32,
    pub flags: EventHeaderFlags,
}

impl EventHeader {
    pub const LEN: usize = 19;

    /// always equals event_length - 19
    pub fn data_len(&self) -> u32 {
        self.event_len.saturating_sub(Self::LEN as u32)
    }
}

impl ReadFromBytes for EventHeader {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let timestamp = input.read_le_u32()?;
        let type_code = input.read_u8()?;
        let server_id = input.read_le_u32()?;
        let event_len = input.read_le_u32()?;
        let next_pos = input.read_le_u32()?;
        let flags = input.read_le_u16()?;
        Ok(EventHeader {
            timestamp,
            type_code,
            server_id,
            event_len,
            next_pos,
            flags: EventHeaderFlags::from_bits_truncate(flags),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1590000000u32.to_le_bytes());
        bytes.push(30);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&52u32.to_le_bytes());
        bytes.extend_from_slice(&1234u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        let mut input = Bytes::from(bytes);
        let header = EventHeader::read_from(&mut input).unwrap();
        assert_eq!(30, header.type_code);
        assert_eq!(1, header.server_id);
        assert_eq!(52, header.event_len);
        assert_eq!(33, header.data_len());
        assert_eq!(1234, header.next_pos);
        assert!(header.flags.contains(EventHeaderFlags::BINLOG_IN_USE));
    }
}
