use crate::flag::*;
use crate::handshake::AuthSwitchRequest;
use bytes::{Buf, Bytes};
use bytes_parser::error::{Error, Needed, Result};
use bytes_parser::my::ReadMyEnc;
use bytes_parser::{ReadBytesExt, ReadFromBytes, ReadFromBytesWithContext};

/// MySQL packet
///
/// reference: https://dev.mysql.com/doc/internals/en/mysql-packet.html
#[derive(Debug, Clone)]
pub struct Packet {
    pub payload_len: u32,
    pub seq_id: u8,
    pub payload: Bytes,
}

impl ReadFromBytes for Packet {
    fn read_from(input: &mut Bytes) -> Result<Packet> {
        let payload_len = input.read_le_u24()?;
        let seq_id = input.read_u8()?;
        let payload = input.read_len(payload_len as usize)?;
        Ok(Packet {
            payload_len,
            seq_id,
            payload,
        })
    }
}

/// one or more packet payloads combine to one full message
#[derive(Debug, Clone)]
pub enum Message {
    Ok(OkPacket),
    Err(ErrPacket),
    Eof(EofPacket),
}

impl<'c> ReadFromBytesWithContext<'c> for Message {
    type Context = &'c CapabilityFlags;

    fn read_with_ctx(input: &mut Bytes, cap_flags: Self::Context) -> Result<Self> {
        if !input.has_remaining() {
            return Err(Error::InputIncomplete(Bytes::new(), Needed::Unknown));
        }
        match input[0] {
            0x00 => Ok(Message::Ok(OkPacket::read_with_ctx(input, cap_flags)?)),
            0xff => Ok(Message::Err(ErrPacket::read_with_ctx(
                input,
                (cap_flags, true),
            )?)),
            0xfe => Ok(Message::Eof(EofPacket::read_with_ctx(input, cap_flags)?)),
            c => Err(Error::ConstraintError(format!("invalid packet code {}", c))),
        }
    }
}

/// classification of one packet of an in-progress binlog dump
///
/// an OK header byte precedes every event payload and must be
/// stripped before the event header is parsed
#[derive(Debug, Clone)]
pub enum DumpPacket {
    /// event payload with the leading 0x00 removed
    Event(Bytes),
    Eof,
    Err(ErrPacket),
}

impl<'c> ReadFromBytesWithContext<'c> for DumpPacket {
    type Context = &'c CapabilityFlags;

    fn read_with_ctx(input: &mut Bytes, cap_flags: Self::Context) -> Result<Self> {
        if !input.has_remaining() {
            return Err(Error::InputIncomplete(Bytes::new(), Needed::Unknown));
        }
        match input[0] {
            0x00 => {
                input.read_u8()?;
                Ok(DumpPacket::Event(input.split_to(input.remaining())))
            }
            0xfe if input.remaining() < 9 => Ok(DumpPacket::Eof),
            0xff => Ok(DumpPacket::Err(ErrPacket::read_with_ctx(
                input,
                (cap_flags, true),
            )?)),
            c => Err(Error::ConstraintError(format!(
                "invalid dump packet code {}",
                c
            ))),
        }
    }
}

/// handshake message
#[derive(Debug, Clone)]
pub enum HandshakeMessage {
    Ok(OkPacket),
    Err(ErrPacket),
    Switch(AuthSwitchRequest),
}

impl<'c> ReadFromBytesWithContext<'c> for HandshakeMessage {
    type Context = &'c CapabilityFlags;

    fn read_with_ctx(input: &mut Bytes, cap_flags: Self::Context) -> Result<Self> {
        if !input.has_remaining() {
            return Err(Error::InputIncomplete(Bytes::new(), Needed::Unknown));
        }
        match input[0] {
            0x00 => {
                let ok = OkPacket::read_with_ctx(input, cap_flags)?;
                Ok(HandshakeMessage::Ok(ok))
            }
            0xff => {
                let err = ErrPacket::read_with_ctx(input, (cap_flags, false))?;
                Ok(HandshakeMessage::Err(err))
            }
            0xfe => {
                let switch = AuthSwitchRequest::read_from(input)?;
                Ok(HandshakeMessage::Switch(switch))
            }
            c => Err(Error::ConstraintError(format!("invalid packet code {}", c))),
        }
    }
}

/// Ok Packet
///
/// reference: https://dev.mysql.com/doc/internals/en/packet-OK_Packet.html
#[derive(Debug, Clone)]
pub struct OkPacket {
    pub header: u8,
    // actually len-enc-int
    pub affected_rows: u64,
    // actually len-enc-int
    pub last_insert_id: u64,
    // if PROTOCOL_41 or TRANSACTIONS enabled
    pub status_flags: StatusFlags,
    // if PROTOCOL_41 enabled
    pub warnings: u16,
    // if SESSION_TRACK enabled: len-enc-str
    // else: EOF-terminated string
    pub info: Bytes,
}

impl<'c> ReadFromBytesWithContext<'c> for OkPacket {
    type Context = &'c CapabilityFlags;

    fn read_with_ctx(input: &mut Bytes, cap_flags: Self::Context) -> Result<OkPacket> {
        // header can be either 0x00 or 0xfe
        let header = input.read_u8()?;
        let affected_rows = input.read_len_enc_int()?;
        let affected_rows = affected_rows
            .to_u64()
            .ok_or_else(|| Error::ConstraintError("invalid affected rows".to_owned()))?;
        let last_insert_id = input.read_len_enc_int()?;
        let last_insert_id = last_insert_id
            .to_u64()
            .ok_or_else(|| Error::ConstraintError("invalid last insert id".to_owned()))?;
        let status_flags = if cap_flags.contains(CapabilityFlags::PROTOCOL_41)
            || cap_flags.contains(CapabilityFlags::TRANSACTIONS)
        {
            StatusFlags::from_bits_truncate(input.read_le_u16()?)
        } else {
            StatusFlags::empty()
        };
        let warnings = if cap_flags.contains(CapabilityFlags::PROTOCOL_41) {
            input.read_le_u16()?
        } else {
            0
        };
        let info = if cap_flags.contains(CapabilityFlags::SESSION_TRACK) && input.has_remaining() {
            let info = input.read_len_enc_str()?;
            info.into_bytes()
                .ok_or_else(|| Error::ConstraintError("invalid info".to_owned()))?
        } else {
            input.split_to(input.remaining())
        };
        Ok(OkPacket {
            header,
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info,
        })
    }
}

/// Err Packet
///
/// reference: https://dev.mysql.com/doc/internals/en/packet-ERR_Packet.html
#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub header: u8,
    pub error_code: u16,
    // if PROTOCOL_41 enabled: string[1]
    pub sql_state_marker: u8,
    // if PROTOCOL_41 enabled: string[5]
    pub sql_state: Bytes,
    // EOF-terminated string
    pub error_message: Bytes,
}

impl<'c> ReadFromBytesWithContext<'c> for ErrPacket {
    type Context = (&'c CapabilityFlags, bool);

    fn read_with_ctx(input: &mut Bytes, (cap_flags, sql): Self::Context) -> Result<ErrPacket> {
        let header = input.read_u8()?;
        let error_code = input.read_le_u16()?;
        let (sql_state_marker, sql_state) =
            if sql && cap_flags.contains(CapabilityFlags::PROTOCOL_41) {
                let sql_state_marker = input.read_u8()?;
                let sql_state = input.read_len(5usize)?;
                (sql_state_marker, sql_state)
            } else {
                (0u8, Bytes::new())
            };
        let error_message = input.split_to(input.remaining());
        Ok(ErrPacket {
            header,
            error_code,
            sql_state_marker,
            sql_state,
            error_message,
        })
    }
}

/// EOF Packet
///
/// reference: https://dev.mysql.com/doc/internals/en/packet-EOF_Packet.html
#[derive(Debug, Clone)]
pub struct EofPacket {
    pub header: u8,
    // if PROTOCOL_41 enabled
    pub warnings: u16,
    // if PROTOCOL_41 enabled
    pub status_flags: StatusFlags,
}

impl<'c> ReadFromBytesWithContext<'c> for EofPacket {
    type Context = &'c CapabilityFlags;

    fn read_with_ctx(input: &mut Bytes, cap_flags: Self::Context) -> Result<EofPacket> {
        let header = input.read_u8()?;
        let (warnings, status_flags) = if cap_flags.contains(CapabilityFlags::PROTOCOL_41) {
            let warnings = input.read_le_u16()?;
            let status_flags = StatusFlags::from_bits_truncate(input.read_le_u16()?);
            (warnings, status_flags)
        } else {
            (0, StatusFlags::empty())
        };
        Ok(EofPacket {
            header,
            warnings,
            status_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_packet() {
        let input: Vec<u8> = vec![0, 0, 0, 2, 0, 0, 0];
        let mut input = Bytes::from(input);
        let ok = OkPacket::read_with_ctx(&mut input, &CapabilityFlags::PROTOCOL_41).unwrap();
        assert_eq!(0, ok.header);
        assert_eq!(0, ok.affected_rows);
        assert!(ok.status_flags.contains(StatusFlags::STATUS_AUTOCOMMIT));
    }

    #[test]
    fn test_err_packet() {
        let mut input = Bytes::from_static(
            b"\xff\xd4\x04#HY000Slave can not handle replication events",
        );
        let err =
            ErrPacket::read_with_ctx(&mut input, (&CapabilityFlags::PROTOCOL_41, true)).unwrap();
        assert_eq!(0xff, err.header);
        assert_eq!(1236, err.error_code);
        assert_eq!(&b"HY000"[..], &err.sql_state[..]);
    }

    #[test]
    fn test_eof_packet() {
        let mut input = Bytes::from_static(&[0xfe, 0x00, 0x00, 0x02, 0x00]);
        let eof = EofPacket::read_with_ctx(&mut input, &CapabilityFlags::PROTOCOL_41).unwrap();
        assert_eq!(0xfe, eof.header);
        assert!(eof.status_flags.contains(StatusFlags::STATUS_AUTOCOMMIT));
    }

    #[test]
    fn test_dump_packet_event() {
        let mut input = Bytes::from_static(&[0x00, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        match DumpPacket::read_with_ctx(&mut input, &CapabilityFlags::PROTOCOL_41).unwrap() {
            DumpPacket::Event(payload) => assert_eq!(10, payload.len()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dump_packet_eof() {
        let mut input = Bytes::from_static(&[0xfe, 0x00, 0x00, 0x02, 0x00]);
        match DumpPacket::read_with_ctx(&mut input, &CapabilityFlags::PROTOCOL_41).unwrap() {
            DumpPacket::Eof => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
