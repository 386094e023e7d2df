//! format description event
use super::LogEventType;
use bytes::{Buf, Bytes};
use bytes_parser::error::Result;
use bytes_parser::{ReadBytesExt, ReadFromBytes};

/// Data of FormatDescriptionEvent
///
/// reference: https://dev.mysql.com/doc/internals/en/format-description-event.html
#[derive(Debug, Clone)]
pub struct FormatDescriptionData {
    pub binlog_version: u16,
    pub server_version: String,
    pub create_timestamp: u32,
    pub header_length: u8,
    pub post_header_lengths: Vec<u8>,
    // 0 or 1 after mysql 5.6.1, 0 for earlier versions
    pub checksum_flag: u8,
}

impl ReadFromBytes for FormatDescriptionData {
    fn read_from(input: &mut Bytes) -> Result<FormatDescriptionData> {
        let binlog_version = input.read_le_u16()?;
        let mut server_version = input.read_len(50)?;
        let server_version = server_version.read_until(0, false)?;
        let server_version = String::from_utf8(Vec::from(&server_version[..]))?;
        let create_timestamp = input.read_le_u32()?;
        let header_length = input.read_u8()?;
        // 57(2+50+4+1) bytes consumed so far
        //
        // from 5.6.1 on, a checksum algorithm byte follows the post
        // header lengths, and a 4-byte checksum value may trail; the
        // FDE's own self-describing post header length tells which
        // layout is present
        let fde_type_code = u8::from(LogEventType::FormatDescriptionEvent);
        if input.remaining() < fde_type_code as usize {
            return Err(bytes_parser::error::Error::ConstraintError(
                "format description payload too short".to_owned(),
            ));
        }
        let fde_post_header_len = input[fde_type_code as usize - 1]
            .checked_sub(57)
            .ok_or_else(|| {
                bytes_parser::error::Error::ConstraintError(
                    "invalid format description post header length".to_owned(),
                )
            })?;
        if input.remaining() == fde_post_header_len as usize {
            // version without checksum support
            let post_header_lengths = Vec::from(&input.split_to(input.remaining())[..]);
            return Ok(FormatDescriptionData {
                binlog_version,
                server_version,
                create_timestamp,
                header_length,
                post_header_lengths,
                checksum_flag: 0,
            });
        }
        let post_header_lengths = Vec::from(&input.split_to(fde_post_header_len as usize)[..]);
        let checksum_flag = input.read_u8()?;
        // a 4-byte crc32 may remain, the caller strips it
        Ok(FormatDescriptionData {
            binlog_version,
            server_version,
            create_timestamp,
            header_length,
            post_header_lengths,
            checksum_flag,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_fde_payload(checksum: bool) -> Vec<u8> {
        // 38 event types with 5.7.30-style post header lengths
        let post_header_lengths: [u8; 38] = [
            56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 95, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2,
            0, 0, 0, 10, 10, 10, 42, 42, 0, 18, 52, 0,
        ];
        let mut v = Vec::new();
        v.extend_from_slice(&4u16.to_le_bytes());
        let mut server_version = b"5.7.30-log".to_vec();
        server_version.resize(50, 0);
        v.extend_from_slice(&server_version);
        v.extend_from_slice(&1590000000u32.to_le_bytes());
        v.push(19);
        v.extend_from_slice(&post_header_lengths);
        if checksum {
            v.push(1);
        }
        v
    }

    #[test]
    fn test_fde_with_checksum() {
        let mut input = Bytes::from(sample_fde_payload(true));
        let fdd = FormatDescriptionData::read_from(&mut input).unwrap();
        assert_eq!(4, fdd.binlog_version);
        assert_eq!("5.7.30-log", fdd.server_version);
        assert_eq!(1, fdd.checksum_flag);
        assert_eq!(38, fdd.post_header_lengths.len());
        // self-describing FDE post header length
        assert_eq!(95, fdd.post_header_lengths[14]);
    }

    #[test]
    fn test_fde_without_checksum() {
        // before 5.6.1 the FDE post header length covers the whole tail
        let mut payload = sample_fde_payload(false);
        payload[57 + 14] = 38 + 57;
        let mut input = Bytes::from(payload);
        let fdd = FormatDescriptionData::read_from(&mut input).unwrap();
        assert_eq!(0, fdd.checksum_flag);
        assert_eq!(38, fdd.post_header_lengths.len());
    }
}
