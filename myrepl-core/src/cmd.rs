//! command packets sent by this client
use crate::binlog::gtid::GtidSet;
use crate::Command;
use bitflags::bitflags;
use bytes::BytesMut;
use bytes_parser::error::Result;
use bytes_parser::{WriteBytesExt, WriteToBytes};

#[derive(Debug, Clone)]
pub struct ComQuery {
    pub cmd: Command,
    pub query: String,
}

impl ComQuery {
    pub fn new<S: Into<String>>(query: S) -> Self {
        ComQuery {
            cmd: Command::Query,
            query: query.into(),
        }
    }
}

impl WriteToBytes for ComQuery {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let mut len = 0;
        len += out.write_u8(self.cmd.to_byte())?;
        len += out.write_bytes(self.query.as_bytes())?;
        Ok(len)
    }
}

#[derive(Debug, Clone)]
pub struct ComQuit {
    pub cmd: Command,
}

impl ComQuit {
    pub fn new() -> Self {
        ComQuit { cmd: Command::Quit }
    }
}

impl Default for ComQuit {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteToBytes for ComQuit {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        out.write_u8(self.cmd.to_byte())
    }
}

/// request a binlog network stream from master
/// starting at a given file and position
///
/// layout: cmd(1) pos(4) flags(2) server_id(4) filename(EOF)
#[derive(Debug, Clone)]
pub struct ComBinlogDump {
    pub cmd: Command,
    pub binlog_pos: u32,
    pub flags: BinlogDumpFlags,
    pub server_id: u32,
    pub binlog_filename: String,
}

impl ComBinlogDump {
    pub fn new<S: Into<String>>(
        binlog_filename: S,
        binlog_pos: u32,
        server_id: u32,
        non_blocking: bool,
    ) -> Self {
        let flags = if non_blocking {
            BinlogDumpFlags::NON_BLOCK
        } else {
            BinlogDumpFlags::empty()
        };
        ComBinlogDump {
            cmd: Command::BinlogDump,
            binlog_pos,
            flags,
            server_id,
            binlog_filename: binlog_filename.into(),
        }
    }
}

impl WriteToBytes for ComBinlogDump {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let mut len = 0;
        len += out.write_u8(self.cmd.to_byte())?;
        len += out.write_le_u32(self.binlog_pos)?;
        len += out.write_le_u16(self.flags.bits())?;
        len += out.write_le_u32(self.server_id)?;
        len += out.write_bytes(self.binlog_filename.as_bytes())?;
        Ok(len)
    }
}

bitflags! {
    pub struct BinlogDumpFlags: u16 {
        const NON_BLOCK = 0x0001;
    }
}

/// request the binlog network stream based on a GTID set
///
/// layout: cmd(1) flags(2)=0 server_id(4) name_size(4)=3
/// name(3)=zeroes pos(8)=4 data_size(4) gtid-set encoding
#[derive(Debug, Clone)]
pub struct ComBinlogDumpGtid {
    pub cmd: Command,
    pub flags: u16,
    pub server_id: u32,
    pub gtid_set: GtidSet,
}

impl ComBinlogDumpGtid {
    pub fn new(server_id: u32, gtid_set: GtidSet) -> Self {
        ComBinlogDumpGtid {
            cmd: Command::BinlogDumpGtid,
            // zero for retrocompatibility, the gtid payload always follows
            flags: 0,
            server_id,
            gtid_set,
        }
    }
}

impl WriteToBytes for ComBinlogDumpGtid {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let mut len = 0;
        len += out.write_u8(self.cmd.to_byte())?;
        len += out.write_le_u16(self.flags)?;
        len += out.write_le_u32(self.server_id)?;
        // zeroified 3-byte binlog name
        len += out.write_le_u32(3)?;
        len += out.write_bytes(&[0u8; 3][..])?;
        // binlog position, always the file start
        len += out.write_le_u64(4)?;
        len += out.write_le_u32(self.gtid_set.encoded_len() as u32)?;
        len += out.write_bytes(self.gtid_set)?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    #[test]
    fn test_com_query() {
        let mut out = BytesMut::new();
        ComQuery::new("select 1").write_to(&mut out).unwrap();
        assert_eq!(0x03, out[0]);
        assert_eq!(&b"select 1"[..], &out[1..]);
    }

    #[test]
    fn test_com_binlog_dump() {
        let cmd = ComBinlogDump::new("mysql-bin.000001", 4, 1024, false);
        let mut out = BytesMut::new();
        let len = cmd.write_to(&mut out).unwrap();
        assert_eq!(len, out.len());
        assert_eq!(0x12, out[0]);
        assert_eq!(4, u32::from_le_bytes([out[1], out[2], out[3], out[4]]));
        assert_eq!(0, u16::from_le_bytes([out[5], out[6]]));
        assert_eq!(1024, u32::from_le_bytes([out[7], out[8], out[9], out[10]]));
        assert_eq!(&b"mysql-bin.000001"[..], &out[11..]);
    }

    #[test]
    fn test_com_binlog_dump_non_blocking() {
        let cmd = ComBinlogDump::new("mysql-bin.000001", 4, 1024, true);
        let mut out = BytesMut::new();
        cmd.write_to(&mut out).unwrap();
        assert_eq!(1, u16::from_le_bytes([out[5], out[6]]));
    }

    #[test]
    fn test_com_binlog_dump_gtid() {
        let gtid_set: GtidSet = "57b70f4e-20d3-11e5-a393-4a63946f7eac:1-56"
            .parse()
            .unwrap();
        let encoded_len = gtid_set.encoded_len();
        let cmd = ComBinlogDumpGtid::new(1024, gtid_set);
        let mut out = BytesMut::new();
        let len = cmd.write_to(&mut out).unwrap();
        assert_eq!(len, out.len());
        assert_eq!(0x1e, out[0]);
        // flags
        assert_eq!(0, u16::from_le_bytes([out[1], out[2]]));
        // server id
        assert_eq!(1024, u32::from_le_bytes([out[3], out[4], out[5], out[6]]));
        // empty binlog name
        assert_eq!(3, u32::from_le_bytes([out[7], out[8], out[9], out[10]]));
        assert_eq!(&[0u8; 3][..], &out[11..14]);
        // binlog pos
        assert_eq!(4, u64::from_le_bytes(out[14..22].try_into().unwrap()));
        // payload size then payload
        assert_eq!(
            encoded_len as u32,
            u32::from_le_bytes(out[22..26].try_into().unwrap())
        );
        assert_eq!(encoded_len, out[26..].len());
    }
}
