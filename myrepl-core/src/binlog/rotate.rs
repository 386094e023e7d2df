use bytes::{Buf, Bytes};
use bytes_parser::error::Result;
use bytes_parser::{ReadBytesExt, ReadFromBytes};

/// Data of RotateEvent
///
/// reference: https://dev.mysql.com/doc/internals/en/rotate-event.html
#[derive(Debug, Clone)]
pub struct RotateData {
    pub position: u64,
    // below is variable part
    pub next_binlog_filename: Bytes,
}

impl RotateData {
    pub fn next_binlog(&self) -> Result<String> {
        Ok(String::from_utf8(Vec::from(&self.next_binlog_filename[..]))?)
    }
}

impl ReadFromBytes for RotateData {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let position = input.read_le_u64()?;
        let next_binlog_filename = input.split_to(input.remaining());
        Ok(RotateData {
            position,
            next_binlog_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate() {
        let mut bytes = 4u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"mysql-bin.000002");
        let mut input = Bytes::from(bytes);
        let rd = RotateData::read_from(&mut input).unwrap();
        assert_eq!(4, rd.position);
        assert_eq!("mysql-bin.000002", rd.next_binlog().unwrap());
    }
}
