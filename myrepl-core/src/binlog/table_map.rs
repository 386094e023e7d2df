use crate::col::ColumnMetas;
use bytes::{Buf, Bytes};
use bytes_parser::error::{Error, Result};
use bytes_parser::my::ReadMyEnc;
use bytes_parser::{ReadBytesExt, ReadFromBytes};
use smol_str::SmolStr;
use std::convert::TryFrom;

/// Data of TableMapEvent
///
/// reference: https://dev.mysql.com/doc/internals/en/table-map-event.html
/// only binlog v4
#[derive(Debug, Clone)]
pub struct TableMapData {
    // actually a 6-byte integer
    pub table_id: u64,
    pub flags: u16,
    // variable part, decoded on demand
    pub payload: Bytes,
}

impl ReadFromBytes for TableMapData {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let table_id = input.read_le_u48()?;
        let flags = input.read_le_u16()?;
        let payload = input.split_to(input.remaining());
        Ok(TableMapData {
            table_id,
            flags,
            payload,
        })
    }
}

impl TableMapData {
    pub fn table_map(&self) -> crate::error::Result<TableMap> {
        use std::convert::TryInto;
        let mut payload = self.payload.clone();
        let rtm = RawTableMap::read_from(&mut payload)?;
        rtm.try_into()
    }
}

#[derive(Debug, Clone)]
struct RawTableMap {
    schema_name: Bytes,
    table_name: Bytes,
    col_cnt: u64,
    col_defs: Bytes,
    col_meta_defs: Bytes,
    null_bitmap: Bytes,
}

/// reference: https://github.com/mysql/mysql-server/blob/5.7/libbinlogevents/include/rows_event.h
impl ReadFromBytes for RawTableMap {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let schema_name_len = input.read_u8()?;
        let schema_name = input.read_len(schema_name_len as usize)?;
        input.read_len(1)?;
        let table_name_len = input.read_u8()?;
        let table_name = input.read_len(table_name_len as usize)?;
        input.read_len(1)?;
        let col_cnt = input.read_len_enc_int()?;
        let col_cnt = col_cnt
            .to_u64()
            .ok_or_else(|| Error::ConstraintError("error column count".to_owned()))?;
        let col_defs = input.read_len(col_cnt as usize)?;
        let col_meta_defs_len = input.read_len_enc_int()?;
        let col_meta_defs_len = col_meta_defs_len
            .to_u64()
            .ok_or_else(|| Error::ConstraintError("error column meta def length".to_owned()))?;
        let col_meta_defs = input.read_len(col_meta_defs_len as usize)?;
        let bitmap_len = (col_cnt + 7) / 8u64;
        let null_bitmap = input.read_len(bitmap_len as usize)?;
        Ok(RawTableMap {
            schema_name,
            table_name,
            col_cnt,
            col_defs,
            col_meta_defs,
            null_bitmap,
        })
    }
}

/// decoded table map: binds a table id to schema, name and the
/// decode instructions of every column
#[derive(Debug, Clone)]
pub struct TableMap {
    pub schema_name: SmolStr,
    pub table_name: SmolStr,
    pub col_metas: ColumnMetas,
    pub null_bitmap: Vec<u8>,
}

impl TryFrom<RawTableMap> for TableMap {
    type Error = crate::error::Error;

    fn try_from(raw: RawTableMap) -> crate::error::Result<Self> {
        use bytes_parser::ReadFromBytesWithContext;
        let schema_name = SmolStr::from(std::str::from_utf8(&raw.schema_name[..])?);
        let table_name = SmolStr::from(std::str::from_utf8(&raw.table_name[..])?);
        let null_bitmap = Vec::from(&raw.null_bitmap[..]);
        let col_metas = ColumnMetas::read_with_ctx(
            &mut raw.col_meta_defs.clone(),
            (raw.col_cnt as usize, &raw.col_defs[..]),
        )?;
        Ok(TableMap {
            schema_name,
            table_name,
            col_metas,
            null_bitmap,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::col::ColumnMeta;

    /// TABLE_MAP payload for `test.t(id INT, data VARCHAR(50))`,
    /// data nullable
    pub(crate) fn sample_table_map_payload(table_id: u64) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&table_id.to_le_bytes()[..6]);
        v.extend_from_slice(&1u16.to_le_bytes());
        v.push(4);
        v.extend_from_slice(b"test");
        v.push(0);
        v.push(1);
        v.extend_from_slice(b"t");
        v.push(0);
        // two columns: LONG, VARCHAR
        v.push(2);
        v.extend_from_slice(&[0x03, 0x0f]);
        // meta block: only varchar carries bytes (max_len 150)
        v.push(2);
        v.extend_from_slice(&150u16.to_le_bytes());
        // null bitmap: second column nullable
        v.push(0b10);
        v
    }

    #[test]
    fn test_table_map_decode() {
        let mut input = Bytes::from(sample_table_map_payload(0x66));
        let tmd = TableMapData::read_from(&mut input).unwrap();
        assert_eq!(0x66, tmd.table_id);
        let tm = tmd.table_map().unwrap();
        assert_eq!("test", tm.schema_name.as_str());
        assert_eq!("t", tm.table_name.as_str());
        assert_eq!(2, tm.col_metas.len());
        assert_eq!(ColumnMeta::Long, tm.col_metas[0]);
        assert_eq!(ColumnMeta::Varchar { max_len: 150 }, tm.col_metas[1]);
        assert_eq!(vec![0b10u8], tm.null_bitmap);
    }
}
