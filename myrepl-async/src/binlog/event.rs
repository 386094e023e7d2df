//! consumer-facing events and row values
use crate::binlog::table::TableColumn;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use linked_hash_map::LinkedHashMap;
use myrepl_core::col::BinlogColumnValue;
use myrepl_core::time::MyTime;
use serde_derive::Serialize;
use smol_str::SmolStr;
use uuid::Uuid;

/// event classes a consumer can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Rotate,
    FormatDescription,
    Query,
    Xid,
    Gtid,
    Stop,
    TableMap,
    WriteRows,
    UpdateRows,
    DeleteRows,
    NotImplemented,
}

impl EventKind {
    pub fn all() -> Vec<EventKind> {
        vec![
            EventKind::Rotate,
            EventKind::FormatDescription,
            EventKind::Query,
            EventKind::Xid,
            EventKind::Gtid,
            EventKind::Stop,
            EventKind::TableMap,
            EventKind::WriteRows,
            EventKind::UpdateRows,
            EventKind::DeleteRows,
            EventKind::NotImplemented,
        ]
    }
}

/// decoded column value as delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnValue {
    Null,
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    Decimal(BigDecimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(MyTime),
    Year(u16),
    String(String),
    Bytes(Vec<u8>),
    /// binary digit string, e.g. "1000110001100001"
    Bit(String),
    Enum(SmolStr),
    Set(Vec<SmolStr>),
    Json(Vec<u8>),
    Geometry(Vec<u8>),
}

/// one row image, column name to value in table order
pub type RowImage = LinkedHashMap<SmolStr, ColumnValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowsEvent {
    pub table_id: u64,
    pub schema: SmolStr,
    pub table: SmolStr,
    pub columns: Vec<SmolStr>,
    pub rows: Vec<RowImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRowImage {
    pub before_values: RowImage,
    pub after_values: RowImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRowsEvent {
    pub table_id: u64,
    pub schema: SmolStr,
    pub table: SmolStr,
    pub columns: Vec<SmolStr>,
    pub rows: Vec<UpdateRowImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BinlogEvent {
    Rotate {
        position: u64,
        next_binlog: String,
    },
    FormatDescription {
        binlog_version: u16,
        server_version: String,
    },
    Query {
        schema: String,
        query: String,
        execution_time: u32,
        error_code: u16,
    },
    Xid {
        xid: u64,
    },
    Gtid {
        sid: Uuid,
        gno: u64,
    },
    Stop,
    TableMap {
        table_id: u64,
        schema: SmolStr,
        table: SmolStr,
        columns: Vec<SmolStr>,
    },
    WriteRows(RowsEvent),
    UpdateRows(UpdateRowsEvent),
    DeleteRows(RowsEvent),
    NotImplemented {
        event_type: u8,
    },
}

impl BinlogEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BinlogEvent::Rotate { .. } => EventKind::Rotate,
            BinlogEvent::FormatDescription { .. } => EventKind::FormatDescription,
            BinlogEvent::Query { .. } => EventKind::Query,
            BinlogEvent::Xid { .. } => EventKind::Xid,
            BinlogEvent::Gtid { .. } => EventKind::Gtid,
            BinlogEvent::Stop => EventKind::Stop,
            BinlogEvent::TableMap { .. } => EventKind::TableMap,
            BinlogEvent::WriteRows(_) => EventKind::WriteRows,
            BinlogEvent::UpdateRows(_) => EventKind::UpdateRows,
            BinlogEvent::DeleteRows(_) => EventKind::DeleteRows,
            BinlogEvent::NotImplemented { .. } => EventKind::NotImplemented,
        }
    }

    /// schema/table pair for events bound to one table
    pub fn table_ref(&self) -> Option<(&str, &str)> {
        match self {
            BinlogEvent::TableMap { schema, table, .. } => Some((schema, table)),
            BinlogEvent::WriteRows(e) | BinlogEvent::DeleteRows(e) => {
                Some((&e.schema, &e.table))
            }
            BinlogEvent::UpdateRows(e) => Some((&e.schema, &e.table)),
            _ => None,
        }
    }
}

/// delivered event: the common header fields plus the typed body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationEvent {
    pub timestamp: u32,
    pub server_id: u32,
    pub event_size: u32,
    /// next-event position from the header
    pub log_pos: u32,
    pub flags: u16,
    pub data: BinlogEvent,
}

/// interpret a raw decoded value through the column's schema:
/// signedness, character set, enum/set member names
pub(crate) fn value_from_binlog(raw: BinlogColumnValue, col: &TableColumn) -> ColumnValue {
    let unsigned = col
        .schema
        .as_ref()
        .map(|s| s.is_unsigned)
        .unwrap_or(false);
    match raw {
        BinlogColumnValue::Null => ColumnValue::Null,
        BinlogColumnValue::Tiny(v) => {
            if unsigned {
                ColumnValue::UnsignedInt(v as u64)
            } else {
                ColumnValue::SignedInt(v as i8 as i64)
            }
        }
        BinlogColumnValue::Short(v) => {
            if unsigned {
                ColumnValue::UnsignedInt(v as u64)
            } else {
                ColumnValue::SignedInt(v as i16 as i64)
            }
        }
        BinlogColumnValue::Int24(v) => {
            if unsigned {
                ColumnValue::UnsignedInt(v as u64)
            } else {
                let v = if v & 0x80_0000 != 0 {
                    (v | 0xff00_0000) as i32
                } else {
                    v as i32
                };
                ColumnValue::SignedInt(v as i64)
            }
        }
        BinlogColumnValue::Long(v) => {
            if unsigned {
                ColumnValue::UnsignedInt(v as u64)
            } else {
                ColumnValue::SignedInt(v as i32 as i64)
            }
        }
        BinlogColumnValue::LongLong(v) => {
            if unsigned {
                ColumnValue::UnsignedInt(v)
            } else {
                ColumnValue::SignedInt(v as i64)
            }
        }
        BinlogColumnValue::Float(v) => ColumnValue::Float(v),
        BinlogColumnValue::Double(v) => ColumnValue::Double(v),
        BinlogColumnValue::Decimal(d) => match d.to_bigdecimal() {
            Ok(bd) => ColumnValue::Decimal(bd),
            Err(_) => ColumnValue::String(d.to_string()),
        },
        BinlogColumnValue::Date { year, month, day } => {
            match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
                Some(d) => ColumnValue::Date(d),
                None => ColumnValue::Null,
            }
        }
        BinlogColumnValue::Time(t) => ColumnValue::Time(t),
        BinlogColumnValue::DateTime(dt) => match dt.to_naive() {
            Some(ndt) => ColumnValue::DateTime(ndt),
            None => ColumnValue::Null,
        },
        BinlogColumnValue::Timestamp {
            seconds,
            micro_second,
        } => match NaiveDateTime::from_timestamp_opt(seconds as i64, micro_second * 1000) {
            Some(ndt) => ColumnValue::DateTime(ndt),
            None => ColumnValue::Null,
        },
        BinlogColumnValue::Year(y) => ColumnValue::Year(y),
        BinlogColumnValue::Varchar(bs) => {
            if col.is_text() {
                ColumnValue::String(String::from_utf8_lossy(&bs).into_owned())
            } else {
                ColumnValue::Bytes(Vec::from(&bs[..]))
            }
        }
        BinlogColumnValue::Bit(bs) => {
            let width = col.meta.bit_len().unwrap_or(bs.len() as u16 * 8) as usize;
            let mut digits = String::with_capacity(bs.len() * 8);
            for b in bs.iter() {
                digits.push_str(&format!("{:08b}", b));
            }
            let skip = digits.len() - width;
            ColumnValue::Bit(digits.split_off(skip))
        }
        BinlogColumnValue::Enum(idx) => {
            let values = col.schema.as_ref().map(|s| &s.enum_values);
            match values {
                Some(values) if !values.is_empty() => {
                    if idx == 0 {
                        // index zero is the empty pseudo-member
                        ColumnValue::Enum(SmolStr::default())
                    } else {
                        match values.get(idx as usize - 1) {
                            Some(v) => ColumnValue::Enum(v.clone()),
                            None => ColumnValue::UnsignedInt(idx as u64),
                        }
                    }
                }
                _ => ColumnValue::UnsignedInt(idx as u64),
            }
        }
        BinlogColumnValue::Set(mask) => {
            let values = col.schema.as_ref().map(|s| &s.set_values);
            match values {
                Some(values) if !values.is_empty() => {
                    let members = values
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, v)| v.clone())
                        .collect();
                    ColumnValue::Set(members)
                }
                _ => ColumnValue::UnsignedInt(mask),
            }
        }
        BinlogColumnValue::Blob(bs) => {
            // TEXT columns arrive as blobs with a character set
            if col.is_text() {
                ColumnValue::String(String::from_utf8_lossy(&bs).into_owned())
            } else {
                ColumnValue::Bytes(Vec::from(&bs[..]))
            }
        }
        BinlogColumnValue::Json(bs) => ColumnValue::Json(Vec::from(&bs[..])),
        BinlogColumnValue::Geometry(bs) => ColumnValue::Geometry(Vec::from(&bs[..])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::table::{ColumnSchema, TableColumn};
    use myrepl_core::col::ColumnMeta;

    fn plain_col(meta: ColumnMeta) -> TableColumn {
        TableColumn {
            name: SmolStr::from("c"),
            meta,
            nullable: true,
            schema: None,
        }
    }

    fn col_with_schema(meta: ColumnMeta, schema: ColumnSchema) -> TableColumn {
        TableColumn {
            name: SmolStr::from("c"),
            meta,
            nullable: true,
            schema: Some(schema),
        }
    }

    #[test]
    fn test_signed_extension() {
        assert_eq!(
            ColumnValue::SignedInt(-5),
            value_from_binlog(BinlogColumnValue::Tiny(0xfb), &plain_col(ColumnMeta::Tiny))
        );
        assert_eq!(
            ColumnValue::SignedInt(-90034),
            value_from_binlog(
                BinlogColumnValue::Int24((-90034i32 as u32) & 0xff_ffff),
                &plain_col(ColumnMeta::Int24)
            )
        );
    }

    #[test]
    fn test_unsigned_flag() {
        let schema = ColumnSchema::for_tests("c", "int(10) unsigned");
        assert_eq!(
            ColumnValue::UnsignedInt(0xfffffffe),
            value_from_binlog(
                BinlogColumnValue::Long(0xfffffffe),
                &col_with_schema(ColumnMeta::Long, schema)
            )
        );
    }

    #[test]
    fn test_bit_digit_string() {
        let col = plain_col(ColumnMeta::Bit { bits: 0, bytes: 2 });
        assert_eq!(
            ColumnValue::Bit("1000110001100001".to_owned()),
            value_from_binlog(
                BinlogColumnValue::Bit(bytes::Bytes::from_static(&[0x8c, 0x61])),
                &col
            )
        );
    }

    #[test]
    fn test_enum_name_resolution() {
        let schema = ColumnSchema::for_tests("c", "enum('small','medium','large')");
        let col = col_with_schema(ColumnMeta::Enum { pack_len: 1 }, schema);
        assert_eq!(
            ColumnValue::Enum(SmolStr::from("medium")),
            value_from_binlog(BinlogColumnValue::Enum(2), &col)
        );
        assert_eq!(
            ColumnValue::Enum(SmolStr::default()),
            value_from_binlog(BinlogColumnValue::Enum(0), &col)
        );
    }

    #[test]
    fn test_set_members() {
        let schema = ColumnSchema::for_tests("c", "set('a','b','c')");
        let col = col_with_schema(ColumnMeta::Set { pack_len: 1 }, schema);
        assert_eq!(
            ColumnValue::Set(vec![SmolStr::from("a"), SmolStr::from("c")]),
            value_from_binlog(BinlogColumnValue::Set(0b101), &col)
        );
    }

    #[test]
    fn test_text_vs_binary() {
        let text = ColumnSchema::for_tests_with_charset("c", "varchar(50)", Some("utf8"));
        assert_eq!(
            ColumnValue::String("hello".to_owned()),
            value_from_binlog(
                BinlogColumnValue::Varchar(bytes::Bytes::from_static(b"hello")),
                &col_with_schema(ColumnMeta::Varchar { max_len: 150 }, text)
            )
        );
        let binary = ColumnSchema::for_tests_with_charset("c", "varbinary(50)", None);
        assert_eq!(
            ColumnValue::Bytes(b"hello".to_vec()),
            value_from_binlog(
                BinlogColumnValue::Varchar(bytes::Bytes::from_static(b"hello")),
                &col_with_schema(ColumnMeta::Varchar { max_len: 50 }, binary)
            )
        );
    }

    #[test]
    fn test_event_kind() {
        let ev = BinlogEvent::Xid { xid: 9 };
        assert_eq!(EventKind::Xid, ev.kind());
        assert_eq!(None, ev.table_ref());
    }

    #[test]
    fn test_events_serialize_to_json() {
        let mut values = RowImage::new();
        values.insert(SmolStr::from("id"), ColumnValue::SignedInt(1));
        values.insert(
            SmolStr::from("data"),
            ColumnValue::String("Hello World".to_owned()),
        );
        let ev = ReplicationEvent {
            timestamp: 1590000000,
            server_id: 1,
            event_size: 52,
            log_pos: 400,
            flags: 0,
            data: BinlogEvent::WriteRows(RowsEvent {
                table_id: 0x66,
                schema: SmolStr::from("test"),
                table: SmolStr::from("t"),
                columns: vec![SmolStr::from("id"), SmolStr::from("data")],
                rows: vec![values],
            }),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("Hello World"));
        assert!(json.contains("\"log_pos\":400"));
    }
}
