//! column types, table-map metadata and the row-image value codec
use crate::decimal::MyDecimal;
use crate::time::{read_timestamp2, MyDateTime, MyTime};
use bitflags::bitflags;
use bytes::Bytes;
use bytes_parser::error::{Error, Result};
use bytes_parser::my::ReadMyEnc;
use bytes_parser::{ReadBytesExt, ReadFromBytesWithContext};
use std::convert::TryFrom;

/// ColumnType defined in binlog
///
/// the complete list:
/// https://github.com/mysql/mysql-server/blob/5.7/libbinlogevents/export/binary_log_types.h
///
/// ENUM, SET and the blob subtypes never appear in TABLE_MAP column
/// definitions directly, they hide behind STRING / BLOB, see
/// https://github.com/mysql/mysql-server/blob/5.7/libbinlogevents/include/rows_event.h#L174
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    Varchar,
    Bit,
    Timestamp2,
    DateTime2,
    Time2,
    Json,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
}

impl TryFrom<u8> for ColumnType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        let ct = match code {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0a => ColumnType::Date,
            0x0b => ColumnType::Time,
            0x0c => ColumnType::DateTime,
            0x0d => ColumnType::Year,
            0x0e => ColumnType::NewDate,
            0x0f => ColumnType::Varchar,
            0x10 => ColumnType::Bit,
            0x11 => ColumnType::Timestamp2,
            0x12 => ColumnType::DateTime2,
            0x13 => ColumnType::Time2,
            0xf5 => ColumnType::Json,
            0xf6 => ColumnType::NewDecimal,
            0xf7 => ColumnType::Enum,
            0xf8 => ColumnType::Set,
            0xf9 => ColumnType::TinyBlob,
            0xfa => ColumnType::MediumBlob,
            0xfb => ColumnType::LongBlob,
            0xfc => ColumnType::Blob,
            0xfd => ColumnType::VarString,
            0xfe => ColumnType::String,
            0xff => ColumnType::Geometry,
            _ => {
                return Err(Error::ConstraintError(format!(
                    "invalid column type code: {}",
                    code
                )))
            }
        };
        Ok(ct)
    }
}

impl From<ColumnType> for u8 {
    fn from(ct: ColumnType) -> u8 {
        match ct {
            ColumnType::Decimal => 0x00,
            ColumnType::Tiny => 0x01,
            ColumnType::Short => 0x02,
            ColumnType::Long => 0x03,
            ColumnType::Float => 0x04,
            ColumnType::Double => 0x05,
            ColumnType::Null => 0x06,
            ColumnType::Timestamp => 0x07,
            ColumnType::LongLong => 0x08,
            ColumnType::Int24 => 0x09,
            ColumnType::Date => 0x0a,
            ColumnType::Time => 0x0b,
            ColumnType::DateTime => 0x0c,
            ColumnType::Year => 0x0d,
            ColumnType::NewDate => 0x0e,
            ColumnType::Varchar => 0x0f,
            ColumnType::Bit => 0x10,
            ColumnType::Timestamp2 => 0x11,
            ColumnType::DateTime2 => 0x12,
            ColumnType::Time2 => 0x13,
            ColumnType::Json => 0xf5,
            ColumnType::NewDecimal => 0xf6,
            ColumnType::Enum => 0xf7,
            ColumnType::Set => 0xf8,
            ColumnType::TinyBlob => 0xf9,
            ColumnType::MediumBlob => 0xfa,
            ColumnType::LongBlob => 0xfb,
            ColumnType::Blob => 0xfc,
            ColumnType::VarString => 0xfd,
            ColumnType::String => 0xfe,
            ColumnType::Geometry => 0xff,
        }
    }
}

/// per-column decode instructions, derived from the column type byte
/// and the type-specific metadata bytes of TABLE_MAP
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnMeta {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    Varchar { max_len: u16 },
    Bit { bits: u8, bytes: u8 },
    Timestamp2 { fsp: u8 },
    DateTime2 { fsp: u8 },
    Time2 { fsp: u8 },
    Json { pack_len: u8 },
    NewDecimal { precision: u8, decimals: u8 },
    Enum { pack_len: u8 },
    Set { pack_len: u8 },
    Blob { pack_len: u8 },
    VarString { max_len: u16 },
    String { max_len: u16 },
    Geometry { pack_len: u8 },
}

impl ColumnMeta {
    /// total BIT width in bits
    pub fn bit_len(&self) -> Option<u16> {
        match self {
            ColumnMeta::Bit { bits, bytes } => Some(*bytes as u16 * 8 + *bits as u16),
            _ => None,
        }
    }
}

impl ReadFromBytesWithContext<'_> for ColumnMeta {
    type Context = ColumnType;

    fn read_with_ctx(input: &mut Bytes, col_type: Self::Context) -> Result<Self> {
        let col_meta = match col_type {
            ColumnType::Decimal => ColumnMeta::Decimal,
            ColumnType::Tiny => ColumnMeta::Tiny,
            ColumnType::Short => ColumnMeta::Short,
            ColumnType::Long => ColumnMeta::Long,
            // the single metadata byte is the pack length, fixed by the type
            ColumnType::Float => {
                input.read_u8()?;
                ColumnMeta::Float
            }
            ColumnType::Double => {
                input.read_u8()?;
                ColumnMeta::Double
            }
            ColumnType::Null => ColumnMeta::Null,
            ColumnType::Timestamp => ColumnMeta::Timestamp,
            ColumnType::LongLong => ColumnMeta::LongLong,
            ColumnType::Int24 => ColumnMeta::Int24,
            ColumnType::Date => ColumnMeta::Date,
            ColumnType::Time => ColumnMeta::Time,
            ColumnType::DateTime => ColumnMeta::DateTime,
            ColumnType::Year => ColumnMeta::Year,
            ColumnType::NewDate => ColumnMeta::NewDate,
            ColumnType::Varchar => {
                let max_len = input.read_le_u16()?;
                ColumnMeta::Varchar { max_len }
            }
            ColumnType::Bit => {
                let bits = input.read_u8()?;
                let bytes = input.read_u8()?;
                ColumnMeta::Bit { bits, bytes }
            }
            ColumnType::Timestamp2 => ColumnMeta::Timestamp2 {
                fsp: input.read_u8()?,
            },
            ColumnType::DateTime2 => ColumnMeta::DateTime2 {
                fsp: input.read_u8()?,
            },
            ColumnType::Time2 => ColumnMeta::Time2 {
                fsp: input.read_u8()?,
            },
            ColumnType::Json => ColumnMeta::Json {
                pack_len: input.read_u8()?,
            },
            ColumnType::NewDecimal => {
                let precision = input.read_u8()?;
                let decimals = input.read_u8()?;
                ColumnMeta::NewDecimal {
                    precision,
                    decimals,
                }
            }
            ColumnType::Enum => ColumnMeta::Enum {
                pack_len: input.read_u8()?,
            },
            ColumnType::Set => ColumnMeta::Set {
                pack_len: input.read_u8()?,
            },
            ColumnType::TinyBlob
            | ColumnType::MediumBlob
            | ColumnType::LongBlob
            | ColumnType::Blob => ColumnMeta::Blob {
                pack_len: input.read_u8()?,
            },
            ColumnType::VarString => {
                let max_len = input.read_le_u16()?;
                ColumnMeta::VarString { max_len }
            }
            // STRING multiplexes CHAR, ENUM and SET; the real type hides
            // in the upper bits of the first metadata byte
            ColumnType::String => {
                let b0 = input.read_u8()?;
                let b1 = input.read_u8()?;
                let real_type = if b0 & 0x30 != 0x30 { b0 | 0x30 } else { b0 };
                match ColumnType::try_from(real_type)? {
                    ColumnType::Enum => ColumnMeta::Enum { pack_len: b1 },
                    ColumnType::Set => ColumnMeta::Set { pack_len: b1 },
                    _ => {
                        let max_len = if b0 & 0x30 != 0x30 {
                            (b1 as u16) | ((((b0 as u16) & 0x30) ^ 0x30) << 4)
                        } else {
                            b1 as u16
                        };
                        ColumnMeta::String { max_len }
                    }
                }
            }
            ColumnType::Geometry => ColumnMeta::Geometry {
                pack_len: input.read_u8()?,
            },
        };
        Ok(col_meta)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMetas(pub Vec<ColumnMeta>);

impl<'c> ReadFromBytesWithContext<'c> for ColumnMetas {
    type Context = (usize, &'c [u8]);

    fn read_with_ctx(input: &mut Bytes, (col_cnt, col_defs): Self::Context) -> Result<Self> {
        let mut col_metas = Vec::with_capacity(col_cnt);
        for &def in col_defs.iter().take(col_cnt) {
            let col_type = ColumnType::try_from(def)?;
            col_metas.push(ColumnMeta::read_with_ctx(input, col_type)?);
        }
        Ok(ColumnMetas(col_metas))
    }
}

impl std::ops::Deref for ColumnMetas {
    type Target = [ColumnMeta];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// column value decoded from a binlog row image
///
/// integers are kept raw little-endian unsigned, signedness is a
/// schema-level property applied by the consumer layer
#[derive(Debug, Clone, PartialEq)]
pub enum BinlogColumnValue {
    Null,
    Tiny(u8),
    Short(u16),
    Int24(u32),
    Long(u32),
    LongLong(u64),
    Float(f32),
    Double(f64),
    Decimal(MyDecimal),
    Date {
        year: u16,
        month: u8,
        day: u8,
    },
    Time(MyTime),
    DateTime(MyDateTime),
    Timestamp {
        seconds: u32,
        micro_second: u32,
    },
    Year(u16),
    Varchar(Bytes),
    Bit(Bytes),
    Enum(u16),
    Set(u64),
    Blob(Bytes),
    Json(Bytes),
    Geometry(Bytes),
}

impl<'c> ReadFromBytesWithContext<'c> for BinlogColumnValue {
    type Context = &'c ColumnMeta;

    fn read_with_ctx(input: &mut Bytes, col_meta: Self::Context) -> Result<Self> {
        let col_val = match col_meta {
            ColumnMeta::Decimal => {
                // old pre-5.0 decimal, stored as text
                let v = input.read_len_enc_str()?;
                match v.into_bytes() {
                    Some(bs) => BinlogColumnValue::Varchar(bs),
                    None => BinlogColumnValue::Null,
                }
            }
            ColumnMeta::Tiny => BinlogColumnValue::Tiny(input.read_u8()?),
            ColumnMeta::Short => BinlogColumnValue::Short(input.read_le_u16()?),
            ColumnMeta::Int24 => BinlogColumnValue::Int24(input.read_le_u24()?),
            ColumnMeta::Long => BinlogColumnValue::Long(input.read_le_u32()?),
            ColumnMeta::LongLong => BinlogColumnValue::LongLong(input.read_le_u64()?),
            ColumnMeta::Float => BinlogColumnValue::Float(input.read_le_f32()?),
            ColumnMeta::Double => BinlogColumnValue::Double(input.read_le_f64()?),
            ColumnMeta::Null => BinlogColumnValue::Null,
            ColumnMeta::NewDecimal {
                precision,
                decimals,
            } => {
                let d = MyDecimal::read_from(input, precision - decimals, *decimals)?;
                BinlogColumnValue::Decimal(d)
            }
            ColumnMeta::Date | ColumnMeta::NewDate => {
                let packed = input.read_le_u24()?;
                let day = (packed & 0x1f) as u8;
                let month = ((packed >> 5) & 0x0f) as u8;
                let year = (packed >> 9) as u16;
                if year == 0 && month == 0 && day == 0 {
                    BinlogColumnValue::Null
                } else {
                    BinlogColumnValue::Date { year, month, day }
                }
            }
            ColumnMeta::Time => BinlogColumnValue::Time(MyTime::read_time(input)?),
            ColumnMeta::Time2 { fsp } => {
                BinlogColumnValue::Time(MyTime::read_time2(input, *fsp)?)
            }
            ColumnMeta::DateTime => {
                let dt = MyDateTime::read_datetime(input)?;
                if dt.is_zero() {
                    BinlogColumnValue::Null
                } else {
                    BinlogColumnValue::DateTime(dt)
                }
            }
            ColumnMeta::DateTime2 { fsp } => {
                let dt = MyDateTime::read_datetime2(input, *fsp)?;
                if dt.is_zero() {
                    BinlogColumnValue::Null
                } else {
                    BinlogColumnValue::DateTime(dt)
                }
            }
            ColumnMeta::Timestamp => BinlogColumnValue::Timestamp {
                seconds: input.read_le_u32()?,
                micro_second: 0,
            },
            ColumnMeta::Timestamp2 { fsp } => {
                let (seconds, micro_second) = read_timestamp2(input, *fsp)?;
                BinlogColumnValue::Timestamp {
                    seconds,
                    micro_second,
                }
            }
            ColumnMeta::Year => {
                let y = input.read_u8()?;
                BinlogColumnValue::Year(if y == 0 { 0 } else { 1900 + y as u16 })
            }
            ColumnMeta::Varchar { max_len }
            | ColumnMeta::VarString { max_len }
            | ColumnMeta::String { max_len } => {
                let len = if *max_len > 255 {
                    input.read_le_u16()? as usize
                } else {
                    input.read_u8()? as usize
                };
                BinlogColumnValue::Varchar(input.read_len(len)?)
            }
            ColumnMeta::Bit { bits, bytes } => {
                let len = (*bytes as usize * 8 + *bits as usize + 7) / 8;
                BinlogColumnValue::Bit(input.read_len(len)?)
            }
            ColumnMeta::Enum { pack_len } => {
                let idx = match *pack_len {
                    1 => input.read_u8()? as u16,
                    2 => input.read_le_u16()?,
                    _ => {
                        return Err(Error::ConstraintError(format!(
                            "invalid enum pack length {}",
                            pack_len
                        )))
                    }
                };
                BinlogColumnValue::Enum(idx)
            }
            ColumnMeta::Set { pack_len } => {
                let mask = read_packed_uint(input, *pack_len)?;
                BinlogColumnValue::Set(mask)
            }
            ColumnMeta::Blob { pack_len } => {
                let len = read_packed_uint(input, *pack_len)? as usize;
                BinlogColumnValue::Blob(input.read_len(len)?)
            }
            ColumnMeta::Json { pack_len } => {
                let len = read_packed_uint(input, *pack_len)? as usize;
                BinlogColumnValue::Json(input.read_len(len)?)
            }
            ColumnMeta::Geometry { pack_len } => {
                let len = read_packed_uint(input, *pack_len)? as usize;
                BinlogColumnValue::Geometry(input.read_len(len)?)
            }
        };
        Ok(col_val)
    }
}

/// little-endian unsigned integer of 1..=8 bytes
fn read_packed_uint(input: &mut Bytes, len: u8) -> Result<u64> {
    if len == 0 || len > 8 {
        return Err(Error::ConstraintError(format!(
            "invalid packed integer length {}",
            len
        )));
    }
    let bs = input.read_len(len as usize)?;
    Ok(bs
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// column value parsed from text protocol
pub type TextColumnValue = Option<Bytes>;

/// Column definition
///
/// reference: https://dev.mysql.com/doc/internals/en/com-query-response.html
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    // len-enc-str
    pub catalog: String,
    // len-enc-str
    pub schema: String,
    // len-enc-str
    pub table: String,
    // len-enc-str
    pub org_table: String,
    // len-enc-str
    pub name: String,
    // len-enc-str
    pub org_name: String,
    // len-enc-int, always 0x0c
    pub charset: u16,
    pub col_len: u32,
    pub col_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
    // 2-byte filler
}

impl ReadFromBytesWithContext<'_> for ColumnDefinition {
    type Context = ();

    fn read_with_ctx(input: &mut Bytes, _ctx: ()) -> Result<Self> {
        let catalog = input.read_len_enc_str()?.into_string()?;
        let schema = input.read_len_enc_str()?.into_string()?;
        let table = input.read_len_enc_str()?.into_string()?;
        let org_table = input.read_len_enc_str()?.into_string()?;
        let name = input.read_len_enc_str()?.into_string()?;
        let org_name = input.read_len_enc_str()?.into_string()?;
        // fixed-length fields marker, always 0x0c
        input.read_len_enc_int()?;
        let charset = input.read_le_u16()?;
        let col_len = input.read_le_u32()?;
        let col_type = ColumnType::try_from(input.read_u8()?)?;
        let flags = ColumnFlags::from_bits_truncate(input.read_le_u16()?);
        let decimals = input.read_u8()?;
        // two bytes filler
        input.read_len(2)?;
        Ok(ColumnDefinition {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            charset,
            col_len,
            col_type,
            flags,
            decimals,
        })
    }
}

bitflags! {
    /// flags of column, truncated to u16 on the wire
    ///
    /// reference: https://github.com/mysql/mysql-server/blob/5.7/sql/field.h#L4504
    pub struct ColumnFlags: u16 {
        const NOT_NULL      = 0x0001;
        const PRIMARY_KEY   = 0x0002;
        const UNIQUE_KEY    = 0x0004;
        const MULTIPLE_KEY  = 0x0008;
        const BLOB          = 0x0010;
        const UNSIGNED      = 0x0020;
        const ZEROFILL      = 0x0040;
        const BINARY        = 0x0080;
        const ENUM          = 0x0100;
        const AUTO_INCREMENT    = 0x0200;
        const TIMESTAMP     = 0x0400;
        const SET           = 0x0800;
        const NO_DEFAULT_VALUE  = 0x1000;
        const ON_UPDATE_NOW = 0x2000;
        const NUM           = 0x4000;
        const PART_KEY      = 0x8000;
    }
}
