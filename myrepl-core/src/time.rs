//! decoding of mysql time/datetime/timestamp binlog representations
//!
//! the "2" variants pack into big-endian bit fields with the sign bit
//! inverted; fractional seconds occupy ceil(fsp/2) extra bytes
use bytes::Bytes;
use bytes_parser::error::{Error as BError, Result as BResult};
use bytes_parser::ReadBytesExt;
use chrono::{NaiveDate, NaiveDateTime};
use serde_derive::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MyTime {
    pub negative: bool,
    pub days: u32,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micro_second: u32,
}

impl MyTime {
    /// read TIME2 with given fractional precision
    ///
    /// https://github.com/mysql/mysql-server/blob/5.7/sql-common/my_time.c#L1689
    pub fn read_time2(input: &mut Bytes, fsp: u8) -> BResult<Self> {
        let (packed, negative) = packed_from_time_binary(input, fsp)?;
        let hms = (packed >> 24) & 0xff_ffff;
        let hours = ((hms >> 12) % (1 << 10)) as u32;
        let days = hours / 24;
        let hour = (hours - days * 24) as u8;
        let minute = ((hms >> 6) % (1 << 6)) as u8;
        let second = (hms % (1 << 6)) as u8;
        let micro_second = (packed & 0xff_ffff) as u32;
        Ok(Self {
            negative,
            days,
            hour,
            minute,
            second,
            micro_second,
        })
    }

    /// read the legacy 3-byte TIME, a signed decimal HHMMSS
    pub fn read_time(input: &mut Bytes) -> BResult<Self> {
        let n = input.read_le_i24()?;
        let negative = n < 0;
        let n = n.abs() as u32;
        let hours = n / 10000;
        let days = hours / 24;
        Ok(Self {
            negative,
            days,
            hour: (hours - days * 24) as u8,
            minute: ((n / 100) % 100) as u8,
            second: (n % 100) as u8,
            micro_second: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MyDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micro_second: u32,
}

impl MyDateTime {
    /// read DATETIME2 with given fractional precision
    ///
    /// https://github.com/mysql/mysql-server/blob/5.7/sql-common/my_time.c#L1820
    pub fn read_datetime2(input: &mut Bytes, fsp: u8) -> BResult<Self> {
        let packed = packed_from_datetime_binary(input, fsp)?;
        let ymdhms = (packed >> 24) & 0xff_ffff_ffff;
        let ymd = ymdhms >> 17;
        let ym = ymd >> 5;
        let hms = ymdhms % (1 << 17);
        let day = (ymd % (1 << 5)) as u8;
        let month = (ym % 13) as u8;
        let year = (ym / 13) as u16;
        let hour = (hms >> 12) as u8;
        let minute = ((hms >> 6) % (1 << 6)) as u8;
        let second = (hms % (1 << 6)) as u8;
        let micro_second = (packed & 0xff_ffff) as u32;
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            micro_second,
        })
    }

    /// read the legacy 8-byte DATETIME, a decimal YYYYMMDDHHMMSS
    pub fn read_datetime(input: &mut Bytes) -> BResult<Self> {
        let n = input.read_le_u64()?;
        let date = n / 1_000_000;
        let time = n % 1_000_000;
        Ok(Self {
            year: (date / 10000) as u16,
            month: ((date / 100) % 100) as u8,
            day: (date % 100) as u8,
            hour: (time / 10000) as u8,
            minute: ((time / 100) % 100) as u8,
            second: (time % 100) as u8,
            micro_second: 0,
        })
    }

    /// zero dates and zero-in-date values are not representable
    pub fn is_zero(&self) -> bool {
        self.month == 0 || self.day == 0
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32).and_then(
            |d| {
                d.and_hms_micro_opt(
                    self.hour as u32,
                    self.minute as u32,
                    self.second as u32,
                    self.micro_second,
                )
            },
        )
    }
}

/// read TIMESTAMP2: big-endian epoch seconds plus fractional bytes
pub fn read_timestamp2(input: &mut Bytes, fsp: u8) -> BResult<(u32, u32)> {
    let secs = input.read_be_u32()?;
    let micros = read_fractional(input, fsp)?;
    Ok((secs, micros))
}

fn read_fractional(input: &mut Bytes, fsp: u8) -> BResult<u32> {
    let micros = match fsp {
        0 => 0,
        1 | 2 => input.read_u8()? as u32 * 10000,
        3 | 4 => input.read_be_u16()? as u32 * 100,
        5 | 6 => input.read_be_u24()?,
        _ => {
            return Err(BError::ConstraintError(format!(
                "invalid fractional seconds precision {}",
                fsp
            )))
        }
    };
    Ok(micros)
}

/// convert binary representation of TIME2 to packed u64
///
/// consumes 3 to 6 bytes according to the fractional precision
fn packed_from_time_binary(input: &mut Bytes, fsp: u8) -> BResult<(u64, bool)> {
    let hms = input.read_be_u24()?;
    let negative = hms & 0x80_0000 != 0x80_0000;
    let packed = match fsp {
        0 => {
            let int_part = hms.wrapping_sub(0x80_0000);
            (int_part as u64) << 24
        }
        1 | 2 => {
            let int_part = hms.wrapping_sub(0x80_0000);
            let frac_part = input.read_u8()?;
            ((int_part as u64) << 24) + (frac_part as u64) * 10000
        }
        3 | 4 => {
            let int_part = hms.wrapping_sub(0x80_0000);
            let frac_part = input.read_be_u16()?;
            ((int_part as u64) << 24) + (frac_part as u64) * 100
        }
        5 | 6 => {
            let frac_part = input.read_be_u24()?;
            let p = ((hms as u64) << 24) + (frac_part as u64);
            p.wrapping_sub(0x8000_0000_0000)
        }
        _ => {
            return Err(BError::ConstraintError(format!(
                "invalid fractional length of time {}",
                fsp
            )))
        }
    };
    let packed = if negative {
        (-(packed as i64)) as u64
    } else {
        packed
    };
    Ok((packed, negative))
}

/// convert binary representation of DATETIME2 to packed u64
fn packed_from_datetime_binary(input: &mut Bytes, fsp: u8) -> BResult<u64> {
    let ymdhms = input.read_be_u40()?;
    let negative = ymdhms & 0x80_0000_0000 != 0x80_0000_0000;
    let int_part = ymdhms.wrapping_sub(0x80_0000_0000);
    let packed = (int_part << 24) + read_fractional(input, fsp)? as u64;
    let packed = if negative {
        (-(packed as i64)) as u64
    } else {
        packed
    };
    Ok(packed)
}
