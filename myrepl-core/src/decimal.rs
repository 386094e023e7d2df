//! decoding of the packed BCD representation MySQL uses for NEWDECIMAL
//!
//! nine decimal digits pack into four big-endian bytes, the leading and
//! trailing fragments shrink to the byte width their digit count needs,
//! and the sign lives in the top bit of the first byte (inverted for
//! positive values; negative values are stored complemented)
use crate::error::Result;
use bigdecimal::BigDecimal;
use bytes::Bytes;
use bytes_parser::error::{Error as BError, Result as BResult};
use bytes_parser::ReadBytesExt;
use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

const DIG_PER_DEC1: u8 = 9;
const DIG_TO_BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

#[derive(Debug, Clone, PartialEq)]
pub struct MyDecimal {
    // number of decimal digits before the point
    pub intg: u8,
    // number of decimal digits after the point
    pub frac: u8,
    pub negative: bool,
    // digit fragments, up to nine decimal digits each;
    // the first integral and last fractional fragment keep
    // their natural (possibly shorter) width
    pub buf: Vec<u32>,
}

impl MyDecimal {
    pub fn zero(intg: u8, frac: u8) -> Self {
        Self {
            intg,
            frac,
            negative: false,
            buf: vec![],
        }
    }

    /// byte length of the binary image for given precision split
    pub fn bin_size(intg: u8, frac: u8) -> usize {
        let intg0 = (intg / DIG_PER_DEC1) as usize;
        let frac0 = (frac / DIG_PER_DEC1) as usize;
        let intg0x = (intg % DIG_PER_DEC1) as usize;
        let frac0x = (frac % DIG_PER_DEC1) as usize;
        intg0 * 4 + DIG_TO_BYTES[intg0x] + frac0 * 4 + DIG_TO_BYTES[frac0x]
    }

    /// consume exactly the binary image of a decimal with the
    /// given digit counts from the cursor
    pub fn read_from(input: &mut Bytes, intg: u8, frac: u8) -> BResult<Self> {
        let bin_size = Self::bin_size(intg, frac);
        let raw = input.read_len(bin_size)?;
        let mut image = Vec::from(&raw[..]);
        if image.is_empty() {
            return Ok(Self::zero(intg, frac));
        }
        // positive values carry the sign bit set
        let negative = image[0] & 0x80 != 0x80;
        image[0] ^= 0x80;
        if negative {
            for b in image.iter_mut() {
                *b = !*b;
            }
        }
        let mut cursor = Bytes::from(image);
        let intg0 = intg / DIG_PER_DEC1;
        let frac0 = frac / DIG_PER_DEC1;
        let intg0x = intg % DIG_PER_DEC1;
        let frac0x = frac % DIG_PER_DEC1;
        let mut buf = Vec::with_capacity((intg0 + frac0 + 2) as usize);
        if intg0x > 0 {
            buf.push(read_fragment(&mut cursor, DIG_TO_BYTES[intg0x as usize])?);
        }
        for _ in 0..intg0 {
            buf.push(read_fragment(&mut cursor, 4)?);
        }
        for _ in 0..frac0 {
            buf.push(read_fragment(&mut cursor, 4)?);
        }
        if frac0x > 0 {
            buf.push(read_fragment(&mut cursor, DIG_TO_BYTES[frac0x as usize])?);
        }
        Ok(Self {
            intg,
            frac,
            negative,
            buf,
        })
    }

    pub fn to_bigdecimal(&self) -> Result<BigDecimal> {
        Ok(BigDecimal::from_str(&self.to_string())?)
    }
}

impl fmt::Display for MyDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intg0 = self.intg / DIG_PER_DEC1;
        let intg0x = self.intg % DIG_PER_DEC1;
        let frac0 = self.frac / DIG_PER_DEC1;
        let frac0x = self.frac % DIG_PER_DEC1;
        let frag = |i: usize| self.buf.get(i).copied().unwrap_or(0);
        let mut i = 0;
        let mut int_str = String::new();
        if intg0x > 0 {
            write!(int_str, "{}", frag(i))?;
            i += 1;
        }
        for _ in 0..intg0 {
            if int_str.is_empty() {
                write!(int_str, "{}", frag(i))?;
            } else {
                write!(int_str, "{:09}", frag(i))?;
            }
            i += 1;
        }
        let int_str = int_str.trim_start_matches('0');
        let int_str = if int_str.is_empty() { "0" } else { int_str };
        let mut frac_str = String::new();
        for _ in 0..frac0 {
            write!(frac_str, "{:09}", frag(i))?;
            i += 1;
        }
        if frac0x > 0 {
            write!(frac_str, "{:0width$}", frag(i), width = frac0x as usize)?;
        }
        let nonzero = self.buf.iter().any(|&n| n != 0);
        if self.negative && nonzero {
            write!(f, "-")?;
        }
        write!(f, "{}", int_str)?;
        if !frac_str.is_empty() {
            write!(f, ".{}", frac_str)?;
        }
        Ok(())
    }
}

fn read_fragment(input: &mut Bytes, len: usize) -> BResult<u32> {
    let frag = match len {
        1 => input.read_u8()? as u32,
        2 => input.read_be_u16()? as u32,
        3 => input.read_be_u24()?,
        4 => input.read_be_u32()?,
        _ => {
            return Err(BError::ConstraintError(format!(
                "unexpected decimal fragment length {}",
                len
            )))
        }
    };
    Ok(frag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_decimal_positive() {
        // 1 234567890 . 1234
        let mut bs = Bytes::from(vec![0x81, 0x0d, 0xfb, 0x38, 0xd2, 0x04, 0xd2]);
        let d = MyDecimal::read_from(&mut bs, 10, 4).unwrap();
        assert!(!d.negative);
        assert_eq!(vec![1, 234567890, 1234], d.buf);
        assert_eq!("1234567890.1234", d.to_string());
        assert!(bs.is_empty());
    }

    #[test]
    fn test_read_decimal_negative() {
        let mut bs = Bytes::from(vec![0x7E, 0xF2, 0x04, 0xC7, 0x2D, 0xFB, 0x2D]);
        let d = MyDecimal::read_from(&mut bs, 10, 4).unwrap();
        assert!(d.negative);
        assert_eq!("-1234567890.1234", d.to_string());
    }

    #[test]
    fn test_decimal_inner_fragment_padding() {
        // 1000000005.00 as DECIMAL(12, 2): fragments 1, 000000005, 00
        let mut image = vec![0u8];
        image.extend_from_slice(&1u32.to_be_bytes());
        image.extend_from_slice(&5u32.to_be_bytes());
        image.push(0);
        image[0] ^= 0x80;
        let mut bs = Bytes::from(image);
        let d = MyDecimal::read_from(&mut bs, 10, 2).unwrap();
        assert_eq!("1000000005.00", d.to_string());
    }

    #[test]
    fn test_decimal_23_0_round_trip_display() {
        // 12345678912345678912345 as DECIMAL(23, 0):
        // fragments 12345 (5 digits, 3 bytes), 678912345, 678912345
        let mut image = Vec::new();
        image.extend_from_slice(&12345u32.to_be_bytes()[1..]);
        image.extend_from_slice(&678912345u32.to_be_bytes());
        image.extend_from_slice(&678912345u32.to_be_bytes());
        image[0] ^= 0x80;
        let mut bs = Bytes::from(image.clone());
        let d = MyDecimal::read_from(&mut bs, 23, 0).unwrap();
        assert_eq!("12345678912345678912345", d.to_string());

        // the same image complemented is the negative value
        let mut neg = image;
        for b in neg.iter_mut() {
            *b = !*b;
        }
        let mut bs = Bytes::from(neg);
        let d = MyDecimal::read_from(&mut bs, 23, 0).unwrap();
        assert_eq!("-12345678912345678912345", d.to_string());
    }

    #[test]
    fn test_decimal_30_15_boundary() {
        // 10^15 - 1 . 10^15 - 1 as DECIMAL(30, 15)
        let mut image = Vec::new();
        image.extend_from_slice(&999999u32.to_be_bytes()[1..]);
        image.extend_from_slice(&999999999u32.to_be_bytes());
        image.extend_from_slice(&999999999u32.to_be_bytes());
        image.extend_from_slice(&999999u32.to_be_bytes()[1..]);
        image[0] ^= 0x80;
        let mut bs = Bytes::from(image.clone());
        let d = MyDecimal::read_from(&mut bs, 15, 15).unwrap();
        assert_eq!("999999999999999.999999999999999", d.to_string());

        let mut neg = image;
        for b in neg.iter_mut() {
            *b = !*b;
        }
        let mut bs = Bytes::from(neg);
        let d = MyDecimal::read_from(&mut bs, 15, 15).unwrap();
        assert_eq!("-999999999999999.999999999999999", d.to_string());
    }

    #[test]
    fn test_decimal_fraction_only() {
        // 0.5000 as DECIMAL(4, 4): single 2-byte fraction fragment
        let mut image = vec![0x80u8];
        image.extend_from_slice(&5000u16.to_be_bytes());
        let mut bs = Bytes::from(image);
        let d = MyDecimal::read_from(&mut bs, 0, 4).unwrap();
        assert_eq!("0.5000", d.to_string());
    }

    #[test]
    fn test_decimal_zero() {
        let mut bs = Bytes::from(vec![0x80u8, 0]);
        let d = MyDecimal::read_from(&mut bs, 4, 0).unwrap();
        assert_eq!("0", d.to_string());
    }

    #[test]
    fn test_decimal_to_bigdecimal() {
        let mut bs = Bytes::from(vec![0x81, 0x0d, 0xfb, 0x38, 0xd2, 0x04, 0xd2]);
        let d = MyDecimal::read_from(&mut bs, 10, 4).unwrap();
        let bd = d.to_bigdecimal().unwrap();
        assert_eq!(BigDecimal::from_str("1234567890.1234").unwrap(), bd);
    }

    #[test]
    fn test_bin_size() {
        assert_eq!(7, MyDecimal::bin_size(10, 4));
        assert_eq!(11, MyDecimal::bin_size(23, 0));
        assert_eq!(2, MyDecimal::bin_size(0, 4));
        // DECIMAL(65, 30)
        assert_eq!(16 + 14, MyDecimal::bin_size(35, 30));
    }
}
