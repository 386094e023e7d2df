//! MySQL specific encodings: length encoded integers and strings
use crate::error::{Error, Result};
use crate::{ReadBytesExt, WriteBytesExt, WriteToBytes};
use bytes::{Bytes, BytesMut};

/// read MySQL length encoded types off a byte cursor
pub trait ReadMyEnc {
    fn read_len_enc_int(&mut self) -> Result<LenEncInt>;

    fn read_len_enc_str(&mut self) -> Result<LenEncStr>;
}

impl ReadMyEnc for Bytes {
    fn read_len_enc_int(&mut self) -> Result<LenEncInt> {
        let len = self.read_u8()?;
        let lei = match len {
            0xfb => LenEncInt::Null,
            0xfc => LenEncInt::Len3(self.read_le_u16()?),
            0xfd => LenEncInt::Len4(self.read_le_u24()?),
            0xfe => LenEncInt::Len9(self.read_le_u64()?),
            0xff => LenEncInt::Err,
            _ => LenEncInt::Len1(len),
        };
        Ok(lei)
    }

    fn read_len_enc_str(&mut self) -> Result<LenEncStr> {
        let lei = self.read_len_enc_int()?;
        match lei {
            LenEncInt::Err => Ok(LenEncStr::Err),
            LenEncInt::Null => Ok(LenEncStr::Null),
            _ => {
                // err and null already handled
                let len = lei.to_u64().unwrap() as usize;
                let bs = self.read_len(len)?;
                Ok(LenEncStr::Bytes(bs))
            }
        }
    }
}

/// MySQL length encoded integer
#[derive(Debug, Clone, PartialEq)]
pub enum LenEncInt {
    Null,
    Err,
    Len1(u8),
    Len3(u16),
    Len4(u32),
    Len9(u64),
}

impl LenEncInt {
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            LenEncInt::Len1(n) => Some(*n as u64),
            LenEncInt::Len3(n) => Some(*n as u64),
            LenEncInt::Len4(n) => Some(*n as u64),
            LenEncInt::Len9(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_u32(&self) -> Option<u32> {
        self.to_u64().map(|n| n as u32)
    }
}

impl WriteToBytes for LenEncInt {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let len = match self {
            LenEncInt::Null => out.write_u8(0xfb)?,
            LenEncInt::Err => out.write_u8(0xff)?,
            LenEncInt::Len1(n) => out.write_u8(n)?,
            LenEncInt::Len3(n) => {
                out.write_u8(0xfc)?;
                1 + out.write_le_u16(n)?
            }
            LenEncInt::Len4(n) => {
                out.write_u8(0xfd)?;
                1 + out.write_le_u24(n)?
            }
            LenEncInt::Len9(n) => {
                out.write_u8(0xfe)?;
                1 + out.write_le_u64(n)?
            }
        };
        Ok(len)
    }
}

/// convert unsigned integers to the shortest len-enc-int form
impl From<u64> for LenEncInt {
    fn from(src: u64) -> Self {
        if src <= 0xfa {
            LenEncInt::Len1(src as u8)
        } else if src <= 0xffff {
            LenEncInt::Len3(src as u16)
        } else if src <= 0xff_ffff {
            LenEncInt::Len4(src as u32)
        } else {
            LenEncInt::Len9(src)
        }
    }
}

impl From<u32> for LenEncInt {
    fn from(src: u32) -> Self {
        Self::from(src as u64)
    }
}

/// MySQL length encoded string
#[derive(Debug, Clone, PartialEq)]
pub enum LenEncStr {
    Null,
    Err,
    Bytes(Bytes),
}

impl LenEncStr {
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            LenEncStr::Bytes(bs) => Some(bs),
            _ => None,
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            LenEncStr::Bytes(bs) => Ok(String::from_utf8(Vec::from(&bs[..]))?),
            other => Err(Error::ConstraintError(format!(
                "expected string, got {:?}",
                other
            ))),
        }
    }
}

impl WriteToBytes for LenEncStr {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let len = match self {
            LenEncStr::Null => out.write_u8(0xfb)?,
            LenEncStr::Err => out.write_u8(0xff)?,
            LenEncStr::Bytes(bs) => {
                let lei = LenEncInt::from(bs.len() as u64);
                let lei_len = lei.write_to(out)?;
                lei_len + out.write_bytes(bs)?
            }
        };
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_enc_int_1() {
        let mut bs = Bytes::from_static(&[0x0a_u8]);
        let lei = bs.read_len_enc_int().unwrap();
        assert_eq!(LenEncInt::Len1(0x0a), lei);
        let mut encoded = BytesMut::new();
        lei.write_to(&mut encoded).unwrap();
        assert_eq!(&[0x0a_u8][..], &encoded[..]);
    }

    #[test]
    fn test_len_enc_int_3() {
        let mut bs = Bytes::from_static(&[0xfc_u8, 0x1d, 0x05]);
        let lei = bs.read_len_enc_int().unwrap();
        assert_eq!(LenEncInt::Len3(0x051d_u16), lei);
        let mut encoded = BytesMut::new();
        lei.write_to(&mut encoded).unwrap();
        assert_eq!(&[0xfc_u8, 0x1d, 0x05][..], &encoded[..]);
    }

    #[test]
    fn test_len_enc_int_4() {
        let mut bs = Bytes::from_static(&[0xfd_u8, 0xc2, 0xb2, 0xa2]);
        let lei = bs.read_len_enc_int().unwrap();
        assert_eq!(LenEncInt::Len4(0xa2b2c2_u32), lei);
    }

    #[test]
    fn test_len_enc_int_9() {
        let mut bs = Bytes::from_static(&[0xfe, 0x0d, 0x0c, 0x0b, 0x0a, 0x04, 0x03, 0x02, 0x01]);
        let lei = bs.read_len_enc_int().unwrap();
        assert_eq!(LenEncInt::Len9(0x010203040a0b0c0d_u64), lei);
    }

    #[test]
    fn test_len_enc_int_null_and_err() {
        let mut bs = Bytes::from_static(&[0xfb_u8]);
        assert_eq!(LenEncInt::Null, bs.read_len_enc_int().unwrap());
        let mut bs = Bytes::from_static(&[0xff_u8]);
        assert_eq!(LenEncInt::Err, bs.read_len_enc_int().unwrap());
    }

    #[test]
    fn test_len_enc_str() {
        let mut bs = Bytes::from_static(b"\x05hello");
        let les = bs.read_len_enc_str().unwrap();
        assert_eq!(LenEncStr::Bytes(Bytes::from_static(b"hello")), les);
        let mut encoded = BytesMut::new();
        les.write_to(&mut encoded).unwrap();
        assert_eq!(&b"\x05hello"[..], &encoded[..]);
    }

    #[test]
    fn test_len_enc_str_incomplete() {
        let mut bs = Bytes::from_static(b"\x05hel");
        assert!(bs.read_len_enc_str().is_err());
    }
}
