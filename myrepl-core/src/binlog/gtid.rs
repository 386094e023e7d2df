//! gtid events and the gtid set codec used for auto-positioning
use crate::error::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use bytes_parser::error::Result as BResult;
use bytes_parser::{ReadBytesExt, ReadFromBytes, WriteBytesExt, WriteToBytes};
use linked_hash_map::LinkedHashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Data of GtidEvent
///
/// reference: https://github.com/mysql/mysql-server/blob/5.7/libbinlogevents/include/control_events.h#L933
#[derive(Debug, Clone)]
pub struct GtidLogData {
    pub gtid_flags: u8,
    pub sid: Uuid,
    pub gno: u64,
    // absent in versions earlier than 5.7.4
    pub ts_type: u8,
    pub last_committed: u64,
    pub seq_num: u64,
}

impl ReadFromBytes for GtidLogData {
    fn read_from(input: &mut Bytes) -> BResult<Self> {
        let gtid_flags = input.read_u8()?;
        let sid_bytes = input.read_len(16)?;
        let mut sid = [0u8; 16];
        sid.copy_from_slice(&sid_bytes);
        let sid = Uuid::from_bytes(sid);
        let gno = input.read_le_u64()?;
        // 25 bytes consumed so far
        let (ts_type, last_committed, seq_num) = if input.remaining() >= 17 {
            (
                input.read_u8()?,
                input.read_le_u64()?,
                input.read_le_u64()?,
            )
        } else {
            (0, 0, 0)
        };
        Ok(GtidLogData {
            gtid_flags,
            sid,
            gno,
            ts_type,
            last_committed,
            seq_num,
        })
    }
}

/// Data of PreviousGtidsEvent
///
/// the payload is a wire-encoded gtid set, layout per
/// https://github.com/mysql/mysql-server/blob/5.7/sql/rpl_gtid_set.cc#L1469
#[derive(Debug, Clone)]
pub struct PreviousGtidsData {
    pub payload: Bytes,
}

impl PreviousGtidsData {
    pub fn gtid_set(&self) -> Result<GtidSet> {
        GtidSet::read_from(&mut self.payload.clone()).map_err(Into::into)
    }
}

impl ReadFromBytes for PreviousGtidsData {
    fn read_from(input: &mut Bytes) -> BResult<Self> {
        let payload = input.split_to(input.remaining());
        Ok(PreviousGtidsData { payload })
    }
}

/// half-open transaction number range [start, stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtidInterval {
    pub start: u64,
    pub stop: u64,
}

/// set of executed transactions, one ordered disjoint interval
/// list per server uuid
///
/// text form: `sid:start-stop[:start-stop...][,sid:...]`, where the
/// text ranges are inclusive and a bare `sid:n` covers one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GtidSet {
    sids: LinkedHashMap<Uuid, Vec<GtidInterval>>,
}

impl GtidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    pub fn intervals(&self, sid: &Uuid) -> Option<&[GtidInterval]> {
        self.sids.get(sid).map(|v| &v[..])
    }

    /// insert an interval, merging overlapping and adjacent ranges
    pub fn add(&mut self, sid: Uuid, interval: GtidInterval) -> Result<()> {
        if interval.start == 0 || interval.stop <= interval.start {
            return Err(Error::InvalidGtidSet(format!(
                "invalid interval: start={}, stop={}",
                interval.start, interval.stop
            )));
        }
        let intervals = self.sids.entry(sid).or_insert_with(Vec::new);
        intervals.push(interval);
        intervals.sort_by_key(|iv| iv.start);
        let mut merged: Vec<GtidInterval> = Vec::with_capacity(intervals.len());
        for iv in intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if iv.start <= last.stop => {
                    last.stop = last.stop.max(iv.stop);
                }
                _ => merged.push(iv),
            }
        }
        *intervals = merged;
        Ok(())
    }

    /// record one more executed transaction, extending the tail
    /// interval when contiguous
    pub fn add_gtid(&mut self, sid: Uuid, gno: u64) -> Result<()> {
        self.add(
            sid,
            GtidInterval {
                start: gno,
                stop: gno + 1,
            },
        )
    }

    /// wire length: 8 + per sid 16 + 8 + 16 * n_intervals
    pub fn encoded_len(&self) -> usize {
        8 + self
            .sids
            .values()
            .map(|ivs| 16 + 8 + 16 * ivs.len())
            .sum::<usize>()
    }
}

impl FromStr for GtidSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = GtidSet::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut pieces = part.split(':');
            let sid = pieces
                .next()
                .ok_or_else(|| Error::InvalidGtidSet(part.to_owned()))?;
            let sid = Uuid::parse_str(sid)?;
            let mut any = false;
            for range in pieces {
                any = true;
                let mut bounds = range.splitn(2, '-');
                let start: u64 = bounds
                    .next()
                    .ok_or_else(|| Error::InvalidGtidSet(range.to_owned()))?
                    .parse()?;
                let stop = match bounds.next() {
                    // text ranges are inclusive
                    Some(end) => end.parse::<u64>()? + 1,
                    None => start + 1,
                };
                set.add(sid, GtidInterval { start, stop })?;
            }
            if !any {
                return Err(Error::InvalidGtidSet(format!(
                    "no interval for sid {}",
                    sid
                )));
            }
        }
        Ok(set)
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first_sid = true;
        for (sid, intervals) in &self.sids {
            if !first_sid {
                write!(f, ",")?;
            }
            first_sid = false;
            write!(f, "{}", sid)?;
            for iv in intervals {
                if iv.stop == iv.start + 1 {
                    write!(f, ":{}", iv.start)?;
                } else {
                    write!(f, ":{}-{}", iv.start, iv.stop - 1)?;
                }
            }
        }
        Ok(())
    }
}

/// wire form, all little-endian unsigned:
/// n_sids u64, then per sid: uuid 16 bytes, n_intervals u64,
/// then start u64 / stop u64 per interval
impl ReadFromBytes for GtidSet {
    fn read_from(input: &mut Bytes) -> BResult<Self> {
        let n_sids = input.read_le_u64()?;
        let mut sids = LinkedHashMap::with_capacity(n_sids as usize);
        for _ in 0..n_sids {
            let sid_bytes = input.read_len(16)?;
            let mut sid = [0u8; 16];
            sid.copy_from_slice(&sid_bytes);
            let sid = Uuid::from_bytes(sid);
            let n_intervals = input.read_le_u64()?;
            let mut intervals = Vec::with_capacity(n_intervals as usize);
            let mut last = 0u64;
            for _ in 0..n_intervals {
                let start = input.read_le_u64()?;
                let stop = input.read_le_u64()?;
                if start <= last || stop <= start {
                    return Err(bytes_parser::error::Error::ConstraintError(format!(
                        "invalid gtid interval: start={}, stop={}, last={}",
                        start, stop, last
                    )));
                }
                last = stop;
                intervals.push(GtidInterval { start, stop });
            }
            sids.insert(sid, intervals);
        }
        Ok(GtidSet { sids })
    }
}

impl WriteToBytes for GtidSet {
    fn write_to(self, out: &mut BytesMut) -> BResult<usize> {
        let mut len = 0;
        len += out.write_le_u64(self.sids.len() as u64)?;
        for (sid, intervals) in &self.sids {
            len += out.write_bytes(&sid.as_bytes()[..])?;
            len += out.write_le_u64(intervals.len() as u64)?;
            for iv in intervals {
                len += out.write_le_u64(iv.start)?;
                len += out.write_le_u64(iv.stop)?;
            }
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SID1: &str = "57b70f4e-20d3-11e5-a393-4a63946f7eac";
    const SID2: &str = "4350f323-7565-4e59-8763-4b1b83a0ce0e";

    #[test]
    fn test_parse_single_interval() {
        let set: GtidSet = format!("{}:1-56", SID1).parse().unwrap();
        let sid = Uuid::parse_str(SID1).unwrap();
        assert_eq!(
            &[GtidInterval { start: 1, stop: 57 }][..],
            set.intervals(&sid).unwrap()
        );
    }

    #[test]
    fn test_parse_single_transaction() {
        let set: GtidSet = format!("{}:5", SID1).parse().unwrap();
        let sid = Uuid::parse_str(SID1).unwrap();
        assert_eq!(
            &[GtidInterval { start: 5, stop: 6 }][..],
            set.intervals(&sid).unwrap()
        );
    }

    #[test]
    fn test_parse_multi_sid_multi_interval() {
        let text = format!("{}:1-3:8-10,{}:42-47:80-100:130-140", SID1, SID2);
        let set: GtidSet = text.parse().unwrap();
        let sid2 = Uuid::parse_str(SID2).unwrap();
        assert_eq!(3, set.intervals(&sid2).unwrap().len());
        assert_eq!(text, set.to_string());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-uuid:1-3".parse::<GtidSet>().is_err());
        assert!(format!("{}:0", SID1).parse::<GtidSet>().is_err());
        assert!(format!("{}", SID1).parse::<GtidSet>().is_err());
    }

    #[test]
    fn test_interval_merge() {
        let sid = Uuid::parse_str(SID1).unwrap();
        let mut set = GtidSet::new();
        set.add(sid, GtidInterval { start: 1, stop: 4 }).unwrap();
        set.add(sid, GtidInterval { start: 8, stop: 11 }).unwrap();
        // adjacent to the first
        set.add(sid, GtidInterval { start: 4, stop: 6 }).unwrap();
        assert_eq!(
            &[
                GtidInterval { start: 1, stop: 6 },
                GtidInterval { start: 8, stop: 11 }
            ][..],
            set.intervals(&sid).unwrap()
        );
        // contiguous gno extends the tail
        set.add_gtid(sid, 11).unwrap();
        assert_eq!(
            &[
                GtidInterval { start: 1, stop: 6 },
                GtidInterval { start: 8, stop: 12 }
            ][..],
            set.intervals(&sid).unwrap()
        );
    }

    #[test]
    fn test_encoded_len() {
        let set: GtidSet = format!("{}:1-3:8-10,{}:42-47", SID1, SID2).parse().unwrap();
        // 8 + (16 + 8 + 2 * 16) + (16 + 8 + 16)
        assert_eq!(104, set.encoded_len());
    }

    #[test]
    fn test_wire_round_trip() {
        let text = format!("{}:1-3:8-10,{}:42-47:80-100", SID1, SID2);
        let set: GtidSet = text.parse().unwrap();
        let mut out = BytesMut::new();
        let len = set.clone().write_to(&mut out).unwrap();
        assert_eq!(set.encoded_len(), len);
        assert_eq!(len, out.len());
        let decoded = GtidSet::read_from(&mut out.freeze()).unwrap();
        assert_eq!(set, decoded);
        assert_eq!(text, decoded.to_string());
    }

    #[test]
    fn test_wire_uuid_byte_order() {
        let set: GtidSet = format!("{}:1", SID1).parse().unwrap();
        let mut out = BytesMut::new();
        set.write_to(&mut out).unwrap();
        // uuid bytes appear in text order right after n_sids
        assert_eq!(&[0x57u8, 0xb7, 0x0f, 0x4e], &out[8..12]);
    }

    #[test]
    fn test_gtid_log_data() {
        let sid = Uuid::parse_str(SID1).unwrap();
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(sid.as_bytes());
        bytes.extend_from_slice(&42u64.to_le_bytes());
        bytes.push(2);
        bytes.extend_from_slice(&7u64.to_le_bytes());
        bytes.extend_from_slice(&8u64.to_le_bytes());
        let mut input = Bytes::from(bytes);
        let gld = GtidLogData::read_from(&mut input).unwrap();
        assert_eq!(sid, gld.sid);
        assert_eq!(42, gld.gno);
        assert_eq!(7, gld.last_committed);
        assert_eq!(8, gld.seq_num);
    }
}
