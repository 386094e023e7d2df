//! rows events, v1 (5.1.18+) and v2 (5.6+) layouts
use crate::bitmap;
use crate::col::ColumnMeta;
use crate::row::LogRow;
use bytes::{Buf, Bytes};
use bytes_parser::error::{Error, Result};
use bytes_parser::my::ReadMyEnc;
use bytes_parser::ReadBytesExt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowsEventVersion {
    V1,
    V2,
}

/// common shape of WRITE/UPDATE/DELETE rows events
///
/// reference: https://dev.mysql.com/doc/internals/en/rows-event.html
/// v2 inserts a variable extra-data block after the post header
#[derive(Debug, Clone)]
pub struct RowsData {
    // actually a 6-byte integer
    pub table_id: u64,
    pub flags: u16,
    pub extra_data: Bytes,
    // variable part, decoded on demand against the table map
    pub payload: Bytes,
}

impl RowsData {
    pub fn read_with_version(input: &mut Bytes, version: RowsEventVersion) -> Result<Self> {
        let table_id = input.read_le_u48()?;
        let flags = input.read_le_u16()?;
        let extra_data = match version {
            RowsEventVersion::V1 => Bytes::new(),
            RowsEventVersion::V2 => {
                // the length counts its own two bytes
                let extra_data_len = input.read_le_u16()?;
                if extra_data_len < 2 {
                    return Err(Error::ConstraintError(format!(
                        "invalid extra data length: {}",
                        extra_data_len
                    )));
                }
                input.read_len(extra_data_len as usize - 2)?
            }
        };
        let payload = input.split_to(input.remaining());
        Ok(RowsData {
            table_id,
            flags,
            extra_data,
            payload,
        })
    }

    /// decode write/delete row images against the column metadata
    /// of the matching table map
    pub fn rows(&self, col_metas: &[ColumnMeta]) -> Result<Rows> {
        Rows::read_from(&mut self.payload.clone(), col_metas)
    }

    /// decode update row image pairs
    pub fn update_rows(&self, col_metas: &[ColumnMeta]) -> Result<UpdateRows> {
        UpdateRows::read_from(&mut self.payload.clone(), col_metas)
    }
}

fn read_n_cols(input: &mut Bytes) -> Result<u32> {
    let n_cols = input.read_len_enc_int()?;
    n_cols
        .to_u32()
        .ok_or_else(|| Error::ConstraintError(format!("invalid column count: {:?}", n_cols)))
}

/// combine the present bitmap with one row's null bitmap into the
/// per-column decode mask
fn combined_bitmap(present: &[u8], null_bm: &[u8], n_cols: usize) -> Vec<u8> {
    let mut col_bitmap = Vec::from(present);
    let mut null_idx = 0;
    for j in 0..n_cols {
        if bitmap::index(present, j) {
            bitmap::mark(&mut col_bitmap, j, !bitmap::index(null_bm, null_idx));
            null_idx += 1;
        }
    }
    col_bitmap
}

#[derive(Debug, Clone)]
pub struct Rows {
    pub n_cols: u32,
    // changed columns for WRITE, identifying columns for DELETE
    pub present_bitmap: Bytes,
    pub rows: Vec<LogRow>,
}

impl Rows {
    fn read_from(input: &mut Bytes, col_metas: &[ColumnMeta]) -> Result<Rows> {
        let n_cols = read_n_cols(input)?;
        let bitmap_len = (n_cols as usize + 7) >> 3;
        let present_bitmap = input.read_len(bitmap_len)?;
        let present_cols = bitmap::count_ones(&present_bitmap, n_cols as usize);
        let null_bitmap_len = (present_cols + 7) >> 3;
        let mut rows = Vec::new();
        while input.has_remaining() {
            let null_bitmap = input.read_len(null_bitmap_len)?;
            let col_bm = combined_bitmap(&present_bitmap, &null_bitmap, n_cols as usize);
            rows.push(LogRow::read_from(input, n_cols as usize, &col_bm, col_metas)?);
        }
        Ok(Rows {
            n_cols,
            present_bitmap,
            rows,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateRow {
    pub before: LogRow,
    pub after: LogRow,
}

#[derive(Debug, Clone)]
pub struct UpdateRows {
    pub n_cols: u32,
    pub before_present_bitmap: Bytes,
    pub after_present_bitmap: Bytes,
    pub rows: Vec<UpdateRow>,
}

impl UpdateRows {
    fn read_from(input: &mut Bytes, col_metas: &[ColumnMeta]) -> Result<UpdateRows> {
        let n_cols = read_n_cols(input)?;
        let bitmap_len = (n_cols as usize + 7) >> 3;
        let before_present_bitmap = input.read_len(bitmap_len)?;
        let after_present_bitmap = input.read_len(bitmap_len)?;
        let before_present_cols = bitmap::count_ones(&before_present_bitmap, n_cols as usize);
        let after_present_cols = bitmap::count_ones(&after_present_bitmap, n_cols as usize);
        let before_null_len = (before_present_cols + 7) >> 3;
        let after_null_len = (after_present_cols + 7) >> 3;
        let mut rows = Vec::new();
        while input.has_remaining() {
            let null_bitmap = input.read_len(before_null_len)?;
            let col_bm = combined_bitmap(&before_present_bitmap, &null_bitmap, n_cols as usize);
            let before = LogRow::read_from(input, n_cols as usize, &col_bm, col_metas)?;
            let null_bitmap = input.read_len(after_null_len)?;
            let col_bm = combined_bitmap(&after_present_bitmap, &null_bitmap, n_cols as usize);
            let after = LogRow::read_from(input, n_cols as usize, &col_bm, col_metas)?;
            rows.push(UpdateRow { before, after });
        }
        Ok(UpdateRows {
            n_cols,
            before_present_bitmap,
            after_present_bitmap,
            rows,
        })
    }
}
