use crate::bitmap;
use crate::col::{BinlogColumnValue, ColumnMeta, TextColumnValue};
use bytes::Bytes;
use bytes_parser::error::{Error, Result};
use bytes_parser::my::{LenEncStr, ReadMyEnc};
use bytes_parser::ReadFromBytesWithContext;

/// row of a text result set
#[derive(Debug, Clone)]
pub struct TextRow(pub Vec<TextColumnValue>);

impl TextRow {
    pub fn read_from(input: &mut Bytes, col_cnt: usize) -> Result<Self> {
        let mut tcvs = Vec::with_capacity(col_cnt);
        for _ in 0..col_cnt {
            match input.read_len_enc_str()? {
                LenEncStr::Null => tcvs.push(None),
                LenEncStr::Bytes(bs) => tcvs.push(Some(bs)),
                LenEncStr::Err => {
                    return Err(Error::ConstraintError(
                        "invalid text column value".to_owned(),
                    ))
                }
            }
        }
        Ok(TextRow(tcvs))
    }
}

/// one row image of a binlog rows event
///
/// columns cleared in the combined bitmap, whether absent from the
/// image or NULL, surface as Null
#[derive(Debug, Clone)]
pub struct LogRow(pub Vec<BinlogColumnValue>);

impl LogRow {
    pub fn read_from(
        input: &mut Bytes,
        n_cols: usize,
        col_bm: &[u8],
        col_metas: &[ColumnMeta],
    ) -> Result<Self> {
        if col_metas.len() < n_cols {
            return Err(Error::ConstraintError(format!(
                "column metadata too short: {} < {}",
                col_metas.len(),
                n_cols
            )));
        }
        let mut cols = Vec::with_capacity(n_cols);
        for (i, col_meta) in col_metas.iter().enumerate().take(n_cols) {
            if bitmap::index(col_bm, i) {
                cols.push(BinlogColumnValue::read_with_ctx(input, col_meta)?);
            } else {
                cols.push(BinlogColumnValue::Null);
            }
        }
        Ok(LogRow(cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_row() {
        let mut input = Bytes::from_static(b"\x05hello\xfb\x012");
        let row = TextRow::read_from(&mut input, 3).unwrap();
        assert_eq!(Some(Bytes::from_static(b"hello")), row.0[0]);
        assert_eq!(None, row.0[1]);
        assert_eq!(Some(Bytes::from_static(b"2")), row.0[2]);
    }

    #[test]
    fn test_log_row_with_nulls() {
        let metas = vec![ColumnMeta::Long, ColumnMeta::Varchar { max_len: 50 }];
        // only column 0 present and non-null
        let col_bm = [0b01u8];
        let mut input = Bytes::from(vec![1, 0, 0, 0]);
        let row = LogRow::read_from(&mut input, 2, &col_bm, &metas).unwrap();
        assert_eq!(BinlogColumnValue::Long(1), row.0[0]);
        assert_eq!(BinlogColumnValue::Null, row.0[1]);
    }
}
