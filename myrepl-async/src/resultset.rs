use crate::conn::Conn;
use crate::error::{Error, Result};
use bytes::Bytes;
use bytes_parser::my::ReadMyEnc;
use bytes_parser::ReadFromBytesWithContext;
use futures::io::{AsyncRead, AsyncWrite};
use myrepl_core::col::ColumnDefinition;
use myrepl_core::packet::{ErrPacket, OkPacket};
use myrepl_core::row::TextRow;

/// fully buffered text result set
///
/// the client only queries small metadata sets (SHOW ..., a single
/// table out of information_schema), streaming buys nothing here
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub col_defs: Vec<ColumnDefinition>,
    pub rows: Vec<TextRow>,
}

impl ResultSet {
    pub fn empty() -> Self {
        ResultSet {
            col_defs: vec![],
            rows: vec![],
        }
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.col_defs
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// raw cell bytes, None for SQL NULL or out-of-range access
    pub fn cell(&self, row: usize, col: usize) -> Option<&Bytes> {
        self.rows.get(row)?.0.get(col)?.as_ref()
    }

    /// cell decoded as utf-8 text
    pub fn cell_str(&self, row: usize, col: usize) -> Option<String> {
        self.cell(row, col)
            .map(|bs| String::from_utf8_lossy(bs).into_owned())
    }
}

/// read the response of a COM_QUERY off the connection
///
/// https://dev.mysql.com/doc/internals/en/com-query-response.html
pub(crate) async fn read_result_set<S>(conn: &mut Conn<S>) -> Result<ResultSet>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut msg = conn.recv_msg().await?;
    if msg.is_empty() {
        return Err(Error::PacketError("empty query response".to_owned()));
    }
    match msg[0] {
        0xff => {
            let cap_flags = conn.cap_flags;
            let err = ErrPacket::read_with_ctx(&mut msg, (&cap_flags, true))?;
            return Err(err.into());
        }
        0x00 => {
            let cap_flags = conn.cap_flags;
            OkPacket::read_with_ctx(&mut msg, &cap_flags)?;
            return Ok(ResultSet::empty());
        }
        _ => (),
    }
    let col_cnt = msg
        .read_len_enc_int()?
        .to_u64()
        .ok_or_else(|| Error::PacketError("invalid column count".to_owned()))?;
    let mut col_defs = Vec::with_capacity(col_cnt as usize);
    for _ in 0..col_cnt {
        let mut msg = conn.recv_msg().await?;
        col_defs.push(ColumnDefinition::read_with_ctx(&mut msg, ())?);
    }
    // EOF terminates the column definitions
    conn.recv_msg().await?;
    let mut rows = Vec::new();
    loop {
        let mut msg = conn.recv_msg().await?;
        if msg.is_empty() {
            return Err(Error::PacketError("empty row packet".to_owned()));
        }
        match msg[0] {
            0xfe if msg.len() < 9 => break,
            0xff => {
                let cap_flags = conn.cap_flags;
                let err = ErrPacket::read_with_ctx(&mut msg, (&cap_flags, true))?;
                return Err(err.into());
            }
            _ => rows.push(TextRow::read_from(&mut msg, col_cnt as usize)?),
        }
    }
    Ok(ResultSet { col_defs, rows })
}
