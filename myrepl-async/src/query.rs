use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::resultset::{read_result_set, ResultSet};
use bytes_parser::ReadFromBytesWithContext;
use futures::io::{AsyncRead, AsyncWrite};
use myrepl_core::cmd::ComQuery;
use myrepl_core::packet::{ErrPacket, OkPacket};

/// wrapper on Conn providing plain query execution
#[derive(Debug)]
pub struct Query<'a, S> {
    conn: &'a mut Conn<S>,
}

impl<'a, S> Query<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(conn: &'a mut Conn<S>) -> Self {
        Query { conn }
    }

    /// execute a statement that returns no rows
    pub async fn exec<Q: Into<String>>(self, qry: Q) -> Result<()> {
        let qry = ComQuery::new(qry);
        self.conn.send_msg(qry, true).await?;
        loop {
            let mut msg = self.conn.recv_msg().await?;
            if msg.is_empty() {
                return Err(Error::PacketError("empty query response".to_owned()));
            }
            match msg[0] {
                0xff => {
                    let cap_flags = self.conn.cap_flags;
                    let err = ErrPacket::read_with_ctx(&mut msg, (&cap_flags, true))?;
                    return Err(err.into());
                }
                0x00 => {
                    let cap_flags = self.conn.cap_flags;
                    OkPacket::read_with_ctx(&mut msg, &cap_flags)?;
                    return Ok(());
                }
                _ => {
                    log::warn!("statement execution returned data, draining");
                }
            }
        }
    }

    /// run a query and buffer its text result set
    pub async fn qry<Q: Into<String>>(self, qry: Q) -> Result<ResultSet> {
        let qry = ComQuery::new(qry);
        self.conn.send_msg(qry, true).await?;
        read_result_set(self.conn).await
    }
}
