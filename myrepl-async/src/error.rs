use myrepl_core::packet::ErrPacket;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// client-side codes the server ecosystem uses for a dying connection
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
pub const CR_SERVER_LOST: u16 = 2013;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    IO(#[from] io::Error),
    #[error("address not found")]
    AddrNotFound,
    #[error("parse error: {0}")]
    ParseError(#[from] bytes_parser::error::Error),
    #[error("binlog error: {0}")]
    BinlogError(#[from] myrepl_core::Error),
    #[error("packet error: {0}")]
    PacketError(String),
    #[error("sql error: {0:?}")]
    SqlError(SqlError),
    #[error("utf8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    #[error("parse int error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("protocol inconsistency: {0}")]
    ProtocolInconsistency(String),
    #[error("stream closed")]
    StreamClosed,
}

impl Error {
    /// whether the failure warrants a transparent reconnect
    ///
    /// covers a dropped socket and the client codes 2013 (connection
    /// lost) and 2006 (server gone away); everything else is fatal
    /// for the session
    pub fn is_transient(&self) -> bool {
        match self {
            Error::IO(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            Error::SqlError(e) => {
                e.error_code == CR_SERVER_LOST || e.error_code == CR_SERVER_GONE_ERROR
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlError {
    pub error_code: u16,
    pub sql_state: String,
    pub error_message: String,
}

impl From<ErrPacket> for Error {
    fn from(err: ErrPacket) -> Error {
        Error::SqlError(SqlError {
            error_code: err.error_code,
            sql_state: String::from_utf8_lossy(&err.sql_state).into_owned(),
            error_message: String::from_utf8_lossy(&err.error_message).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let lost = Error::SqlError(SqlError {
            error_code: 2013,
            sql_state: String::new(),
            error_message: "Lost connection".to_owned(),
        });
        assert!(lost.is_transient());
        let gone = Error::SqlError(SqlError {
            error_code: 2006,
            sql_state: String::new(),
            error_message: "gone away".to_owned(),
        });
        assert!(gone.is_transient());
        let syntax = Error::SqlError(SqlError {
            error_code: 1064,
            sql_state: "42000".to_owned(),
            error_message: "syntax".to_owned(),
        });
        assert!(!syntax.is_transient());
        let reset = Error::IO(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(reset.is_transient());
        let denied = Error::IO(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(!denied.is_transient());
    }
}
