pub mod binlog;
pub mod bitmap;
pub mod cmd;
pub mod col;
pub mod decimal;
pub mod error;
pub mod flag;
pub mod handshake;
pub mod packet;
pub mod row;
pub mod time;

pub use crate::error::{Error, Result};

/// commands this client sends to the server
///
/// the full command space is larger, a replication client
/// only ever issues these
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Quit,
    Query,
    BinlogDump,
    BinlogDumpGtid,
}

impl Command {
    pub fn to_byte(self) -> u8 {
        match self {
            Command::Quit => 0x01,
            Command::Query => 0x03,
            Command::BinlogDump => 0x12,
            Command::BinlogDumpGtid => 0x1e,
        }
    }
}
